use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::ports::{
    DuplicateLogSinkPort, EventStorePort, OrganizerDirectoryPort, RunHistoryPort, TelemetrySinkPort,
};
use crate::error::{ImportError, Result};
use crate::pipeline::utils::StringUtils;
use crate::types::{
    parse_event_datetime, DuplicateLogEntry, ImportRunResult, NewEvent, OrganizerSummary, ProgressLogEntry,
    StoredEvent,
};

/// In-memory event catalog for development and testing
#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<StoredEvent>>,
    inserted: Mutex<Vec<NewEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<StoredEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            inserted: Mutex::new(Vec::new()),
        }
    }

    /// Seed the catalog from a JSON array of stored events
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let events: Vec<StoredEvent> = serde_json::from_str(&content)?;
        Ok(Self::with_events(events))
    }

    /// Events inserted through this store, in insertion order
    pub async fn inserted(&self) -> Vec<NewEvent> {
        self.inserted.lock().await.clone()
    }
}

#[async_trait]
impl EventStorePort for InMemoryEventStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredEvent>> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .find(|e| e.source_url.as_deref() == Some(url))
            .cloned())
    }

    async fn find_by_day_and_venue(&self, day: NaiveDate, keyword: &str) -> Result<Vec<StoredEvent>> {
        let keyword = keyword.to_lowercase();
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| {
                parse_event_datetime(&e.date_time).map(|dt| dt.date_naive()) == Some(day)
                    && e.venue.to_lowercase().contains(&keyword)
            })
            .cloned()
            .collect())
    }

    async fn exists_by_identifier(&self, identifier: &str) -> Result<bool> {
        let events = self.events.lock().await;
        Ok(events.iter().any(|e| e.identifier == identifier))
    }

    async fn insert(&self, event: NewEvent) -> Result<StoredEvent> {
        let mut events = self.events.lock().await;
        if events.iter().any(|e| e.identifier == event.identifier) {
            return Err(ImportError::Persistence(format!(
                "identifier '{}' already exists",
                event.identifier
            )));
        }

        let stored = StoredEvent {
            id: Uuid::new_v4(),
            identifier: event.identifier.clone(),
            name: event.name.clone(),
            date_time: event.date_time.clone(),
            venue: event.venue_name.clone().unwrap_or_else(|| event.location.clone()),
            source_url: event.source_url.clone(),
        };
        events.push(stored.clone());
        self.inserted.lock().await.push(event);

        debug!("Created event: {} with id {}", stored.name, stored.id);
        Ok(stored)
    }
}

/// Organizer as registered in the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// In-memory organizer directory
#[derive(Default)]
pub struct InMemoryOrganizerDirectory {
    organizers: Vec<OrganizerRecord>,
}

impl InMemoryOrganizerDirectory {
    pub fn new(organizers: Vec<OrganizerRecord>) -> Self {
        Self { organizers }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }
}

#[async_trait]
impl OrganizerDirectoryPort for InMemoryOrganizerDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Uuid>> {
        let name = name.trim().to_lowercase();
        Ok(self
            .organizers
            .iter()
            .find(|o| o.name.trim().to_lowercase() == name)
            .map(|o| o.id))
    }

    async fn find_by_venue(&self, venue: &str) -> Result<Option<Uuid>> {
        let venue = venue.trim().to_lowercase();
        Ok(self
            .organizers
            .iter()
            .find(|o| o.venue_name.as_deref().map(|v| v.trim().to_lowercase()) == Some(venue.clone()))
            .map(|o| o.id))
    }

    async fn find_by_contact(&self, email: Option<&str>, phone: Option<&str>) -> Result<Option<Uuid>> {
        if let Some(email) = email {
            let email = email.trim().to_lowercase();
            if let Some(o) = self
                .organizers
                .iter()
                .find(|o| o.email.as_deref().map(|e| e.trim().to_lowercase()) == Some(email.clone()))
            {
                return Ok(Some(o.id));
            }
        }
        if let Some(phone) = phone {
            let phone = StringUtils::strip_phone(phone);
            if phone.is_empty() {
                return Ok(None);
            }
            return Ok(self
                .organizers
                .iter()
                .find(|o| o.phone.as_deref().map(StringUtils::strip_phone) == Some(phone.clone()))
                .map(|o| o.id));
        }
        Ok(None)
    }

    async fn list_all_with_venue(&self) -> Result<Vec<OrganizerSummary>> {
        Ok(self
            .organizers
            .iter()
            .map(|o| OrganizerSummary {
                id: o.id,
                name: o.name.clone(),
                venue_name: o.venue_name.clone(),
            })
            .collect())
    }
}

/// Keeps progress entries in memory and mirrors them to the log
#[derive(Default)]
pub struct InMemoryTelemetrySink {
    entries: Mutex<Vec<ProgressLogEntry>>,
}

impl InMemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<ProgressLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl TelemetrySinkPort for InMemoryTelemetrySink {
    async fn record_progress(&self, entry: ProgressLogEntry) -> Result<()> {
        info!(
            run_id = %entry.run_id,
            step = ?entry.step,
            current = ?entry.progress_current,
            total = ?entry.progress_total,
            eta_ms = ?entry.estimated_time_remaining_ms,
            "{}",
            entry.message
        );
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDuplicateLog {
    entries: Mutex<Vec<DuplicateLogEntry>>,
    /// Number of batch writes received
    writes: Mutex<usize>,
}

impl InMemoryDuplicateLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<DuplicateLogEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl DuplicateLogSinkPort for InMemoryDuplicateLog {
    async fn write_duplicates(&self, entries: &[DuplicateLogEntry]) -> Result<()> {
        self.entries.lock().await.extend_from_slice(entries);
        *self.writes.lock().await += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRunHistory {
    runs: Mutex<Vec<ImportRunResult>>,
}

impl InMemoryRunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<ImportRunResult> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl RunHistoryPort for InMemoryRunHistory {
    async fn record_run(&self, result: &ImportRunResult) -> Result<()> {
        self.runs.lock().await.push(result.clone());
        Ok(())
    }
}
