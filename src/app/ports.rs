use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    DuplicateLogEntry, ImportRunResult, ModerationResult, NewEvent, OrganizerSummary,
    ProgressLogEntry, RawEvent, SourceConfig, StoredEvent,
};

// Ingest-side ports
#[async_trait]
pub trait EventSourcePort: Send + Sync {
    async fn fetch_events(&self, source: &SourceConfig) -> Result<Vec<RawEvent>>;
}

#[async_trait]
pub trait TextClassifierPort: Send + Sync {
    /// Returns a raw label; the caller validates it against the category set.
    async fn classify(&self, name: &str, description: Option<&str>, venue_or_location: &str) -> Result<String>;
}

#[async_trait]
pub trait ContentSafetyPort: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<ModerationResult>;
}

/// Gate awaited before every external classifier call.
#[async_trait]
pub trait PacingPort: Send + Sync {
    async fn wait(&self);
}

// Persistence ports
#[async_trait]
pub trait EventStorePort: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<StoredEvent>>;
    /// Events starting on `day` (UTC) whose venue contains `keyword`, case-insensitively.
    async fn find_by_day_and_venue(&self, day: NaiveDate, keyword: &str) -> Result<Vec<StoredEvent>>;
    async fn exists_by_identifier(&self, identifier: &str) -> Result<bool>;
    async fn insert(&self, event: NewEvent) -> Result<StoredEvent>;
}

#[async_trait]
pub trait OrganizerDirectoryPort: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Uuid>>;
    async fn find_by_venue(&self, venue: &str) -> Result<Option<Uuid>>;
    async fn find_by_contact(&self, email: Option<&str>, phone: Option<&str>) -> Result<Option<Uuid>>;
    async fn list_all_with_venue(&self) -> Result<Vec<OrganizerSummary>>;
}

// Output ports
#[async_trait]
pub trait TelemetrySinkPort: Send + Sync {
    async fn record_progress(&self, entry: ProgressLogEntry) -> Result<()>;
}

#[async_trait]
pub trait DuplicateLogSinkPort: Send + Sync {
    async fn write_duplicates(&self, entries: &[DuplicateLogEntry]) -> Result<()>;
}

#[async_trait]
pub trait RunHistoryPort: Send + Sync {
    async fn record_run(&self, result: &ImportRunResult) -> Result<()>;
}
