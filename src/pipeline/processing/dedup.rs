use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::app::ports::EventStorePort;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::utils::StringUtils;
use crate::types::{DuplicateLogEntry, DuplicateMatchType, RawEvent, StoredEvent};

/// Default minimum name similarity for a fuzzy duplicate
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.85;

/// Outcome of both dedup phases over one batch
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub unique: Vec<RawEvent>,
    pub duplicates: Vec<DuplicateLogEntry>,
    /// Events dropped by the exact in-batch key check
    pub in_batch_dropped: usize,
}

/// Keep the first occurrence of every dedupe key, preserving order
pub fn dedupe_in_batch(events: Vec<RawEvent>) -> (Vec<RawEvent>, usize) {
    let mut seen = HashSet::new();
    let total = events.len();
    let kept: Vec<RawEvent> = events
        .into_iter()
        .filter(|event| seen.insert(event.dedupe_key()))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Two-phase deduplication against the batch itself and the persisted catalog
pub struct DeduplicationEngine {
    store: Arc<dyn EventStorePort>,
    threshold: f64,
}

impl DeduplicationEngine {
    pub fn new(store: Arc<dyn EventStorePort>) -> Self {
        Self::with_threshold(store, DEFAULT_DUPLICATE_THRESHOLD)
    }

    pub fn with_threshold(store: Arc<dyn EventStorePort>, threshold: f64) -> Self {
        Self { store, threshold }
    }

    /// Run both phases. Store failures propagate and abort the run.
    pub async fn deduplicate(&self, source_name: &str, events: Vec<RawEvent>) -> Result<DedupOutcome> {
        let (candidates, in_batch_dropped) = dedupe_in_batch(events);
        if in_batch_dropped > 0 {
            info!(source = source_name, dropped = in_batch_dropped, "Collapsed in-batch duplicates");
            metrics::dedup::in_batch_dropped(source_name, in_batch_dropped);
        }

        let mut outcome = DedupOutcome {
            in_batch_dropped,
            ..Default::default()
        };

        for event in candidates {
            match self.find_persisted_duplicate(source_name, &event).await? {
                Some(entry) => {
                    info!(
                        source = source_name,
                        event = %event.name,
                        existing_id = %entry.existing_event_id,
                        match_type = ?entry.match_type,
                        similarity = entry.similarity_score,
                        "Skipping duplicate of persisted event"
                    );
                    outcome.duplicates.push(entry);
                }
                None => outcome.unique.push(event),
            }
        }

        Ok(outcome)
    }

    /// Check one event against the persisted store: URL first, then fuzzy name on the same day and venue
    pub async fn find_persisted_duplicate(
        &self,
        source_name: &str,
        event: &RawEvent,
    ) -> Result<Option<DuplicateLogEntry>> {
        if let Some(url) = event.source_url() {
            if let Some(existing) = self.store.find_by_url(url).await? {
                metrics::dedup::url_duplicate(source_name);
                return Ok(Some(Self::log_entry(
                    source_name,
                    event,
                    &existing,
                    1.0,
                    DuplicateMatchType::Url,
                )));
            }
        }

        let Some(keyword) = StringUtils::venue_keyword(event.venue_or_location()) else {
            debug!(event = %event.name, "No venue keyword; treating as unique");
            return Ok(None);
        };
        let Some(starts_at) = event.starts_at() else {
            debug!(event = %event.name, date_time = %event.date_time, "Unparseable date; treating as unique");
            return Ok(None);
        };

        let candidates = self
            .store
            .find_by_day_and_venue(starts_at.date_naive(), &keyword)
            .await?;

        let best = candidates
            .iter()
            .map(|candidate| (StringUtils::event_name_similarity(&event.name, &candidate.name), candidate))
            .filter(|(score, _)| *score >= self.threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        Ok(best.map(|(score, existing)| {
            metrics::dedup::fuzzy_duplicate(source_name, score);
            Self::log_entry(source_name, event, existing, score, DuplicateMatchType::FuzzyName)
        }))
    }

    fn log_entry(
        source_name: &str,
        event: &RawEvent,
        existing: &StoredEvent,
        similarity_score: f64,
        match_type: DuplicateMatchType,
    ) -> DuplicateLogEntry {
        DuplicateLogEntry {
            source_name: source_name.to_string(),
            scraper_event_name: event.name.clone(),
            scraper_event_url: event.source_url().map(str::to_string),
            existing_event_id: existing.id,
            existing_event_name: existing.name.clone(),
            existing_event_url: existing.source_url.clone(),
            similarity_score,
            match_type,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::infra::in_memory::InMemoryEventStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn raw(name: &str, date_time: &str, venue: &str) -> RawEvent {
        RawEvent {
            name: name.to_string(),
            date_time: date_time.to_string(),
            location: "Varberg".to_string(),
            venue_name: Some(venue.to_string()),
            ..Default::default()
        }
    }

    fn stored(name: &str, date_time: &str, venue: &str, url: Option<&str>) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            identifier: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            date_time: date_time.to_string(),
            venue: venue.to_string(),
            source_url: url.map(str::to_string),
        }
    }

    #[test]
    fn test_in_batch_keeps_first_occurrence() {
        let mut first = raw("Jazzkväll", "2025-12-01T19:00:00Z", "Societetshuset");
        first.description = Some("first".to_string());
        let mut second = raw("Jazzkväll", "2025-12-01T21:00:00Z", "Societetshuset");
        second.description = Some("second".to_string());
        let other = raw("Jazzkväll", "2025-12-02T19:00:00Z", "Societetshuset");

        let (kept, dropped) = dedupe_in_batch(vec![first, second, other]);
        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].description.as_deref(), Some("first"));
        assert_eq!(kept[1].date_time, "2025-12-02T19:00:00Z");
    }

    #[test]
    fn test_in_batch_does_not_collapse_punctuation_differences() {
        let a = raw("Rock & Blues", "2025-12-01T19:00:00Z", "Harrys");
        let b = raw("Rock and Blues", "2025-12-01T19:00:00Z", "Harrys");
        let (kept, dropped) = dedupe_in_batch(vec![a, b]);
        assert_eq!(dropped, 0);
        assert_eq!(kept.len(), 2);
    }

    #[tokio::test]
    async fn test_url_match_is_duplicate_with_full_similarity() {
        let existing = stored("Annat namn", "2025-06-01T10:00:00Z", "Torget", Some("https://ex.se/e/1"));
        let store = Arc::new(InMemoryEventStore::with_events(vec![existing.clone()]));
        let engine = DeduplicationEngine::new(store);

        let mut event = raw("Helt nytt evenemang", "2025-12-01T19:00:00Z", "Annanstans");
        event.source_url = Some("https://ex.se/e/1".to_string());

        let outcome = engine.deduplicate("kultur", vec![event]).await.unwrap();
        assert!(outcome.unique.is_empty());
        assert_eq!(outcome.duplicates.len(), 1);
        let entry = &outcome.duplicates[0];
        assert_eq!(entry.match_type, DuplicateMatchType::Url);
        assert_eq!(entry.similarity_score, 1.0);
        assert_eq!(entry.existing_event_id, existing.id);
        assert_eq!(entry.scraper_event_url.as_deref(), Some("https://ex.se/e/1"));
    }

    #[tokio::test]
    async fn test_fuzzy_name_match_on_same_day_and_venue_keyword() {
        let existing = stored("Julmarknad Varberg", "2025-12-13T10:00:00Z", "Stadsparken Varberg", None);
        let store = Arc::new(InMemoryEventStore::with_events(vec![existing.clone()]));
        let engine = DeduplicationEngine::new(store);

        let event = raw("Julmarknad i Varberg", "2025-12-13T12:00:00Z", "Stadsparken");
        let outcome = engine.deduplicate("kultur", vec![event]).await.unwrap();

        assert!(outcome.unique.is_empty());
        let entry = &outcome.duplicates[0];
        assert_eq!(entry.match_type, DuplicateMatchType::FuzzyName);
        assert!(entry.similarity_score >= 0.85);
        assert_eq!(entry.existing_event_name, "Julmarknad Varberg");
    }

    #[tokio::test]
    async fn test_fuzzy_requires_same_day() {
        let existing = stored("Julmarknad Varberg", "2025-12-14T10:00:00Z", "Stadsparken Varberg", None);
        let store = Arc::new(InMemoryEventStore::with_events(vec![existing]));
        let engine = DeduplicationEngine::new(store);

        let event = raw("Julmarknad i Varberg", "2025-12-13T12:00:00Z", "Stadsparken");
        let outcome = engine.deduplicate("kultur", vec![event]).await.unwrap();
        assert_eq!(outcome.unique.len(), 1);
        assert!(outcome.duplicates.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let existing = stored("Julmarknad", "2025-12-13T10:00:00Z", "Stadsparken", None);
        let store = Arc::new(InMemoryEventStore::with_events(vec![existing]));

        let event = raw("Påskmarknad", "2025-12-13T12:00:00Z", "Stadsparken");
        let score = StringUtils::event_name_similarity(&event.name, "Julmarknad");
        assert!(score < 0.85);

        // Below the threshold: never flagged
        let strict = DeduplicationEngine::with_threshold(store.clone(), 0.85);
        assert!(strict.find_persisted_duplicate("s", &event).await.unwrap().is_none());

        // Exactly at the threshold: always flagged
        let at_score = DeduplicationEngine::with_threshold(store, score);
        let entry = at_score.find_persisted_duplicate("s", &event).await.unwrap().unwrap();
        assert_eq!(entry.similarity_score, score);
    }

    #[tokio::test]
    async fn test_best_candidate_wins() {
        let weaker = stored("Julmarknad på torget", "2025-12-13T09:00:00Z", "Stadsparken", None);
        let exact = stored("Julmarknad Varberg", "2025-12-13T10:00:00Z", "Stadsparken", None);
        let store = Arc::new(InMemoryEventStore::with_events(vec![weaker, exact.clone()]));
        let engine = DeduplicationEngine::with_threshold(store, 0.5);

        let event = raw("Julmarknad Varberg", "2025-12-13T12:00:00Z", "Stadsparken");
        let entry = engine.find_persisted_duplicate("s", &event).await.unwrap().unwrap();
        assert_eq!(entry.existing_event_id, exact.id);
        assert_eq!(entry.similarity_score, 1.0);
    }

    #[tokio::test]
    async fn test_no_venue_keyword_is_unique() {
        let existing = stored("Julmarknad", "2025-12-13T10:00:00Z", "Stadsparken", None);
        let store = Arc::new(InMemoryEventStore::with_events(vec![existing]));
        let engine = DeduplicationEngine::new(store);

        let mut event = raw("Julmarknad", "2025-12-13T12:00:00Z", "");
        event.location = " ".to_string();
        let outcome = engine.deduplicate("s", vec![event]).await.unwrap();
        assert_eq!(outcome.unique.len(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl EventStorePort for FailingStore {
        async fn find_by_url(&self, _url: &str) -> Result<Option<StoredEvent>> {
            Err(ImportError::Infrastructure("store unreachable".to_string()))
        }
        async fn find_by_day_and_venue(&self, _day: NaiveDate, _keyword: &str) -> Result<Vec<StoredEvent>> {
            Err(ImportError::Infrastructure("store unreachable".to_string()))
        }
        async fn exists_by_identifier(&self, _identifier: &str) -> Result<bool> {
            Ok(false)
        }
        async fn insert(&self, _event: crate::types::NewEvent) -> Result<StoredEvent> {
            Err(ImportError::Persistence("read only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let engine = DeduplicationEngine::new(Arc::new(FailingStore));
        let event = raw("Julmarknad", "2025-12-13T12:00:00Z", "Stadsparken");
        let err = engine.deduplicate("s", vec![event]).await.unwrap_err();
        assert!(err.is_infrastructure());
    }
}
