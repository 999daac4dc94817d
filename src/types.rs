use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Source-supplied hints used to resolve the organizing entity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Event record as produced by a source adapter, before dedup and scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// ISO-8601 timestamp as delivered by the source
    #[serde(default)]
    pub date_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<EventMetadata>,
}

impl RawEvent {
    /// Venue name when present and non-blank, otherwise the location
    pub fn venue_or_location(&self) -> &str {
        match self.venue_name.as_deref() {
            Some(v) if !v.trim().is_empty() => v,
            _ => &self.location,
        }
    }

    /// Lowercased, trimmed name; the grouping key for categorization
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// Exact-match composite key used for in-batch collapse
    pub fn dedupe_key(&self) -> String {
        let date_part = self
            .date_time
            .trim()
            .split(|c| c == 'T' || c == ' ')
            .next()
            .unwrap_or("");
        format!(
            "{}|{}|{}",
            self.normalized_name(),
            date_part,
            self.venue_or_location().trim().to_lowercase()
        )
    }

    /// Start time in UTC, if the date string parses
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        parse_event_datetime(&self.date_time)
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// Parse the date formats sources are known to emit. Naive values are taken as UTC.
pub fn parse_event_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Closed set of topical categories the classifier may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Music,
    Theater,
    Art,
    Sports,
    FoodDrink,
    Family,
    Culture,
    Nightlife,
    Market,
    Outdoor,
    Education,
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 12] = [
        EventCategory::Music,
        EventCategory::Theater,
        EventCategory::Art,
        EventCategory::Sports,
        EventCategory::FoodDrink,
        EventCategory::Family,
        EventCategory::Culture,
        EventCategory::Nightlife,
        EventCategory::Market,
        EventCategory::Outdoor,
        EventCategory::Education,
        EventCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Music => "music",
            EventCategory::Theater => "theater",
            EventCategory::Art => "art",
            EventCategory::Sports => "sports",
            EventCategory::FoodDrink => "food_drink",
            EventCategory::Family => "family",
            EventCategory::Culture => "culture",
            EventCategory::Nightlife => "nightlife",
            EventCategory::Market => "market",
            EventCategory::Outdoor => "outdoor",
            EventCategory::Education => "education",
            EventCategory::Other => "other",
        }
    }

    /// Parse a classifier label; anything outside the set yields `None`
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches(|c| c == '"' || c == '.').to_lowercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication status derived from the quality assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Published,
    PendingApproval,
    Draft,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Published => "published",
            EventStatus::PendingApproval => "pending_approval",
            EventStatus::Draft => "draft",
        }
    }
}

/// Categories a content-safety check may flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyCategory {
    Hate,
    Threatening,
    Harassment,
    Sexual,
    Violence,
    SelfHarm,
}

impl SafetyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyCategory::Hate => "hate",
            SafetyCategory::Threatening => "threatening",
            SafetyCategory::Harassment => "harassment",
            SafetyCategory::Sexual => "sexual",
            SafetyCategory::Violence => "violence",
            SafetyCategory::SelfHarm => "self-harm",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub flagged: bool,
    pub categories: BTreeSet<SafetyCategory>,
}

/// Configuration of one event source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Organizer owning events from this source unless matching says otherwise
    pub organizer_id: Uuid,
    #[serde(default)]
    pub default_category: Option<EventCategory>,
    /// Multi-organizer aggregators resolve organizers per event
    #[serde(default)]
    pub aggregator: bool,
}

fn default_enabled() -> bool {
    true
}

/// Event as persisted in the catalog, projected to what dedup needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredEvent {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub date_time: String,
    pub venue: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Fully processed event ready for insertion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEvent {
    pub identifier: String,
    pub name: String,
    pub description: Option<String>,
    pub date_time: String,
    pub location: String,
    pub venue_name: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub category: EventCategory,
    pub status: EventStatus,
    pub quality_score: i32,
    pub quality_issues: Option<String>,
    pub auto_published: bool,
    pub organizer_id: Uuid,
    pub source_name: String,
}

/// Known organizer as listed by the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub venue_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMatchType {
    Url,
    FuzzyName,
}

/// Audit record for an event skipped as a duplicate of a persisted one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateLogEntry {
    pub source_name: String,
    pub scraper_event_name: String,
    pub scraper_event_url: Option<String>,
    pub existing_event_id: Uuid,
    pub existing_event_name: String,
    pub existing_event_url: Option<String>,
    pub similarity_score: f64,
    pub match_type: DuplicateMatchType,
    pub timestamp: DateTime<Utc>,
}

/// Statistics of one import run, returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportRunResult {
    pub source: String,
    pub success: bool,
    pub events_found: usize,
    pub events_imported: usize,
    pub duplicates_skipped: usize,
    pub errors: Vec<String>,
}

impl ImportRunResult {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            success: true,
            events_found: 0,
            events_imported: 0,
            duplicates_skipped: 0,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStep {
    Starting,
    Scraping,
    Deduplicating,
    Categorizing,
    MatchingOrganizers,
    Importing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLogEntry {
    pub run_id: Uuid,
    pub step: ProgressStep,
    pub message: String,
    pub progress_current: Option<usize>,
    pub progress_total: Option<usize>,
    pub estimated_time_remaining_ms: Option<u64>,
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, date_time: &str, location: &str, venue: Option<&str>) -> RawEvent {
        RawEvent {
            name: name.to_string(),
            date_time: date_time.to_string(),
            location: location.to_string(),
            venue_name: venue.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_dedupe_key_uses_date_part_and_venue() {
        let e = event("  Jazz Kväll ", "2025-12-01T19:00:00Z", "Varberg", Some(" Societetshuset "));
        assert_eq!(e.dedupe_key(), "jazz kväll|2025-12-01|societetshuset");
    }

    #[test]
    fn test_dedupe_key_falls_back_to_location() {
        let e = event("Quiz", "2025-12-01 18:00", "Harry's Pub", Some("   "));
        assert_eq!(e.dedupe_key(), "quiz|2025-12-01|harry's pub");
    }

    #[test]
    fn test_parse_event_datetime_formats() {
        assert!(parse_event_datetime("2025-12-01T19:00:00+01:00").is_some());
        assert!(parse_event_datetime("2025-12-01T19:00:00").is_some());
        assert!(parse_event_datetime("2025-12-01T19:00").is_some());
        assert!(parse_event_datetime("2025-12-01").is_some());
        assert!(parse_event_datetime("").is_none());
        assert!(parse_event_datetime("next friday").is_none());
    }

    #[test]
    fn test_offset_datetime_converts_to_utc_day() {
        let dt = parse_event_datetime("2025-12-02T00:30:00+01:00").unwrap();
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(EventCategory::from_label(" Music "), Some(EventCategory::Music));
        assert_eq!(EventCategory::from_label("\"food_drink\""), Some(EventCategory::FoodDrink));
        assert_eq!(EventCategory::from_label("opera"), None);
    }

    #[test]
    fn test_raw_event_deserializes_camel_case_metadata() {
        let json = r#"{
            "name": "Vinprovning",
            "date_time": "2025-11-20T18:00:00Z",
            "location": "Varberg",
            "metadata": {"organizerName": "Vinbaren", "phone": "0340-123 45"}
        }"#;
        let e: RawEvent = serde_json::from_str(json).unwrap();
        let meta = e.metadata.unwrap();
        assert_eq!(meta.organizer_name.as_deref(), Some("Vinbaren"));
        assert_eq!(meta.phone.as_deref(), Some("0340-123 45"));
        assert!(e.description.is_none());
    }
}
