use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::app::ports::EventSourcePort;
use crate::error::{ImportError, Result};
use crate::types::{RawEvent, SourceConfig};

/// Reads a batch of raw events that a scraper wrote to disk as a JSON array
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventSourcePort for JsonFileSource {
    async fn fetch_events(&self, source: &SourceConfig) -> Result<Vec<RawEvent>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ImportError::Source(format!("{}: {}", self.path.display(), e)))?;
        let events: Vec<RawEvent> = serde_json::from_str(&content)
            .map_err(|e| ImportError::Source(format!("{}: {}", self.path.display(), e)))?;
        info!(source = %source.name, count = events.len(), path = %self.path.display(), "Loaded raw events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "fil".to_string(),
            url: String::new(),
            enabled: true,
            organizer_id: Uuid::new_v4(),
            default_category: None,
            aggregator: false,
        }
    }

    #[tokio::test]
    async fn test_reads_event_array() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"Loppis","date_time":"2025-05-01T10:00:00Z","location":"Torget"}}]"#
        )
        .unwrap();

        let events = JsonFileSource::new(file.path()).fetch_events(&source()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Loppis");
    }

    #[tokio::test]
    async fn test_malformed_file_is_source_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = JsonFileSource::new(file.path()).fetch_events(&source()).await.unwrap_err();
        assert!(matches!(err, ImportError::Source(_)));
    }
}
