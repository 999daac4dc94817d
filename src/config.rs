use serde::Deserialize;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::types::{EventCategory, SourceConfig};

pub const DEFAULT_CONFIG_PATH: &str = "import.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Tunables of the import pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub dedup_similarity_threshold: f64,
    pub organizer_similarity_threshold: f64,
    /// Minimum spacing between distinct classifier calls
    pub classifier_delay_ms: u64,
    /// Emit import progress every N persisted events
    pub progress_interval: usize,
    pub default_category: EventCategory,
    pub trusted_organizers: Vec<Uuid>,
    pub slug_max_length: usize,
    pub slug_strip_prefixes: Vec<String>,
    pub telemetry_timeout_ms: u64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            dedup_similarity_threshold: 0.85,
            organizer_similarity_threshold: 0.80,
            classifier_delay_ms: 500,
            progress_interval: 10,
            default_category: EventCategory::Other,
            trusted_organizers: Vec::new(),
            slug_max_length: 80,
            slug_strip_prefixes: Vec::new(),
            telemetry_timeout_ms: 2000,
        }
    }
}

/// OpenAI-compatible endpoint used for categorization and moderation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_seconds: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ClassifierSettings {
    /// API key from the environment, if configured
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("dedup_similarity_threshold", self.import.dedup_similarity_threshold),
            ("organizer_similarity_threshold", self.import.organizer_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ImportError::Config(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        if self.import.progress_interval == 0 {
            return Err(ImportError::Config("progress_interval must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let org = Uuid::new_v4();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[import]
classifier_delay_ms = 250
default_category = "culture"
trusted_organizers = ["{org}"]
slug_strip_prefixes = ["evenemang-"]

[classifier]
model = "gpt-4o"

[[sources]]
name = "kulturkalendern"
url = "https://example.se/kalender"
organizer_id = "{org}"
aggregator = true
default_category = "music"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.import.classifier_delay_ms, 250);
        assert_eq!(config.import.progress_interval, 10);
        assert_eq!(config.import.default_category, EventCategory::Culture);
        assert_eq!(config.import.trusted_organizers, vec![org]);
        assert_eq!(config.classifier.model, "gpt-4o");
        assert_eq!(config.classifier.api_key_env, "OPENAI_API_KEY");

        let source = config.source("kulturkalendern").unwrap();
        assert!(source.enabled);
        assert!(source.aggregator);
        assert_eq!(source.default_category, Some(EventCategory::Music));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[import]\ndedup_similarity_threshold = 1.5\n").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ImportError::Config(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/import.toml").unwrap();
        assert_eq!(config.import.dedup_similarity_threshold, 0.85);
        assert!(config.sources.is_empty());
    }
}
