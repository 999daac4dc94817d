use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

use crate::app::ports::{ContentSafetyPort, TextClassifierPort};
use crate::config::ClassifierSettings;
use crate::error::{ImportError, Result};
use crate::types::{EventCategory, ModerationResult, SafetyCategory};

/// Chat-completions classifier and moderation client for OpenAI-compatible APIs
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationEntry>,
}

#[derive(Debug, Deserialize)]
struct ModerationEntry {
    flagged: bool,
    #[serde(default)]
    categories: HashMap<String, bool>,
}

impl OpenAiClient {
    pub fn new(settings: &ClassifierSettings, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    fn system_prompt() -> String {
        let labels: Vec<&str> = EventCategory::ALL.iter().map(|c| c.as_str()).collect();
        format!(
            "You categorize event listings. Answer with exactly one of these labels and nothing else: {}",
            labels.join(", ")
        )
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ImportError::Classifier(format!("{} returned {}: {}", path, status.as_u16(), text)));
        }
        Ok(resp.json::<T>().await?)
    }
}

/// Map a moderation category key to our safety categories
fn safety_category(key: &str) -> Option<SafetyCategory> {
    let root = key.split('/').next().unwrap_or(key);
    match (root, key) {
        (_, "hate/threatening") | (_, "harassment/threatening") => Some(SafetyCategory::Threatening),
        ("hate", _) => Some(SafetyCategory::Hate),
        ("harassment", _) => Some(SafetyCategory::Harassment),
        ("sexual", _) => Some(SafetyCategory::Sexual),
        ("violence", _) => Some(SafetyCategory::Violence),
        ("self-harm", _) => Some(SafetyCategory::SelfHarm),
        _ => None,
    }
}

#[async_trait]
impl TextClassifierPort for OpenAiClient {
    async fn classify(&self, name: &str, description: Option<&str>, venue_or_location: &str) -> Result<String> {
        let user = format!(
            "Name: {}\nDescription: {}\nVenue: {}",
            name,
            description.unwrap_or("-"),
            venue_or_location
        );
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": Self::system_prompt()},
                {"role": "user", "content": user},
            ],
        });

        let response: ChatResponse = self
            .post("/chat/completions", body)
            .await
            .map_err(|e| ImportError::Classifier(e.to_string()))?;
        let label = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ImportError::Classifier("empty completion".to_string()))?;
        debug!(name, label = %label, "Classifier responded");
        Ok(label)
    }
}

#[async_trait]
impl ContentSafetyPort for OpenAiClient {
    async fn moderate(&self, text: &str) -> Result<ModerationResult> {
        let response: ModerationResponse = self
            .post("/moderations", json!({ "input": text }))
            .await
            .map_err(|e| ImportError::ContentSafety(e.to_string()))?;

        let Some(entry) = response.results.into_iter().next() else {
            return Err(ImportError::ContentSafety("empty moderation result".to_string()));
        };
        let categories: BTreeSet<SafetyCategory> = entry
            .categories
            .iter()
            .filter(|(_, &hit)| hit)
            .filter_map(|(key, _)| safety_category(key))
            .collect();
        Ok(ModerationResult {
            flagged: entry.flagged,
            categories,
        })
    }
}

/// Classifier used when no API key is configured; always answers with one label
pub struct StaticClassifier(pub EventCategory);

#[async_trait]
impl TextClassifierPort for StaticClassifier {
    async fn classify(&self, _name: &str, _description: Option<&str>, _venue: &str) -> Result<String> {
        Ok(self.0.as_str().to_string())
    }
}

/// Safety check used when no API key is configured
pub struct NoopSafety;

#[async_trait]
impl ContentSafetyPort for NoopSafety {
    async fn moderate(&self, _text: &str) -> Result<ModerationResult> {
        Ok(ModerationResult::default())
    }
}
