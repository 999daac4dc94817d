use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::ports::ContentSafetyPort;
use crate::observability::metrics;
use crate::types::{EventStatus, RawEvent};

/// Quality assessment result for one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityAssessment {
    pub status: EventStatus,
    /// Starts at 100; not clamped, may go negative
    pub score: i32,
    pub issues: Vec<String>,
    pub auto_published: bool,
}

/// Score penalties and status thresholds
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    pub base_score: i32,
    pub min_name_chars: usize,
    pub min_description_chars: usize,
    pub min_venue_chars: usize,
    pub missing_name_penalty: i32,
    pub missing_description_penalty: i32,
    pub short_description_penalty: i32,
    pub missing_date_penalty: i32,
    pub past_date_penalty: i32,
    pub missing_image_penalty: i32,
    pub missing_venue_penalty: i32,
    pub flagged_content_penalty: i32,
    /// Minimum score for automatic publication
    pub publish_threshold: i32,
    /// Minimum score for the review queue; lower scores stay drafts
    pub review_threshold: i32,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            base_score: 100,
            min_name_chars: 5,
            min_description_chars: 50,
            min_venue_chars: 3,
            missing_name_penalty: 30,
            missing_description_penalty: 30,
            short_description_penalty: 20,
            missing_date_penalty: 30,
            past_date_penalty: 15,
            missing_image_penalty: 25,
            missing_venue_penalty: 10,
            flagged_content_penalty: 50,
            publish_threshold: 80,
            review_threshold: 50,
        }
    }
}

/// Organizers whose events may be published without review
#[derive(Debug, Clone, Default)]
pub struct TrustedOrganizers(HashSet<Uuid>);

impl TrustedOrganizers {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn contains(&self, organizer_id: &Uuid) -> bool {
        self.0.contains(organizer_id)
    }
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

/// Completeness score and issues, without the content-safety check
pub fn score_completeness(config: &QualityGateConfig, event: &RawEvent, now: DateTime<Utc>) -> (i32, Vec<String>) {
    let mut score = config.base_score;
    let mut issues = Vec::new();

    if char_len(&event.name) < config.min_name_chars {
        score -= config.missing_name_penalty;
        issues.push("Name is missing or too short".to_string());
    }

    match event.description.as_deref().map(str::trim) {
        None | Some("") => {
            score -= config.missing_description_penalty;
            issues.push("Description is missing".to_string());
        }
        Some(description) if description.chars().count() < config.min_description_chars => {
            score -= config.short_description_penalty;
            issues.push(format!(
                "Description is shorter than {} characters",
                config.min_description_chars
            ));
        }
        Some(_) => {}
    }

    if event.date_time.trim().is_empty() {
        score -= config.missing_date_penalty;
        issues.push("Date is missing".to_string());
    } else if event.starts_at().is_some_and(|starts_at| starts_at < now) {
        score -= config.past_date_penalty;
        issues.push("Event date is in the past".to_string());
    }

    if event.image_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
        score -= config.missing_image_penalty;
        issues.push("Image is missing".to_string());
    }

    if char_len(event.venue_or_location()) < config.min_venue_chars {
        score -= config.missing_venue_penalty;
        issues.push("Venue is missing or too short".to_string());
    }

    (score, issues)
}

/// Map a final score to a status; returns the status and the auto-publish flag
pub fn decide_status(config: &QualityGateConfig, score: i32, trusted: bool, safe: bool) -> (EventStatus, bool) {
    if score >= config.publish_threshold && trusted && safe {
        (EventStatus::Published, true)
    } else if score >= config.review_threshold {
        (EventStatus::PendingApproval, false)
    } else {
        (EventStatus::Draft, false)
    }
}

/// Scores events and decides their publication status
pub struct QualityAssessor {
    config: QualityGateConfig,
    safety: Arc<dyn ContentSafetyPort>,
    trusted: TrustedOrganizers,
}

impl QualityAssessor {
    pub fn new(safety: Arc<dyn ContentSafetyPort>, trusted: TrustedOrganizers) -> Self {
        Self::with_config(QualityGateConfig::default(), safety, trusted)
    }

    pub fn with_config(config: QualityGateConfig, safety: Arc<dyn ContentSafetyPort>, trusted: TrustedOrganizers) -> Self {
        Self { config, safety, trusted }
    }

    pub async fn assess(&self, event: &RawEvent, organizer_id: Uuid) -> QualityAssessment {
        self.assess_at(event, organizer_id, Utc::now()).await
    }

    pub async fn assess_at(&self, event: &RawEvent, organizer_id: Uuid, now: DateTime<Utc>) -> QualityAssessment {
        let (mut score, mut issues) = score_completeness(&self.config, event, now);

        let text = format!("{} {}", event.name, event.description.as_deref().unwrap_or("")).trim().to_string();
        let safe = match self.safety.moderate(&text).await {
            Ok(result) if result.flagged => {
                score -= self.config.flagged_content_penalty;
                issues.extend(
                    result
                        .categories
                        .iter()
                        .map(|category| format!("Content flagged: {}", category.as_str())),
                );
                metrics::quality::safety_flagged();
                warn!(event = %event.name, categories = ?result.categories, "Content flagged by safety check");
                false
            }
            Ok(_) => true,
            Err(e) => {
                // Fail open
                warn!(event = %event.name, error = %e, "Content safety check failed; treating as safe");
                metrics::quality::safety_check_failed();
                true
            }
        };

        let (status, auto_published) =
            decide_status(&self.config, score, self.trusted.contains(&organizer_id), safe);
        metrics::quality::assessed(score, status);
        debug!(event = %event.name, score, status = status.as_str(), issues = issues.len(), "Assessed event quality");

        QualityAssessment {
            status,
            score,
            issues,
            auto_published,
        }
    }
}
