//! Metrics for the import pipeline
//!
//! Thin wrappers over the `metrics` facade so call sites never carry
//! metric names as magic strings. Without an installed recorder these are no-ops.

use std::fmt;

/// All metric names recorded by the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Dedup metrics
    DedupInBatchDropped,
    DedupUrlDuplicates,
    DedupFuzzyDuplicates,
    DedupSimilarityScore,

    // Categorize metrics
    CategorizeClassifierCalls,
    CategorizeCacheHits,
    CategorizeFallbacks,

    // Quality metrics
    QualityScore,
    QualityPublished,
    QualityPendingApproval,
    QualityDraft,
    QualitySafetyFlagged,
    QualitySafetyCheckFailed,

    // Organizer metrics
    OrganizerMatches,

    // Import metrics
    ImportRuns,
    ImportRunsFailed,
    ImportEventsFound,
    ImportEventsImported,
    ImportEventErrors,
    ImportRunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::DedupInBatchDropped => "importer_dedup_in_batch_dropped_total",
            MetricName::DedupUrlDuplicates => "importer_dedup_url_duplicates_total",
            MetricName::DedupFuzzyDuplicates => "importer_dedup_fuzzy_duplicates_total",
            MetricName::DedupSimilarityScore => "importer_dedup_similarity_score",

            MetricName::CategorizeClassifierCalls => "importer_categorize_classifier_calls_total",
            MetricName::CategorizeCacheHits => "importer_categorize_cache_hits_total",
            MetricName::CategorizeFallbacks => "importer_categorize_fallbacks_total",

            MetricName::QualityScore => "importer_quality_score",
            MetricName::QualityPublished => "importer_quality_published_total",
            MetricName::QualityPendingApproval => "importer_quality_pending_approval_total",
            MetricName::QualityDraft => "importer_quality_draft_total",
            MetricName::QualitySafetyFlagged => "importer_quality_safety_flagged_total",
            MetricName::QualitySafetyCheckFailed => "importer_quality_safety_check_failed_total",

            MetricName::OrganizerMatches => "importer_organizer_matches_total",

            MetricName::ImportRuns => "importer_runs_total",
            MetricName::ImportRunsFailed => "importer_runs_failed_total",
            MetricName::ImportEventsFound => "importer_events_found_total",
            MetricName::ImportEventsImported => "importer_events_imported_total",
            MetricName::ImportEventErrors => "importer_event_errors_total",
            MetricName::ImportRunDuration => "importer_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod dedup {
    use super::MetricName;

    pub fn in_batch_dropped(source: &str, count: usize) {
        ::metrics::counter!(MetricName::DedupInBatchDropped.as_str(), "source" => source.to_string())
            .increment(count as u64);
    }

    pub fn url_duplicate(source: &str) {
        ::metrics::counter!(MetricName::DedupUrlDuplicates.as_str(), "source" => source.to_string()).increment(1);
    }

    pub fn fuzzy_duplicate(source: &str, score: f64) {
        ::metrics::counter!(MetricName::DedupFuzzyDuplicates.as_str(), "source" => source.to_string()).increment(1);
        ::metrics::histogram!(MetricName::DedupSimilarityScore.as_str()).record(score);
    }
}

pub mod categorize {
    use super::MetricName;

    pub fn classifier_called() {
        ::metrics::counter!(MetricName::CategorizeClassifierCalls.as_str()).increment(1);
    }

    pub fn cache_hit() {
        ::metrics::counter!(MetricName::CategorizeCacheHits.as_str()).increment(1);
    }

    pub fn fell_back() {
        ::metrics::counter!(MetricName::CategorizeFallbacks.as_str()).increment(1);
    }
}

pub mod quality {
    use super::MetricName;
    use crate::types::EventStatus;

    pub fn assessed(score: i32, status: EventStatus) {
        ::metrics::histogram!(MetricName::QualityScore.as_str()).record(score as f64);
        let name = match status {
            EventStatus::Published => MetricName::QualityPublished,
            EventStatus::PendingApproval => MetricName::QualityPendingApproval,
            EventStatus::Draft => MetricName::QualityDraft,
        };
        ::metrics::counter!(name.as_str()).increment(1);
    }

    pub fn safety_flagged() {
        ::metrics::counter!(MetricName::QualitySafetyFlagged.as_str()).increment(1);
    }

    pub fn safety_check_failed() {
        ::metrics::counter!(MetricName::QualitySafetyCheckFailed.as_str()).increment(1);
    }
}

pub mod organizer {
    use super::MetricName;

    pub fn matched(match_type: &'static str) {
        ::metrics::counter!(MetricName::OrganizerMatches.as_str(), "match_type" => match_type).increment(1);
    }
}

pub mod import {
    use super::MetricName;

    pub fn run_started(source: &str) {
        ::metrics::counter!(MetricName::ImportRuns.as_str(), "source" => source.to_string()).increment(1);
    }

    pub fn run_failed(source: &str) {
        ::metrics::counter!(MetricName::ImportRunsFailed.as_str(), "source" => source.to_string()).increment(1);
    }

    pub fn run_finished(source: &str, found: usize, imported: usize, errors: usize, duration_secs: f64) {
        let source = source.to_string();
        ::metrics::counter!(MetricName::ImportEventsFound.as_str(), "source" => source.clone()).increment(found as u64);
        ::metrics::counter!(MetricName::ImportEventsImported.as_str(), "source" => source.clone())
            .increment(imported as u64);
        ::metrics::counter!(MetricName::ImportEventErrors.as_str(), "source" => source.clone()).increment(errors as u64);
        ::metrics::histogram!(MetricName::ImportRunDuration.as_str(), "source" => source).record(duration_secs);
    }
}
