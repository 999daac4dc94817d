use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use crate::app::ports::TelemetrySinkPort;
use crate::types::{ProgressLogEntry, ProgressStep};

/// Remaining-time estimate from the average time per processed item
pub fn estimate_remaining_ms(elapsed: Duration, processed: usize, total: usize) -> Option<u64> {
    if processed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(processed) as f64;
    Some((elapsed.as_millis() as f64 / processed as f64 * remaining).round() as u64)
}

/// Best-effort progress emitter for one run. Failures are logged, never returned.
pub struct ProgressReporter {
    sink: Arc<dyn TelemetrySinkPort>,
    run_id: Option<Uuid>,
    timeout: Duration,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn TelemetrySinkPort>, run_id: Option<Uuid>, timeout: Duration) -> Self {
        Self {
            sink,
            run_id,
            timeout,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub async fn step(&self, step: ProgressStep, message: impl Into<String>) {
        self.emit(step, message.into(), None, None, None).await;
    }

    pub async fn step_with_metadata(&self, step: ProgressStep, message: impl Into<String>, metadata: serde_json::Value) {
        self.emit(step, message.into(), None, None, Some(metadata)).await;
    }

    /// Progress within a stage, with an ETA derived from elapsed run time
    pub async fn progress(&self, step: ProgressStep, message: impl Into<String>, current: usize, total: usize) {
        self.progress_since(self.started, step, message, current, total).await;
    }

    /// Progress within a stage, with an ETA derived from time spent since `stage_started`
    pub async fn progress_since(
        &self,
        stage_started: Instant,
        step: ProgressStep,
        message: impl Into<String>,
        current: usize,
        total: usize,
    ) {
        let eta = estimate_remaining_ms(stage_started.elapsed(), current, total);
        self.emit(step, message.into(), Some((current, total)), eta, None).await;
    }

    async fn emit(
        &self,
        step: ProgressStep,
        message: String,
        progress: Option<(usize, usize)>,
        estimated_time_remaining_ms: Option<u64>,
        metadata: Option<serde_json::Value>,
    ) {
        // Telemetry is only recorded for runs started with an id
        let Some(run_id) = self.run_id else {
            return;
        };

        let entry = ProgressLogEntry {
            run_id,
            step,
            message,
            progress_current: progress.map(|(current, _)| current),
            progress_total: progress.map(|(_, total)| total),
            estimated_time_remaining_ms,
            metadata,
        };

        match tokio::time::timeout(self.timeout, self.sink.record_progress(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(run_id = %run_id, step = ?step, error = %e, "Failed to record progress"),
            Err(_) => warn!(run_id = %run_id, step = ?step, "Timed out recording progress"),
        }
    }
}
