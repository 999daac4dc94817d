use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::app::ports::PacingPort;

/// Enforces a minimum interval between consecutive external calls.
/// The first call passes immediately.
#[derive(Debug)]
pub struct IntervalGate {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl IntervalGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl PacingPort for IntervalGate {
    async fn wait(&self) {
        // Holding the lock across the sleep serializes concurrent callers
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Pacing that never waits
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

#[async_trait]
impl PacingPort for NoPacing {
    async fn wait(&self) {}
}
