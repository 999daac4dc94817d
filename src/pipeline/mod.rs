// Import pipeline: batch processing stages, progress telemetry and shared string helpers

pub mod processing;
pub mod progress;
pub mod utils;
