pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Application layer: ports and the import use case
pub mod app;
// Adapters behind the ports
pub mod infra;

pub mod observability;
pub mod pipeline;
