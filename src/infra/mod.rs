pub mod in_memory;
pub mod json_source;
pub mod openai_client;
pub mod rate_limiter;
