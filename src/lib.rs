// unm-gateway - resilient caching, rate limiting and source fallback for a music catalog API

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ratelimit;
pub mod server;
pub mod sources;
pub mod utils;
