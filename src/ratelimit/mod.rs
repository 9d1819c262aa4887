// Fixed-window rate limiting backed by the shared cache

pub mod client_key;
pub mod limiter;
pub mod middleware;

pub use client_key::{client_key, UNKNOWN_CLIENT};
pub use limiter::{counter_key, RateLimitDecision, RateLimiter};
pub use middleware::{rate_limit, RatePolicy};
