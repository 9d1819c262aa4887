//! Cross-cutting helpers.
//!
//! - `logging`: tracing subscriber setup and log-safe formatting.

pub mod logging;
