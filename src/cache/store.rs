//! Key/value store trait shared by the distributed and local backends.

use super::error::{CacheError, CacheResult};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

/// Operations every backing store provides.
///
/// Implemented by `RedisStore` and `MemoryStore`. A missing key is `Ok(None)`,
/// never an error; `Err` always means the store itself failed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Establish (or re-establish) the connection. In-process stores succeed immediately.
    async fn connect(&self) -> CacheResult<()> {
        Ok(())
    }

    /// Get a value by key
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Keys matching a glob pattern (`*`, `?`, `[...]`)
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Delete every key matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Remaining lifetime in seconds, `-1` when the key has no expiry or does not exist
    async fn ttl(&self, key: &str) -> CacheResult<i64>;

    /// Set a new expiry on an existing key, returning whether the key existed
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Release connections. The store is unusable afterwards.
    async fn close(&self);

    /// Get the name of the store
    fn provider_name(&self) -> &'static str;
}

/// Compile a Redis-style glob into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    class.push(inner);
                }
                if closed && !class.is_empty() {
                    out.push('[');
                    if let Some(rest) = class.strip_prefix('^') {
                        out.push('^');
                        out.push_str(&regex::escape(rest).replace("\\-", "-"));
                    } else {
                        out.push_str(&regex::escape(&class).replace("\\-", "-"));
                    }
                    out.push(']');
                } else {
                    out.push_str(&regex::escape(&format!("[{}", class)));
                    if closed {
                        out.push_str("\\]");
                    }
                }
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Regex::new(&out)
        .map_err(|e| CacheError::BackendError(format!("Invalid key pattern {}: {}", pattern, e)))
}
