//! Payloads returned by upstream sources and the provenance wrapper.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playable stream location for a song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongUrl {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyric {
    pub id: String,
    pub lyric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
}

/// Cover art location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    pub id: String,
    pub url: String,
}

/// A successful provider result tagged with the source that produced it.
///
/// This is what gets cached, so a cache hit still reports provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub source: String,
    pub data: T,
    /// Set when the value came from the cache rather than a live call.
    #[serde(default)]
    pub cached: bool,
}

impl<T> Sourced<T> {
    pub fn new(source: impl Into<String>, data: T) -> Self {
        Self {
            source: source.into(),
            data,
            cached: false,
        }
    }
}

/// Item classes with their cache namespace and lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemClass {
    Search,
    Url,
    Lyric,
    Picture,
}

impl ItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Search => "search",
            ItemClass::Url => "url",
            ItemClass::Lyric => "lyric",
            ItemClass::Picture => "picture",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            ItemClass::Search => Duration::from_secs(1800),
            ItemClass::Url => Duration::from_secs(3600),
            ItemClass::Lyric | ItemClass::Picture => Duration::from_secs(7200),
        }
    }
}
