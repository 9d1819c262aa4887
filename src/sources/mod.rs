//! Upstream music sources and ordered fallback across them.
//!
//! - `provider`: capability traits every source implements.
//! - `http`: the JSON-over-HTTP provider built from configuration.
//! - `registry`: name lookup and the default source order.
//! - `resolver`: cache-first resolution with first-success write-back.

pub mod error;
pub mod http;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resolver;

pub use error::{ProviderError, ProviderResult};
pub use http::{build_client, HttpProvider};
pub use models::{ItemClass, Lyric, Picture, SearchItem, SongUrl, Sourced};
pub use provider::{LyricCapability, PictureCapability, Provider};
pub use registry::ProviderRegistry;
pub use resolver::{cache_key, SourceResolver};
