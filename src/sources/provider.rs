//! Upstream provider capability traits.
//!
//! Every provider resolves URLs and searches. Lyrics and pictures are optional
//! capabilities: a provider exposes them by returning `Some` from `lyrics()` /
//! `pictures()`.

use super::error::ProviderResult;
use super::models::{Lyric, Picture, SearchItem, SongUrl};
use async_trait::async_trait;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Source name as used in request `server` lists.
    fn name(&self) -> &str;

    async fn resolve_url(&self, id: &str, quality: Option<&str>) -> ProviderResult<SongUrl>;

    async fn search(&self, keyword: &str, limit: usize) -> ProviderResult<Vec<SearchItem>>;

    fn lyrics(&self) -> Option<&dyn LyricCapability> {
        None
    }

    fn pictures(&self) -> Option<&dyn PictureCapability> {
        None
    }
}

#[async_trait]
pub trait LyricCapability: Send + Sync {
    async fn fetch_lyric(&self, id: &str) -> ProviderResult<Lyric>;
}

#[async_trait]
pub trait PictureCapability: Send + Sync {
    async fn fetch_picture(&self, id: &str) -> ProviderResult<Picture>;
}
