// JSON-over-HTTP upstream provider

use super::error::{ProviderError, ProviderResult};
use super::models::{Lyric, Picture, SearchItem, SongUrl};
use super::provider::{LyricCapability, PictureCapability, Provider};
use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Build the HTTP client shared by every provider.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .user_agent(concat!("unm-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Provider speaking the gateway's upstream JSON shape:
///
/// - `GET {base}/url?id=&quality=` -> `SongUrl`
/// - `GET {base}/search?keyword=&limit=` -> `[SearchItem]`
/// - `GET {base}/lyric?id=` -> `Lyric`
/// - `GET {base}/picture?id=` -> `Picture`
///
/// Bodies may be wrapped as `{"data": ...}`.
pub struct HttpProvider {
    name: String,
    base_url: String,
    client: Client,
    lyric: bool,
    picture: bool,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("lyric", &self.lyric)
            .field("picture", &self.picture)
            .finish()
    }
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig, client: Client) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            lyric: config.lyric,
            picture: config.picture,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(source = %self.name, url = %url, "Calling upstream");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        decode_body(body)
    }
}

/// Unwrap an optional `{"data": ...}` envelope and decode.
fn decode_body<T: DeserializeOwned>(body: Value) -> ProviderResult<T> {
    let payload = match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    if payload.is_null() {
        return Err(ProviderError::Empty);
    }
    serde_json::from_value(payload).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_url(&self, id: &str, quality: Option<&str>) -> ProviderResult<SongUrl> {
        let mut query = vec![("id", id.to_string())];
        if let Some(quality) = quality {
            query.push(("quality", quality.to_string()));
        }
        let song: SongUrl = self.fetch("url", &query).await?;
        if song.url.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(song)
    }

    async fn search(&self, keyword: &str, limit: usize) -> ProviderResult<Vec<SearchItem>> {
        let query = [("keyword", keyword.to_string()), ("limit", limit.to_string())];
        let mut items: Vec<SearchItem> = self.fetch("search", &query).await?;
        if items.is_empty() {
            return Err(ProviderError::Empty);
        }
        items.truncate(limit);
        Ok(items)
    }

    fn lyrics(&self) -> Option<&dyn LyricCapability> {
        self.lyric.then_some(self as &dyn LyricCapability)
    }

    fn pictures(&self) -> Option<&dyn PictureCapability> {
        self.picture.then_some(self as &dyn PictureCapability)
    }
}

#[async_trait]
impl LyricCapability for HttpProvider {
    async fn fetch_lyric(&self, id: &str) -> ProviderResult<Lyric> {
        let lyric: Lyric = self.fetch("lyric", &[("id", id.to_string())]).await?;
        if lyric.lyric.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(lyric)
    }
}

#[async_trait]
impl PictureCapability for HttpProvider {
    async fn fetch_picture(&self, id: &str) -> ProviderResult<Picture> {
        let picture: Picture = self.fetch("picture", &[("id", id.to_string())]).await?;
        if picture.url.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(picture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_wrapped_and_bare() {
        let wrapped: Picture =
            decode_body(json!({"data": {"id": "1", "url": "https://a/1.jpg"}})).unwrap();
        let bare: Picture = decode_body(json!({"id": "1", "url": "https://a/1.jpg"})).unwrap();
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn test_decode_null_data_is_empty() {
        let result: ProviderResult<Picture> = decode_body(json!({"data": null}));
        assert!(matches!(result, Err(ProviderError::Empty)));
    }

    #[test]
    fn test_capabilities_follow_config() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let provider = HttpProvider::new(
            &ProviderConfig {
                name: "kuwo".to_string(),
                base_url: "http://localhost/".to_string(),
                lyric: true,
                picture: false,
            },
            client,
        );
        assert!(provider.lyrics().is_some());
        assert!(provider.pictures().is_none());
        assert_eq!(provider.base_url, "http://localhost");
    }
}
