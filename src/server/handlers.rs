// HTTP request handlers

use super::routes::AppState;
use crate::cache::{CacheStats, ConnectionStatus};
use crate::error::{AppError, Result};
use crate::metrics::gather_metrics;
use crate::sources::{Lyric, Picture, SearchItem, SongUrl, Sourced};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tracing::info;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

/// Success envelope shared by every `/api` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            code: 200,
            message: "success".to_string(),
            data,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub id: Option<String>,
    pub server: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub server: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub id: Option<String>,
    pub server: Option<String>,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let status = state.cache.status();

    let (overall, cache_check) = if state.registry.is_ready() {
        (
            HealthStatus::Healthy,
            HealthCheck {
                status: "ok".to_string(),
                message: "Distributed cache connected".to_string(),
            },
        )
    } else {
        (
            HealthStatus::Degraded,
            HealthCheck {
                status: "warning".to_string(),
                message: format!(
                    "Distributed cache {}, serving from local store (reconnect attempts {}/{})",
                    status.state.as_str(),
                    status.reconnect_attempts,
                    status.max_reconnect_attempts
                ),
            },
        )
    };
    checks.insert("cache".to_string(), cache_check);

    let providers = state.resolver.providers();
    checks.insert(
        "sources".to_string(),
        HealthCheck {
            status: if providers.is_empty() { "warning" } else { "ok" }.to_string(),
            message: format!("{} registered: {}", providers.len(), providers.names().join(",")),
        },
    );

    Json(HealthResponse {
        status: overall,
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn metrics_handler() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
        .into_response()
}

pub async fn match_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<MatchQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Sourced<SongUrl>>>> {
    let Query(query) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let id = required(query.id, "id")?;
    let sources = parse_sources(query.server.as_deref());
    let quality = query.quality;

    let resolver = state.resolver.clone();
    let lookup_id = id.clone();
    let found = detached(async move {
        resolver
            .resolve_url(&lookup_id, quality.as_deref(), &sources)
            .await
    })
    .await?;

    found
        .map(ApiResponse::success)
        .ok_or_else(|| AppError::NotFound(format!("no source could resolve song {}", id)))
}

pub async fn search_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Sourced<Vec<SearchItem>>>>> {
    let Query(query) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let keyword = required(query.keyword, "keyword")?;
    let sources = parse_sources(query.server.as_deref());
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let resolver = state.resolver.clone();
    let lookup = keyword.clone();
    let found = detached(async move { resolver.search(&lookup, limit, &sources).await }).await?;

    found
        .map(ApiResponse::success)
        .ok_or_else(|| AppError::NotFound(format!("no results for \"{}\"", keyword)))
}

pub async fn lyric_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<ItemQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Sourced<Lyric>>>> {
    let Query(query) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let id = required(query.id, "id")?;
    let sources = parse_sources(query.server.as_deref());

    let resolver = state.resolver.clone();
    let lookup_id = id.clone();
    let found = detached(async move { resolver.lyric(&lookup_id, &sources).await }).await?;

    found
        .map(ApiResponse::success)
        .ok_or_else(|| AppError::NotFound(format!("no lyric found for {}", id)))
}

pub async fn picture_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<ItemQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Sourced<Picture>>>> {
    let Query(query) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let id = required(query.id, "id")?;
    let sources = parse_sources(query.server.as_deref());

    let resolver = state.resolver.clone();
    let lookup_id = id.clone();
    let found = detached(async move { resolver.picture(&lookup_id, &sources).await }).await?;

    found
        .map(ApiResponse::success)
        .ok_or_else(|| AppError::NotFound(format!("no picture found for {}", id)))
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<ApiResponse<CacheStats>> {
    ApiResponse::success(state.cache.get_stats())
}

pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<ApiResponse<CacheStats>> {
    state.cache.reset_stats();
    info!("Cache statistics reset by operator");
    ApiResponse::success(state.cache.get_stats())
}

pub async fn reconnect_handler(
    State(state): State<AppState>,
) -> Json<ApiResponse<ConnectionStatus>> {
    info!("Cache reconnect requested by operator");
    state.cache.reset_connection();
    ApiResponse::success(state.cache.status())
}

/// Run a resolution on its own task so a dropped client connection does not
/// cancel a fetch that other requests may be waiting to see cached.
async fn detached<F, T>(work: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| AppError::Internal(format!("resolution task failed: {}", e)))
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::InvalidRequest(format!(
            "missing required parameter '{}'",
            name
        ))),
    }
}

/// `server=a,b` into an ordered source list. Empty means the default order.
pub(crate) fn parse_sources(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    })
    .unwrap_or_default()
}
