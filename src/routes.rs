use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::activity::{classify, ActivityStatus};
use crate::fetcher::Fetcher;
use crate::store::{Blog, BlogPatch, BlogStore, NewBlog};

pub struct AppState {
    pub store: Arc<BlogStore>,
    pub fetcher: Arc<Fetcher>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/blogs", get(list_blogs).post(create_blog))
        .route(
            "/api/blogs/:id",
            get(get_blog).patch(update_blog).delete(delete_blog),
        )
        .route("/api/proxy/rss", get(proxy_rss))
        .route("/api/refresh", post(refresh))
        .route("/api/refresh/status", get(refresh_status))
        .route("/health", get(health))
        .with_state(state)
}

/// Blog record as returned by the API: the stored fields plus the activity
/// status computed from `last_posted` at read time. The status is never
/// persisted.
#[derive(Serialize)]
pub struct BlogResponse {
    #[serde(flatten)]
    blog: Blog,
    status: ActivityStatus,
}

impl From<Blog> for BlogResponse {
    fn from(blog: Blog) -> Self {
        let status = classify(blog.last_posted);
        Self { blog, status }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Blog not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

// Route handlers

pub async fn list_blogs(State(state): State<Arc<AppState>>) -> Json<Vec<BlogResponse>> {
    let blogs = state.store.list().await;
    Json(blogs.into_iter().map(BlogResponse::from).collect())
}

pub async fn get_blog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state.store.get(id).await.ok_or(ApiError::NotFound)?;
    Ok(Json(blog.into()))
}

pub async fn create_blog(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewBlog>,
) -> Result<impl IntoResponse, ApiError> {
    validate_new_blog(&new)?;

    // The feed must be reachable and parseable before a record exists;
    // a failing feed never leaves a partial blog behind.
    let snapshot = state.fetcher.probe_feed(&new.rss_url).await.map_err(|e| {
        warn!("Rejected blog '{}': {}", new.name, e);
        ApiError::BadRequest(format!(
            "Could not fetch or parse the RSS feed; check the URL ({})",
            e
        ))
    })?;

    let blog = state.store.create(new, snapshot).await;
    Ok((StatusCode::CREATED, Json(BlogResponse::from(blog))))
}

pub async fn update_blog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<BlogPatch>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state
        .store
        .update(id, patch)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(blog.into()))
}

pub async fn delete_blog(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[derive(Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// Pass-through fetch of a feed URL so the browser dashboard can read
/// feeds without tripping over cross-origin restrictions.
pub async fn proxy_rss(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .ok_or_else(|| ApiError::BadRequest("URL parameter is required".to_string()))?;

    let response = state.fetcher.client().get(&url).send().await.map_err(|e| {
        warn!("Proxy fetch failed for {}: {}", url, e);
        ApiError::BadRequest(format!("Failed to fetch RSS feed: {}", e))
    })?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    if !status.is_success() {
        return Ok((
            status,
            Json(json!({ "message": format!("Failed to fetch RSS feed: {}", status) })),
        )
            .into_response());
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/xml")
        .to_string();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    // Spawn the refresh task and report immediately.
    let fetcher = state.fetcher.clone();
    tokio::spawn(async move {
        let _ = fetcher.refresh_all_blogs().await;
    });

    Json(json!({ "refreshing": true }))
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "refreshing": state.fetcher.is_refreshing().await }))
}

pub async fn health() -> &'static str {
    "OK"
}

fn validate_new_blog(new: &NewBlog) -> Result<(), ApiError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Blog name is required".to_string()));
    }
    url::Url::parse(&new.url)
        .map_err(|_| ApiError::BadRequest("url must be a valid URL".to_string()))?;
    url::Url::parse(&new.rss_url)
        .map_err(|_| ApiError::BadRequest("rssUrl must be a valid URL".to_string()))?;
    Ok(())
}
