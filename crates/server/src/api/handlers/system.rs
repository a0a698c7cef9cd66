use axum::{extract::State, response::Html, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>podcast-proxy</title></head>
<body>
<h1>podcast-proxy</h1>
<p>Subscribe to <code>/feed?url=&lt;feed url&gt;&amp;apikey=&lt;key&gt;</code> in your podcast app.
Audio and artwork in the feed are served through this proxy.</p>
<p>API documentation: <a href="/docs">/docs</a></p>
</body>
</html>
"#;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Stored feeds, including expired ones not yet swept
    pub cache_entries: usize,
}

/// Landing page with usage instructions
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "Usage page", content_type = "text/html", body = String)
    )
)]
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.config.version.clone(),
        cache_entries: state.cache.len(),
    })
}
