use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        header::{RANGE, USER_AGENT},
        HeaderMap,
    },
    response::Response,
};
use feed::TargetKind;

use super::UrlQuery;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Stream an upstream media file through the proxy
#[utoipa::path(
    get,
    path = "/proxy",
    tag = "proxy",
    params(UrlQuery),
    responses(
        (status = 200, description = "Upstream body, streamed"),
        (status = 206, description = "Partial content for a forwarded Range request"),
        (status = 400, description = "Missing or invalid url"),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 502, description = "Upstream unreachable")
    ),
    security(("api_key" = []), ("bearer" = []), ("basic" = []))
)]
pub async fn relay_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UrlQuery>,
) -> AppResult<Response> {
    relay(&state, None, &headers, &query).await
}

/// Stream an upstream media file of a known kind through the proxy
#[utoipa::path(
    get,
    path = "/proxy/{kind}",
    tag = "proxy",
    params(
        ("kind" = String, Path, description = "Media kind: audio or image"),
        UrlQuery
    ),
    responses(
        (status = 200, description = "Upstream body, streamed"),
        (status = 206, description = "Partial content for a forwarded Range request"),
        (status = 400, description = "Missing or invalid url, or unknown kind"),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 502, description = "Upstream unreachable")
    ),
    security(("api_key" = []), ("bearer" = []), ("basic" = []))
)]
pub async fn relay_media_kind(
    State(state): State<AppState>,
    Path(kind): Path<TargetKind>,
    headers: HeaderMap,
    Query(query): Query<UrlQuery>,
) -> AppResult<Response> {
    relay(&state, Some(kind), &headers, &query).await
}

async fn relay(
    state: &AppState,
    kind: Option<TargetKind>,
    headers: &HeaderMap,
    query: &UrlQuery,
) -> AppResult<Response> {
    let raw_url = query.require_url()?;
    let kind = kind.map_or("any", |k| k.as_str());

    let upstream = state
        .relay
        .open(raw_url, headers.get(RANGE), headers.get(USER_AGENT))
        .await
        .map_err(|e| {
            tracing::warn!(url = raw_url, kind, "Media relay failed: {}", e);
            AppError::from(e)
        })?;

    tracing::debug!(
        url = raw_url,
        kind,
        status = upstream.status().as_u16(),
        "Relaying media"
    );

    // Status and headers are passed through unchanged
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = upstream_headers;
    Ok(response)
}
