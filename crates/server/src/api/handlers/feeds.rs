use axum::{
    body::Body,
    extract::{Query, State},
    http::{
        header::{CONTENT_TYPE, HOST},
        HeaderMap, HeaderName, HeaderValue, Uri,
    },
    response::Response,
};
use bytes::Bytes;
use feed::ProxyContext;

use super::UrlQuery;
use crate::error::{AppError, AppResult};
use crate::services::CacheKey;
use crate::state::AppState;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Fetch a podcast feed and rewrite its media links through this proxy
#[utoipa::path(
    get,
    path = "/feed",
    tag = "feed",
    params(UrlQuery),
    responses(
        (status = 200, description = "Rewritten feed", content_type = "application/xml", body = String),
        (status = 400, description = "Missing or invalid url"),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 500, description = "Feed could not be processed"),
        (status = 502, description = "Upstream unreachable after all retries")
    ),
    security(("api_key" = []), ("bearer" = []), ("basic" = []))
)]
pub async fn get_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<UrlQuery>,
) -> AppResult<Response> {
    let raw_url = query.require_url()?;
    let source = state.fetcher.guard().validate(raw_url).map_err(|e| {
        tracing::warn!(url = raw_url, "Rejected feed URL: {}", e);
        AppError::from(e)
    })?;

    let ctx = proxy_context(&headers, &uri, state.gate.api_key())?;
    let key = CacheKey::for_feed(&source, &ctx.base());

    if let Some(payload) = state.cache.get(&key) {
        tracing::debug!(url = %source, "Serving feed from cache");
        return Ok(xml_response(payload, HeaderMap::new(), "HIT"));
    }

    let fetched = state.fetcher.fetch(source.as_str()).await.map_err(|e| {
        tracing::error!(url = %source, attempts = ?e.attempts(), "Feed fetch failed: {}", e);
        AppError::from(e)
    })?;
    let attempts = fetched.attempts;

    let body = fetched.body.clone();
    let rewrite_ctx = ctx.clone();
    let rewritten = tokio::task::spawn_blocking(move || feed::rewrite_feed(&body, &rewrite_ctx))
        .await
        .map_err(|e| AppError::internal(format!("Rewrite task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!(url = %source, attempts, "Feed rewrite failed: {}", e);
            AppError::from(e)
        })?;

    let payload = Bytes::from(rewritten);
    state
        .cache
        .set(key, payload.clone(), state.config.cache_ttl);

    tracing::info!(
        url = %source,
        attempts,
        bytes = payload.len(),
        "Feed rewritten"
    );
    Ok(xml_response(payload, fetched.headers, "MISS"))
}

/// Scheme and host clients used to reach us, for building proxy links
fn proxy_context(headers: &HeaderMap, uri: &Uri, token: &str) -> AppResult<ProxyContext> {
    let forwarded_https = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
    let scheme = if forwarded_https { "https" } else { "http" };

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing Host header"))?;

    Ok(ProxyContext::new(scheme, host, token))
}

fn xml_response(payload: Bytes, upstream_headers: HeaderMap, cache_status: &'static str) -> Response {
    let mut response = Response::new(Body::from(payload));
    let headers = response.headers_mut();
    *headers = upstream_headers;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
    headers.insert(X_CACHE, HeaderValue::from_static(cache_status));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    #[test]
    fn test_proxy_context_from_host() {
        let ctx = proxy_context(
            &headers(&[("host", "proxy.local:8080")]),
            &Uri::from_static("/feed"),
            "k",
        )
        .unwrap();
        assert_eq!(ctx.base(), "http://proxy.local:8080");
    }

    #[test]
    fn test_proxy_context_honours_forwarded_proto() {
        let ctx = proxy_context(
            &headers(&[("host", "pods.example.org"), ("x-forwarded-proto", "HTTPS, http")]),
            &Uri::from_static("/feed"),
            "k",
        )
        .unwrap();
        assert_eq!(ctx.base(), "https://pods.example.org");
    }

    #[test]
    fn test_proxy_context_requires_host() {
        let err = proxy_context(&HeaderMap::new(), &Uri::from_static("/feed"), "k").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let ctx = proxy_context(
            &HeaderMap::new(),
            &Uri::from_static("http://proxy.local/feed"),
            "k",
        )
        .unwrap();
        assert_eq!(ctx.base(), "http://proxy.local");
    }
}
