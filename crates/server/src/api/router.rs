use axum::{extract::Request, middleware, routing::get, Json, Router};
use tower_http::trace::TraceLayer;
use tracing::Span;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{openapi::ApiDoc, state::AppState};

use super::handlers;
use super::middleware::require_auth;

pub fn create_router(state: AppState) -> (Router, utoipa::openapi::OpenApi) {
    let (protected, mut api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(handlers::get_feed))
        .routes(routes!(handlers::relay_media))
        .routes(routes!(handlers::relay_media_kind))
        .with_state(state.clone())
        .split_for_parts();
    let protected = protected.route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let (public, public_api) = OpenApiRouter::new()
        .routes(routes!(handlers::index))
        .routes(routes!(handlers::health))
        .with_state(state)
        .split_for_parts();
    api.merge(public_api);

    let document = api.clone();
    let router = protected
        .merge(public)
        .route(
            "/api/openapi.json",
            get(move || {
                let document = document.clone();
                async move { Json(document) }
            }),
        )
        .layer(TraceLayer::new_for_http().make_span_with(request_span));

    (router, api)
}

/// Span for one HTTP request. The query string carries credentials, so only
/// the path is recorded.
fn request_span(request: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::HttpClients;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-key";
    const UPSTREAM_HOST: &str = "feeds.example.com";
    const PROXY_HOST: &str = "proxy.local:8080";

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
<channel>
<title>Test Show</title>
<itunes:image href="https://cdn.example.com/cover.jpg"/>
<item><title>Ep 1</title><enclosure url="https://cdn.example.com/ep1.mp3" type="audio/mpeg" length="1"/></item>
</channel>
</rss>"#;

    fn test_state(upstream: SocketAddr) -> AppState {
        let mut config = Config::new(API_KEY);
        config.version = "9.9.9-test".to_string();
        config.max_retries = 3;
        config.retry_backoff = Duration::from_millis(1);

        let client = reqwest::Client::builder()
            .resolve(UPSTREAM_HOST, upstream)
            .build()
            .unwrap();
        let clients = HttpClients {
            feed: client.clone(),
            media: client,
        };
        AppState::new(config, clients)
    }

    fn upstream_url(server: &MockServer, path: &str) -> String {
        let url = format!("http://{}:{}{}", UPSTREAM_HOST, server.address().port(), path);
        url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
    }

    async fn send(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response {
        let mut request = Request::builder().uri(uri).header(header::HOST, PROXY_HOST);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_feed_requires_credentials() {
        let server = MockServer::start().await;
        let (app, _) = create_router(test_state(*server.address()));

        let uri = format!("/feed?url={}", upstream_url(&server, "/feed.xml"));
        let response = send(app.clone(), &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let response = send(app, &format!("{}&apikey=wrong-key", uri), &[]).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_is_rewritten_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(FEED, "application/rss+xml")
                    .insert_header("etag", "\"v1\""),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(*server.address());
        let (app, _) = create_router(state.clone());
        let uri = format!(
            "/feed?url={}&apikey={}",
            upstream_url(&server, "/feed.xml"),
            API_KEY
        );

        let response = send(app.clone(), &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml; charset=utf-8"
        );
        assert_eq!(response.headers().get("x-cache").unwrap(), "MISS");
        assert_eq!(response.headers().get("etag").unwrap(), "\"v1\"");

        let body = body_text(response).await;
        assert!(body.contains(
            "http://proxy.local:8080/proxy/audio?url=https%3A%2F%2Fcdn.example.com%2Fep1.mp3"
        ));
        assert!(body.contains(
            "http://proxy.local:8080/proxy/image?url=https%3A%2F%2Fcdn.example.com%2Fcover.jpg"
        ));
        assert!(body.contains("apikey=test-key"));
        assert!(body.contains("<title>Ep 1</title>"));
        assert_eq!(state.cache.len(), 1);

        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");
        assert_eq!(body_text(response).await, body);
    }

    #[tokio::test]
    async fn test_basic_auth_feed_links_carry_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let mut config = Config::new(API_KEY);
        config.basic_auth = Some(crate::config::BasicCredentials {
            username: "alice".into(),
            password: "hunter2".into(),
        });
        let client = reqwest::Client::builder()
            .resolve(UPSTREAM_HOST, *server.address())
            .build()
            .unwrap();
        let state = AppState::new(
            config,
            HttpClients {
                feed: client.clone(),
                media: client,
            },
        );
        let (app, _) = create_router(state);

        let uri = format!(
            "/feed?url={}&username=alice&password=hunter2",
            upstream_url(&server, "/feed.xml")
        );
        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("apikey=test-key"));
        assert!(!body.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_malformed_feed_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss><channel><item><enclosure url="https://cdn.example.com/a.mp3"/>"#,
            ))
            .mount(&server)
            .await;

        let state = test_state(*server.address());
        let (app, _) = create_router(state.clone());
        let uri = format!(
            "/feed?url={}&apikey={}",
            upstream_url(&server, "/feed.xml"),
            API_KEY
        );

        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_feed_rejects_bad_urls() {
        let server = MockServer::start().await;
        let (app, _) = create_router(test_state(*server.address()));

        let response = send(app.clone(), &format!("/feed?apikey={}", API_KEY), &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            app.clone(),
            &format!("/feed?url=http%3A%2F%2Flocalhost%2Ffeed.xml&apikey={}", API_KEY),
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            app,
            &format!("/feed?url=ftp%3A%2F%2Fexample.com%2Ffeed.xml&apikey={}", API_KEY),
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_feed_upstream_failure_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let state = test_state(*server.address());
        let (app, _) = create_router(state.clone());
        let uri = format!(
            "/feed?url={}&apikey={}",
            upstream_url(&server, "/feed.xml"),
            API_KEY
        );

        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_proxy_streams_partial_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ep1.mp3"))
            .and(header_eq("range", "bytes=0-3"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 0-3/10")
                    .insert_header("accept-ranges", "bytes")
                    .set_body_raw(b"ID3\x04".to_vec(), "audio/mpeg"),
            )
            .mount(&server)
            .await;

        let (app, _) = create_router(test_state(*server.address()));
        let uri = format!("/proxy/audio?url={}", upstream_url(&server, "/ep1.mp3"));
        let bearer = format!("Bearer {}", API_KEY);
        let response = send(
            app,
            &uri,
            &[("authorization", bearer.as_str()), ("range", "bytes=0-3")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get("content-range").unwrap(),
            "bytes 0-3/10"
        );
        assert_eq!(response.headers().get("content-type").unwrap(), "audio/mpeg");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ID3\x04");
    }

    #[tokio::test]
    async fn test_proxy_passes_upstream_errors_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (app, _) = create_router(test_state(*server.address()));
        let uri = format!(
            "/proxy?url={}&apikey={}",
            upstream_url(&server, "/missing.jpg"),
            API_KEY
        );

        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_proxy_rejects_unknown_kind() {
        let server = MockServer::start().await;
        let (app, _) = create_router(test_state(*server.address()));
        let uri = format!(
            "/proxy/video?url={}&apikey={}",
            upstream_url(&server, "/a.mp4"),
            API_KEY
        );

        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    /// Log sink shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_request_logs_never_contain_credentials() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3".to_vec()))
            .mount(&server)
            .await;
        let (app, _) = create_router(test_state(*server.address()));

        let uri = format!(
            "/proxy/audio?url={}&apikey={}",
            upstream_url(&server, "/ep1.mp3"),
            API_KEY
        );
        let response = send(app.clone(), &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_text(response).await;

        let uri = format!(
            "/feed?url={}&apikey=leaked-guess&username=alice&password=hunter2",
            upstream_url(&server, "/feed.xml")
        );
        let response = send(app, &uri, &[]).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let text = logs.text();
        assert!(text.contains("path=/proxy/audio"));
        assert!(text.contains("Unauthorized request"));
        assert!(!text.contains(API_KEY));
        assert!(!text.contains("leaked-guess"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("apikey="));
    }

    #[tokio::test]
    async fn test_public_routes() {
        let server = MockServer::start().await;
        let (app, _) = create_router(test_state(*server.address()));

        let response = send(app.clone(), "/health", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], "9.9.9-test");
        assert_eq!(health["cache_entries"], 0);

        let response = send(app.clone(), "/", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("/feed?url="));

        let response = send(app, "/api/openapi.json", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        let document: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(document["paths"]["/feed"].is_object());
        assert!(document["paths"]["/proxy/{kind}"].is_object());
        assert!(document["paths"]["/health"].is_object());
    }
}
