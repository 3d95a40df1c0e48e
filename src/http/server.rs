//! HTTP Server
//!
//! Axum HTTP 服务器启动和配置

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use http::header::{ACCEPT, CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::middleware::{request_logging_middleware, REQUEST_ID_HEADER};
use super::routes::create_routes;
use super::state::AppState;
use crate::config::ServerConfig;

/// HTTP 服务器
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// 创建新的 HTTP 服务器
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// 构建 Router
    pub fn build_router(&self) -> Router {
        let router = create_routes(self.state.clone())
            .layer(middleware::from_fn(request_logging_middleware))
            .layer(TraceLayer::new_for_http());

        if self.config.cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers([ACCEPT, CONTENT_TYPE])
                .expose_headers([REQUEST_ID_HEADER])
                .max_age(std::time::Duration::from_secs(3600));
            router.layer(cors)
        } else {
            router
        }
    }

    /// 启动服务器
    pub async fn run(self) -> Result<(), std::io::Error> {
        let router = self.build_router();
        let addr = self.config.addr();

        info!("Starting HTTP server on {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }

    /// 启动服务器（带优雅关闭）
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let addr = self.config.addr();

        info!("Starting HTTP server on {} (with graceful shutdown)", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::http::log_sink::RecordingLogSink;
    use axum::body::{to_bytes, Body};
    use http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    const SIGNING_HEX: &str = "6b1c7a0f4e3d2c1b0a99887766554433221100ffeeddccbbaa99887766554433";

    fn server(signing: Option<&str>) -> (HttpServer, Arc<RecordingLogSink>) {
        let mut config = AppConfig::default();
        config.cookie.signing_secret = signing.map(str::to_string);
        let keys = crate::config::cookie_keys(&config).unwrap();

        let sink = Arc::new(RecordingLogSink::new());
        let state = AppState::new(&config, keys).with_sink(sink.clone());
        (HttpServer::new(config.server.clone(), state), sink)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "example.com")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping_json() {
        let (server, _) = server(None);
        let response = server.build_router().oneshot(get("/api/ping")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_ping_xml() {
        let (server, _) = server(None);
        let request = Request::builder()
            .uri("/api/ping")
            .header(header::ACCEPT, "application/xml")
            .body(Body::empty())
            .unwrap();
        let response = server.build_router().oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml; charset=utf-8"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<status>ok</status>"));
    }

    #[tokio::test]
    async fn test_item_found_and_missing() {
        let (server, sink) = server(None);
        let router = server.build_router();

        let response = router.clone().oneshot(get("/api/items/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "widget");

        let response = router.oneshot(get("/api/items/42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"message": "resource not found", "code": "NOT_FOUND_ERROR", "context": {"id": "42"}})
        );
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_item_missing_xml() {
        let (server, _) = server(None);
        let request = Request::builder()
            .uri("/api/items/42")
            .header(header::ACCEPT, "application/xml")
            .body(Body::empty())
            .unwrap();
        let response = server.build_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("<error>"));
        assert!(text.contains("<code>NOT_FOUND_ERROR</code>"));
    }

    #[tokio::test]
    async fn test_item_invalid_id_is_bad_request() {
        let (server, sink) = server(None);
        let response = server.build_router().oneshot(get("/api/items/abc")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["context"], json!({"id": "abc"}));
        assert_eq!(sink.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_echo_reads_body_twice() {
        let (server, _) = server(None);
        let raw = r#"{"message":"hi","repeat":2}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(raw))
            .unwrap();
        let response = server.build_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "hihi", "body_bytes": raw.len()})
        );
    }

    #[tokio::test]
    async fn test_echo_without_body() {
        let (server, sink) = server(None);
        let request = Request::builder()
            .method("POST")
            .uri("/api/echo")
            .body(Body::empty())
            .unwrap();
        let response = server.build_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
        assert!(sink.entries()[0].contains("no http body bytes to read"));
    }

    #[tokio::test]
    async fn test_session_routes_disabled_without_secret() {
        let (server, _) = server(None);
        let response = server.build_router().oneshot(get("/api/session")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (server, _) = server(Some(SIGNING_HEX));
        let router = server.build_router();

        let login = Request::builder()
            .method("POST")
            .uri("/api/session")
            .header(header::HOST, "example.com")
            .header("X-Forwarded-Proto", "https")
            .body(Body::from(r#"{"user":"alice"}"#))
            .unwrap();
        let response = router.clone().oneshot(login).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));
        let pair = set_cookie.split(';').next().unwrap().to_string();

        let request = Request::builder()
            .uri("/api/session")
            .header(header::COOKIE, pair.as_str())
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["user"], "alice");

        let tampered = format!("{}x", pair);
        let request = Request::builder()
            .uri("/api/session")
            .header(header::COOKIE, tampered.as_str())
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_delete() {
        let (server, _) = server(Some(SIGNING_HEX));
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/session")
            .body(Body::empty())
            .unwrap();
        let response = server.build_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap();
        assert!(set_cookie.to_str().unwrap().starts_with("session=;"));
    }

    #[tokio::test]
    async fn test_whoami_uses_full_path() {
        let (server, _) = server(None);
        let response = server
            .build_router()
            .oneshot(get("/api/whoami?x=1"))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["base_url"], "http://example.com/");
        assert_eq!(body["full_url"], "http://example.com/api/whoami?x=1");
        assert_eq!(body["secure"], false);
        assert!(body["request_id"].is_string());
    }
}
