//! HTTP Middleware
//!
//! 请求日志中间件：为每个请求分配 request id，并按状态码记录日志

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// 响应头中的 request id
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// 请求 id，中间件放入 request extensions 供 handler 读取
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// 请求日志中间件
///
/// 4xx 记 warn，5xx 记 error；handler 内部错误的 cause 链由 LogSink 记录
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP client error"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::util::ServiceExt;

    async fn ok_handler() -> &'static str {
        "OK"
    }

    async fn not_found_handler() -> StatusCode {
        StatusCode::NOT_FOUND
    }

    async fn error_handler() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn id_handler(Extension(id): Extension<RequestId>) -> String {
        id.to_string()
    }

    fn create_test_router() -> Router {
        Router::new()
            .route("/ok", get(ok_handler))
            .route("/not-found", get(not_found_handler))
            .route("/error", get(error_handler))
            .route("/id", get(id_handler))
            .layer(axum::middleware::from_fn(request_logging_middleware))
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_ok_response_has_request_id() {
        let app = create_test_router();
        let response = app.oneshot(get_request("/ok")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_client_error_passes_through() {
        let app = create_test_router();
        let response = app.oneshot(get_request("/not-found")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_server_error_passes_through() {
        let app = create_test_router();
        let response = app.oneshot(get_request("/error")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_handler_sees_same_request_id() {
        let app = create_test_router();
        let response = app.oneshot(get_request("/id")).await.unwrap();

        let header = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(header.as_bytes(), &body[..]);
    }
}
