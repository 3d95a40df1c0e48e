//! Whoami Handler
//!
//! 返回代理之后客户端看到的 URL，用于排查反向代理配置

use std::sync::Arc;

use axum::body::Body;
use axum::extract::OriginalUri;
use http::Request;
use serde::Serialize;

use crate::error::ApplicationError;
use crate::http::handler::HandlerResult;
use crate::http::middleware::RequestId;
use crate::http::request::{is_secure, proxy_base_url, proxy_url_full};
use crate::http::response::ResponseWriter;
use crate::http::state::AppState;

#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub base_url: String,
    pub full_url: String,
    pub secure: bool,
    pub request_id: Option<String>,
}

/// GET /api/whoami
pub async fn whoami(state: Arc<AppState>, w: ResponseWriter, req: Request<Body>) -> HandlerResult {
    // nest 会去掉路由前缀，还原为完整路径
    let (mut parts, body) = req.into_parts();
    if let Some(OriginalUri(uri)) = parts.extensions.get::<OriginalUri>().cloned() {
        parts.uri = uri;
    }
    let req = Request::from_parts(parts, body);

    let base = proxy_base_url(&req, &state.proxy)
        .map_err(|e| ApplicationError::bad_request().with_cause(e))?;
    let full = proxy_url_full(&req, &state.proxy)
        .map_err(|e| ApplicationError::bad_request().with_cause(e))?;

    w.json(&WhoamiResponse {
        base_url: base.to_string(),
        full_url: full.to_string(),
        secure: is_secure(&req, &state.proxy),
        request_id: req.extensions().get::<RequestId>().map(ToString::to_string),
    })?;
    Ok(())
}
