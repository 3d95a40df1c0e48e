//! Echo Handler

use std::sync::Arc;

use axum::body::Body;
use http::{Request, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;
use crate::http::body::{decode_body_with_limit, read_body};
use crate::http::handler::HandlerResult;
use crate::http::response::ResponseWriter;
use crate::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EchoRequest {
    pub message: String,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub message: String,
    /// 原始 body 字节数（解码后再次读取）
    pub body_bytes: usize,
}

/// POST /api/echo
pub async fn echo(state: Arc<AppState>, w: ResponseWriter, mut req: Request<Body>) -> HandlerResult {
    let body: EchoRequest = decode_body_with_limit(&mut req, state.max_body_bytes)
        .await
        .map_err(ApplicationError::from)?;

    if body.repeat == 0 || body.repeat > 10 {
        return Err(ApplicationError::bad_request()
            .with_message("repeat must be between 1 and 10")
            .with_field("repeat", body.repeat)
            .into());
    }

    // decoder 已放回 body，这里可以再次读取
    let raw = read_body(&mut req).await.map_err(ApplicationError::from)?;

    w.status(StatusCode::OK).json(&EchoResponse {
        message: body.message.repeat(body.repeat as usize),
        body_bytes: raw.len(),
    })?;
    Ok(())
}
