//! Ping Handler
//!
//! 健康检查，按 Accept 返回 JSON 或 XML

use axum::body::Body;
use http::Request;
use serde::Serialize;

use super::accepts_xml;
use crate::http::handler::HandlerResult;
use crate::http::response::ResponseWriter;

/// Ping 响应
#[derive(Serialize)]
#[serde(rename = "ping")]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Ping endpoint - 健康检查
pub async fn ping(w: ResponseWriter, req: Request<Body>) -> HandlerResult {
    let response = PingResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    };

    if accepts_xml(&req) {
        w.xml(&response)?;
    } else {
        w.json(&response)?;
    }
    Ok(())
}
