//! Session Handlers
//!
//! 基于 secure cookie 的无状态 session

use std::sync::Arc;

use axum::body::Body;
use chrono::{DateTime, Utc};
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use http::{Request, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;
use crate::http::body::decode_body_with_limit;
use crate::http::cookie::{request_cookie, SecureCookie};
use crate::http::handler::HandlerResult;
use crate::http::request::is_secure;
use crate::http::response::ResponseWriter;
use crate::http::state::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: String,
}

/// cookie 中保存的 session 数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: String,
    pub issued_at: DateTime<Utc>,
}

fn codec(state: &AppState) -> Result<&SecureCookie, ApplicationError> {
    state.cookies.as_ref().ok_or_else(|| {
        ApplicationError::internal_server_error().with_cause("cookie keys are not configured")
    })
}

/// GET /api/session
pub async fn get_session(state: Arc<AppState>, w: ResponseWriter, req: Request<Body>) -> HandlerResult {
    let codec = codec(&state)?;
    let cookie = request_cookie(&req, SESSION_COOKIE).ok_or_else(|| {
        ApplicationError::unauthorized().with_message("no session cookie")
    })?;

    let session: SessionData = codec.decode_cookie(&cookie).map_err(ApplicationError::from)?;
    w.json(&session)?;
    Ok(())
}

/// POST /api/session
pub async fn create_session(
    state: Arc<AppState>,
    w: ResponseWriter,
    mut req: Request<Body>,
) -> HandlerResult {
    let codec = codec(&state)?;
    let login: LoginRequest = decode_body_with_limit(&mut req, state.max_body_bytes)
        .await
        .map_err(ApplicationError::from)?;

    if login.user.trim().is_empty() {
        return Err(ApplicationError::bad_request()
            .with_message("user cannot be empty")
            .into());
    }

    let session = SessionData {
        user: login.user,
        issued_at: Utc::now(),
    };

    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(is_secure(&req, &state.proxy))
        .build();
    if codec.max_age_secs() > 0 {
        cookie.set_max_age(Duration::seconds(codec.max_age_secs()));
    }
    let cookie = codec.encode_cookie(cookie, &session).map_err(ApplicationError::from)?;

    w.set_cookie(&cookie).status(StatusCode::CREATED).json(&session)?;
    Ok(())
}

/// DELETE /api/session
pub async fn clear_session(_state: Arc<AppState>, w: ResponseWriter, _req: Request<Body>) -> HandlerResult {
    w.del_cookie_by_name(SESSION_COOKIE)
        .write_header(StatusCode::NO_CONTENT);
    Ok(())
}
