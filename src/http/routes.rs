//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping          GET     健康检查（JSON 或 XML）
//! - /api/echo          POST    回显 JSON body
//! - /api/items/:id     GET     查询商品
//! - /api/session       GET     读取 session cookie
//! - /api/session       POST    签发 session cookie
//! - /api/session       DELETE  删除 session cookie
//! - /api/whoami        GET     代理之后的 URL 信息
//!
//! session 路由仅在配置了签名密钥时挂载

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::routing::{get_service, post_service, MethodRouter};
use axum::Router;
use http::Request;

use super::handler::{HandlerFunc, HandlerResult};
use super::handlers;
use super::response::ResponseWriter;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new().nest("/api", api_routes(&state))
}

/// API 路由
fn api_routes(state: &Arc<AppState>) -> Router {
    let router = Router::new()
        .route(
            "/ping",
            get_service(HandlerFunc::new(handlers::ping, state.sink.clone())),
        )
        .route("/echo", post_service(with_state(state, handlers::echo)))
        .route("/items/:id", get_service(with_state(state, handlers::get_item)))
        .route("/whoami", get_service(with_state(state, handlers::whoami)));

    if state.cookies.is_some() {
        router.route("/session", session_routes(state))
    } else {
        tracing::info!("Cookie signing secret not configured, session routes disabled");
        router
    }
}

/// Session 路由
fn session_routes(state: &Arc<AppState>) -> MethodRouter {
    get_service(with_state(state, handlers::get_session))
        .post_service(with_state(state, handlers::create_session))
        .delete_service(with_state(state, handlers::clear_session))
}

/// 把需要共享状态的 handler 包装为 adapter，日志出口取自 state
fn with_state<F, Fut>(
    state: &Arc<AppState>,
    handler: F,
) -> HandlerFunc<impl Fn(ResponseWriter, Request<Body>) -> Fut + Clone + Send + Sync + 'static>
where
    F: Fn(Arc<AppState>, ResponseWriter, Request<Body>) -> Fut + Copy + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let sink = state.sink.clone();
    let state = state.clone();
    HandlerFunc::new(move |w, req| handler(state.clone(), w, req), sink)
}
