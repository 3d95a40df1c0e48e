//! httpx - axum 之上的 handler 人机工学层
//!
//! handler 写成 `async fn(ResponseWriter, Request) -> HandlerResult`，
//! 通过 `handler_fn` 适配为 tower `Service` 挂到 axum 路由上。
//!
//! 模块:
//! - error: 带 HTTP 语义的 `ApplicationError`
//! - http: Response Writer、Handler Adapter、Body Decoder、Cookie Codec、参考服务
//! - config: 分层配置加载

pub mod config;
pub mod error;
pub mod http;

pub use config::{load_config, AppConfig};
pub use error::{ApplicationError, ErrorContext, ErrorPatch};
pub use crate::http::{handler_fn, HandlerFunc, HandlerResult, ResponseWriter};
