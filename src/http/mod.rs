//! HTTP Layer
//!
//! handler 人机工学层：
//! - Response Writer: 带状态机的响应句柄（status/header/body、JSON/XML、重定向、cookie）
//! - Handler Adapter: 错误返回型 handler 到 tower `Service` 的适配
//! - Body Decoder: 可重复读取的请求体解码
//! - Cookie Codec: 签名（可选加密）cookie
//! - Request helpers: 反向代理之后的 URL 还原
//!
//! 以及基于以上组件的参考服务（server、routes、handlers）。

pub mod body;
pub mod cookie;
pub mod handler;
pub mod handlers;
pub mod log_sink;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use body::{decode_body, decode_body_with_limit, has_body, read_body, read_body_with_limit, BodyError};
pub use cookie::{deletion_cookie, request_cookie, CookieError, CookieKeys, SecureCookie};
pub use handler::{handler_fn, HandlerFunc, HandlerPanic, HandlerResult};
pub use log_sink::{error_chain, LogSink, RecordingLogSink, TracingLogSink};
pub use middleware::{request_logging_middleware, RequestId, REQUEST_ID_HEADER};
pub use request::{is_secure, proxy_base_url, proxy_url_full, UrlError};
pub use response::{ContentType, ResponseError, ResponseState, ResponseWriter};
pub use server::HttpServer;
pub use state::AppState;
