//! Handler Adapter
//!
//! 把 `async fn(ResponseWriter, Request) -> HandlerResult` 形式的 handler 适配为
//! tower `Service`，可以直接挂到 axum 路由上：
//!
//! ```ignore
//! Router::new().route("/items/:id", get_service(handler_fn(get_item)))
//! ```
//!
//! 错误处理：
//! - `ApplicationError`：按 `json_err` 写出；携带 cause 时交给 sink 记录
//! - 其他错误：包装为 internal-server-error 写出，并且总是交给 sink 记录
//! - panic：记录后，若响应尚未开始则写出 500，已经开始则保持原样

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::{Method, Request, Uri};
use thiserror::Error;
use tower::Service;

use super::log_sink::{LogSink, TracingLogSink};
use super::response::ResponseWriter;
use crate::error::ApplicationError;

/// handler 的返回类型
pub type HandlerResult = anyhow::Result<()>;

/// handler panic 时记录的错误
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// 错误返回型 handler 的适配器
#[derive(Clone)]
pub struct HandlerFunc<F> {
    handler: F,
    sink: Arc<dyn LogSink>,
}

/// 使用 `TracingLogSink` 的适配器
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFunc<F>
where
    F: Fn(ResponseWriter, Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerFunc::new(handler, Arc::new(TracingLogSink))
}

impl<F, Fut> HandlerFunc<F>
where
    F: Fn(ResponseWriter, Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(handler: F, sink: Arc<dyn LogSink>) -> Self {
        Self { handler, sink }
    }

    /// 执行 handler 并生成最终响应
    pub async fn serve(&self, request: Request<Body>) -> Response {
        let writer = ResponseWriter::new();
        let method = request.method().clone();
        let uri = request.uri().clone();

        let handler_writer = writer.clone();
        let outcome = AssertUnwindSafe(async { (self.handler)(handler_writer, request).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.handle_error(&writer, &method, &uri, err),
            Err(payload) => self.handle_panic(&writer, &method, &uri, payload),
        }

        writer.take_response()
    }

    fn handle_error(&self, writer: &ResponseWriter, method: &Method, uri: &Uri, err: anyhow::Error) {
        match err.downcast::<ApplicationError>() {
            Ok(app_err) => {
                write_error(writer, &app_err);
                if app_err.cause().is_some() {
                    self.sink.request_error(method, uri, &app_err);
                }
            }
            Err(err) => {
                self.sink.request_error(method, uri, &*err);
                write_error(writer, &ApplicationError::internal_server_error().with_cause(err));
            }
        }
    }

    fn handle_panic(
        &self,
        writer: &ResponseWriter,
        method: &Method,
        uri: &Uri,
        payload: Box<dyn Any + Send>,
    ) {
        let panic = HandlerPanic::from_payload(payload);
        self.sink.request_error(method, uri, &panic);

        if writer.is_sent() {
            tracing::warn!(method = %method, uri = %uri, "Handler panicked after response started");
        } else {
            write_error(writer, &ApplicationError::internal_server_error().with_cause(panic));
        }
    }
}

fn write_error(writer: &ResponseWriter, err: &ApplicationError) {
    if let Err(e) = writer.json_err(err) {
        tracing::error!(code = %err.code(), error = %e, "Failed to write error response");
    }
}

impl<F, Fut> Service<Request<Body>> for HandlerFunc<F>
where
    F: Fn(ResponseWriter, Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.serve(request).await) })
    }
}
