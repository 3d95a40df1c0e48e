//! Application Error - 统一的 HTTP 错误模型
//!
//! `ApplicationError` 同时承载面向客户端的信息（message / code / context）
//! 与仅供内部诊断的信息（status / causes）。
//!
//! 派生操作（`with_*` / `derive`）全部基于 `&self` 返回新值，原型错误永远不会被修改。

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

/// 可以作为 cause 的任意错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 错误上下文（诊断用的键值对）
pub type ErrorContext = Map<String, Value>;

type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// 应用层 HTTP 错误
///
/// 序列化到线上的只有 `message`、`code`、`context` 三个字段。
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationError {
    message: Cow<'static, str>,
    code: Cow<'static, str>,
    context: Option<ErrorContext>,

    #[serde(skip)]
    status: StatusCode,

    /// 按添加顺序排列，最后一个是最新的 cause
    #[serde(skip)]
    causes: Vec<Cause>,
}

/// `derive` 的可选覆盖项
#[derive(Debug, Default)]
pub struct ErrorPatch {
    pub message: Option<String>,
    pub context: Option<ErrorContext>,
    pub cause: Option<BoxError>,
}

impl ApplicationError {
    /// 创建全新的错误
    pub fn new(
        status: StatusCode,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            context: None,
            status,
            causes: Vec::new(),
        }
    }

    const fn prototype(status: StatusCode, code: &'static str, message: &'static str) -> Self {
        Self {
            message: Cow::Borrowed(message),
            code: Cow::Borrowed(code),
            context: None,
            status,
            causes: Vec::new(),
        }
    }

    /// 500 原型
    pub const fn internal_server_error() -> Self {
        Self::prototype(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "internal server error",
        )
    }

    /// 404 原型
    pub const fn not_found() -> Self {
        Self::prototype(StatusCode::NOT_FOUND, "NOT_FOUND_ERROR", "resource not found")
    }

    /// 401 原型
    pub const fn unauthorized() -> Self {
        Self::prototype(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "unauthorized")
    }

    /// 400 原型
    pub const fn bad_request() -> Self {
        Self::prototype(StatusCode::BAD_REQUEST, "BAD_REQUEST", "bad request")
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// 最新添加的 cause
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.causes.last().map(|c| c.as_ref())
    }

    /// 全部 cause，从最早到最新
    pub fn causes(&self) -> impl Iterator<Item = &(dyn std::error::Error + Send + Sync + 'static)> {
        self.causes.iter().map(|c| c.as_ref())
    }

    /// 替换 message
    pub fn with_message(&self, message: impl Into<Cow<'static, str>>) -> Self {
        let mut next = self.clone();
        next.message = message.into();
        next
    }

    /// 替换整个 context
    pub fn with_context(&self, context: ErrorContext) -> Self {
        let mut next = self.clone();
        next.context = Some(context);
        next
    }

    /// 在 context 中插入（或覆盖）一个键
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.context
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        next
    }

    /// 追加一个 cause，已有的 cause 保留在链中
    pub fn with_cause(&self, cause: impl Into<BoxError>) -> Self {
        let mut next = self.clone();
        next.causes.push(Arc::from(cause.into()));
        next
    }

    /// 一次性覆盖多个字段
    pub fn derive(&self, patch: ErrorPatch) -> Self {
        let mut next = self.clone();
        if let Some(message) = patch.message {
            next.message = Cow::Owned(message);
        }
        if let Some(context) = patch.context {
            next.context = Some(context);
        }
        if let Some(cause) = patch.cause {
            next.causes.push(Arc::from(cause));
        }
        next
    }

    /// cause 链的文本形式，例如 `connection reset: write failed`
    pub fn cause_chain(&self) -> Option<String> {
        if self.causes.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.causes.iter().map(|c| c.to_string()).collect();
        Some(parts.join(": "))
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP Error {} {} {}",
            self.status.as_u16(),
            self.code,
            self.message
        )?;
        if let Some(chain) = self.cause_chain() {
            write!(f, ": {}", chain)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes
            .last()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}
