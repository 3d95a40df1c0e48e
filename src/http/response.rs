//! Response Writer
//!
//! 状态机：`fresh → status-set → type-set → sent`
//!
//! - status 可以重复设置，直到第一个字节写出
//! - content type 只有第一次设置生效（first-write-wins）
//! - 第一次 write 冻结 status 与 headers，之后的修改全部被忽略（no-op，不报错）
//!
//! `ResponseWriter` 是单个请求内共享的句柄，handler 与 adapter 各持一份，
//! handler 返回后由 adapter 转换为 axum `Response`。

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use http::header::{self, HeaderName, HeaderValue, InvalidHeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use thiserror::Error;

use super::cookie::deletion_cookie;
use crate::error::{ApplicationError, ErrorContext};

/// XML 文档前的声明行
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// XML 错误信封的根元素
const XML_ERROR_ROOT: &str = "error";

/// 响应媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    TextHtml,
    ApplicationJson,
    ApplicationXml,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::TextHtml => "text/html; charset=utf-8",
            ContentType::ApplicationJson => "application/json; charset=utf-8",
            ContentType::ApplicationXml => "application/xml; charset=utf-8",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 响应写出错误
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to encode JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode XML response: {0}")]
    Xml(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

// ============================================================================
// ResponseState
// ============================================================================

/// 单个响应的缓冲状态
#[derive(Debug, Default)]
pub struct ResponseState {
    status: Option<StatusCode>,
    content_type: Option<ContentType>,
    headers: HeaderMap,
    body: Vec<u8>,
    header_sent: bool,
}

impl ResponseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 status；已发送则忽略
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        if self.header_sent {
            tracing::debug!(status = %code, "Response already sent, status ignored");
        } else {
            self.status = Some(code);
        }
        self
    }

    /// 设置 content type，仅第一次生效
    pub fn content_type(&mut self, media: ContentType) -> &mut Self {
        if self.content_type.is_none() && !self.header_sent {
            self.content_type = Some(media);
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(media.as_str()));
            self.headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
        }
        self
    }

    /// 显式刷出 header
    pub fn write_header(&mut self, code: StatusCode) {
        if self.header_sent {
            tracing::debug!(status = %code, "Response already sent, header flush ignored");
            return;
        }
        self.status = Some(code);
        self.header_sent = true;
    }

    /// 写入 body；第一次写入时冻结 status（默认 200）
    pub fn write_body(&mut self, bytes: &[u8]) -> usize {
        if !self.header_sent {
            self.status.get_or_insert(StatusCode::OK);
            self.header_sent = true;
        }
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// 覆盖一个 header；返回是否生效
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.header_sent {
            tracing::debug!(header = %name, "Response already sent, header ignored");
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    /// 追加一个 header；返回是否生效
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.header_sent {
            tracing::debug!(header = %name, "Response already sent, header ignored");
            return false;
        }
        self.headers.append(name, value);
        true
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn media_type(&self) -> Option<ContentType> {
        self.content_type
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_sent(&self) -> bool {
        self.header_sent
    }
}

impl io::Write for ResponseState {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_body(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for ResponseState {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_body(s.as_bytes());
        Ok(())
    }
}

impl IntoResponse for ResponseState {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

// ============================================================================
// ResponseWriter
// ============================================================================

/// 单个请求内的响应句柄
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        // handler panic 时锁可能中毒，状态本身仍然完整
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self, code: StatusCode) -> &Self {
        self.lock().status(code);
        self
    }

    pub fn content_type(&self, media: ContentType) -> &Self {
        self.lock().content_type(media);
        self
    }

    pub fn write_header(&self, code: StatusCode) {
        self.lock().write_header(code);
    }

    pub fn write(&self, bytes: &[u8]) -> usize {
        self.lock().write_body(bytes)
    }

    /// 写出一行文本
    pub fn send(&self, text: impl fmt::Display) {
        let line = format!("{}\n", text);
        self.write(line.as_bytes());
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.lock().insert_header(name, value);
        self
    }

    /// 编码 JSON 并直接写入 body
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ResponseError> {
        let mut state = self.lock();
        state.content_type(ContentType::ApplicationJson);
        serde_json::to_writer(&mut *state, value)?;
        state.write_body(b"\n");
        Ok(())
    }

    /// 写出 XML 声明后编码 XML；编码失败时不写入任何内容
    pub fn xml<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ResponseError> {
        let mut encoded = String::new();
        quick_xml::se::to_writer(&mut encoded, value)
            .map_err(|e| ResponseError::Xml(e.to_string()))?;

        let mut state = self.lock();
        state.content_type(ContentType::ApplicationXml);
        state.write_body(XML_DECLARATION.as_bytes());
        state.write_body(encoded.as_bytes());
        Ok(())
    }

    /// 以 err.status 写出 JSON 错误信封
    pub fn json_err(&self, err: &ApplicationError) -> Result<(), ResponseError> {
        self.status(err.status()).json(err)
    }

    /// 以 err.status 写出 XML 错误信封
    ///
    /// context 的键不是合法 XML 名称时，改为写出不带 context 的信封
    pub fn xml_err(&self, err: &ApplicationError) -> Result<(), ResponseError> {
        let encoded = match encode_xml_error(err) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(code = %err.code(), error = %e, "Error context is not XML encodable, dropped");
                encode_xml_error(&err.with_context(ErrorContext::new()))?
            }
        };

        let mut state = self.lock();
        state.status(err.status());
        state.content_type(ContentType::ApplicationXml);
        state.write_body(XML_DECLARATION.as_bytes());
        state.write_body(encoded.as_bytes());
        Ok(())
    }

    /// 重定向：设置 Location 并刷出 status；GET 请求附带一段 HTML
    pub fn redirect(
        &self,
        method: &Method,
        location: &str,
        code: StatusCode,
    ) -> Result<(), ResponseError> {
        let value = HeaderValue::from_str(location)?;
        let mut state = self.lock();
        if state.is_sent() {
            tracing::warn!(location = %location, "Response already sent, redirect ignored");
            return Ok(());
        }

        state.insert_header(header::LOCATION, value);
        let had_content_type = state.media_type().is_some();
        if !had_content_type && (*method == Method::GET || *method == Method::HEAD) {
            state.content_type(ContentType::TextHtml);
        }
        state.write_header(code);

        if !had_content_type && *method == Method::GET {
            let body = format!(
                "<a href=\"{}\">{}</a>.\n",
                html_escape(location),
                code.canonical_reason().unwrap_or_default()
            );
            state.write_body(body.as_bytes());
        }
        Ok(())
    }

    /// 追加 Set-Cookie
    pub fn set_cookie(&self, cookie: &Cookie<'_>) -> &Self {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                self.lock().append_header(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = %cookie.name(), error = %e, "Cookie is not a valid header value");
            }
        }
        self
    }

    /// 覆盖为立即过期的空 cookie
    pub fn del_cookie(&self, cookie: Cookie<'_>) -> &Self {
        self.set_cookie(&deletion_cookie(cookie))
    }

    pub fn del_cookie_by_name(&self, name: &str) -> &Self {
        self.del_cookie(Cookie::new(name.to_string(), ""))
    }

    pub fn is_sent(&self) -> bool {
        self.lock().is_sent()
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.lock().status_code()
    }

    /// 取出当前状态并生成 axum Response
    pub fn take_response(&self) -> Response {
        std::mem::take(&mut *self.lock()).into_response()
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self) -> Response {
        self.take_response()
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let writer = ResponseWriter::new();
        if let Err(e) = writer.json_err(&self) {
            tracing::error!(error = %e, code = %self.code(), "Failed to encode error response");
        }
        writer.take_response()
    }
}

fn encode_xml_error(err: &ApplicationError) -> Result<String, ResponseError> {
    let mut encoded = String::new();
    let serializer = quick_xml::se::Serializer::with_root(&mut encoded, Some(XML_ERROR_ROOT))
        .map_err(|e| ResponseError::Xml(e.to_string()))?;
    err.serialize(serializer)
        .map_err(|e| ResponseError::Xml(e.to_string()))?;
    Ok(encoded)
}

/// 转义重定向 HTML 中的 `& < > " '`
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
