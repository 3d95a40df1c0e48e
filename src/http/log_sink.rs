//! Log Sink - handler 错误的日志出口
//!
//! Adapter 在构造时注入 sink，不依赖全局 logger，测试可以替换为 `RecordingLogSink`。

use std::error::Error;
use std::sync::{Mutex, PoisonError};

use http::{Method, Uri};

/// 请求错误的日志出口
pub trait LogSink: Send + Sync {
    fn request_error(&self, method: &Method, uri: &Uri, error: &(dyn Error + 'static));
}

/// 默认实现：输出 `tracing::error!` 事件
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn request_error(&self, method: &Method, uri: &Uri, error: &(dyn Error + 'static)) {
        tracing::error!(
            method = %method,
            uri = %uri,
            error = %error_chain(error),
            "Request error"
        );
    }
}

/// 把错误记录在内存中的 sink（测试替身）
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    entries: Mutex<Vec<String>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的条目，格式为 `METHOD uri: error chain`
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for RecordingLogSink {
    fn request_error(&self, method: &Method, uri: &Uri, error: &(dyn Error + 'static)) {
        let entry = format!("{} {}: {}", method, uri, error_chain(error));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// 渲染错误及其 source 链；已经出现在前文中的 source 不再重复
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = err.source();
    }
    rendered
}
