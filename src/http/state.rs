//! Application State
//!
//! 参考服务各 handler 共享的只读状态

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::cookie::{CookieKeys, SecureCookie};
use super::log_sink::{LogSink, TracingLogSink};
use crate::config::{AppConfig, ProxyConfig};

/// 商品目录中的条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename = "item")]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub quantity: u32,
}

/// 应用状态
pub struct AppState {
    pub proxy: ProxyConfig,
    pub max_body_bytes: usize,
    /// 未配置签名密钥时为 None，session 路由不挂载
    pub cookies: Option<SecureCookie>,
    pub items: HashMap<u64, Item>,
    pub sink: Arc<dyn LogSink>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(config: &AppConfig, keys: Option<CookieKeys>) -> Self {
        let cookies = keys
            .map(|keys| SecureCookie::new(keys).with_max_age(config.cookie.max_age_secs));

        Self {
            proxy: config.proxy.clone(),
            max_body_bytes: config.server.max_body_bytes,
            cookies,
            items: default_items(),
            sink: Arc::new(TracingLogSink),
        }
    }

    /// 替换日志出口（测试中使用 `RecordingLogSink`）
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }
}

fn default_items() -> HashMap<u64, Item> {
    [(1, "widget", 12), (2, "bolt", 250), (3, "gear", 0)]
        .into_iter()
        .map(|(id, name, quantity)| {
            (
                id,
                Item {
                    id,
                    name: name.to_string(),
                    quantity,
                },
            )
        })
        .collect()
}
