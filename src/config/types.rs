//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::http::cookie::DEFAULT_MAX_AGE_SECS;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 反向代理配置
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Cookie 密钥配置
    #[serde(default)]
    pub cookie: CookieConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体最大字节数
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// 允许跨域访问
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5060
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            cors: false,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 反向代理配置
///
/// 服务部署在代理之后时，用于还原客户端看到的 URL。
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// 对外端口，设置后替换 Host 中的端口
    #[serde(default)]
    pub port: Option<u16>,

    /// 对外路径前缀
    #[serde(default)]
    pub prefix: String,

    /// 携带原始协议的请求头
    #[serde(default = "default_forwarded_proto_header")]
    pub forwarded_proto_header: String,
}

fn default_forwarded_proto_header() -> String {
    "X-Forwarded-Proto".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: None,
            prefix: String::new(),
            forwarded_proto_header: default_forwarded_proto_header(),
        }
    }
}

/// Cookie 密钥配置（hex 编码）
#[derive(Clone, Deserialize)]
pub struct CookieConfig {
    /// 签名密钥，未设置时不挂载 session 路由
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// 加密密钥，16 或 32 字节
    #[serde(default)]
    pub encryption_secret: Option<String>,

    /// cookie 有效期（秒）
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,
}

fn default_max_age_secs() -> i64 {
    DEFAULT_MAX_AGE_SECS
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            encryption_secret: None,
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl std::fmt::Debug for CookieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieConfig")
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "***"))
            .field("encryption_secret", &self.encryption_secret.as_ref().map(|_| "***"))
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
