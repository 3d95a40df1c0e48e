//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 兼容旧部署的环境变量（PROXY_PORT 等）
//! 2. 环境变量（前缀 `HTTPX_`）
//! 3. 配置文件（config.toml）
//! 4. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::http::cookie::CookieKeys;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 旧部署使用的无前缀环境变量及其对应的配置键
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("PROXY_PORT", "proxy.port"),
    ("PROXY_PREFIX", "proxy.prefix"),
    ("COOKIE_SIG_SECRET", "cookie.signing_secret"),
    ("COOKIE_ENC_SECRET", "cookie.encryption_secret"),
];

/// 加载应用配置
///
/// # 环境变量示例
/// - `HTTPX_SERVER__PORT=8080`
/// - `HTTPX_PROXY__PREFIX=/shop`
/// - `HTTPX_COOKIE__SIGNING_SECRET=<hex>`
/// - `PROXY_PORT=443`（兼容变量，优先级最高）
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    build_config(config_path, None)
}

/// `env` 为 None 时读取进程环境变量
fn build_config(
    config_path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5060)?
        .set_default("server.max_body_bytes", 1024 * 1024)?
        .set_default("server.cors", false)?
        .set_default("proxy.prefix", "")?
        .set_default("proxy.forwarded_proto_header", "X-Forwarded-Proto")?
        .set_default("cookie.max_age_secs", 86400 * 30)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量
    // 前缀: HTTPX_
    // 层级分隔符: __ (双下划线)
    // 例如: HTTPX_PROXY__FORWARDED_PROTO_HEADER=X-Scheme
    builder = builder.add_source(
        Environment::with_prefix("HTTPX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env.clone()),
    );

    // 4. 兼容变量
    for (var, key) in LEGACY_ENV_KEYS {
        let value = match &env {
            Some(map) => map.get(*var).cloned(),
            None => std::env::var(var).ok(),
        };
        builder = builder.set_override_option(*key, value.filter(|v| !v.is_empty()))?;
    }

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.proxy.port == Some(0) {
        return Err(ConfigError::ValidationError(
            "Proxy port cannot be 0".to_string(),
        ));
    }

    if http::HeaderName::from_bytes(config.proxy.forwarded_proto_header.as_bytes()).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "Invalid forwarded proto header: {:?}",
            config.proxy.forwarded_proto_header
        )));
    }

    if config.cookie.encryption_secret.is_some() && config.cookie.signing_secret.is_none() {
        return Err(ConfigError::ValidationError(
            "Cookie encryption secret requires a signing secret".to_string(),
        ));
    }

    // 密钥长度与 hex 格式交给 CookieKeys 校验
    cookie_keys(config)?;

    Ok(())
}

/// 根据配置构造 cookie 密钥；未配置签名密钥时返回 None
pub fn cookie_keys(config: &AppConfig) -> Result<Option<CookieKeys>, ConfigError> {
    let Some(signing) = config.cookie.signing_secret.as_deref() else {
        return Ok(None);
    };

    CookieKeys::from_hex(signing, config.cookie.encryption_secret.as_deref())
        .map(Some)
        .map_err(|e| ConfigError::ValidationError(format!("Invalid cookie secret: {}", e)))
}

/// 打印配置信息（用于启动时日志），不输出密钥
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Max Body Size: {} bytes", config.server.max_body_bytes);
    tracing::info!("CORS: {}", config.server.cors);
    match config.proxy.port {
        Some(port) => tracing::info!("Proxy Port: {}", port),
        None => tracing::info!("Proxy Port: (from Host)"),
    }
    tracing::info!("Proxy Prefix: {:?}", config.proxy.prefix);
    tracing::info!("Forwarded Proto Header: {}", config.proxy.forwarded_proto_header);
    tracing::info!(
        "Cookie Signing: {}",
        if config.cookie.signing_secret.is_some() { "configured" } else { "disabled" }
    );
    tracing::info!("Cookie Encryption: {}", config.cookie.encryption_secret.is_some());
    tracing::info!("Cookie Max Age: {}s", config.cookie.max_age_secs);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
