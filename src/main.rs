//! httpx 参考服务
//!
//! 演示 handler 人机工学层：JSON/XML 响应、错误信封、body 解码、secure cookie、代理 URL。

use httpx::config::{cookie_keys, load_config, print_config};
use httpx::http::{AppState, HttpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：兼容变量 > 环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},httpx={},tower_http=debug",
        config.log.level, config.log.level
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("httpx reference service v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    let keys = cookie_keys(&config)?;
    let state = AppState::new(&config, keys);
    let server = HttpServer::new(config.server.clone(), state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
