use std::path::Path;

use anyhow::{Context, Result};
use report_submit::utils::logging;
use report_submit::{App, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("REPORT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

    // 加载配置：文件 → 环境变量覆盖
    let config = Config::load(&config_path)
        .and_then(Config::apply_env)
        .with_context(|| format!("加载配置失败: {}", config_path))?;

    // 初始化日志
    logging::init(config.verbose_logging);
    if !Path::new(&config_path).exists() {
        info!("配置文件 {} 不存在，使用默认配置", config_path);
    }

    let app = App::initialize(config).await?;

    match std::env::args().nth(1).as_deref() {
        Some("check") => app.check().await,
        _ => app.run().await,
    }
}
