//! 批量上报处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量上报的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建 Reporter、初始化结果日志
//! 2. **批量加载**：读取目标列表文件（去空行、去注释、去重）
//! 3. **并发控制**：委托 QueueProcessor 限制同时运行的流程数
//! 4. **停止信号**：Ctrl-C 时不再启动新目标，已启动的正常跑完
//! 5. **全局统计**：汇总所有目标的处理结果

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::ApiKey;
use crate::orchestrator::reporter::Reporter;
use crate::services::ResultLog;
use crate::utils::logging::{log_result, log_startup, log_targets_loaded, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    reporter: Reporter,
    credentials: ApiKey,
    result_log: ResultLog,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置校验失败")?;

        log_startup(&config);

        let reporter = Reporter::new(&config).context("创建上报器失败")?;
        let result_log = ResultLog::new(&config.output_log_file);

        Ok(Self {
            credentials: config.api_key(),
            config,
            reporter,
            result_log,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let targets = self.load_targets().await?;

        if targets.is_empty() {
            warn!("⚠️ 没有找到待上报的目标，程序结束");
            return Ok(());
        }

        log_targets_loaded(targets.len(), self.config.parallel_count);
        self.result_log.init().context("初始化结果日志失败")?;

        let mut batch = self.reporter.run_batch_with(
            &targets,
            &self.credentials,
            self.config.submit_options(),
            self.config.parallel_count,
            self.config.inter_item_delay(),
        );

        let stop = batch.stop_handle();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⏹️ 收到 Ctrl-C，等待进行中的目标完成...");
                stop.stop();
            }
        });

        while let Some(result) = batch.next().await {
            log_result(&result);
            if let Err(e) = self.result_log.append(&result) {
                error!("写入结果日志失败: {}", e);
            }
        }

        let stopped = batch.stop_handle().is_stopped();
        let snapshot = batch.finish().await;
        ctrl_c.abort();

        print_final_stats(&snapshot, stopped, &self.config.output_log_file);
        Ok(())
    }

    /// 只检查表单是否可访问
    pub async fn check(&self) -> Result<()> {
        info!("🔍 正在检查表单可访问性: {}", self.config.form_url);

        let report = self.reporter.check_accessibility().await;
        if report.accessible {
            info!("✅ {}", report.message);
            Ok(())
        } else {
            anyhow::bail!("{}", report.message)
        }
    }

    /// 加载目标列表
    async fn load_targets(&self) -> Result<Vec<String>> {
        info!("\n📁 正在读取目标列表: {}", self.config.domains_file);

        let content = tokio::fs::read_to_string(&self.config.domains_file)
            .await
            .with_context(|| format!("读取目标列表失败: {}", self.config.domains_file))?;

        Ok(parse_targets(&content))
    }
}

/// 每行一个目标，跳过空行和 `#` 注释，按首次出现顺序去重
pub fn parse_targets(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        let content = "\n# phishing list\nphish.example\n  login-bank.example  \n\nphish.example\n";
        assert_eq!(
            parse_targets(content),
            vec!["phish.example".to_string(), "login-bank.example".to_string()]
        );
    }

    #[tokio::test]
    async fn test_initialize_requires_solver_key() {
        let result = App::initialize(Config::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_targets_file_is_an_error() {
        let config = Config {
            anti_captcha_key: "key".to_string(),
            domains_file: "/nonexistent/domains.txt".to_string(),
            ..Config::default()
        };
        let app = App::initialize(config).await.unwrap();
        assert!(app.run().await.is_err());
    }
}
