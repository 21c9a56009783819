//! 日志工具模块
//!
//! 提供日志初始化和输出的辅助函数

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::SubmissionResult;
use crate::orchestrator::PoolSnapshot;
use crate::services::form_submitter::TIMESTAMP_FORMAT;

/// 初始化 tracing 输出
///
/// 级别由 `RUST_LOG` 控制，未设置时为 info（verbose 时为 debug）。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量举报提交模式");
    info!("🌐 表单地址: {}", config.form_url);
    info!(
        "📊 并发数: {} | 重试次数: {} | 间隔: {} ms",
        config.parallel_count, config.retry_limit, config.inter_item_delay_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录目标加载信息
pub fn log_targets_loaded(total: usize, parallel_count: usize) {
    info!("✓ 找到 {} 个待上报的目标", total);
    info!("📋 最多同时处理 {} 个\n", parallel_count.max(1));
}

/// 记录单个结果
pub fn log_result(result: &SubmissionResult) {
    if result.success {
        info!(
            "✅ {} | {} 次尝试 | {} ms",
            result.target, result.attempts, result.duration_ms
        );
    } else {
        warn!(
            "❌ {} | {} 次尝试 | {}",
            result.target,
            result.attempts,
            truncate_text(&result.message, 200)
        );
    }
}

/// 打印最终统计信息
pub fn print_final_stats(snapshot: &PoolSnapshot, stopped: bool, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!("完成时间: {}", chrono::Local::now().format(TIMESTAMP_FORMAT));
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", snapshot.success_count, snapshot.total_processed);
    info!("❌ 失败: {}", snapshot.error_count);
    if stopped {
        info!("⏹️ 已手动停止，未处理: {}", snapshot.skipped);
    }
    info!("📈 最高并发: {}", snapshot.peak_in_flight);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("ihbarınız alınmıştır", 5), "ihbar...");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
