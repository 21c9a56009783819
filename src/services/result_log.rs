//! 结果日志服务 - 业务能力层
//!
//! 只负责"把上报结果写入日志文件"能力，不关心流程

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::SubmissionResult;
use crate::services::form_submitter::TIMESTAMP_FORMAT;

/// 结果日志
///
/// 职责：
/// - 初始化日志文件（写入标题）
/// - 每个结果追加一行
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 覆盖写入日志标题
    pub fn init(&self) -> AppResult<()> {
        let header = format!(
            "{}\n上报处理日志 - {}\n{}\n\n",
            "=".repeat(60),
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            "=".repeat(60)
        );
        fs::write(&self.path, header).map_err(|e| AppError::file(self.display(), e))
    }

    /// 追加一条结果
    pub fn append(&self, result: &SubmissionResult) -> AppResult<()> {
        debug!("写入结果: {} | success={}", result.target, result.success);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::file(self.display(), e))?;

        file.write_all(format_line(result).as_bytes())
            .map_err(|e| AppError::file(self.display(), e))
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

/// `[时间] ✅ 目标 | N 次尝试 | 耗时 | 消息`
pub fn format_line(result: &SubmissionResult) -> String {
    format!(
        "[{}] {} {} | {} 次尝试 | {} ms | {}\n",
        result.finished_at.format(TIMESTAMP_FORMAT),
        if result.success { "✅" } else { "❌" },
        result.target,
        result.attempts,
        result.duration_ms,
        result.message.replace('\n', " ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn sample(success: bool) -> SubmissionResult {
        let now = Local::now();
        SubmissionResult {
            target: "phish.example".to_string(),
            success,
            message: "form submitted successfully".to_string(),
            attempts: 2,
            duration_ms: 1500,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_format_line() {
        let line = format_line(&sample(true));
        assert!(line.contains("✅ phish.example | 2 次尝试 | 1500 ms | form submitted successfully"));
        assert!(line.ends_with('\n'));
        assert!(format_line(&sample(false)).contains("❌"));
    }

    #[test]
    fn test_init_then_append() {
        let path = std::env::temp_dir().join(format!("report_submit_log_{}.txt", std::process::id()));
        let log = ResultLog::new(&path);

        log.init().unwrap();
        log.append(&sample(true)).unwrap();
        log.append(&sample(false)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("上报处理日志"));
        assert_eq!(content.matches("phish.example").count(), 2);

        let _ = fs::remove_file(&path);
    }
}
