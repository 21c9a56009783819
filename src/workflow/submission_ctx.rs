//! 上报处理上下文
//!
//! 封装"我正在处理第几个目标"这一信息，用作日志前缀

use std::fmt::Display;

/// 上报处理上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 目标在批次中的序号（从1开始，仅用于日志显示）
    pub task_index: usize,

    /// 目标域名
    pub target: String,
}

impl SubmissionCtx {
    pub fn new(task_index: usize, target: impl Into<String>) -> Self {
        Self {
            task_index,
            target: target.into(),
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[目标 #{} {}]", self.task_index, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let ctx = SubmissionCtx::new(3, "phish.example");
        assert_eq!(ctx.to_string(), "[目标 #3 phish.example]");
    }
}
