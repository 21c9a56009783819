use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::infrastructure::ProxyConfig;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 验证码识别服务密钥
///
/// Debug 输出时不显示明文。
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// 获取明文密钥（仅用于请求体）
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// 单次上报的重试参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// 最多执行的完整流水线次数
    pub retry_limit: u32,
    /// 两次尝试之间的等待时间
    pub retry_delay: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// 默认的举报描述
pub fn default_description(target: &str) -> String {
    format!("Phishing domain report: {}", target)
}

/// 一个上报任务
///
/// 创建后不可变，由某个工作槽消费一次。
#[derive(Debug, Clone)]
pub struct SubmissionTask {
    target: String,
    credentials: ApiKey,
    retry_limit: u32,
    retry_delay: Duration,
    user_agent: String,
    proxy: Option<ProxyConfig>,
    description: String,
}

impl SubmissionTask {
    /// 创建新的上报任务（retry_limit 至少为 1）
    pub fn new(target: impl Into<String>, credentials: ApiKey, options: SubmitOptions) -> Self {
        let target = target.into();
        let description = default_description(&target);
        Self {
            target,
            credentials,
            retry_limit: options.retry_limit.max(1),
            retry_delay: options.retry_delay,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            description,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn credentials(&self) -> &ApiKey {
        &self.credentials
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// 上报结果，每个任务恰好产生一次
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub target: String,
    pub success: bool,
    pub message: String,
    /// 实际执行的完整流水线次数
    pub attempts: u32,
    pub duration_ms: u64,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}
