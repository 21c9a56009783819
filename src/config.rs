use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ConfigError;
use crate::infrastructure::{parse_proxy_list, ProxyConfig, ProxyParseError, TransportSettings};
use crate::models::{ApiKey, Language, SubmitOptions, DEFAULT_USER_AGENT};
use crate::services::captcha_solver::DEFAULT_SOLVER_API_URL;
use crate::services::SolverSettings;

/// 程序配置文件
///
/// 所有字段都有默认值，TOML 文件中只需写要覆盖的项。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 举报表单地址
    pub form_url: String,
    /// 验证码图片元素的 id
    pub captcha_element_id: String,
    // --- 验证码识别服务 ---
    pub solver_api_url: String,
    pub anti_captcha_key: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    // --- 重试与并发 ---
    /// 每个目标最多执行的完整流程次数
    pub retry_limit: u32,
    pub retry_delay_ms: u64,
    /// 同时处理的目标数量
    pub parallel_count: usize,
    pub inter_item_delay_ms: u64,
    // --- HTTP ---
    pub request_timeout_secs: u64,
    pub max_redirects: usize,
    /// 轮换使用的 User-Agent，为空时使用默认值
    pub user_agents: Vec<String>,
    /// 代理列表，每行一个
    pub proxy_list: String,
    /// 举报描述模板，`{domain}` 会被替换为目标
    pub report_texts: Vec<String>,
    // --- 输入输出 ---
    pub domains_file: String,
    pub output_log_file: String,
    pub language: Language,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            form_url: "https://www.ihbarweb.org.tr/ihbar.php?subject=7".to_string(),
            captcha_element_id: "captcha".to_string(),
            solver_api_url: DEFAULT_SOLVER_API_URL.to_string(),
            anti_captcha_key: String::new(),
            poll_interval_ms: 1000,
            max_poll_attempts: 30,
            retry_limit: 3,
            retry_delay_ms: 2000,
            parallel_count: 1,
            inter_item_delay_ms: 2000,
            request_timeout_secs: 30,
            max_redirects: 5,
            user_agents: vec![DEFAULT_USER_AGENT.to_string()],
            proxy_list: String::new(),
            report_texts: Vec::new(),
            domains_file: "domains.txt".to_string(),
            output_log_file: "output.txt".to_string(),
            language: Language::English,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从 TOML 文件加载，文件不存在时使用默认配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_display = path.display().to_string();

        if !path.exists() {
            debug!("配置文件 {} 不存在，使用默认配置", path_display);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path_display.clone(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path_display,
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// 用进程环境变量覆盖当前配置
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// 用给定的查找函数覆盖当前配置（便于测试）
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |name: &str, current: &mut String| {
            if let Some(value) = lookup(name) {
                *current = value;
            }
        };
        text("REPORT_FORM_URL", &mut self.form_url);
        text("CAPTCHA_ELEMENT_ID", &mut self.captcha_element_id);
        text("SOLVER_API_URL", &mut self.solver_api_url);
        text("ANTI_CAPTCHA_KEY", &mut self.anti_captcha_key);
        text("PROXY_LIST", &mut self.proxy_list);
        text("DOMAINS_FILE", &mut self.domains_file);
        text("OUTPUT_LOG_FILE", &mut self.output_log_file);

        self.poll_interval_ms = parse_var(&lookup, "POLL_INTERVAL_MS", "u64", self.poll_interval_ms)?;
        self.max_poll_attempts = parse_var(&lookup, "MAX_POLL_ATTEMPTS", "u32", self.max_poll_attempts)?;
        self.retry_limit = parse_var(&lookup, "RETRY_LIMIT", "u32", self.retry_limit)?;
        self.retry_delay_ms = parse_var(&lookup, "RETRY_DELAY_MS", "u64", self.retry_delay_ms)?;
        self.parallel_count = parse_var(&lookup, "PARALLEL_COUNT", "usize", self.parallel_count)?;
        self.inter_item_delay_ms =
            parse_var(&lookup, "INTER_ITEM_DELAY_MS", "u64", self.inter_item_delay_ms)?;
        self.request_timeout_secs =
            parse_var(&lookup, "REQUEST_TIMEOUT_SECS", "u64", self.request_timeout_secs)?;
        self.max_redirects = parse_var(&lookup, "MAX_REDIRECTS", "usize", self.max_redirects)?;
        self.verbose_logging = parse_var(&lookup, "VERBOSE_LOGGING", "bool", self.verbose_logging)?;

        if let Some(value) = lookup("REPORT_LANGUAGE") {
            self.language = Language::parse(&value).ok_or(ConfigError::EnvVarParseFailed {
                var_name: "REPORT_LANGUAGE".to_string(),
                value,
                expected_type: "en | tr".to_string(),
            })?;
        }

        Ok(self)
    }

    /// 检查必填项和格式
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key().is_empty() {
            return Err(ConfigError::MissingSolverKey);
        }
        self.parsed_form_url()?;
        self.proxies()?;
        Ok(())
    }

    pub fn parsed_form_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.form_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.form_url.clone(),
            source,
        })
    }

    pub fn api_key(&self) -> ApiKey {
        ApiKey::new(self.anti_captcha_key.clone())
    }

    pub fn proxies(&self) -> Result<Vec<ProxyConfig>, ProxyParseError> {
        parse_proxy_list(&self.proxy_list)
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            retry_limit: self.retry_limit,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }

    /// 不含代理的传输设置，代理按任务指定
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_redirects: self.max_redirects,
            proxy: None,
        }
    }

    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            api_url: self.solver_api_url.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_attempts: self.max_poll_attempts,
            ..SolverSettings::default()
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    expected_type: &str,
    current: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        None => Ok(current),
    }
}
