//! 上报入口 - 编排层
//!
//! 对外提供单个上报、批量上报和可访问性检查三个操作。
//! 每个任务的 User-Agent、代理和描述按配置列表轮换分配。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::infrastructure::{ProxyConfig, ReqwestTransportFactory, TransportFactory};
use crate::models::{
    default_description, ApiKey, SubmissionResult, SubmissionTask, SubmitOptions, DEFAULT_USER_AGENT,
};
use crate::orchestrator::queue_processor::{BatchRun, QueueProcessor};
use crate::services::AccessibilityReport;
use crate::workflow::{SubmissionCtx, SubmissionFlow};

/// 按顺序循环取值，列表为空时返回 None
#[derive(Debug)]
struct Rotation<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T: Clone> Rotation<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.items.len();
        Some(self.items[index].clone())
    }
}

/// 上报入口
pub struct Reporter {
    flow: Arc<SubmissionFlow>,
    queue: QueueProcessor,
    user_agents: Rotation<String>,
    proxies: Rotation<ProxyConfig>,
    report_texts: Rotation<String>,
}

impl Reporter {
    /// 使用 reqwest 传输创建
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_transport(config, Arc::new(ReqwestTransportFactory))
    }

    /// 使用自定义传输创建
    ///
    /// 不检查密钥，密钥随每次调用传入。
    pub fn with_transport(config: &Config, transports: Arc<dyn TransportFactory>) -> AppResult<Self> {
        let proxies = config.proxies().map_err(ConfigError::from)?;
        let flow = Arc::new(SubmissionFlow::new(config, transports)?);

        let user_agents = config
            .user_agents
            .iter()
            .map(|ua| ua.trim())
            .filter(|ua| !ua.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            queue: QueueProcessor::new(flow.clone()),
            flow,
            user_agents: Rotation::new(user_agents),
            proxies: Rotation::new(proxies),
            report_texts: Rotation::new(config.report_texts.clone()),
        })
    }

    /// 按轮换规则创建任务
    pub fn prepare_task(&self, target: &str, credentials: &ApiKey, options: SubmitOptions) -> SubmissionTask {
        let user_agent = self
            .user_agents
            .next()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let description = self
            .report_texts
            .next()
            .map(|text| text.replace("{domain}", target))
            .unwrap_or_else(|| default_description(target));

        SubmissionTask::new(target, credentials.clone(), options)
            .with_user_agent(user_agent)
            .with_proxy(self.proxies.next())
            .with_description(description)
    }

    /// 上报单个目标
    ///
    /// 不幂等：每次调用都会真实提交一次。
    pub async fn submit_report(
        &self,
        target: &str,
        credentials: &ApiKey,
        options: SubmitOptions,
    ) -> SubmissionResult {
        let task = self.prepare_task(target, credentials, options);
        let ctx = SubmissionCtx::new(1, target);
        self.flow.run(&task, &ctx).await
    }

    /// 批量上报，立即返回运行中的批次
    ///
    /// 重试参数使用默认值。
    pub fn run_batch(
        &self,
        targets: &[String],
        credentials: &ApiKey,
        parallel_count: usize,
        inter_item_delay: Duration,
    ) -> BatchRun {
        self.run_batch_with(targets, credentials, SubmitOptions::default(), parallel_count, inter_item_delay)
    }

    /// 批量上报，指定重试参数
    pub fn run_batch_with(
        &self,
        targets: &[String],
        credentials: &ApiKey,
        options: SubmitOptions,
        parallel_count: usize,
        inter_item_delay: Duration,
    ) -> BatchRun {
        let tasks = targets
            .iter()
            .map(|target| self.prepare_task(target, credentials, options))
            .collect();
        self.queue.run(tasks, parallel_count, inter_item_delay)
    }

    /// 只检查表单页面是否可访问
    pub async fn check_accessibility(&self) -> AccessibilityReport {
        let user_agent = self
            .user_agents
            .next()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let proxy = self.proxies.next();

        let language = self.flow.language();
        match self.flow.open_transport(proxy.as_ref()) {
            Ok(transport) => {
                self.flow
                    .fetcher()
                    .check_accessibility(transport.as_ref(), &user_agent, language)
                    .await
            }
            Err(e) => AccessibilityReport {
                accessible: false,
                message: e.message(language),
            },
        }
    }
}
