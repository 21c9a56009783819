//! 上报处理流程 - 流程层
//!
//! 核心职责：定义"一个目标"的完整上报流程，并在失败时整体重试
//!
//! 流程顺序（每次尝试）：
//! 1. 获取表单页面 → 定位验证码
//! 2. 下载验证码 → 识别
//! 3. 提交表单 → 判断结果
//!
//! 每次尝试使用全新的传输会话（Cookie 不跨尝试保留）。

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppResult, Stage, StageError};
use crate::infrastructure::{HttpTransport, ProxyConfig, TransportFactory, TransportSettings};
use crate::models::{Language, SubmissionResult, SubmissionTask};
use crate::services::form_submitter::format_timestamp;
use crate::services::{CaptchaSolver, FormSubmitter, PageFetcher, ReportFields};
use crate::workflow::submission_ctx::SubmissionCtx;

/// 单个任务所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Fetching,
    Solving,
    Submitting,
    /// 等待下一次尝试
    Retrying,
    Succeeded,
    Exhausted,
}

/// 上报处理流程
///
/// - 编排 fetch → solve → submit
/// - 决定何时重试、何时放弃
/// - 失败从不向上抛出，全部折叠进 SubmissionResult
pub struct SubmissionFlow {
    fetcher: PageFetcher,
    solver: CaptchaSolver,
    submitter: FormSubmitter,
    transports: Arc<dyn TransportFactory>,
    transport_settings: TransportSettings,
    language: Language,
    verbose_logging: bool,
}

impl SubmissionFlow {
    /// 创建新的上报流程
    pub fn new(config: &Config, transports: Arc<dyn TransportFactory>) -> AppResult<Self> {
        let form_url = config.parsed_form_url()?;

        Ok(Self {
            fetcher: PageFetcher::new(form_url.clone(), config.captcha_element_id.clone()),
            solver: CaptchaSolver::new(config.solver_settings()),
            submitter: FormSubmitter::new(form_url),
            transports,
            transport_settings: config.transport_settings(),
            language: config.language,
            verbose_logging: config.verbose_logging,
        })
    }

    /// 替换表单提交服务（例如自定义成功判断）
    pub fn with_submitter(mut self, submitter: FormSubmitter) -> Self {
        self.submitter = submitter;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    /// 为一次尝试打开新的传输会话
    pub fn open_transport(
        &self,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Arc<dyn HttpTransport>, StageError> {
        let settings = TransportSettings {
            proxy: proxy.cloned(),
            ..self.transport_settings.clone()
        };
        self.transports
            .open(&settings)
            .map_err(|e| StageError::network(Stage::FormPage, &e))
    }

    /// 执行完整流程，最多 retry_limit 次
    pub async fn run(&self, task: &SubmissionTask, ctx: &SubmissionCtx) -> SubmissionResult {
        let started_at = Local::now();
        let clock = Instant::now();
        let retry_limit = task.retry_limit();

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < retry_limit {
            attempts += 1;
            info!("{} 🚀 第 {}/{} 次尝试", ctx, attempts, retry_limit);

            match self.attempt(task, ctx).await {
                Ok(()) => {
                    info!("{} ✅ 提交成功", ctx);
                    self.log_state(ctx, FlowState::Succeeded);
                    last_error = None;
                    break;
                }
                Err(e) => {
                    warn!("{} ❌ 第 {} 次尝试失败: {}", ctx, attempts, e);
                    last_error = Some(e);

                    if attempts < retry_limit {
                        self.log_state(ctx, FlowState::Retrying);
                        sleep(task.retry_delay()).await;
                    }
                }
            }
        }

        let (success, message) = match last_error {
            None => (true, self.language.submitted().to_string()),
            Some(e) => {
                self.log_state(ctx, FlowState::Exhausted);
                let detail = e.message(self.language);
                (false, self.language.exhausted(attempts, &detail))
            }
        };

        SubmissionResult {
            target: task.target().to_string(),
            success,
            message,
            attempts,
            duration_ms: clock.elapsed().as_millis() as u64,
            started_at,
            finished_at: Local::now(),
        }
    }

    /// 单次完整尝试
    async fn attempt(&self, task: &SubmissionTask, ctx: &SubmissionCtx) -> Result<(), StageError> {
        let transport = self.open_transport(task.proxy())?;
        let transport = transport.as_ref();
        let user_agent = task.user_agent();

        self.log_state(ctx, FlowState::Fetching);
        let page = self.fetcher.fetch_form(transport, user_agent).await?;
        let image = self.fetcher.fetch_captcha(transport, &page, user_agent).await?;

        self.log_state(ctx, FlowState::Solving);
        let solve = self.solver.solve(transport, task.credentials(), &image).await?;
        let polls = solve.polls();
        let code = solve.into_solution()?;
        if self.verbose_logging {
            info!("{} 🔑 验证码识别结果: {} (轮询 {} 次)", ctx, code, polls);
        }

        self.log_state(ctx, FlowState::Submitting);
        let timestamp = format_timestamp(&Local::now());
        let fields = ReportFields {
            target: task.target(),
            description: task.description(),
            timestamp: &timestamp,
            security_code: &code,
        };
        self.submitter.submit(transport, user_agent, &fields).await
    }

    fn log_state(&self, ctx: &SubmissionCtx, state: FlowState) {
        debug!("{} 状态 → {:?}", ctx, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::infrastructure::{HttpResponse, ProxyProtocol, RequestBody, RequestOptions};
    use crate::models::{ApiKey, SubmitOptions};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 每次打开都计数，且所有请求都返回 403
    struct BlockedSite {
        opened: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for BlockedSite {
        async fn get(&self, _url: &str, _options: &RequestOptions) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::new(403, "Forbidden"))
        }

        async fn post(
            &self,
            _url: &str,
            _body: &RequestBody,
            _options: &RequestOptions,
        ) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::new(403, "Forbidden"))
        }
    }

    struct BlockedFactory(Arc<BlockedSite>);

    impl TransportFactory for BlockedFactory {
        fn open(&self, _settings: &TransportSettings) -> Result<Arc<dyn HttpTransport>, TransportError> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.clone())
        }
    }

    /// 记录每次打开时收到的代理
    struct RecordingFactory {
        site: Arc<BlockedSite>,
        proxies: std::sync::Mutex<Vec<Option<ProxyConfig>>>,
    }

    impl TransportFactory for RecordingFactory {
        fn open(&self, settings: &TransportSettings) -> Result<Arc<dyn HttpTransport>, TransportError> {
            if let Ok(mut proxies) = self.proxies.lock() {
                proxies.push(settings.proxy.clone());
            }
            Ok(self.site.clone())
        }
    }

    struct BrokenFactory;

    impl TransportFactory for BrokenFactory {
        fn open(&self, _settings: &TransportSettings) -> Result<Arc<dyn HttpTransport>, TransportError> {
            Err(TransportError::InvalidRequest("bad proxy".to_string()))
        }
    }

    fn task(limit: u32) -> SubmissionTask {
        SubmissionTask::new(
            "phish.example",
            ApiKey::new("key"),
            SubmitOptions {
                retry_limit: limit,
                retry_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn test_each_attempt_opens_new_session() {
        let site = Arc::new(BlockedSite {
            opened: AtomicUsize::new(0),
        });
        let flow = SubmissionFlow::new(&Config::default(), Arc::new(BlockedFactory(site.clone()))).unwrap();

        let result = flow.run(&task(3), &SubmissionCtx::new(1, "phish.example")).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(site.opened.load(Ordering::SeqCst), 3);
        assert!(result.message.contains("blocked"), "{}", result.message);
        assert!(result.finished_at >= result.started_at);
    }

    #[tokio::test]
    async fn test_task_proxy_used_on_every_attempt() {
        let factory = Arc::new(RecordingFactory {
            site: Arc::new(BlockedSite {
                opened: AtomicUsize::new(0),
            }),
            proxies: std::sync::Mutex::new(Vec::new()),
        });
        let flow = SubmissionFlow::new(&Config::default(), factory.clone()).unwrap();
        let proxy = ProxyConfig::new("10.0.0.9", 8080, ProxyProtocol::Http);

        let result = flow
            .run(&task(3).with_proxy(Some(proxy.clone())), &SubmissionCtx::new(1, "phish.example"))
            .await;

        assert_eq!(result.attempts, 3);
        let recorded = factory.proxies.lock().unwrap().clone();
        assert_eq!(recorded, vec![Some(proxy); 3]);
    }

    #[tokio::test]
    async fn test_no_proxy_when_task_has_none() {
        let factory = Arc::new(RecordingFactory {
            site: Arc::new(BlockedSite {
                opened: AtomicUsize::new(0),
            }),
            proxies: std::sync::Mutex::new(Vec::new()),
        });
        let flow = SubmissionFlow::new(&Config::default(), factory.clone()).unwrap();

        flow.run(&task(2), &SubmissionCtx::new(1, "phish.example")).await;

        assert_eq!(factory.proxies.lock().unwrap().clone(), vec![None, None]);
    }

    #[tokio::test]
    async fn test_transport_open_failure_counts_as_attempt() {
        let flow = SubmissionFlow::new(&Config::default(), Arc::new(BrokenFactory)).unwrap();

        let result = flow.run(&task(2), &SubmissionCtx::new(1, "phish.example")).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        assert!(result.message.contains("bad proxy"), "{}", result.message);
    }

    #[test]
    fn test_invalid_form_url_is_rejected() {
        let config = Config {
            form_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(SubmissionFlow::new(&config, Arc::new(BrokenFactory)).is_err());
    }
}
