//! 验证码识别服务客户端 - 业务能力层
//!
//! 只负责"创建识别任务 + 轮询结果"能力。
//! 不重试任务创建，整体重试由流程层负责。

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Stage, StageError};
use crate::infrastructure::{HttpTransport, RequestBody, RequestOptions};
use crate::models::{ApiKey, SolveTask};
use crate::utils::logging::truncate_text;

/// 默认识别服务地址
pub const DEFAULT_SOLVER_API_URL: &str = "https://api.anti-captcha.com";

/// 识别约束，作为任务参数显式发送
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptchaConstraints {
    /// 是否包含空格（多个词）
    pub phrase: bool,
    /// 区分大小写
    pub case_sensitive: bool,
    /// 0 = 字母数字均可, 1 = 仅数字, 2 = 仅字母
    pub numeric: u8,
    pub math: bool,
    pub min_length: u32,
    pub max_length: u32,
}

impl Default for CaptchaConstraints {
    fn default() -> Self {
        Self {
            phrase: false,
            case_sensitive: true,
            numeric: 0,
            math: false,
            min_length: 6,
            max_length: 6,
        }
    }
}

/// 识别客户端设置
#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub api_url: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub constraints: CaptchaConstraints,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SOLVER_API_URL.to_string(),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 30,
            constraints: CaptchaConstraints::default(),
        }
    }
}

/// 单次轮询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(String),
    Failed(String),
    Processing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    #[serde(default)]
    error_id: i64,
    error_code: Option<String>,
    error_description: Option<String>,
    task_id: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    #[serde(default)]
    error_id: i64,
    error_code: Option<String>,
    error_description: Option<String>,
    status: Option<String>,
    solution: Option<TaskSolution>,
}

#[derive(Debug, Deserialize)]
struct TaskSolution {
    text: Option<String>,
}

fn describe_error(
    error_id: i64,
    description: Option<String>,
    code: Option<String>,
) -> String {
    description
        .or(code)
        .unwrap_or_else(|| format!("errorId {}", error_id))
}

/// 验证码识别客户端
#[derive(Debug, Clone)]
pub struct CaptchaSolver {
    settings: SolverSettings,
}

impl CaptchaSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.settings.api_url.trim_end_matches('/'), method)
    }

    /// 识别图片，返回的任务总处于终止状态
    ///
    /// 任务创建失败时返回 Err，轮询中的失败记录在任务状态里。
    pub async fn solve(
        &self,
        transport: &dyn HttpTransport,
        key: &ApiKey,
        image: &[u8],
    ) -> Result<SolveTask, StageError> {
        let task_id = self.create_task(transport, key, image).await?;
        debug!("识别任务已创建: {}", task_id);

        let mut task = SolveTask::new(task_id);
        self.poll_until_done(transport, key, &mut task).await;
        Ok(task)
    }

    /// 创建 ImageToTextTask
    pub async fn create_task(
        &self,
        transport: &dyn HttpTransport,
        key: &ApiKey,
        image: &[u8],
    ) -> Result<String, StageError> {
        let c = &self.settings.constraints;
        let payload = json!({
            "clientKey": key.expose(),
            "task": {
                "type": "ImageToTextTask",
                "body": STANDARD.encode(image),
                "phrase": c.phrase,
                "case": c.case_sensitive,
                "numeric": c.numeric,
                "math": c.math,
                "minLength": c.min_length,
                "maxLength": c.max_length
            }
        });

        let response: CreateTaskResponse = self.call("createTask", payload).send(transport).await?;

        if response.error_id > 0 {
            return Err(StageError::SolverService {
                description: describe_error(
                    response.error_id,
                    response.error_description,
                    response.error_code,
                ),
            });
        }

        match response.task_id {
            Some(JsonValue::Number(n)) => Ok(n.to_string()),
            Some(JsonValue::String(s)) if !s.is_empty() => Ok(s),
            _ => Err(StageError::SolverService {
                description: "createTask response has no taskId".to_string(),
            }),
        }
    }

    /// 查询一次任务结果
    pub async fn get_task_result(
        &self,
        transport: &dyn HttpTransport,
        key: &ApiKey,
        task_id: &str,
    ) -> Result<PollOutcome, StageError> {
        // 服务端返回的 taskId 是数字，原样回传
        let task_id_value = task_id
            .parse::<u64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::from(task_id));

        let payload = json!({
            "clientKey": key.expose(),
            "taskId": task_id_value
        });

        let response: TaskResultResponse = self.call("getTaskResult", payload).send(transport).await?;

        if response.error_id > 0 {
            return Ok(PollOutcome::Failed(describe_error(
                response.error_id,
                response.error_description,
                response.error_code,
            )));
        }

        match response.status.as_deref() {
            Some("ready") => match response.solution.and_then(|s| s.text) {
                Some(text) => Ok(PollOutcome::Ready(text)),
                None => Ok(PollOutcome::Failed(
                    "task is ready but has no solution text".to_string(),
                )),
            },
            _ => Ok(PollOutcome::Processing),
        }
    }

    /// 固定间隔轮询，最多 max_poll_attempts 次，最后一次之后不再等待
    async fn poll_until_done(&self, transport: &dyn HttpTransport, key: &ApiKey, task: &mut SolveTask) {
        let max_attempts = self.settings.max_poll_attempts.max(1);

        for attempt in 1..=max_attempts {
            task.record_poll();

            let outcome = self.get_task_result(transport, key, task.task_id()).await;
            match outcome {
                Ok(PollOutcome::Ready(text)) => {
                    debug!("识别完成 (第 {} 次轮询)", attempt);
                    task.mark_ready(text);
                    return;
                }
                Ok(PollOutcome::Failed(description)) => {
                    warn!("识别服务返回错误: {}", description);
                    task.mark_failed(description);
                    return;
                }
                Err(e) => {
                    warn!("轮询识别结果失败: {}", e);
                    task.mark_failed(failure_detail(&e));
                    return;
                }
                Ok(PollOutcome::Processing) => {
                    if attempt < max_attempts {
                        sleep(self.settings.poll_interval).await;
                    }
                }
            }
        }

        warn!("识别超时，已轮询 {} 次", task.polls());
        task.mark_timeout();
    }

    fn call(&self, method: &'static str, payload: JsonValue) -> ApiCall {
        ApiCall {
            url: self.endpoint(method),
            method,
            body: RequestBody::Json(payload),
        }
    }
}

/// 一次待发送的识别服务调用
struct ApiCall {
    url: String,
    method: &'static str,
    body: RequestBody,
}

impl ApiCall {
    /// 发送并解析 JSON，传输错误 / 非 2xx / 响应格式错误都转换为阶段错误
    async fn send<T: DeserializeOwned>(
        self,
        transport: &dyn HttpTransport,
    ) -> Result<T, StageError> {
        let options = RequestOptions::new().header("Accept", "application/json");
        let response = transport
            .post(&self.url, &self.body, &options)
            .await
            .map_err(|e| StageError::network(Stage::Solver, &e))?;

        if !(200..300).contains(&response.status) {
            return Err(StageError::HttpStatus {
                stage: Stage::Solver,
                status: response.status,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| StageError::SolverService {
            description: format!(
                "malformed {} response ({}): {}",
                self.method,
                e,
                truncate_text(&response.text(), 120)
            ),
        })
    }
}

/// 去掉阶段前缀，只保留失败细节
fn failure_detail(err: &StageError) -> String {
    match err {
        StageError::Network { message, .. } => message.clone(),
        StageError::HttpStatus { status, .. } => format!("HTTP {}", status),
        StageError::SolverService { description } => description.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let c = CaptchaConstraints::default();
        assert!(!c.phrase);
        assert!(c.case_sensitive);
        assert_eq!(c.numeric, 0);
        assert!(!c.math);
        assert_eq!((c.min_length, c.max_length), (6, 6));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let solver = CaptchaSolver::new(SolverSettings {
            api_url: "http://localhost:9000/".to_string(),
            ..SolverSettings::default()
        });
        assert_eq!(solver.endpoint("createTask"), "http://localhost:9000/createTask");
    }

    #[test]
    fn test_describe_error_prefers_description() {
        assert_eq!(
            describe_error(1, Some("Account has zero balance".into()), Some("ERROR_ZERO_BALANCE".into())),
            "Account has zero balance"
        );
        assert_eq!(describe_error(2, None, Some("ERROR_KEY_DOES_NOT_EXIST".into())), "ERROR_KEY_DOES_NOT_EXIST");
        assert_eq!(describe_error(3, None, None), "errorId 3");
    }

    #[test]
    fn test_failure_detail_strips_prefix() {
        let err = StageError::Network {
            stage: Stage::Solver,
            message: "connection refused".to_string(),
        };
        assert_eq!(failure_detail(&err), "connection refused");
    }
}
