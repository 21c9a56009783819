//! # Report Submit
//!
//! 自动向举报表单提交钓鱼域名的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - HTTP 传输抽象，只暴露 get / post 能力
//! - `HttpTransport` - 传输接口，流水线只依赖它
//! - `ReqwestTransport` - 生产环境实现（带 Cookie 会话、超时、代理）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只做一步
//! - `PageFetcher` - 获取表单页面与验证码图片
//! - `CaptchaSolver` - 创建识别任务并轮询结果
//! - `FormSubmitter` - 提交表单并判断结果
//! - `ResultLog` - 写结果日志能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个目标"的完整上报流程
//! - `SubmissionCtx` - 上下文封装（序号 + 目标）
//! - `SubmissionFlow` - 流程编排（fetch → solve → submit，失败整体重试）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/reporter` - 对外入口，创建任务
//! - `orchestrator/queue_processor` - 有界并发批处理
//! - `orchestrator/batch_processor` - 应用生命周期
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, StageError};
pub use infrastructure::{HttpTransport, ReqwestTransportFactory, TransportFactory};
pub use models::{ApiKey, Language, SubmissionResult, SubmissionTask, SubmitOptions};
pub use orchestrator::{App, BatchRun, PoolSnapshot, Reporter, StopHandle};
pub use services::AccessibilityReport;
pub use workflow::{SubmissionCtx, SubmissionFlow};
