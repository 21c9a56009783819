//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量上报处理器
//! - 管理应用生命周期（初始化、运行）
//! - 读取目标列表、写结果日志
//! - 响应 Ctrl-C 停止信号
//! - 输出全局统计信息
//!
//! ### `reporter` - 上报入口
//! - 单个上报 / 批量上报 / 可访问性检查
//! - 轮换分配 User-Agent、代理和举报描述
//!
//! ### `queue_processor` - 队列处理器
//! - 有界并发运行 SubmissionFlow
//! - 节流、停止信号、计数
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (读取 Vec<目标>)
//!     ↓
//! reporter (创建 SubmissionTask)
//!     ↓
//! queue_processor (并发调度)
//!     ↓
//! workflow::SubmissionFlow (处理单个目标，含重试)
//!     ↓
//! services (能力层：page / captcha / submit / log)
//!     ↓
//! infrastructure (基础设施：HttpTransport)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管应用，queue_processor 管并发
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;
pub mod queue_processor;
pub mod reporter;

// 重新导出主要类型
pub use batch_processor::{parse_targets, App};
pub use queue_processor::{BatchRun, PoolSnapshot, QueueProcessor, StopHandle, WorkerPoolState};
pub use reporter::Reporter;
