//! 队列处理器 - 编排层
//!
//! 在有界并发下把一批上报任务跑完，结果按完成顺序逐个发出。
//!
//! 循环：
//! 1. 从待处理队列补满工作槽（最多 parallel_count 个）
//! 2. 等待 inter_item_delay（节流，不暂停正在运行的流程）
//! 3. 收集已完成的流程，更新计数，发出结果
//! 4. 待处理与处理中都为空时结束
//!
//! 停止信号只阻止新任务启动，已启动的任务正常跑完并照常发出结果。

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use futures::{Future, FutureExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::{SubmissionResult, SubmissionTask};
use crate::workflow::{SubmissionCtx, SubmissionFlow};

type Pipeline = Pin<Box<dyn Future<Output = (usize, Result<SubmissionResult, JoinError>)> + Send>>;

/// 工作池计数器
///
/// 只由队列处理器修改，每个任务完成时原子更新一次。
#[derive(Debug, Default)]
pub struct WorkerPoolState {
    total_processed: AtomicUsize,
    success_count: AtomicUsize,
    error_count: AtomicUsize,
    in_flight: AtomicUsize,
    pending: AtomicUsize,
    peak_in_flight: AtomicUsize,
    skipped: AtomicUsize,
}

/// 某一时刻的计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub in_flight: usize,
    pub pending: usize,
    /// 整个批次中同时运行的最大流程数
    pub peak_in_flight: usize,
    /// 因停止信号而未启动的任务数
    pub skipped: usize,
}

impl WorkerPoolState {
    fn new(pending: usize) -> Self {
        let state = Self::default();
        state.pending.store(pending, Ordering::SeqCst);
        state
    }

    fn task_started(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn task_finished(&self, success: bool) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.total_processed.fetch_add(1, Ordering::SeqCst);
        if success {
            self.success_count.fetch_add(1, Ordering::SeqCst);
        } else {
            self.error_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn skip_remaining(&self, count: usize) {
        self.pending.fetch_sub(count, Ordering::SeqCst);
        self.skipped.fetch_add(count, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            total_processed: self.total_processed.load(Ordering::SeqCst),
            success_count: self.success_count.load(Ordering::SeqCst),
            error_count: self.error_count.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

/// 停止信号，可在任意任务中克隆使用
#[derive(Debug, Clone, Default)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// 队列处理器
#[derive(Clone)]
pub struct QueueProcessor {
    flow: Arc<SubmissionFlow>,
}

impl QueueProcessor {
    pub fn new(flow: Arc<SubmissionFlow>) -> Self {
        Self { flow }
    }

    /// 启动一个批次，立即返回
    ///
    /// `parallel_count` 小于 1 时按 1 处理。
    pub fn run(
        &self,
        tasks: Vec<SubmissionTask>,
        parallel_count: usize,
        inter_item_delay: Duration,
    ) -> BatchRun {
        let state = Arc::new(WorkerPoolState::new(tasks.len()));
        let stop = StopHandle::default();
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = Driver {
            flow: self.flow.clone(),
            parallel_count: parallel_count.max(1),
            inter_item_delay,
            state: state.clone(),
            stop: stop.clone(),
            results: tx,
        };
        let handle = tokio::spawn(driver.run(tasks));

        BatchRun {
            results: rx,
            stop,
            state,
            driver: handle,
        }
    }
}

struct Driver {
    flow: Arc<SubmissionFlow>,
    parallel_count: usize,
    inter_item_delay: Duration,
    state: Arc<WorkerPoolState>,
    stop: StopHandle,
    results: mpsc::UnboundedSender<SubmissionResult>,
}

impl Driver {
    async fn run(self, tasks: Vec<SubmissionTask>) {
        let targets: Vec<String> = tasks.iter().map(|t| t.target().to_string()).collect();
        let mut pending: VecDeque<(usize, SubmissionTask)> = tasks.into_iter().enumerate().collect();
        let mut in_flight: FuturesUnordered<Pipeline> = FuturesUnordered::new();

        loop {
            // ① 补满工作槽
            while in_flight.len() < self.parallel_count && !self.stop.is_stopped() {
                let Some((index, task)) = pending.pop_front() else {
                    break;
                };
                in_flight.push(self.start(index, task));
            }

            if self.stop.is_stopped() && !pending.is_empty() {
                info!("⏹️ 收到停止信号，跳过剩余 {} 个目标", pending.len());
                self.state.skip_remaining(pending.len());
                pending.clear();
            }

            if in_flight.is_empty() {
                break;
            }

            // ② 节流：只在还有任务等待启动时等待
            if !pending.is_empty() && !self.inter_item_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.inter_item_delay) => {}
                    _ = self.stop.0.cancelled() => {}
                }
            }

            // ③ 收集已完成的流程，没有则等待一个
            let mut collected = 0;
            while let Some(Some(done)) = in_flight.next().now_or_never() {
                self.finish(done, &targets);
                collected += 1;
            }
            if collected == 0 {
                if let Some(done) = in_flight.next().await {
                    self.finish(done, &targets);
                }
            }
        }
    }

    fn start(&self, index: usize, task: SubmissionTask) -> Pipeline {
        self.state.task_started();

        let flow = self.flow.clone();
        let ctx = SubmissionCtx::new(index + 1, task.target());
        let handle: JoinHandle<SubmissionResult> =
            tokio::spawn(async move { flow.run(&task, &ctx).await });

        Box::pin(handle.map(move |joined| (index, joined)))
    }

    fn finish(&self, (index, joined): (usize, Result<SubmissionResult, JoinError>), targets: &[String]) {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                let target = targets.get(index).cloned().unwrap_or_default();
                error!("[目标 #{} {}] 任务执行失败: {}", index + 1, target, e);
                let now = Local::now();
                SubmissionResult {
                    target,
                    success: false,
                    message: format!("pipeline aborted: {}", e),
                    attempts: 0,
                    duration_ms: 0,
                    started_at: now,
                    finished_at: now,
                }
            }
        };

        self.state.task_finished(result.success);
        if self.results.send(result).is_err() {
            warn!("结果接收端已关闭，结果被丢弃");
        }
    }
}

/// 一个正在运行的批次
///
/// 结果按完成顺序到达；发送端在批次结束后关闭。
pub struct BatchRun {
    results: mpsc::UnboundedReceiver<SubmissionResult>,
    stop: StopHandle,
    state: Arc<WorkerPoolState>,
    driver: JoinHandle<()>,
}

impl BatchRun {
    /// 等待下一个结果，批次结束后返回 None
    pub async fn next(&mut self) -> Option<SubmissionResult> {
        self.results.recv().await
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> Arc<WorkerPoolState> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.state.snapshot()
    }

    /// 转为结果流（计数可先通过 `state()` 取得）
    pub fn into_stream(self) -> impl Stream<Item = SubmissionResult> {
        futures::stream::unfold(self.results, |mut rx| async move {
            rx.recv().await.map(|result| (result, rx))
        })
    }

    /// 等待批次结束并返回最终计数，未读取的结果被丢弃
    pub async fn finish(self) -> PoolSnapshot {
        if let Err(e) = self.driver.await {
            error!("批次调度任务异常退出: {}", e);
        }
        self.state.snapshot()
    }

    /// 读取全部结果并返回最终计数
    pub async fn collect_all(mut self) -> (Vec<SubmissionResult>, PoolSnapshot) {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result);
        }
        let snapshot = self.finish().await;
        (results, snapshot)
    }
}
