use crate::error::StageError;

/// 识别任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Pending,
    Ready,
    Failed,
    Timeout,
}

impl SolveStatus {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        !matches!(self, SolveStatus::Pending)
    }
}

/// 一个正在进行的验证码识别任务
///
/// 进入 Ready / Failed / Timeout 之后状态不再变化。
#[derive(Debug, Clone)]
pub struct SolveTask {
    task_id: String,
    status: SolveStatus,
    solution: Option<String>,
    error: Option<String>,
    polls: u32,
}

impl SolveTask {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: SolveStatus::Pending,
            solution: None,
            error: None,
            polls: 0,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 已执行的轮询次数
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub(crate) fn record_poll(&mut self) {
        self.polls += 1;
    }

    /// 标记为已识别，已终止时返回 false
    pub fn mark_ready(&mut self, solution: impl Into<String>) -> bool {
        if !self.transition(SolveStatus::Ready) {
            return false;
        }
        self.solution = Some(solution.into());
        true
    }

    /// 标记为失败，已终止时返回 false
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if !self.transition(SolveStatus::Failed) {
            return false;
        }
        self.error = Some(error.into());
        true
    }

    /// 标记为超时，已终止时返回 false
    pub fn mark_timeout(&mut self) -> bool {
        self.transition(SolveStatus::Timeout)
    }

    fn transition(&mut self, next: SolveStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }

    /// 取出识别结果，非 Ready 状态转换为对应的阶段错误
    pub fn into_solution(self) -> Result<String, StageError> {
        match (self.status, self.solution) {
            (SolveStatus::Ready, Some(solution)) => Ok(solution),
            (SolveStatus::Timeout, _) => Err(StageError::SolverTimeout {
                attempts: self.polls,
            }),
            (SolveStatus::Failed, _) => Err(StageError::SolverService {
                description: self
                    .error
                    .unwrap_or_else(|| "unknown solver error".to_string()),
            }),
            _ => Err(StageError::SolverService {
                description: format!("task {} has no solution", self.task_id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_never_reverts() {
        let mut task = SolveTask::new("42");
        assert!(task.mark_ready("AB12CD"));
        assert!(!task.mark_failed("ERROR_CAPTCHA_UNSOLVABLE"));
        assert!(!task.mark_timeout());
        assert_eq!(task.status(), SolveStatus::Ready);
        assert_eq!(task.solution(), Some("AB12CD"));
        assert!(task.error().is_none());
    }

    #[test]
    fn test_into_solution() {
        let mut ready = SolveTask::new("1");
        ready.mark_ready("xY9zQ1");
        assert_eq!(ready.into_solution().unwrap(), "xY9zQ1");

        let mut failed = SolveTask::new("2");
        failed.mark_failed("ERROR_ZERO_BALANCE");
        assert_eq!(
            failed.into_solution().unwrap_err(),
            StageError::SolverService {
                description: "ERROR_ZERO_BALANCE".to_string()
            }
        );

        let mut timed_out = SolveTask::new("3");
        timed_out.record_poll();
        timed_out.record_poll();
        timed_out.mark_timeout();
        assert_eq!(
            timed_out.into_solution().unwrap_err(),
            StageError::SolverTimeout { attempts: 2 }
        );

        assert!(SolveTask::new("4").into_solution().is_err());
    }
}
