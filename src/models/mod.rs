pub mod language;
pub mod solve_task;
pub mod task;

pub use language::Language;
pub use solve_task::{SolveStatus, SolveTask};
pub use task::{
    default_description, ApiKey, SubmissionResult, SubmissionTask, SubmitOptions,
    DEFAULT_USER_AGENT,
};
