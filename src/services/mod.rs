pub mod captcha_solver;
pub mod form_submitter;
pub mod page_fetcher;
pub mod result_log;

pub use captcha_solver::{CaptchaConstraints, CaptchaSolver, PollOutcome, SolverSettings};
pub use form_submitter::{FormSubmitter, MarkerPredicate, ReportFields, SuccessPredicate};
pub use page_fetcher::{AccessibilityReport, FormPage, PageFetcher};
pub use result_log::ResultLog;
