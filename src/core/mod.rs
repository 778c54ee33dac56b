//! 核心层：错误分类、重试、差异对账、运行报告、编排器

pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod retry;

pub use diff::reconcile;
pub use error::{
    NetworkErrorKind, NormalizationError, PatternError, RemoteError, RetryError, RunError,
    RETRYABLE_STATUS,
};
pub use orchestrator::{create_api_from_config, Orchestrator};
pub use report::{
    Action, OperationLog, OperationRecord, Outcome, ReconciliationReport, ReportEntry, RunResult,
};
pub use retry::{RetryHandler, RetryPolicy};
