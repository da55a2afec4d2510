//! 调度与重试
//!
//! - [`ScheduleLoop`]：固定间隔扫描到期的调度条目并入队
//! - [`RetryService`]：失败尝试的固定间隔重试
//! - [`ExecutionDispatcher`]：队列、执行记录与指标的共享句柄

pub mod dispatch;
pub mod retry_service;
pub mod scheduler;

pub use dispatch::ExecutionDispatcher;
pub use jobs_core::models::ScheduleExpr;
pub use retry_service::{RetryDecision, RetryService};
pub use scheduler::{ScheduleLoop, TickSummary};
