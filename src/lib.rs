//! 进程内后台任务调度与执行
//!
//! [`JobManager`] 组合注册表、调度循环、有界执行队列和Worker池；
//! [`app::Application`] 在其上加载配置、注册内置任务。

pub mod app;
pub mod builtin_jobs;
pub mod manager;

pub use app::Application;
pub use manager::{JobManager, JobStats};

pub use jobs_core::{
    handler_fn, Execution, ExecutionSource, ExecutionStatus, JobContext, JobDefinition,
    JobHandler, JobParams, JobResult, ScheduleEntry, ScheduleExpr, SchedulerError,
    SchedulerResult,
};
