//! 后台任务调度子系统的核心类型
//!
//! - [`errors`]: 统一错误类型 [`SchedulerError`]
//! - [`models`]: 任务定义、调度条目、执行实例
//! - [`traits`]: 任务处理器能力 [`JobHandler`]
//! - [`config`]: 配置加载与验证
//! - [`shutdown`]: 进程级关闭信号

pub mod config;
pub mod errors;
pub mod models;
pub mod shutdown;
pub mod traits;

pub use config::{AppConfig, ManagerConfig, ObservabilityConfig, ScheduleConfig};
pub use errors::*;
pub use models::{
    Execution, ExecutionSource, ExecutionStatus, JobDefinition, JobParams, JobResult,
    ScheduleEntry, ScheduleExpr,
};
pub use shutdown::ShutdownManager;
pub use traits::{handler_fn, JobContext, JobHandler};
