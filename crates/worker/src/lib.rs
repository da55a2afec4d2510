//! 执行池
//!
//! 每个 [`Worker`] 独立地从共享队列取出执行实例，在任务定义的超时内
//! 调用处理器，然后完成、重试或标记失败。

pub mod pool;
pub mod worker;

pub use pool::WorkerPool;
pub use worker::{Worker, WorkerSnapshot, WorkerStats};
