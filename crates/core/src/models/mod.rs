//! # 数据模型
//!
//! 任务调度子系统的核心数据结构。
//!
//! ## 核心模型
//!
//! ### JobDefinition - 任务定义
//! 注册时创建、之后不可变的可执行单元描述：标识、超时、重试策略和处理器。
//!
//! ### ScheduleEntry - 调度条目
//! 把任务定义绑定到周期触发器（[`ScheduleExpr`]），记录下次/上次触发时间。
//!
//! ### Execution - 执行实例
//! 一次具体的执行谱系，携带状态、时间戳、尝试次数以及结果或错误。
//!
//! ## 状态流转
//!
//! ```text
//! Pending → Running → Completed
//!             ↓  ↘
//!        Retrying  Failed
//!             ↓
//!          Pending
//! Pending → Cancelled
//! ```
//!
//! 所有时间字段使用 `DateTime<Utc>`。

pub mod execution;
pub mod job;
pub mod schedule;

pub use execution::*;
pub use job::*;
pub use schedule::*;
