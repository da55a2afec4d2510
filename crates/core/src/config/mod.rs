//! 配置管理
//!
//! 配置按以下顺序合并，后者覆盖前者：
//!
//! 1. 内置默认值（各配置结构的 `Default` 实现）
//! 2. TOML配置文件
//! 3. `JOBS_` 前缀的环境变量，嵌套字段用 `__` 分隔，例如
//!    `JOBS_MANAGER__WORKER_COUNT=8`
//!
//! ```toml
//! [manager]
//! worker_count = 5
//! queue_capacity = 1000
//! tick_interval_seconds = 60
//!
//! [observability]
//! log_level = "info"
//! log_format = "json"
//!
//! [[schedules]]
//! job_id = "fub_sync"
//! name = "FUB Contact Sync"
//! schedule = "0 */2 * * *"
//! parameters = { sync_notes = true }
//! ```

pub mod models;

pub use models::*;
