pub mod execution_store;
pub mod in_memory_queue;
pub mod observability;
pub mod registry;

pub use execution_store::ExecutionStore;
pub use in_memory_queue::{ExecutionQueue, QueueFullError};
pub use observability::{init_logging, init_metrics, init_observability};
pub use observability::{JobMetrics, JobMetricsSnapshot, StructuredLogger};
pub use registry::JobRegistry;
