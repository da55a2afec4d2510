pub mod app_config;
pub mod manager;
pub mod observability;
pub mod schedule;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use manager::ManagerConfig;
pub use observability::ObservabilityConfig;
pub use schedule::ScheduleConfig;
