//! 可观测性模块
//!
//! - 结构化日志初始化（tracing + EnvFilter）
//! - Prometheus 指标导出
//! - 任务生命周期事件日志与指标收集

pub mod metrics_collector;
pub mod structured_logger;

use std::net::SocketAddr;

use anyhow::Result;
use jobs_core::config::ObservabilityConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use metrics_collector::{JobMetrics, JobMetricsSnapshot};
pub use structured_logger::StructuredLogger;

/// 初始化结构化日志
///
/// `RUST_LOG` 环境变量优先于配置中的日志级别。重复初始化会返回错误。
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format.as_str() {
        "json" => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_thread_ids(true);
            registry.with(fmt_layer).try_init()
        }
        "compact" => {
            let fmt_layer = tracing_subscriber::fmt::layer().compact().with_target(false);
            registry.with(fmt_layer).try_init()
        }
        _ => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true);
            registry.with(fmt_layer).try_init()
        }
    };

    result.map_err(|e| anyhow::anyhow!("初始化日志失败: {}", e))?;

    info!(
        log_level = %config.log_level,
        log_format = %config.log_format,
        "结构化日志已初始化"
    );
    Ok(())
}

/// 安装全局 Prometheus 指标记录器并在给定地址上提供 `/metrics`
///
/// 必须在 Tokio 运行时内调用。
pub fn init_metrics(bind_address: SocketAddr) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(bind_address)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus指标导出器失败: {}", e))?;

    metrics_collector::describe_metrics();

    info!("Prometheus指标导出器已启动: {}", bind_address);
    Ok(())
}

/// 按配置初始化日志以及（可选的）指标导出
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    if config.metrics_enabled {
        init_metrics(config.metrics_socket_addr()?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_fails() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
            log_format: "compact".to_string(),
            ..Default::default()
        };
        // 第一次可能因其他测试已安装订阅者而失败，第二次必定失败
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
