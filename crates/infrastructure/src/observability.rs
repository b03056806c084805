use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use routing_core::config::ObservabilityConfig;
use tracing::info;

/// 注册路由相关指标的说明
pub fn describe_metrics() {
    describe_counter!(
        "routing_passes_total",
        "路由执行次数，按结果 (assigned/fixed_branch/scheduled/already_applied) 区分"
    );
    describe_counter!(
        "routing_failures_total",
        "路由失败次数，按是否可重试区分"
    );
    describe_counter!("routing_retries_total", "重新投递的路由请求数");
    describe_counter!("routing_dead_letters_total", "进入死信队列的路由请求数");
    describe_counter!("routing_notifications_total", "推送到门店房间的事件数");
    describe_counter!(
        "routing_notifications_dropped_total",
        "门店没有连接而丢弃的事件数"
    );
    describe_counter!("routing_notifications_failed_total", "通知失败次数");
    describe_counter!("routing_requests_enqueued_total", "受理并入队的路由请求数");
    describe_gauge!("routing_queue_depth", "路由队列中等待的消息数");
}

/// 按配置启动 Prometheus 导出端点
///
/// 未启用时返回 `Ok(false)`。必须在 tokio 运行时内调用。
pub fn init_metrics(config: &ObservabilityConfig) -> Result<bool> {
    if !config.metrics_enabled {
        return Ok(false);
    }

    let addr: SocketAddr = config
        .metrics_bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {}", config.metrics_bind_address))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();
    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(true)
}
