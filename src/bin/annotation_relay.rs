//! annotation-relay - 标注提交 Relay
//!
//! 负责：
//! - 唯一持有存储连接
//! - 处理 fetchData / addData / checkDuplicate

use std::sync::Arc;

use annotation_relay::relay::{cleanup_stale_relay, is_relay_running, Relay, RelayConfig};
use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("annotation_relay=debug".parse()?))
        .init();

    tracing::info!("🚀 annotation-relay v{}", env!("CARGO_PKG_VERSION"));

    let config = RelayConfig::from_env();

    if is_relay_running(&config) {
        tracing::error!("❌ Relay is already running, exiting");
        std::process::exit(1);
    }

    if let Err(e) = cleanup_stale_relay(&config) {
        tracing::warn!("Failed to cleanup stale state: {}", e);
    }

    let relay = Arc::new(Relay::new(config)?);
    relay.run().await?;

    tracing::info!("👋 annotation-relay exiting");
    Ok(())
}
