// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use crowd_count_node::{
    api::{start_server, AppState},
    config::NodeConfig,
    version,
    vision::DetectorHandle,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("🚀 Starting {}", version::get_version_string());
    tracing::info!("📦 BUILD VERSION: {}", version::VERSION);
    tracing::info!("🔧 Features: {}", version::FEATURES.join(", "));

    let config = NodeConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    tracing::info!(
        "Config: model={}, conf={}, iou={}, input={}, bind={}:{}",
        config.model_path.display(),
        config.conf_thresh,
        config.iou_thresh,
        config.input_size,
        config.api_host,
        config.api_port
    );

    // Inference setup is blocking; a failure leaves the node serving /health
    let load_config = config.clone();
    let handle = tokio::task::spawn_blocking(move || DetectorHandle::load(&load_config)).await?;

    let state = Arc::new(AppState::new(config, Arc::new(handle))?);
    start_server(state).await?;

    tracing::info!("👋 Crowd count node shut down");
    Ok(())
}
