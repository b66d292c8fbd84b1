// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::PredictResponse;
use crate::config::NodeConfig;
use crate::service::{CrowdService, DetectionRequest};
use crate::source::ImageSource;
use crate::vision::detection::{YoloConfig, YoloDetector};
use crate::vision::{Detector, DetectorHandle};

/// Crowd Count Node CLI
#[derive(Parser, Debug)]
#[command(name = "crowd-cli")]
#[command(version)]
#[command(about = "Offline tools for the crowd count node", long_about = None)]
pub struct Cli {
    /// Weights path (defaults to MODEL_PATH)
    #[arg(long, global = true, env = "MODEL_PATH")]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count people in a local image or a URL
    Detect(DetectArgs),

    /// Load the weights and report how they run
    CheckModel,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Local image file
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub image: Option<PathBuf>,

    /// Remote image URL
    #[arg(long)]
    pub url: Option<String>,

    /// Confidence threshold (defaults to CONF_THRESH)
    #[arg(long)]
    pub conf: Option<f32>,

    /// Label echoed back as beachName
    #[arg(long)]
    pub label: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub t1: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub t2: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub t3: Option<i64>,
}

impl DetectArgs {
    pub fn into_request(self) -> DetectionRequest {
        let mut sources = Vec::new();
        if let Some(path) = self.image {
            sources.push(ImageSource::LocalFile(path));
        }
        if let Some(url) = self.url {
            sources.push(ImageSource::Remote(url));
        }
        DetectionRequest {
            sources,
            confidence: self.conf,
            label_name: self.label,
            t1: self.t1,
            t2: self.t2,
            t3: self.t3,
        }
    }
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = NodeConfig::from_env();
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    match cli.command {
        Commands::Detect(args) => detect(config, args).await,
        Commands::CheckModel => check_model(config),
    }
}

async fn detect(config: NodeConfig, args: DetectArgs) -> Result<()> {
    let handle = Arc::new(DetectorHandle::load(&config));
    if let Some(reason) = handle.load_error() {
        anyhow::bail!("Model not loaded: {}", reason);
    }

    let service = CrowdService::new(config, handle)?;
    let result = service
        .detect(args.into_request())
        .await
        .context("Detection failed")?;

    let response = PredictResponse::from(result);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn check_model(config: NodeConfig) -> Result<()> {
    let yolo_config = YoloConfig {
        input_size: config.input_size,
        iou_threshold: config.iou_thresh,
        intra_threads: config.inference_threads,
    };
    let detector = YoloDetector::load(&config.model_path, yolo_config)
        .with_context(|| format!("Failed to load {}", config.model_path.display()))?;

    println!("✅ Model loaded: {}", config.model_name());
    println!("   ONNX file:  {}", detector.weights_path().display());
    println!("   Provider:   {}", detector.provider());
    println!(
        "   Classes:    {}",
        detector
            .class_count()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("   Input size: {}x{}", config.input_size, config.input_size);
    Ok(())
}
