//! # CARLA Capture CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载、覆盖与验证
//! - 采集运行与生命周期管理
//! - 优雅关闭处理 (Ctrl-C / SIGTERM)

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use observability::{level_for_verbosity, ObservabilityConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_capture, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: level_for_verbosity(cli.verbose, cli.quiet).to_string(),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CARLA Capture CLI starting"
    );

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_capture(args, cli.quiet).await,
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
