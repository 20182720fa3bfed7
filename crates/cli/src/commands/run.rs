//! `run` command implementation.

use anyhow::{Context, Result};
use capture::{CaptureConfig, CaptureController, CaptureStats};
use config_loader::{CaptureBlueprint, ConfigLoader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_capture(args: &RunArgs, quiet: bool) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        host = %blueprint.carla.host,
        port = blueprint.carla.port,
        frames = blueprint.capture.frames,
        vehicle = %blueprint.vehicle.blueprint,
        "Configuration loaded"
    );

    // Dry run - just print merged config and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        let rendered =
            ConfigLoader::to_toml(&blueprint).context("Failed to render configuration")?;
        println!("{rendered}");
        return Ok(());
    }

    let backend = select_backend(args.mock)?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start metrics exporter")?;
    }

    let config = CaptureConfig::from_blueprint(blueprint)
        .context("No output directory: pass --out or set [capture].output_dir")?
        .with_narration(!quiet);

    // Setup graceful shutdown handler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = spawn_shutdown_listener(shutdown_tx);

    info!(out = %config.output_root.display(), "Starting capture...");
    let result = run_controller(backend, config, shutdown_rx).await;
    signal_task.abort();

    let stats = result.context("Capture failed")?;
    info!(
        outcome = ?stats.outcome,
        frames_written = stats.frames_written(),
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Capture finished"
    );

    if !quiet {
        stats.print_summary();
    }
    Ok(())
}

/// Load the config file (or defaults) and apply CLI overrides
fn load_blueprint(args: &RunArgs) -> Result<CaptureBlueprint> {
    let mut blueprint = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => CaptureBlueprint::default(),
    };

    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;
    Ok(blueprint)
}

fn apply_overrides(blueprint: &mut CaptureBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding CARLA host from CLI");
        blueprint.carla.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding CARLA port from CLI");
        blueprint.carla.port = port;
    }
    if let Some(timeout) = args.timeout {
        blueprint.carla.timeout_sec = timeout;
    }
    if let Some(frames) = args.frames {
        info!(frames, "Overriding frame budget from CLI");
        blueprint.capture.frames = frames;
    }
    if let Some(ref out) = args.out {
        blueprint.capture.output_dir = Some(out.clone());
    }
}

/// Simulator the capture runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    #[cfg(feature = "real-carla")]
    Carla,
    Mock,
}

/// The mock is opt-in; without `real-carla` compiled in, `--mock` is required
fn select_backend(mock: bool) -> Result<Backend> {
    if mock {
        Ok(Backend::Mock)
    } else {
        default_backend()
    }
}

#[cfg(feature = "real-carla")]
fn default_backend() -> Result<Backend> {
    Ok(Backend::Carla)
}

#[cfg(not(feature = "real-carla"))]
fn default_backend() -> Result<Backend> {
    anyhow::bail!(
        "this binary was built without CARLA support; rebuild with `--features real-carla` \
         or pass --mock to capture from the in-process mock simulator"
    )
}

async fn run_controller(
    backend: Backend,
    config: CaptureConfig,
    shutdown: watch::Receiver<bool>,
) -> capture::Result<CaptureStats> {
    match backend {
        #[cfg(feature = "real-carla")]
        Backend::Carla => {
            let client = actor_factory::RealCarlaClient::new();
            CaptureController::new(client, config).run(shutdown).await
        }
        Backend::Mock => {
            warn!("Capturing from the in-process mock simulator; --host/--port are ignored");
            let client = actor_factory::MockCarlaClient::new();
            CaptureController::new(client, config).run(shutdown).await
        }
    }
}

/// Flip the shutdown flag on Ctrl+C or SIGTERM
fn spawn_shutdown_listener(shutdown: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Received shutdown signal, stopping capture...");
        // Receiver already gone means the run finished first
        let _ = shutdown.send(true);
    })
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
