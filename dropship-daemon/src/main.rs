//! # Dropship
//!
//! Drop-directory watcher daemon.
//!
//! Watches a drop directory for incoming archives, waits for each file's
//! write activity to settle, hands it to an external loader executable, and
//! relocates it into a backup directory. A periodic sweep reconciles anything
//! the event stream missed.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use dropship_config::{DEFAULT_CONFIG_FILE, WatcherSettings, load_settings};
use dropship_core::{LoaderDispatcher, SettleProbe, WatchService};

#[derive(Parser, Debug)]
#[command(name = "dropship")]
#[command(about = "Watches a drop directory and feeds archives to a loader process")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the JSON settings file
    #[arg(long, env = "DROPSHIP_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default settings file and systemd unit, then exit
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(Command::Init) = cli.command {
        return run_init(&cli.config);
    }

    run_watcher(&cli.config).await
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run_init(config_path: &Path) -> anyhow::Result<()> {
    let settings = dropship_config::write_default_settings(config_path)
        .context("failed to write default settings")?;

    let exec_path = env::current_exe().context("failed to resolve daemon executable path")?;
    let unit_dir = config_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let unit_path =
        dropship_config::write_unit_file(&settings, &unit_dir, &exec_path, config_path)
            .context("failed to write systemd unit")?;

    println!("Wrote {}", config_path.display());
    println!("Wrote {}", unit_path.display());
    println!();
    println!("Review the settings, then install the service with:");
    println!("  sudo cp {} /etc/systemd/system/", unit_path.display());
    println!("  sudo systemctl daemon-reload");
    println!("  sudo systemctl enable --now dropship.service");
    Ok(())
}

async fn run_watcher(config_path: &Path) -> anyhow::Result<()> {
    let settings = load_settings(config_path).with_context(|| {
        format!(
            "failed to load {}; run `dropship init` to create one",
            config_path.display()
        )
    })?;

    info!(
        download_dir = %settings.download_dir.display(),
        backup_dir = %settings.backup_dir.display(),
        user = %settings.user,
        "starting dropship"
    );

    let dispatcher = Arc::new(build_dispatcher(&settings));
    let probe = Arc::new(SettleProbe::new(settings.settle_window()));
    let service = WatchService::start(settings.to_watch_config(), probe, dispatcher)
        .context("failed to start watch service")?;

    shutdown_signal().await;
    info!("shutdown signal received, stopping");
    service.shutdown();
    Ok(())
}

fn build_dispatcher(settings: &WatcherSettings) -> LoaderDispatcher {
    let mut dispatcher = LoaderDispatcher::new(settings.loader.program.clone());
    if let Some(dir) = &settings.loader.working_dir {
        dispatcher = dispatcher.with_working_dir(dir);
    }
    if let Some(user) = settings.run_as_user() {
        dispatcher = dispatcher.with_run_as(user);
    }
    dispatcher
}

/// Resolves on SIGINT or SIGTERM so systemd stops are as clean as Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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
