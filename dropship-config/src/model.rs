//! Settings model for the watcher daemon.

use std::path::PathBuf;
use std::time::Duration;

use dropship_core::WatchConfig;
use serde::{Deserialize, Serialize};

fn default_download_dir() -> PathBuf {
    PathBuf::from("/var/lib/dropship/incoming")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/var/lib/dropship/backup")
}

fn default_user() -> String {
    "dropship".to_string()
}

fn default_group() -> String {
    "dropship".to_string()
}

fn default_loader_program() -> PathBuf {
    PathBuf::from("./dropship-loader")
}

fn default_loader_working_dir() -> Option<PathBuf> {
    Some(PathBuf::from("/usr/local/bin/dropship-loader"))
}

fn default_settle_window_ms() -> u64 {
    5_000
}

fn default_sweep_interval_ms() -> u64 {
    600_000
}

fn default_archive_extension() -> String {
    "zip".to_string()
}

/// Top-level daemon settings, serialized with PascalCase keys so the on-disk
/// file stays compatible with configs written by earlier deployments.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct WatcherSettings {
    /// Directory watched for incoming archives.
    pub download_dir: PathBuf,
    /// Directory processed archives are relocated into.
    pub backup_dir: PathBuf,
    /// Account the loader runs under. Empty means "run as the daemon user".
    pub user: String,
    /// Group written into the generated systemd unit.
    pub group: String,
    /// Loader invocation settings.
    pub loader: LoaderSettings,
    /// Watch-loop tuning.
    pub watch: WatchSettings,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            backup_dir: default_backup_dir(),
            user: default_user(),
            group: default_group(),
            loader: LoaderSettings::default(),
            watch: WatchSettings::default(),
        }
    }
}

/// Where the external ingestion executable lives and how it is invoked.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LoaderSettings {
    /// Loader executable. Relative paths resolve against `working_dir`.
    pub program: PathBuf,
    /// Working directory for the loader process.
    pub working_dir: Option<PathBuf>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            program: default_loader_program(),
            working_dir: default_loader_working_dir(),
        }
    }
}

/// Timing and matching knobs for the watch loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct WatchSettings {
    /// Window (ms) a file's size must stay unchanged before it is considered
    /// fully written.
    pub settle_window_ms: u64,
    /// Period (ms) between reconciliation sweeps.
    pub sweep_interval_ms: u64,
    /// Extension (without the dot, case-insensitive) of files the daemon acts
    /// on. Everything else in the drop directory is ignored.
    pub archive_extension: String,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            settle_window_ms: default_settle_window_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            archive_extension: default_archive_extension(),
        }
    }
}

impl WatcherSettings {
    /// Builds the watch-loop configuration. A zero sweep interval would make
    /// `tokio::time::interval` panic, so it is clamped to one millisecond.
    pub fn to_watch_config(&self) -> WatchConfig {
        WatchConfig {
            download_dir: self.download_dir.clone(),
            backup_dir: self.backup_dir.clone(),
            archive_extension: self.watch.archive_extension.clone(),
            sweep_interval: Duration::from_millis(self.watch.sweep_interval_ms.max(1)),
        }
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.watch.settle_window_ms)
    }

    /// User the loader should run as, or `None` when the field is blank.
    pub fn run_as_user(&self) -> Option<&str> {
        let trimmed = self.user.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }
}
