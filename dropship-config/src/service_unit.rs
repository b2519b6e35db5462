//! Generation of the systemd unit installed by `dropship init`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::loader::ConfigLoadError;
use crate::model::WatcherSettings;

/// File name of the generated systemd unit.
pub const SERVICE_FILE_NAME: &str = "dropship.service";

/// Resolves `group` to its numeric GID via `getent group`. systemd accepts
/// names as well, so on any failure the name is written through unchanged.
pub fn resolve_group_id(group: &str) -> String {
    let output = match Command::new("getent").arg("group").arg(group).output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            warn!(group, status = %output.status, "getent found no such group");
            return group.to_string();
        }
        Err(err) => {
            warn!(group, error = %err, "getent unavailable");
            return group.to_string();
        }
    };

    // getent prints `name:passwd:gid:members`.
    let line = String::from_utf8_lossy(&output.stdout);
    match line.trim().split(':').nth(2) {
        Some(gid) if !gid.is_empty() => gid.to_string(),
        _ => {
            warn!(group, "unexpected getent output");
            group.to_string()
        }
    }
}

/// Renders the unit file contents for a daemon installed at `exec_path` and
/// reading its settings from `config_path`.
pub fn render_unit(
    settings: &WatcherSettings,
    exec_path: &Path,
    config_path: &Path,
) -> String {
    let group = resolve_group_id(&settings.group);

    format!(
        "[Unit]\n\
         Description=Dropship archive watcher\n\
         After=network.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         User={user}\n\
         Group={group}\n\
         ExecStart={exec} --config {config}\n\
         Restart=on-failure\n\
         RestartSec=5\n\
         StandardOutput=journal\n\
         StandardError=journal\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        user = settings.user,
        group = group,
        exec = exec_path.display(),
        config = config_path.display(),
    )
}

/// Writes the unit file into `dir` and returns its path.
pub fn write_unit_file(
    settings: &WatcherSettings,
    dir: &Path,
    exec_path: &Path,
    config_path: &Path,
) -> Result<PathBuf, ConfigLoadError> {
    let unit_path = dir.join(SERVICE_FILE_NAME);
    let rendered = render_unit(settings, exec_path, config_path);

    fs::write(&unit_path, rendered).map_err(|source| ConfigLoadError::Unwritable {
        path: unit_path.clone(),
        source,
    })?;

    info!(path = %unit_path.display(), "wrote systemd unit");
    Ok(unit_path)
}
