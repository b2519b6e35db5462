//! Reading and writing the daemon's JSON settings file.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::model::WatcherSettings;

/// File name `dropship init` writes and the daemon reads by default.
pub const DEFAULT_CONFIG_FILE: &str = "dropship.json";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Unwritable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Loads settings from `path`. Missing keys fall back to defaults; a missing
/// or malformed file is an error so a typo in the path cannot silently start
/// the daemon on stock settings.
pub fn load_settings(path: &Path) -> Result<WatcherSettings, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let settings =
        serde_json::from_str(&contents).map_err(|source| ConfigLoadError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;

    info!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Writes a default settings file to `path`, creating parent directories as
/// needed. Refuses to overwrite an existing file.
pub fn write_default_settings(path: &Path) -> Result<WatcherSettings, ConfigLoadError> {
    if path.exists() {
        return Err(ConfigLoadError::Unwritable {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "config file already exists",
            ),
        });
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigLoadError::Unwritable {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let settings = WatcherSettings::default();
    let rendered = serde_json::to_string_pretty(&settings).map_err(|source| {
        ConfigLoadError::Invalid {
            path: path.to_path_buf(),
            source,
        }
    })?;

    fs::write(path, rendered).map_err(|source| ConfigLoadError::Unwritable {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), "wrote default settings");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::{ConfigLoadError, load_settings, write_default_settings};
    use std::fs;
    use std::path::Path;

    #[test]
    fn written_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropship.json");

        let written = write_default_settings(&path).unwrap();
        let loaded = load_settings(&path).unwrap();

        assert_eq!(loaded.download_dir, written.download_dir);
        assert_eq!(loaded.backup_dir, written.backup_dir);
        assert_eq!(loaded.user, written.user);
        assert_eq!(loaded.watch.sweep_interval_ms, written.watch.sweep_interval_ms);
    }

    #[test]
    fn default_file_uses_pascal_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropship.json");
        write_default_settings(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"DownloadDir\""));
        assert!(raw.contains("\"BackupDir\""));
        assert!(raw.contains("\"User\""));
        assert!(raw.contains("\"Group\""));
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropship.json");
        fs::write(&path, "{\"User\": \"keepme\"}").unwrap();

        let err = write_default_settings(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Unwritable { .. }));
        assert_eq!(load_settings(&path).unwrap().user, "keepme");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_settings(Path::new("/definitely/not/dropship.json")).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Unreadable { .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropship.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_settings(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    }
}
