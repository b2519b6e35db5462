//! Relocation of processed files into the backup directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{DropshipError, Result};

/// Moves `source` into `backup_dir`, overwriting any same-named file already
/// there (last-moved-wins, no versioning). The backup directory is created on
/// demand. On any failure the source file is left untouched so a later
/// notification or the periodic sweep can retry; there is no internal retry.
pub fn archive_file(source: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        DropshipError::Archive(format!("{} has no file name", source.display()))
    })?;

    fs::create_dir_all(backup_dir)?;
    let destination = backup_dir.join(name);

    if destination.exists() {
        debug!(destination = %destination.display(), "overwriting existing backup");
        fs::remove_file(&destination)?;
    }

    fs::rename(source, &destination)?;
    info!(
        source = %source.display(),
        destination = %destination.display(),
        "archived file"
    );
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::archive_file;
    use std::fs;

    #[test]
    fn moves_file_into_backup() {
        let drop_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();
        let source = drop_dir.path().join("a.zip");
        fs::write(&source, b"payload").unwrap();

        let destination = archive_file(&source, backup_dir.path()).unwrap();

        assert!(!source.exists());
        assert_eq!(destination, backup_dir.path().join("a.zip"));
        assert_eq!(fs::read(&destination).unwrap(), b"payload");
    }

    #[test]
    fn creates_backup_directory_on_demand() {
        let drop_dir = tempfile::tempdir().unwrap();
        let backup_root = tempfile::tempdir().unwrap();
        let backup_dir = backup_root.path().join("nested").join("backup");
        let source = drop_dir.path().join("a.zip");
        fs::write(&source, b"payload").unwrap();

        archive_file(&source, &backup_dir).unwrap();

        assert!(backup_dir.join("a.zip").exists());
    }

    #[test]
    fn second_archive_of_same_name_wins() {
        let drop_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();

        let first = drop_dir.path().join("a.zip");
        fs::write(&first, b"first contents").unwrap();
        archive_file(&first, backup_dir.path()).unwrap();

        let second = drop_dir.path().join("a.zip");
        fs::write(&second, b"second contents").unwrap();
        archive_file(&second, backup_dir.path()).unwrap();

        assert_eq!(
            fs::read(backup_dir.path().join("a.zip")).unwrap(),
            b"second contents"
        );
    }

    #[test]
    fn missing_source_is_an_error() {
        let drop_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();
        let source = drop_dir.path().join("gone.zip");

        assert!(archive_file(&source, backup_dir.path()).is_err());
    }
}
