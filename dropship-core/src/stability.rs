//! Write-settle detection for newly arrived files.

use std::path::Path;

use async_trait::async_trait;
use tokio::time::Duration;
use tracing::debug;

/// Decides whether a file has finished arriving. Implementations may hold the
/// calling task for a sampling window; the watch loop relies on that to keep
/// partially written files out of the dispatch path.
#[async_trait]
pub trait StabilityProbe: Send + Sync {
    async fn is_stable(&self, path: &Path) -> bool;
}

/// Samples file size twice across a fixed settle window and reports stability
/// iff the two samples agree. Archives usually arrive as a streamed copy, so
/// an unchanged size across the window is a good proxy for "copy complete".
#[derive(Debug, Clone)]
pub struct SettleProbe {
    settle_window: Duration,
}

impl SettleProbe {
    pub fn new(settle_window: Duration) -> Self {
        Self { settle_window }
    }
}

#[async_trait]
impl StabilityProbe for SettleProbe {
    async fn is_stable(&self, path: &Path) -> bool {
        let Ok(before) = std::fs::metadata(path) else {
            return false;
        };

        tokio::time::sleep(self.settle_window).await;

        // A file that vanished mid-window never counts as stable.
        let Ok(after) = std::fs::metadata(path) else {
            debug!(path = %path.display(), "file vanished during settle window");
            return false;
        };

        after.len() == before.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{SettleProbe, StabilityProbe};
    use std::fs;
    use std::io::Write;
    use tokio::time::Duration;

    #[tokio::test]
    async fn unchanged_file_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.zip");
        fs::write(&path, vec![0u8; 1024]).unwrap();

        let probe = SettleProbe::new(Duration::ZERO);
        assert!(probe.is_stable(&path).await);
    }

    #[tokio::test]
    async fn missing_file_is_not_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let probe = SettleProbe::new(Duration::ZERO);
        assert!(!probe.is_stable(&tmp.path().join("gone.zip")).await);
    }

    #[tokio::test]
    async fn growing_file_is_not_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.zip");
        fs::write(&path, b"partial").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let mut file = fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            file.write_all(b" more bytes").unwrap();
        });

        let probe = SettleProbe::new(Duration::from_millis(150));
        assert!(!probe.is_stable(&path).await);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn file_deleted_during_window_is_not_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.zip");
        fs::write(&path, b"short lived").unwrap();

        let victim = path.clone();
        let deleter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            fs::remove_file(&victim).unwrap();
        });

        let probe = SettleProbe::new(Duration::from_millis(150));
        assert!(!probe.is_stable(&path).await);
        deleter.await.unwrap();
    }
}
