//! Per-generation dispatch claims.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Tracks which paths have been handed to the loader during the current
/// generation. A generation spans two consecutive sweep clears; within one,
/// each path is claimed at most once no matter how many notifications report
/// it.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    claimed: HashSet<PathBuf>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path` for dispatch. Returns true when this call performed the
    /// insertion; the caller then owns the dispatch attempt for this
    /// generation.
    pub fn try_claim(&mut self, path: &Path) -> bool {
        self.claimed.insert(path.to_path_buf())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.claimed.contains(path)
    }

    /// Starts a new generation. Only the periodic sweep calls this, never a
    /// dispatch in flight.
    pub fn clear(&mut self) {
        self.claimed.clear();
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ProcessedSet;
    use std::path::Path;

    #[test]
    fn first_claim_wins() {
        let mut set = ProcessedSet::new();
        let path = Path::new("/drop/a.zip");

        assert!(set.try_claim(path));
        assert!(!set.try_claim(path));
        assert!(set.contains(path));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn clear_starts_a_new_generation() {
        let mut set = ProcessedSet::new();
        let path = Path::new("/drop/a.zip");

        assert!(set.try_claim(path));
        set.clear();

        assert!(set.is_empty());
        assert!(!set.contains(path));
        assert!(set.try_claim(path), "cleared paths are claimable again");
    }

    #[test]
    fn claims_are_per_path() {
        let mut set = ProcessedSet::new();

        assert!(set.try_claim(Path::new("/drop/a.zip")));
        assert!(set.try_claim(Path::new("/drop/b.zip")));
        assert_eq!(set.len(), 2);
    }
}
