//! Core pipeline for the dropship watcher daemon.
//!
//! The pipeline is watch → detect → stabilize → dispatch → archive: a drop
//! directory is observed for arriving archive files, each file is held until
//! its write activity settles, handed to an external loader executable at most
//! once per generation, and finally relocated into a backup directory. A
//! periodic sweep reconciles anything a missed notification left behind.

pub mod archive;
pub mod dispatch;
pub mod error;
pub mod processed;
pub mod stability;
pub mod watch;

pub use archive::archive_file;
pub use dispatch::{DispatchOutcome, Dispatcher, LoaderDispatcher};
pub use error::{DropshipError, Result};
pub use processed::ProcessedSet;
pub use stability::{SettleProbe, StabilityProbe};
pub use watch::{WatchConfig, WatchService};
