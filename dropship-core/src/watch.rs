//! Watch pipeline for the drop directory.
//!
//! A thin wrapper around `notify` that funnels directory-level notifications,
//! per-file notifications, and the periodic sweep tick through one mpsc
//! channel into a single processing loop. The loop owns all mutable state
//! (the watch set and the claim set), so no locking is needed; stability
//! sampling and loader invocations intentionally stall the loop, one file at
//! a time.

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::archive::archive_file;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::{DropshipError, Result};
use crate::processed::ProcessedSet;
use crate::stability::StabilityProbe;

/// Buffered notifications; the sender blocks the notify thread when full.
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Configuration knobs for the watch pipeline.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Directory observed for arriving archives.
    pub download_dir: PathBuf,
    /// Directory processed files are relocated into.
    pub backup_dir: PathBuf,
    /// Extension (without the dot) a candidate file must carry.
    pub archive_extension: String,
    /// Interval between reconciliation sweeps. Each sweep also clears the
    /// claim set, starting a new generation.
    pub sweep_interval: Duration,
}

enum WatchMessage {
    Notify(Event),
    NotifyError(String),
    Sweep,
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Notify(event) => f
                .debug_struct("WatchMessage::Notify")
                .field("kind", &event.kind)
                .field("path_count", &event.paths.len())
                .finish(),
            WatchMessage::NotifyError(message) => f
                .debug_struct("WatchMessage::NotifyError")
                .field("message", message)
                .finish(),
            WatchMessage::Sweep => f.write_str("WatchMessage::Sweep"),
        }
    }
}

/// Drives the drop-directory pipeline: one notify subscription for the
/// directory plus one per tracked file, a sweep timer, and the processing
/// loop that owns the state.
pub struct WatchService {
    loop_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
}

impl fmt::Debug for WatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchService")
            .field("loop_finished", &self.loop_task.is_finished())
            .field("sweep_finished", &self.sweep_task.is_finished())
            .finish()
    }
}

impl WatchService {
    /// Subscribes to `config.download_dir` and spawns the processing loop.
    /// Files already present in the directory are picked up by an initial
    /// listing pass before any notification is handled.
    pub fn start(
        mut config: WatchConfig,
        probe: Arc<dyn StabilityProbe>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        config.download_dir = resolve_dir(config.download_dir);

        let (tx, rx) = mpsc::channel::<WatchMessage>(WATCH_CHANNEL_CAPACITY);

        let mut watcher = init_watcher(tx.clone())?;
        watcher
            .watch(&config.download_dir, RecursiveMode::NonRecursive)
            .map_err(|err| {
                DropshipError::Watch(format!(
                    "failed to watch {}: {}",
                    config.download_dir.display(),
                    err
                ))
            })?;
        info!(dir = %config.download_dir.display(), "watching drop directory");

        let sweep_task = spawn_sweep_timer(config.sweep_interval, tx.clone());
        let loop_task = spawn_watch_loop(config, watcher, probe, dispatcher, rx);
        drop(tx);

        Ok(Self {
            loop_task,
            sweep_task,
        })
    }

    /// Stops the sweep timer and drops the filesystem subscriptions. An
    /// in-flight loader invocation is not terminated; the child runs to
    /// completion on its own.
    pub fn shutdown(self) {
        self.sweep_task.abort();
        self.loop_task.abort();
        // Dropping the loop's state releases the notify subscriptions.
    }
}

fn init_watcher(tx: mpsc::Sender<WatchMessage>) -> Result<RecommendedWatcher> {
    RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let Err(err) = tx.blocking_send(WatchMessage::Notify(event)) {
                    warn!("watch channel send failed: {err}");
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(WatchMessage::NotifyError(err.to_string()));
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| DropshipError::Watch(format!("failed to create watcher: {err}")))
}

fn spawn_sweep_timer(period: Duration, tx: mpsc::Sender<WatchMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; a sweep right at startup would
        // race the initial listing pass, so skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if tx.send(WatchMessage::Sweep).await.is_err() {
                break;
            }
        }
    })
}

fn spawn_watch_loop(
    config: WatchConfig,
    watcher: RecommendedWatcher,
    probe: Arc<dyn StabilityProbe>,
    dispatcher: Arc<dyn Dispatcher>,
    mut rx: mpsc::Receiver<WatchMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = WatchState::new(config, watcher, probe, dispatcher);
        state.scan_directory().await;
        while let Some(msg) = rx.recv().await {
            state.handle_message(msg).await;
        }
        debug!("watch channel closed, loop exiting");
    })
}

/// Sequential owner of the watch set, the claim set, and the notify handle.
struct WatchState {
    config: WatchConfig,
    watcher: RecommendedWatcher,
    probe: Arc<dyn StabilityProbe>,
    dispatcher: Arc<dyn Dispatcher>,
    watched: HashSet<PathBuf>,
    processed: ProcessedSet,
}

impl WatchState {
    fn new(
        config: WatchConfig,
        watcher: RecommendedWatcher,
        probe: Arc<dyn StabilityProbe>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            config,
            watcher,
            probe,
            dispatcher,
            watched: HashSet::new(),
            processed: ProcessedSet::new(),
        }
    }

    async fn handle_message(&mut self, msg: WatchMessage) {
        match msg {
            WatchMessage::Notify(event) => self.handle_event(event).await,
            WatchMessage::NotifyError(error) => {
                // A degraded notification stream is reconciled by the sweep.
                warn!("filesystem notification error: {error}");
            }
            WatchMessage::Sweep => self.run_sweep().await,
        }
    }

    async fn handle_event(&mut self, event: Event) {
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }

        let mut rescan = false;
        let mut changed = Vec::new();
        for path in event.paths {
            if path == self.config.download_dir {
                rescan = true;
            } else if self.is_candidate(&path) {
                if self.watched.contains(&path) {
                    changed.push(path);
                } else {
                    // An unseen path surfacing counts as a directory-level
                    // change: re-list so registration happens in one place.
                    rescan = true;
                }
            }
        }

        if rescan {
            self.scan_directory().await;
        }
        for path in changed {
            self.handle_file_event(&path).await;
        }
    }

    /// Directory-level pass: re-list matching files, prune entries whose file
    /// vanished, register unseen files, and run the candidate routine once
    /// for each new arrival.
    async fn scan_directory(&mut self) {
        let entries =
            match list_candidates(&self.config.download_dir, &self.config.archive_extension) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        dir = %self.config.download_dir.display(),
                        error = %err,
                        "failed to list drop directory"
                    );
                    return;
                }
            };

        self.prune_vanished(&entries);

        let unseen: Vec<PathBuf> = entries
            .iter()
            .filter(|path| !self.watched.contains(*path))
            .cloned()
            .collect();
        for path in unseen {
            self.track(&path);
            self.try_process(&path).await;
        }
    }

    /// File-level change: ignore paths already claimed this generation,
    /// otherwise run the candidate routine.
    async fn handle_file_event(&mut self, path: &Path) {
        if !path.is_file() {
            self.drop_watch(path);
            return;
        }
        if self.processed.contains(path) {
            debug!(path = %path.display(), "already claimed this generation, ignoring");
            return;
        }
        self.try_process(path).await;
    }

    /// The candidate routine: stabilize → claim → dispatch → archive.
    async fn try_process(&mut self, path: &Path) {
        if self.processed.contains(path) {
            return;
        }
        if !path.is_file() {
            return;
        }

        if !self.probe.is_stable(path).await {
            debug!(
                path = %path.display(),
                "still arriving, waiting for the next notification"
            );
            return;
        }

        // The probe held us for a settle window; the file may be gone by now.
        if !path.is_file() {
            self.drop_watch(path);
            return;
        }

        if !self.processed.try_claim(path) {
            return;
        }

        let outcome = self.dispatcher.dispatch(path).await;
        if outcome != DispatchOutcome::Success {
            warn!(
                path = %path.display(),
                ?outcome,
                "loader did not succeed; archiving anyway"
            );
        }

        self.archive_and_release(path);
    }

    /// Reconciliation pass: any file still on disk that was claimed this
    /// generation missed its archive step, so move it now (no re-dispatch).
    /// Always clears the claim set afterwards, starting the next generation.
    async fn run_sweep(&mut self) {
        debug!("running reconciliation sweep");
        match list_candidates(&self.config.download_dir, &self.config.archive_extension) {
            Ok(entries) => {
                self.prune_vanished(&entries);
                for path in entries {
                    if self.processed.contains(&path) {
                        info!(
                            path = %path.display(),
                            "sweep found claimed file still in drop directory"
                        );
                        self.archive_and_release(&path);
                    }
                }
            }
            Err(err) => {
                warn!(
                    dir = %self.config.download_dir.display(),
                    error = %err,
                    "sweep failed to list drop directory"
                );
            }
        }

        let cleared = self.processed.len();
        self.processed.clear();
        debug!(cleared_claims = cleared, "sweep complete, claim set cleared");
    }

    fn archive_and_release(&mut self, path: &Path) {
        match archive_file(path, &self.config.backup_dir) {
            Ok(_) => self.drop_watch(path),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to archive; will retry on a later event or sweep"
                );
            }
        }
    }

    fn track(&mut self, path: &Path) {
        if self.watched.insert(path.to_path_buf()) {
            if let Err(err) = self.watcher.watch(path, RecursiveMode::NonRecursive) {
                warn!(path = %path.display(), error = %err, "failed to watch file");
            }
            info!(path = %path.display(), "tracking new file");
        }
    }

    fn drop_watch(&mut self, path: &Path) {
        if self.watched.remove(path) {
            if let Err(err) = self.watcher.unwatch(path) {
                // Renamed-away paths lose their subscription on their own.
                debug!(path = %path.display(), error = %err, "unwatch failed");
            }
        }
    }

    fn prune_vanished(&mut self, entries: &[PathBuf]) {
        let present: HashSet<&PathBuf> = entries.iter().collect();
        let vanished: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|path| !present.contains(*path))
            .cloned()
            .collect();
        for path in vanished {
            debug!(path = %path.display(), "file left the drop directory");
            self.drop_watch(&path);
        }
    }

    fn is_candidate(&self, path: &Path) -> bool {
        has_extension(path, &self.config.archive_extension)
    }
}

fn list_candidates(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extension) {
            candidates.push(path);
        }
    }
    Ok(candidates)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

fn resolve_dir(path: PathBuf) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(&path) {
        return canonical;
    }
    if path.is_absolute() {
        path
    } else {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cwd.join(path)
    }
}
