//! Loader invocation and outcome classification.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Result of one loader invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The loader exited with status zero.
    Success,
    /// The loader process could not be spawned at all.
    ProcessFailedToStart,
    /// The loader ran but exited nonzero or was killed by a signal.
    ProcessExitedNonZero,
    /// The spawn succeeded but waiting on the child failed.
    Unknown,
}

/// Hands a stabilized file to the external ingestion process.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, path: &Path) -> DispatchOutcome;
}

/// Invokes the configured loader executable with the archive path as its only
/// argument, optionally under another user identity via `sudo -u`.
///
/// The invocation is built as an argv array end to end; nothing is routed
/// through a shell. Output streams are captured for logging only and never
/// parsed.
#[derive(Debug, Clone)]
pub struct LoaderDispatcher {
    program: PathBuf,
    working_dir: Option<PathBuf>,
    run_as: Option<String>,
}

impl LoaderDispatcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
            run_as: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Runs the loader under another user identity.
    pub fn with_run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = match self.run_as.as_deref() {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.arg("-u").arg(user).arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        };
        cmd.arg(path);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Dispatcher for LoaderDispatcher {
    async fn dispatch(&self, path: &Path) -> DispatchOutcome {
        let mut command = self.command(path);
        debug!(
            path = %path.display(),
            program = %self.program.display(),
            "starting loader"
        );

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to start loader");
                return DispatchOutcome::ProcessFailedToStart;
            }
        };

        // The loader is awaited without a timeout; a hung loader stalls the
        // whole pipeline until the operator intervenes.
        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed waiting for loader");
                return DispatchOutcome::Unknown;
            }
        };

        if !output.stdout.is_empty() {
            debug!(
                path = %path.display(),
                stdout = %String::from_utf8_lossy(&output.stdout),
                "loader stdout"
            );
        }
        if !output.stderr.is_empty() {
            warn!(
                path = %path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "loader stderr"
            );
        }

        if output.status.success() {
            info!(path = %path.display(), "loader finished successfully");
            DispatchOutcome::Success
        } else {
            warn!(
                path = %path.display(),
                status = %output.status,
                "loader exited with failure"
            );
            DispatchOutcome::ProcessExitedNonZero
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchOutcome, Dispatcher, LoaderDispatcher};
    use std::ffi::OsStr;
    use std::path::Path;

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_success() {
        let dispatcher = LoaderDispatcher::new("true");
        let outcome = dispatcher.dispatch(Path::new("/drop/a.zip")).await;
        assert_eq!(outcome, DispatchOutcome::Success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let dispatcher = LoaderDispatcher::new("false");
        let outcome = dispatcher.dispatch(Path::new("/drop/a.zip")).await;
        assert_eq!(outcome, DispatchOutcome::ProcessExitedNonZero);
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let dispatcher = LoaderDispatcher::new("/definitely/not/a/loader");
        let outcome = dispatcher.dispatch(Path::new("/drop/a.zip")).await;
        assert_eq!(outcome, DispatchOutcome::ProcessFailedToStart);
    }

    #[test]
    fn run_as_builds_a_sudo_argv() {
        let dispatcher = LoaderDispatcher::new("/opt/loader/loader").with_run_as("ingest");
        let command = dispatcher.command(Path::new("/drop/a.zip"));
        let std_cmd = command.as_std();

        assert_eq!(std_cmd.get_program(), OsStr::new("sudo"));
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(
            args,
            [
                OsStr::new("-u"),
                OsStr::new("ingest"),
                OsStr::new("/opt/loader/loader"),
                OsStr::new("/drop/a.zip"),
            ]
        );
    }

    #[test]
    fn direct_invocation_passes_only_the_path() {
        let dispatcher = LoaderDispatcher::new("/opt/loader/loader");
        let command = dispatcher.command(Path::new("/drop/a.zip"));
        let std_cmd = command.as_std();

        assert_eq!(std_cmd.get_program(), OsStr::new("/opt/loader/loader"));
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, [OsStr::new("/drop/a.zip")]);
    }
}
