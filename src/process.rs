//! Child process control shared by the capture pipeline and passthrough runs.
//!
//! Both waits a controller performs (next line, child exit) must give way to
//! cancellation. Once cancelled, the child is asked to stop, given a grace
//! period, then killed, and the caller always sees [`Outcome::Interrupted`].

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::{BuildError, INTERRUPTED_EXIT_CODE, Result};

/// How long a child gets to exit after a termination request.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for a child after it has been force-killed.
pub const KILL_WAIT: Duration = Duration::from_secs(5);

/// An external program plus arguments and the directory to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: std::path::PathBuf,
}

impl Invocation {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        working_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
        }
    }

    /// Full command line joined by single spaces, as recorded in logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Reject a working directory that does not exist before anything runs.
    pub fn validate(&self) -> Result<()> {
        if !self.working_dir.is_dir() {
            return Err(BuildError::InvalidWorkingDir(self.working_dir.clone()));
        }
        Ok(())
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(&self.working_dir);
        command
    }

    pub(crate) fn launch_error(&self, source: std::io::Error) -> BuildError {
        BuildError::Launch {
            command: self.display(),
            source,
        }
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The child exited on its own with this code.
    Exited(i32),
    /// Cancellation arrived before the child reported a status.
    Interrupted,
}

impl Outcome {
    /// The integer recorded in logs and returned to callers.
    pub fn code(self) -> i32 {
        match self {
            Outcome::Exited(code) => code,
            Outcome::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }

    pub fn success(self) -> bool {
        self == Outcome::Exited(0)
    }

    /// Convert into the code, re-raising cancellation as an error.
    pub fn into_result(self) -> Result<i32> {
        match self {
            Outcome::Exited(code) => Ok(code),
            Outcome::Interrupted => Err(BuildError::Interrupted),
        }
    }
}

/// Map an exit status to a plain integer.
///
/// A child killed by a signal has no code; report it shell-style as
/// `128 + signal` on Unix and `-1` elsewhere.
pub fn status_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

/// Run an invocation with inherited stdio, waiting for exit or cancellation.
pub async fn run_inherited(invocation: &Invocation, cancel: &CancellationToken) -> Result<Outcome> {
    invocation.validate()?;

    let mut child = invocation
        .command()
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| invocation.launch_error(source))?;

    wait_or_cancel(&mut child, cancel).await
}

/// Wait for the child to exit, terminating it if `cancel` fires first.
pub async fn wait_or_cancel(child: &mut Child, cancel: &CancellationToken) -> Result<Outcome> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            terminate(child).await;
            Ok(Outcome::Interrupted)
        }
        status = child.wait() => {
            let status = status.map_err(BuildError::Wait)?;
            Ok(Outcome::Exited(status_code(status)))
        }
    }
}

/// Ask the child to stop, then kill it if it does not exit in time.
///
/// Best effort: failures are logged, never raised, because the caller is
/// already unwinding from a cancellation.
pub async fn terminate(child: &mut Child) {
    if let Ok(Some(status)) = child.try_wait() {
        log::debug!("child already exited with {status}");
        return;
    }

    request_stop(child);

    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            log::debug!("child stopped after termination request: {status}");
            return;
        }
        Ok(Err(e)) => log::warn!("failed waiting for child after termination request: {e}"),
        Err(_) => log::debug!(
            "child still running after {}s, killing",
            TERMINATE_GRACE.as_secs()
        ),
    }

    if let Err(e) = child.start_kill() {
        log::warn!("failed to kill child process: {e}");
    }

    if tokio::time::timeout(KILL_WAIT, child.wait()).await.is_err() {
        log::warn!(
            "child did not exit within {}s of being killed",
            KILL_WAIT.as_secs()
        );
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(id) = child.id() else {
        return;
    };
    let Ok(raw) = i32::try_from(id) else {
        return;
    };

    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        log::debug!("SIGTERM to pid {raw} failed: {e}");
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::debug!("termination request failed: {e}");
    }
}
