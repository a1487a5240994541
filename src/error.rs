//! Error types for build-mingw.
//!
//! This module defines all error types used throughout build-mingw, using
//! a combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`BuildError`]
//! - Configuration problems (unwritable log, bad working directory) are
//!   raised before any child process starts
//! - Launch failures are distinct from a child exiting non-zero; the latter
//!   is data, surfaced as [`BuildError::StepFailed`] only by the step runner
//! - [`BuildError::Interrupted`] is never folded into an ordinary failure so
//!   the binary can exit with status 130
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use build_mingw::error::{BuildError, Result};
//!
//! fn check_root(path: &Path) -> Result<()> {
//!     if !path.is_dir() {
//!         return Err(BuildError::InvalidWorkingDir(path.to_path_buf()));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Exit status reported when a run is cancelled by the user.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Error types that can occur in build-mingw operations
#[derive(Error, Debug, Diagnostic)]
pub enum BuildError {
    /// Neither container runtime could be found on `PATH`.
    ///
    /// Raised by runtime detection when no override is given and neither
    /// `podman` nor `docker` resolves, or when the requested override is
    /// missing.
    #[error("No container runtime found: {0}")]
    #[diagnostic(
        code(build_mingw::runtime::not_found),
        help("Install podman or docker and make sure it is on PATH.")
    )]
    RuntimeNotFound(
        /// Which runtimes were searched for
        String,
    ),

    /// The build log could not be created or written before the child started.
    #[error("Cannot open build log '{path}'")]
    #[diagnostic(
        code(build_mingw::log::open_error),
        help("Ensure the log directory exists and is writable, or pass --no-log.")
    )]
    LogFile {
        /// The log path that could not be opened
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The directory a child process should run in does not exist.
    #[error("Invalid working directory '{0}'")]
    #[diagnostic(
        code(build_mingw::config::working_dir),
        help("Pass --project-root pointing at the CMake project to build.")
    )]
    InvalidWorkingDir(
        /// The directory that was rejected
        PathBuf,
    ),

    /// The child process could not be started at all.
    ///
    /// Covers a missing executable or permission problems. No exit code
    /// exists for this case because the child never ran.
    #[error("Failed to launch '{command}'")]
    #[diagnostic(code(build_mingw::process::launch_error))]
    Launch {
        /// The command line that was attempted
        command: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a running child failed.
    #[error("Failed waiting for child process")]
    #[diagnostic(code(build_mingw::process::wait_error))]
    Wait(#[source] std::io::Error),

    /// A step's child process exited with a non-zero status.
    #[error("{step} failed with exit code {exit_code}")]
    #[diagnostic(code(build_mingw::step::failed))]
    StepFailed {
        /// Name of the step (configure, build, ...)
        step: String,
        /// Exit code reported by the child
        exit_code: i32,
        /// Log file holding the filtered warnings and errors, if logging
        #[help]
        log: Option<String>,
    },

    /// The user interrupted the run.
    #[error("Interrupted by user")]
    #[diagnostic(code(build_mingw::interrupted))]
    Interrupted,

    /// File system I/O error outside of the capture pipeline.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(build_mingw::io_error))]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Settings could not be resolved into a runnable configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(build_mingw::config::error),
        help("Check the required configuration parameters.")
    )]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl BuildError {
    /// Process exit status the CLI should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Interrupted => INTERRUPTED_EXIT_CODE,
            _ => 1,
        }
    }
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, BuildError>;
