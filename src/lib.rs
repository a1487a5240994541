//! # build-mingw
//!
//! Cross-compiles Windows binaries with the llvm-mingw toolchain by running
//! CMake inside a Podman or Docker container.
//!
//! ## Overview
//!
//! Every step (`configure`, `build`, `package`, `shell`) runs
//! `bash -c <command>` in a throwaway container with the project mounted at
//! `/work`. While a step runs, its merged stdout/stderr is streamed to the
//! console unchanged and the lines that look like compiler diagnostics are
//! copied into a per-step log under `build-logs/`, so a long build leaves a
//! short file with only its warnings and errors.
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`commands`]: The steps and the session they share
//! - [`capture`]: Stream a child's output while filtering it into a log
//! - [`process`]: Launching, waiting on and cancelling child processes
//! - [`runtime`]: Podman/Docker detection
//! - [`container`]: `<runtime> run` argument assembly
//! - [`artifacts`]: Output directory cleaning and package discovery
//! - [`logging`]: Colored console status lines
//! - [`error`]: Error types and handling with thiserror + miette
//!
//! ## Library Usage
//!
//! ```no_run
//! use build_mingw::cli::{Cli, Step};
//! use build_mingw::commands;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> build_mingw::error::Result<()> {
//! let cli = Cli::builder()
//!     .preset("llvm-mingw-cross-debug")
//!     .jobs(8)
//!     .step(Step::Configure)
//!     .step(Step::Build)
//!     .build()?;
//!
//! commands::execute(&cli, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod capture;
pub mod cli;
pub mod commands;
pub mod container;
pub mod error;
pub mod logging;
pub mod process;
pub mod runtime;
