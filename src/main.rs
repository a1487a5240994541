//! # build-mingw CLI
//!
//! Cross-compile Windows binaries using llvm-mingw in a container.
//!
//! ## Usage
//!
//! ```bash
//! build-mingw                                  # configure + build (release)
//! build-mingw -p llvm-mingw-cross-debug build  # debug preset
//! build-mingw clean configure build package    # full workflow
//! build-mingw shell                            # debugging shell
//! ```
//!
//! ## Environment Variables
//!
//! - `PRESET`: CMake preset (default: llvm-mingw-cross-release)
//! - `BUILD_TYPE`: Debug or Release
//! - `BUILD_MINGW_IMAGE`: Container image
//! - `BUILD_MINGW_RUNTIME`: Force podman or docker
//! - `BUILD_MINGW_NO_LOG`: Disable build-logs/ output
//! - `RUST_LOG`: Internal diagnostics (e.g. `RUST_LOG=debug`)
//!
//! ## Exit Status
//!
//! 0 on success, 1 when a step or the setup fails, 130 when interrupted.

use std::io::IsTerminal;
use std::process::ExitCode;

use build_mingw::cli::Cli;
use build_mingw::error::BuildError;
use build_mingw::logging::Console;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    miette::set_panic_hook();

    // Configure miette handler based on terminal capabilities
    let hooked = if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))
    } else {
        // Use a simpler handler for non-TTY environments (CI, logs, etc.)
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))
    };
    if let Err(e) = hooked {
        log::warn!("could not install report handler: {e}");
    }

    let cli = Cli::parse_args();
    let console = Console::new(cli.global_opts().verbose(), cli.global_opts().quiet());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::debug!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match build_mingw::commands::execute(&cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(BuildError::Interrupted) => {
            console.notice("Interrupted by user");
            exit_code(BuildError::Interrupted.exit_code())
        }
        // Already reported by the step runner.
        Err(err @ BuildError::StepFailed { .. }) => exit_code(err.exit_code()),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            exit_code(code)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
