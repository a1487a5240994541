//! Implementation of the build steps.
//!
//! `mod.rs` is a thin dispatcher; step logic lives in `cmake`, `clean` and
//! `shell`, all running against a shared [`Session`].

use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Step};
use crate::error::Result;
use crate::logging::Console;
use crate::runtime::ContainerRuntime;

pub(crate) mod clean;
pub(crate) mod cmake;
pub(crate) mod session;
pub(crate) mod shell;

pub use clean::clean;
pub use cmake::{build, build_script, configure, configure_script, package, package_script};
pub use session::{BuildSettings, LOG_STAMP_FORMAT, Session, SessionBuilder, announcement};
pub use shell::shell;


/// Execute the steps requested on the command line.
///
/// The container runtime is only resolved when at least one step needs it,
/// so `clean` works on hosts without podman or docker.
pub async fn execute(cli: &Cli, cancel: &CancellationToken) -> Result<()> {
    let opts = cli.global_opts();
    let steps = cli.steps();
    let console = Console::new(opts.verbose(), opts.quiet());

    let settings = BuildSettings::from_opts(opts)?;
    let runtime = if steps.iter().any(|step| step.needs_container()) {
        Some(ContainerRuntime::detect(opts.runtime())?)
    } else {
        None
    };

    let session = Session::builder()
        .settings(settings)
        .console(console)
        .runtime(runtime)
        .cancel(cancel.clone())
        .build()?;

    session.print_info();
    session.prepare_log_dir()?;

    run_steps(&session, &steps).await
}

/// Run steps in order, stopping at the first failure.
pub async fn run_steps(session: &Session, steps: &[Step]) -> Result<()> {
    for &step in steps {
        log::debug!("starting step {step}");
        match step {
            Step::Configure => configure(session).await?,
            Step::Build => build(session).await?,
            Step::Clean => {
                clean(session)?;
            }
            Step::Shell => shell(session).await?,
            Step::Package => package(session).await?,
        }
    }
    Ok(())
}
