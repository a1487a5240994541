//! Configure, build and package steps.

use crate::artifacts::find_packages;
use crate::cli::Step;
use crate::commands::session::Session;
use crate::error::Result;

pub fn configure_script(preset: &str) -> String {
    format!("cmake --preset {preset}")
}

pub fn build_script(preset: &str, jobs: usize) -> String {
    format!("cmake --build --preset {preset} -j{jobs}")
}

pub fn package_script(preset: &str) -> String {
    format!("cmake --build out/{preset} --target package")
}

/// Configure the project with the selected preset.
pub async fn configure(session: &Session) -> Result<()> {
    let settings = session.settings();
    let console = session.console();

    console.info(format!("Configuring with preset: {}", settings.preset));
    let invocation = session.container_invocation(&configure_script(&settings.preset))?;
    session.run_step(Step::Configure, &invocation).await?;

    console.success("Configuration complete");
    Ok(())
}

/// Build the configured preset.
pub async fn build(session: &Session) -> Result<()> {
    let settings = session.settings();
    let console = session.console();

    console.info(format!(
        "Building with preset: {} ({} parallel jobs)",
        settings.preset, settings.jobs
    ));
    let invocation =
        session.container_invocation(&build_script(&settings.preset, settings.jobs))?;
    let log_path = session.run_step(Step::Build, &invocation).await?;

    console.success("Build complete");
    console.info(format!("Output: {}/", settings.output_dir().display()));
    if let Some(path) = log_path {
        console.info(format!("Build log: {}", path.display()));
    }
    Ok(())
}

/// Build the `package` target and list the archives it produced.
pub async fn package(session: &Session) -> Result<()> {
    let settings = session.settings();
    let console = session.console();

    console.info(format!(
        "Creating portable package with preset: {}",
        settings.preset
    ));
    let invocation = session.container_invocation(&package_script(&settings.preset))?;
    session.run_step(Step::Package, &invocation).await?;

    console.success(format!("Package created in: out/{}/", settings.preset));
    console.info("Generated packages:");
    for package in find_packages(&settings.output_dir())? {
        console.plain(format!("  - {}", package.display()));
    }
    Ok(())
}
