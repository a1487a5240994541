//! Resolved settings and the shared state every step runs against.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use crate::artifacts::{LOG_DIR, preset_output_dir};
use crate::capture::{CaptureRequest, LinePattern, run_captured_to_stdout};
use crate::cli::{BuildType, GlobalOpts, Step};
use crate::container::{ContainerCommand, Tty};
use crate::error::{BuildError, Result};
use crate::logging::Console;
use crate::process::{Invocation, run_inherited};
use crate::runtime::ContainerRuntime;

/// Timestamp format embedded in log file names.
pub const LOG_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Options resolved once per run: job count and project root are fixed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub preset: String,
    pub build_type: BuildType,
    pub jobs: usize,
    pub image: String,
    pub project_root: PathBuf,
    pub logging: bool,
}

impl BuildSettings {
    pub fn from_opts(opts: &GlobalOpts) -> Result<Self> {
        let project_root = opts.get_project_root();
        if !project_root.is_dir() {
            return Err(BuildError::InvalidWorkingDir(project_root));
        }

        Ok(Self {
            preset: opts.preset().to_string(),
            build_type: opts.build_type(),
            jobs: opts.effective_jobs(),
            image: opts.image().to_string(),
            project_root,
            logging: opts.logging_enabled(),
        })
    }

    /// `<root>/out/<preset>`
    pub fn output_dir(&self) -> PathBuf {
        preset_output_dir(&self.project_root, &self.preset)
    }

    /// `<root>/build-logs`
    pub fn log_dir(&self) -> PathBuf {
        self.project_root.join(LOG_DIR)
    }

    /// `<log dir>/<step>-<preset>-<stamp>.log`, or `None` with logging off.
    pub fn log_path(&self, step: Step, at: DateTime<Local>) -> Option<PathBuf> {
        self.logging.then(|| {
            self.log_dir().join(format!(
                "{step}-{}-{}.log",
                self.preset,
                at.format(LOG_STAMP_FORMAT)
            ))
        })
    }

    /// Container wrapper exporting `PRESET`, `BUILD_TYPE` and `JOBS`.
    pub fn container(&self, runtime: ContainerRuntime) -> ContainerCommand {
        ContainerCommand::new(runtime, &self.image, &self.project_root)
            .env("PRESET", &self.preset)
            .env("BUILD_TYPE", self.build_type)
            .env("JOBS", self.jobs)
    }
}

/// Everything a step needs: settings, console, container and cancellation.
#[derive(Debug)]
pub struct Session {
    settings: BuildSettings,
    console: Console,
    container: Option<ContainerCommand>,
    tty: Tty,
    pattern: LinePattern,
    cancel: CancellationToken,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn container(&self) -> Option<&ContainerCommand> {
        self.container.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Print the configuration banner shown before any step runs.
    pub fn print_info(&self) {
        let settings = &self.settings;
        let console = &self.console;

        if let Some(container) = &self.container {
            console.info(format!("Container runtime: {}", container.runtime()));
        }
        console.info(format!("Container image: {}", settings.image));
        console.info(format!("CMake preset: {}", settings.preset));
        console.info(format!("Build type: {}", settings.build_type));
        console.info(format!("Parallel jobs: {}", settings.jobs));
        if settings.logging {
            console.info(format!("Build logs: {}/", settings.log_dir().display()));
        } else {
            console.info("Build logging: disabled");
        }
        console.verbose(1, format!("Project root: {}", settings.project_root.display()));
        console.plain("");
    }

    /// Create the log directory when logging is enabled.
    pub fn prepare_log_dir(&self) -> Result<()> {
        if !self.settings.logging {
            return Ok(());
        }

        let dir = self.settings.log_dir();
        std::fs::create_dir_all(&dir).map_err(|source| BuildError::IoError { path: dir, source })
    }

    /// Invocation running `script` through the container runtime.
    pub fn container_invocation(&self, script: &str) -> Result<Invocation> {
        let container = self.container.as_ref().ok_or_else(|| BuildError::ConfigError {
            message: "no container runtime configured for this run".to_string(),
        })?;
        Ok(container.invocation(script, self.tty))
    }

    /// Run one step's invocation, capturing diagnostics into a fresh log.
    ///
    /// Returns the log path on success. A non-zero exit is reported on the
    /// console and returned as [`BuildError::StepFailed`]; cancellation comes
    /// back as [`BuildError::Interrupted`].
    pub async fn run_step(&self, step: Step, invocation: &Invocation) -> Result<Option<PathBuf>> {
        let log_path = self.settings.log_path(step, Local::now());
        for line in announcement(invocation, log_path.as_deref()) {
            self.console.info(line);
        }

        let outcome = match &log_path {
            Some(path) => {
                let request =
                    CaptureRequest::new(invocation, path, &self.settings.preset, &self.pattern);
                let report = run_captured_to_stdout(&request, &self.cancel).await?;
                log::debug!(
                    "{step}: {} lines, {} logged",
                    report.lines_seen,
                    report.lines_logged
                );
                report.outcome
            }
            None => run_inherited(invocation, &self.cancel).await?,
        };

        let exit_code = outcome.into_result()?;
        if exit_code != 0 {
            self.report_failure(step, log_path.as_deref());
            return Err(BuildError::StepFailed {
                step: step.name().to_string(),
                exit_code,
                log: log_path.map(|path| format!("Check log: {}", path.display())),
            });
        }

        Ok(log_path)
    }

    /// Run an invocation attached to the terminal, without a log.
    pub async fn run_interactive(&self, invocation: &Invocation) -> Result<i32> {
        for line in announcement(invocation, None) {
            self.console.info(line);
        }
        run_inherited(invocation, &self.cancel).await?.into_result()
    }

    fn report_failure(&self, step: Step, log_path: Option<&Path>) {
        self.console.error(format!("{} failed", step.title()));
        if let Some(path) = log_path {
            self.console.error(format!("Check log: {}", path.display()));
        }
    }
}

/// Status lines printed before a step's child starts.
pub fn announcement(invocation: &Invocation, log_path: Option<&Path>) -> Vec<String> {
    let mut lines = vec![format!("Running: {}", invocation.display())];
    if let Some(path) = log_path {
        lines.push(format!("Logging warnings/errors to: {}", path.display()));
    }
    lines
}

/// Builder for [`Session`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    settings: Option<BuildSettings>,
    console: Option<Console>,
    runtime: Option<ContainerRuntime>,
    tty: Option<Tty>,
    pattern: Option<LinePattern>,
    cancel: Option<CancellationToken>,
}

impl SessionBuilder {
    pub fn settings(mut self, settings: BuildSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    pub fn runtime(mut self, runtime: Option<ContainerRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn tty(mut self, tty: Tty) -> Self {
        self.tty = Some(tty);
        self
    }

    pub fn pattern(mut self, pattern: LinePattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<Session> {
        let settings = self.settings.ok_or_else(|| BuildError::ConfigError {
            message: "build settings are required".to_string(),
        })?;
        let container = self.runtime.map(|runtime| settings.container(runtime));

        Ok(Session {
            console: self.console.unwrap_or_else(|| Console::new(0, false)),
            container,
            tty: self.tty.unwrap_or_else(Tty::detect),
            pattern: self.pattern.unwrap_or_default(),
            cancel: self.cancel.unwrap_or_default(),
            settings,
        })
    }
}
