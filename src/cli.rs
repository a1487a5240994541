//! Command-line interface definitions for build-mingw.
//!
//! This module defines the CLI structure using clap. The main entry point is
//! the [`Cli`] struct: global options that shape every container invocation,
//! followed by the list of [`Step`]s to run in order.
//!
//! # Example
//!
//! ```no_run
//! use build_mingw::cli::{Cli, Step};
//!
//! let cli = Cli::parse_args();
//!
//! for step in cli.steps() {
//!     match step {
//!         Step::Build => println!("will build preset {}", cli.global_opts().preset()),
//!         _ => {}
//!     }
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use crate::error::{BuildError, Result};
use crate::runtime::RuntimeKind;


pub const DEFAULT_PRESET: &str = "llvm-mingw-cross-release";
pub const DEFAULT_IMAGE: &str = "docker.io/mstorsjo/llvm-mingw:latest";

/// Job count used when the CPU count cannot be determined.
pub const FALLBACK_JOBS: usize = 4;

/// Steps run when none are given on the command line.
pub const DEFAULT_STEPS: [Step; 2] = [Step::Configure, Step::Build];

/// Main command-line interface for build-mingw.
#[derive(Parser, Debug)]
#[command(
    name = "build-mingw",
    bin_name = "build-mingw",
    author,
    version,
    about = "Cross-compile Windows binaries using llvm-mingw in a container",
    long_about = "Cross-compile Windows binaries using llvm-mingw in a container.

Works with both Podman and Docker (auto-detected, Podman preferred).
Warnings and errors from each CMake step are copied into build-logs/.",
    after_help = "EXAMPLES:
    build-mingw                                  # configure + build (release)
    build-mingw -p llvm-mingw-cross-debug        # debug preset
    build-mingw -j 8 build                       # build with 8 jobs
    build-mingw shell                            # debugging shell in the container
    build-mingw clean configure build package    # full workflow"
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    /// Steps to run, in order (default: configure build)
    #[arg(value_enum)]
    steps: Vec<Step>,
}

/// Options that apply to every step.
#[derive(Parser, Debug)]
pub struct GlobalOpts {
    /// CMake preset to use
    #[arg(short, long, default_value = DEFAULT_PRESET, env = "PRESET")]
    preset: String,

    /// Number of parallel jobs (default: auto-detected)
    #[arg(short, long, env = "BUILD_MINGW_JOBS")]
    jobs: Option<usize>,

    /// Container image to use
    #[arg(short, long, default_value = DEFAULT_IMAGE, env = "BUILD_MINGW_IMAGE")]
    image: String,

    /// Build type passed into the container
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        default_value_t = BuildType::Release,
        env = "BUILD_TYPE"
    )]
    build_type: BuildType,

    /// Disable logging to file (only output to console)
    #[arg(long, env = "BUILD_MINGW_NO_LOG")]
    no_log: bool,

    /// Root of the CMake project mounted at /work (default: current directory)
    #[arg(long, env = "BUILD_MINGW_PROJECT_ROOT")]
    project_root: Option<PathBuf>,

    /// Force a container runtime instead of auto-detecting
    #[arg(long, value_enum, env = "BUILD_MINGW_RUNTIME")]
    runtime: Option<RuntimeKind>,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, env = "BUILD_MINGW_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors and child output
    #[arg(short, long, conflicts_with = "verbose", env = "BUILD_MINGW_QUIET")]
    quiet: bool,
}

/// CMake build type exported as `BUILD_TYPE` inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildType {
    #[value(name = "Debug")]
    Debug,
    #[value(name = "Release")]
    Release,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
        })
    }
}

/// A unit of work requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Step {
    /// Configure the project with `cmake --preset`
    Configure,
    /// Build the configured preset
    Build,
    /// Remove out/<preset>
    Clean,
    /// Open an interactive shell in the container
    Shell,
    /// Build the `package` target and list the archives
    Package,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::Configure => "configure",
            Step::Build => "build",
            Step::Clean => "clean",
            Step::Shell => "shell",
            Step::Package => "package",
        }
    }

    /// Label used in "<label> failed" messages.
    pub fn title(self) -> &'static str {
        match self {
            Step::Configure => "Configuration",
            Step::Build => "Build",
            Step::Clean => "Clean",
            Step::Shell => "Shell",
            Step::Package => "Packaging",
        }
    }

    /// Whether the step runs inside the build container.
    pub fn needs_container(self) -> bool {
        !matches!(self, Step::Clean)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl GlobalOpts {
    /// Create a new builder for constructing `GlobalOpts` programmatically.
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    pub fn jobs(&self) -> Option<usize> {
        self.jobs
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    pub fn logging_enabled(&self) -> bool {
        !self.no_log
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn runtime(&self) -> Option<RuntimeKind> {
        self.runtime
    }

    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Jobs requested, or the logical CPU count.
    pub fn effective_jobs(&self) -> usize {
        match self.jobs {
            Some(jobs) if jobs > 0 => jobs,
            _ => match num_cpus::get() {
                0 => FALLBACK_JOBS,
                n => n,
            },
        }
    }

    /// Absolute project root, defaulting to the current directory.
    pub fn get_project_root(&self) -> PathBuf {
        normalize_path(self.project_root().unwrap_or_else(|| Path::new(".")))
    }
}

/// Builder for constructing `GlobalOpts` programmatically.
#[derive(Debug)]
pub struct GlobalOptsBuilder {
    preset: String,
    jobs: Option<usize>,
    image: String,
    build_type: BuildType,
    no_log: bool,
    project_root: Option<PathBuf>,
    runtime: Option<RuntimeKind>,
    verbose: u8,
    quiet: bool,
}

impl Default for GlobalOptsBuilder {
    fn default() -> Self {
        Self {
            preset: DEFAULT_PRESET.to_string(),
            jobs: None,
            image: DEFAULT_IMAGE.to_string(),
            build_type: BuildType::Release,
            no_log: false,
            project_root: None,
            runtime: None,
            verbose: 0,
            quiet: false,
        }
    }
}

impl GlobalOptsBuilder {
    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    pub fn no_log(mut self, no_log: bool) -> Self {
        self.no_log = no_log;
        self
    }

    pub fn project_root(mut self, root: Option<impl Into<PathBuf>>) -> Self {
        self.project_root = root.map(Into::into);
        self
    }

    pub fn runtime(mut self, runtime: Option<RuntimeKind>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            preset: self.preset,
            jobs: self.jobs,
            image: self.image,
            build_type: self.build_type,
            no_log: self.no_log,
            project_root: self.project_root,
            runtime: self.runtime,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the global options
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    /// Steps to run, falling back to configure + build.
    pub fn steps(&self) -> Vec<Step> {
        if self.steps.is_empty() {
            DEFAULT_STEPS.to_vec()
        } else {
            self.steps.clone()
        }
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    opts: GlobalOptsBuilder,
    steps: Vec<Step>,
}

impl CliBuilder {
    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.opts = self.opts.preset(preset);
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.opts = self.opts.jobs(Some(jobs));
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.opts = self.opts.image(image);
        self
    }

    pub fn build_type(mut self, build_type: BuildType) -> Self {
        self.opts = self.opts.build_type(build_type);
        self
    }

    pub fn no_log(mut self, no_log: bool) -> Self {
        self.opts = self.opts.no_log(no_log);
        self
    }

    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.opts = self.opts.project_root(Some(root));
        self
    }

    pub fn runtime(mut self, runtime: RuntimeKind) -> Self {
        self.opts = self.opts.runtime(Some(runtime));
        self
    }

    pub fn verbose(mut self, level: u8) -> Self {
        self.opts = self.opts.verbose(level);
        self
    }

    pub fn quiet(mut self, enabled: bool) -> Self {
        self.opts = self.opts.quiet(enabled);
        self
    }

    /// Append a step to run
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Result<Cli> {
        let opts = self.opts.build();
        if opts.preset().trim().is_empty() {
            return Err(BuildError::ConfigError {
                message: "preset must not be empty".to_string(),
            });
        }

        Ok(Cli {
            global_opts: opts,
            steps: self.steps,
        })
    }
}

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// This function:
/// - Converts relative paths to absolute using the current directory
/// - Removes `.` and `..` components where possible
/// - Does NOT resolve symlinks (preserves user intent)
/// - Does NOT require the path to exist
pub(crate) fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let absolute = if path.is_relative() {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && !matches!(last, Component::ParentDir)
                {
                    components.pop();
                    continue;
                }
                components.push(component);
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    let mut result = PathBuf::new();
    for component in components {
        result.push(component);
    }

    result
}
