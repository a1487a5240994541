//! Container runtime detection.
//!
//! Podman is preferred over Docker when both are installed. The two are
//! treated as interchangeable except for a handful of flags: Podman keeps the
//! caller's user namespace and, on SELinux hosts, needs bind mounts relabeled.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::error::{BuildError, Result};

const SELINUX_FS: &str = "/sys/fs/selinux";

/// A supported container engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuntimeKind {
    Podman,
    Docker,
}

impl RuntimeKind {
    /// Search order used for auto-detection.
    pub const PREFERENCE: [RuntimeKind; 2] = [RuntimeKind::Podman, RuntimeKind::Docker];

    pub fn binary_name(self) -> &'static str {
        match self {
            RuntimeKind::Podman => "podman",
            RuntimeKind::Docker => "docker",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A detected runtime and the executable that will be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRuntime {
    kind: RuntimeKind,
    program: PathBuf,
    selinux: bool,
}

impl ContainerRuntime {
    /// Build a runtime description without probing the system.
    pub fn new(kind: RuntimeKind, program: impl Into<PathBuf>, selinux: bool) -> Self {
        Self {
            kind,
            program: program.into(),
            selinux,
        }
    }

    /// Resolve the runtime from `PATH`, honoring an explicit choice.
    pub fn detect(preferred: Option<RuntimeKind>) -> Result<Self> {
        Self::detect_with(preferred, |name| which::which(name).ok(), selinux_enabled())
    }

    /// Detection with an injectable lookup, used by tests.
    pub fn detect_with<F>(preferred: Option<RuntimeKind>, lookup: F, selinux: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let candidates: &[RuntimeKind] = match preferred {
            Some(ref kind) => std::slice::from_ref(kind),
            None => &RuntimeKind::PREFERENCE,
        };

        for &kind in candidates {
            if let Some(path) = lookup(kind.binary_name()) {
                log::debug!("using {kind} at {}", path.display());
                return Ok(Self::new(kind, path, selinux));
            }
            log::debug!("{kind} not found in PATH");
        }

        let searched = candidates
            .iter()
            .map(|kind| kind.binary_name())
            .collect::<Vec<_>>()
            .join(" or ");
        Err(BuildError::RuntimeNotFound(format!(
            "{searched} not found in PATH"
        )))
    }

    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Program name as passed to the process launcher and shown in logs.
    pub fn program_name(&self) -> &'static str {
        self.kind.binary_name()
    }

    /// Runtime-specific flags placed right after `run`.
    pub fn run_flags(&self) -> Vec<String> {
        match self.kind {
            RuntimeKind::Podman => vec!["--userns=keep-id".to_string()],
            RuntimeKind::Docker => Vec::new(),
        }
    }

    /// Suffix appended to bind-mount specs (`:z` for Podman under SELinux).
    pub fn volume_suffix(&self) -> &'static str {
        match self.kind {
            RuntimeKind::Podman if self.selinux => ":z",
            _ => "",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// SELinux relabeling only matters on Linux hosts that expose selinuxfs.
fn selinux_enabled() -> bool {
    cfg!(target_os = "linux") && Path::new(SELINUX_FS).exists()
}
