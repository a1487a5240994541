//! Assembly of `<runtime> run` command lines.
//!
//! Every step runs `bash -c <script>` in a throwaway container with the
//! project bind-mounted at [`WORKDIR`]. The result is a plain
//! [`Invocation`]; nothing here spawns processes.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::process::Invocation;
use crate::runtime::ContainerRuntime;

/// Mount point of the project inside the container.
pub const WORKDIR: &str = "/work";

/// Whether to ask the runtime for a pseudo-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tty {
    /// `-it`: interactive with a terminal.
    Allocate,
    /// `-i`: keep stdin open only; used when stdin is not a terminal, where
    /// `-t` would make the runtime refuse to start.
    StdinOnly,
}

impl Tty {
    pub fn detect() -> Self {
        if std::io::stdin().is_terminal() {
            Tty::Allocate
        } else {
            Tty::StdinOnly
        }
    }

    fn flag(self) -> &'static str {
        match self {
            Tty::Allocate => "-it",
            Tty::StdinOnly => "-i",
        }
    }
}

/// Everything shared by the container invocations of one run.
#[derive(Debug, Clone)]
pub struct ContainerCommand {
    runtime: ContainerRuntime,
    image: String,
    project_root: PathBuf,
    env: Vec<(String, String)>,
}

impl ContainerCommand {
    pub fn new(
        runtime: ContainerRuntime,
        image: impl Into<String>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            image: image.into(),
            project_root: project_root.into(),
            env: Vec::new(),
        }
    }

    /// Export a variable into the container, in insertion order.
    pub fn env(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.env.push((key.into(), value.to_string()));
        self
    }

    pub fn runtime(&self) -> &ContainerRuntime {
        &self.runtime
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Full argument vector (excluding the program) for running `script`.
    pub fn args(&self, script: &str, tty: Tty) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string(), tty.flag().to_string()];
        args.extend(self.runtime.run_flags());

        args.push("-v".to_string());
        args.push(format!(
            "{}:{WORKDIR}{}",
            self.project_root.display(),
            self.runtime.volume_suffix()
        ));
        args.push("-w".to_string());
        args.push(WORKDIR.to_string());

        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        args.push(self.image.clone());
        args.push("bash".to_string());
        args.push("-c".to_string());
        args.push(script.to_string());
        args
    }

    /// Invocation of the runtime, launched from the project root.
    pub fn invocation(&self, script: &str, tty: Tty) -> Invocation {
        Invocation::new(
            self.runtime.program_name(),
            self.args(script, tty),
            &self.project_root,
        )
    }
}
