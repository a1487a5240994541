use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{BuildError, Result};

pub const LOG_TITLE: &str = "=== Build Log (Warnings and Errors Only) ===";

/// Width of the `=` rule framing the matched-line section.
pub const SEPARATOR_WIDTH: usize = 80;

pub fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}

/// Render the header block written before the child starts.
pub fn render_header(timestamp: DateTime<Local>, context: &str, command: &str) -> String {
    format!(
        "{LOG_TITLE}\nTimestamp: {}\nPreset: {context}\nCommand: {command}\n{}\n\n",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        separator()
    )
}

/// Render the footer block written once the invocation ends.
pub fn render_footer(exit_code: i32) -> String {
    format!("\n{}\nExit code: {exit_code}\n", separator())
}

/// Footer code used when the child's status could not be collected.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Write-only warnings/errors log for one invocation.
///
/// Created (truncated) with its header, appended to line by line, and closed
/// with a footer. A failed append disables further appends rather than
/// failing the invocation; the footer is still attempted.
#[derive(Debug)]
pub struct LogRecord<F = File> {
    path: PathBuf,
    file: F,
    appends_enabled: bool,
    lines_written: usize,
}

impl LogRecord<File> {
    /// Truncate `path` and write the header. Fails before any child starts.
    pub async fn create(path: &Path, context: &str, command: &str) -> Result<Self> {
        let file = File::create(path).await.map_err(|source| BuildError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_writer(path, file, context, command).await
    }
}

impl<F: AsyncWrite + Unpin> LogRecord<F> {
    /// Write the header to an already opened sink labelled `path`.
    pub(crate) async fn from_writer(
        path: &Path,
        mut file: F,
        context: &str,
        command: &str,
    ) -> Result<Self> {
        let log_error = |source| BuildError::LogFile {
            path: path.to_path_buf(),
            source,
        };

        let header = render_header(Local::now(), context, command);
        file.write_all(header.as_bytes()).await.map_err(log_error)?;
        file.flush().await.map_err(log_error)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            appends_enabled: true,
            lines_written: 0,
        })
    }

    /// Append one matched line and flush it to disk.
    pub async fn append_line(&mut self, line: &str) {
        if !self.appends_enabled {
            return;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let written = async {
            self.file.write_all(line.as_bytes()).await?;
            self.file.write_all(b"\n").await?;
            self.file.flush().await
        }
        .await;

        match written {
            Ok(()) => self.lines_written += 1,
            Err(e) => {
                log::warn!(
                    "writing to build log {} failed, continuing without it: {e}",
                    self.path.display()
                );
                self.appends_enabled = false;
            }
        }
    }

    /// Write the footer and close the file.
    pub async fn finish(mut self, exit_code: i32) -> Result<()> {
        let footer = render_footer(exit_code);
        let log_error = |source| BuildError::LogFile {
            path: self.path.clone(),
            source,
        };

        self.file
            .write_all(footer.as_bytes())
            .await
            .map_err(log_error)?;
        self.file.flush().await.map_err(log_error)?;
        self.file.shutdown().await.map_err(log_error)
    }

    /// Whether a write failure has switched appends off.
    pub fn appends_enabled(&self) -> bool {
        self.appends_enabled
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }
}
