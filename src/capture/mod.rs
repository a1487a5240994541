//! Output capture pipeline.
//!
//! Runs a child process with stdout and stderr merged into one pipe, streams
//! its output to the console as it arrives, and appends the lines matching a
//! [`LinePattern`] to a [`LogRecord`]. The sequence is strictly linear:
//!
//! 1. validate the working directory and create the log (header written)
//! 2. spawn the child
//! 3. forward and filter output until end of stream or cancellation
//! 4. wait for exit (or terminate on cancellation)
//! 5. write the footer and return the [`Outcome`]
//!
//! Reading happens on one dedicated thread that hands raw chunks to the
//! controller over a channel. The console gets each chunk untouched, without
//! waiting for a line terminator; lines are only reassembled for matching.
//! The controller gives way to cancellation between chunks.
//!
//! # Example
//!
//! ```no_run
//! use build_mingw::capture::{CaptureRequest, LinePattern, run_captured};
//! use build_mingw::process::Invocation;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> build_mingw::error::Result<()> {
//! let invocation = Invocation::new("make", ["-j8"], ".");
//! let pattern = LinePattern::diagnostics();
//! let request = CaptureRequest::new(&invocation, "build-logs/build.log".as_ref(), "default", &pattern);
//! let report = run_captured(&request, &mut tokio::io::stdout(), &CancellationToken::new()).await?;
//! println!("exit code {}", report.outcome.code());
//! # Ok(())
//! # }
//! ```

use std::io::Read;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::process::{Invocation, Outcome, terminate, wait_or_cancel};

mod lines;
mod pattern;
mod record;

use lines::LineSplitter;
pub use pattern::{DIAGNOSTIC_TOKENS, LinePattern};
pub use record::{
    LOG_TITLE, LogRecord, SEPARATOR_WIDTH, UNKNOWN_EXIT_CODE, render_footer, render_header,
    separator,
};

#[cfg(test)]
mod tests;

/// Everything the pipeline needs for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest<'a> {
    pub invocation: &'a Invocation,
    pub log_path: &'a Path,
    /// Label recorded as `Preset:` in the log header.
    pub context: &'a str,
    pub pattern: &'a LinePattern,
}

impl<'a> CaptureRequest<'a> {
    pub fn new(
        invocation: &'a Invocation,
        log_path: &'a Path,
        context: &'a str,
        pattern: &'a LinePattern,
    ) -> Self {
        Self {
            invocation,
            log_path,
            context,
            pattern,
        }
    }
}

/// Result of a captured run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureReport {
    pub outcome: Outcome,
    /// Lines forwarded to the console.
    pub lines_seen: usize,
    /// Lines appended to the log.
    pub lines_logged: usize,
}

type ChunkResult = std::io::Result<Vec<u8>>;

/// Largest single read from the merged pipe.
const READ_CHUNK: usize = 8 * 1024;

/// Run the request, streaming to `console` and filtering into the log.
///
/// A non-zero exit is reported through [`CaptureReport::outcome`], not as
/// an error. Cancellation yields [`Outcome::Interrupted`] after the child
/// has been stopped and the footer written.
pub async fn run_captured<W>(
    request: &CaptureRequest<'_>,
    console: &mut W,
    cancel: &CancellationToken,
) -> Result<CaptureReport>
where
    W: AsyncWrite + Unpin,
{
    let invocation = request.invocation;
    invocation.validate()?;

    let record =
        LogRecord::create(request.log_path, request.context, &invocation.display()).await?;
    run_with_record(invocation, record, request.pattern, console, cancel).await
}

/// Spawn and drive the child once its log has a header.
pub(crate) async fn run_with_record<W, F>(
    invocation: &Invocation,
    mut record: LogRecord<F>,
    pattern: &LinePattern,
    console: &mut W,
    cancel: &CancellationToken,
) -> Result<CaptureReport>
where
    W: AsyncWrite + Unpin,
    F: AsyncWrite + Unpin,
{
    let (reader, writer) = std::io::pipe().map_err(|e| invocation.launch_error(e))?;
    let writer_err = writer.try_clone().map_err(|e| invocation.launch_error(e))?;

    // The command owns our copies of the write end; dropping it right after
    // spawn leaves the child as the only writer so EOF arrives on exit.
    let spawned = {
        let mut command = invocation.command();
        command
            .stdin(Stdio::inherit())
            .stdout(writer)
            .stderr(writer_err);
        command.spawn()
    };
    let mut child = spawned.map_err(|e| invocation.launch_error(e))?;
    log::debug!(
        "spawned {} (pid {:?}), logging to {}",
        invocation.program,
        child.id(),
        record.path().display()
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<ChunkResult>();
    if let Err(e) = std::thread::Builder::new()
        .name("capture-reader".to_string())
        .spawn(move || read_chunks(reader, tx))
    {
        terminate(&mut child).await;
        return Err(invocation.launch_error(e));
    }

    let mut tee = Tee::new(ConsoleSink::new(console), &mut record, pattern);
    let mut interrupted = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            }
            next = rx.recv() => match next {
                Some(Ok(chunk)) => tee.chunk(&chunk).await,
                Some(Err(e)) => {
                    log::warn!("reading output of {} failed: {e}", invocation.program);
                    break;
                }
                None => break,
            }
        }
    }

    // Output already read before the interrupt still reaches console and log.
    if interrupted {
        while let Ok(Ok(chunk)) = rx.try_recv() {
            tee.chunk(&chunk).await;
        }
    }
    tee.finish().await;
    let lines_seen = tee.lines_seen;

    let waited = if interrupted {
        terminate(&mut child).await;
        Ok(Outcome::Interrupted)
    } else {
        wait_or_cancel(&mut child, cancel).await
    };

    let lines_logged = record.lines_written();
    let log_path = record.path().to_path_buf();
    if let Err(e) = record.finish(footer_code(&waited)).await {
        log::warn!(
            "could not write footer to {}: {e}",
            log_path.display()
        );
    }

    Ok(CaptureReport {
        outcome: waited?,
        lines_seen,
        lines_logged,
    })
}

/// Code recorded in the footer; a failed wait still closes the log.
fn footer_code(waited: &Result<Outcome>) -> i32 {
    match waited {
        Ok(outcome) => outcome.code(),
        Err(_) => UNKNOWN_EXIT_CODE,
    }
}

/// Convenience wrapper streaming to the process's stdout.
pub async fn run_captured_to_stdout(
    request: &CaptureRequest<'_>,
    cancel: &CancellationToken,
) -> Result<CaptureReport> {
    let mut stdout = tokio::io::stdout();
    run_captured(request, &mut stdout, cancel).await
}

/// Forward raw reads from the merged pipe, in order, as soon as they arrive.
fn read_chunks(mut reader: std::io::PipeReader, tx: mpsc::UnboundedSender<ChunkResult>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

/// Splits the stream: raw bytes to the console, matching lines to the log.
struct Tee<'a, 'w, W, F> {
    sink: ConsoleSink<'w, W>,
    record: &'a mut LogRecord<F>,
    pattern: &'a LinePattern,
    splitter: LineSplitter,
    lines_seen: usize,
}

impl<'a, 'w, W, F> Tee<'a, 'w, W, F>
where
    W: AsyncWrite + Unpin,
    F: AsyncWrite + Unpin,
{
    fn new(sink: ConsoleSink<'w, W>, record: &'a mut LogRecord<F>, pattern: &'a LinePattern) -> Self {
        Self {
            sink,
            record,
            pattern,
            splitter: LineSplitter::default(),
            lines_seen: 0,
        }
    }

    async fn chunk(&mut self, chunk: &[u8]) {
        self.sink.forward(chunk).await;
        for line in self.splitter.push(chunk) {
            self.line(&line).await;
        }
    }

    async fn finish(&mut self) {
        if let Some(line) = self.splitter.finish() {
            self.line(&line).await;
        }
    }

    async fn line(&mut self, line: &[u8]) {
        self.lines_seen += 1;
        let text = String::from_utf8_lossy(line);
        if self.pattern.is_match(&text) {
            self.record.append_line(&text).await;
        }
    }
}

/// Console side of the tee: raw bytes, flushed per chunk.
///
/// A broken console is reported once; output keeps being drained so the child
/// never blocks on a full pipe.
struct ConsoleSink<'w, W> {
    out: &'w mut W,
    healthy: bool,
}

impl<'w, W: AsyncWrite + Unpin> ConsoleSink<'w, W> {
    fn new(out: &'w mut W) -> Self {
        Self { out, healthy: true }
    }

    async fn forward(&mut self, chunk: &[u8]) {
        if !self.healthy {
            return;
        }

        let written = async {
            self.out.write_all(chunk).await?;
            self.out.flush().await
        }
        .await;

        if let Err(e) = written {
            log::warn!("console write failed, dropping further output: {e}");
            self.healthy = false;
        }
    }
}
