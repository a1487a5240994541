use std::fs;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::BuildError;

/// In-memory writer that can be switched into a failing state.
#[derive(Clone, Default)]
struct SwitchableWriter {
    bytes: Arc<Mutex<Vec<u8>>>,
    broken: Arc<AtomicBool>,
    failed_writes: Arc<AtomicUsize>,
}

impl SwitchableWriter {
    fn broken() -> Self {
        let writer = Self::default();
        writer.break_now();
        writer
    }

    fn break_now(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn contents(&self) -> String {
        String::from_utf8(self.bytes.lock().unwrap().clone()).unwrap()
    }

    fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }
}

impl AsyncWrite for SwitchableWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.broken.load(Ordering::SeqCst) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Poll::Ready(Err(io::Error::other("no space left on device")));
        }
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.broken.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::other("no space left on device")));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Console that records when each write arrived.
struct TimedConsole {
    started: Instant,
    writes: Vec<(Duration, Vec<u8>)>,
}

impl AsyncWrite for TimedConsole {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.writes.push((this.started.elapsed(), buf.to_vec()));
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Console whose first write cancels the run and then stalls, so the reader
/// can queue more output before the controller sees the cancellation.
struct StallingConsole {
    cancel: Option<CancellationToken>,
    stall: Duration,
    bytes: Vec<u8>,
}

impl AsyncWrite for StallingConsole {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Some(cancel) = this.cancel.take() {
            cancel.cancel();
            std::thread::sleep(this.stall);
        }
        this.bytes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sh(dir: &TempDir, script: &str) -> Invocation {
    Invocation::new("sh", ["-c", script], dir.path())
}

async fn capture(dir: &TempDir, script: &str) -> (CaptureReport, String, String) {
    let invocation = sh(dir, script);
    let log_path = dir.path().join("run.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "test-preset", &pattern);

    let mut console: Vec<u8> = Vec::new();
    let report = run_captured(&request, &mut console, &CancellationToken::new())
        .await
        .unwrap();

    let console = String::from_utf8(console).unwrap();
    let log = fs::read_to_string(&log_path).unwrap();
    (report, console, log)
}

/// Text between the header separator and the footer separator.
fn matched_section(log: &str) -> &str {
    let rule = separator();
    let start = log.find(&rule).unwrap() + rule.len();
    let end = log.rfind(&rule).unwrap();
    &log[start..end]
}

#[cfg(unix)]
#[tokio::test]
async fn test_warning_line_is_logged_and_all_lines_streamed() {
    let dir = TempDir::new().unwrap();
    let (report, console, log) = capture(
        &dir,
        "echo 'Compiling foo.c'; echo 'warning: unused variable x'; echo 'Compiling bar.c'",
    )
    .await;

    assert_eq!(report.outcome, Outcome::Exited(0));
    assert_eq!(report.lines_seen, 3);
    assert_eq!(report.lines_logged, 1);
    assert_eq!(
        console,
        "Compiling foo.c\nwarning: unused variable x\nCompiling bar.c\n"
    );
    assert_eq!(matched_section(&log), "\n\nwarning: unused variable x\n\n");
    assert!(log.ends_with("Exit code: 0\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_nonzero_exit_is_returned_not_raised() {
    let dir = TempDir::new().unwrap();
    let (report, _, log) = capture(&dir, "echo 'error: undefined reference to foo'; exit 2").await;

    assert_eq!(report.outcome, Outcome::Exited(2));
    assert!(log.contains("\nerror: undefined reference to foo\n"));
    assert!(log.ends_with("Exit code: 2\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_no_matches_leaves_header_and_footer_only() {
    let dir = TempDir::new().unwrap();
    let (report, _, log) = capture(&dir, "echo hello; echo world").await;

    assert_eq!(report.lines_logged, 0);
    assert_eq!(matched_section(&log), "\n\n\n");
    assert_eq!(log.matches(LOG_TITLE).count(), 1);
    assert_eq!(log.matches("Exit code:").count(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_stderr_is_merged_into_console_and_log() {
    let dir = TempDir::new().unwrap();
    let (report, console, log) = capture(
        &dir,
        "echo out1; echo 'fatal error: missing.h' >&2; echo out2",
    )
    .await;

    assert_eq!(report.lines_seen, 3);
    assert_eq!(console, "out1\nfatal error: missing.h\nout2\n");
    assert!(log.contains("\nfatal error: missing.h\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_header_records_context_and_command() {
    let dir = TempDir::new().unwrap();
    let (_, _, log) = capture(&dir, "true").await;

    let mut lines = log.lines();
    assert_eq!(lines.next(), Some(LOG_TITLE));
    assert!(lines.next().unwrap().starts_with("Timestamp: "));
    assert_eq!(lines.next(), Some("Preset: test-preset"));
    assert_eq!(lines.next(), Some("Command: sh -c true"));
    assert_eq!(lines.next(), Some(separator().as_str()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_partial_last_line_is_forwarded_verbatim() {
    let dir = TempDir::new().unwrap();
    let (report, console, log) = capture(&dir, "printf 'a\\nERROR: tail'").await;

    assert_eq!(report.lines_seen, 2);
    assert_eq!(console, "a\nERROR: tail");
    assert!(log.contains("\nERROR: tail\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_rerun_truncates_previous_log() {
    let dir = TempDir::new().unwrap();
    let (_, _, first) = capture(&dir, "echo 'warning: first run'; exit 1").await;
    assert!(first.contains("warning: first run"));

    let (_, _, second) = capture(&dir, "echo 'warning: second run'").await;
    assert!(!second.contains("first run"));
    assert!(second.contains("warning: second run"));
    assert_eq!(second.matches(LOG_TITLE).count(), 1);
    assert!(second.ends_with("Exit code: 0\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancellation_stops_child_and_writes_footer() {
    let dir = TempDir::new().unwrap();
    let invocation = sh(&dir, "echo 'warning: before'; sleep 30; echo after");
    let log_path = dir.path().join("cancel.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut console: Vec<u8> = Vec::new();
    let report = run_captured(&request, &mut console, &cancel).await.unwrap();

    assert_eq!(report.outcome, Outcome::Interrupted);
    assert_eq!(report.outcome.code(), 130);
    assert!(started.elapsed() < Duration::from_secs(15));

    let console = String::from_utf8(console).unwrap();
    assert!(!console.contains("after"));

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("warning: before"));
    assert!(log.ends_with("Exit code: 130\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unwritable_log_fails_before_child_starts() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("ran");
    let invocation = sh(&dir, &format!("touch '{}'", marker.display()));
    let log_path = dir.path().join("no-such-dir").join("x.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let err = run_captured(&request, &mut Vec::<u8>::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::LogFile { .. }));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_missing_binary_is_launch_error() {
    let dir = TempDir::new().unwrap();
    let invocation = Invocation::new("build-mingw-missing-tool", ["x"], dir.path());
    let log_path = dir.path().join("launch.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let err = run_captured(&request, &mut Vec::<u8>::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Launch { .. }));
}

#[tokio::test]
async fn test_invalid_working_dir_is_config_error() {
    let dir = TempDir::new().unwrap();
    let invocation = Invocation::new("sh", ["-c", "true"], dir.path().join("gone"));
    let log_path = dir.path().join("wd.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let err = run_captured(&request, &mut Vec::<u8>::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::InvalidWorkingDir(_)));
    assert!(!log_path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_carriage_return_output_is_not_held_back() {
    let dir = TempDir::new().unwrap();
    let invocation = sh(
        &dir,
        "printf '[1/2] warning: slow step\\r'; sleep 2; printf '[2/2] Linking\\n'",
    );
    let log_path = dir.path().join("progress.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let mut console = TimedConsole {
        started: Instant::now(),
        writes: Vec::new(),
    };
    let report = run_captured(&request, &mut console, &CancellationToken::new())
        .await
        .unwrap();

    let (first_at, first) = &console.writes[0];
    assert!(
        *first_at < Duration::from_millis(1500),
        "first output arrived after {first_at:?}"
    );
    assert_eq!(first.as_slice(), b"[1/2] warning: slow step\r");

    let all: Vec<u8> = console.writes.iter().flat_map(|(_, bytes)| bytes.clone()).collect();
    assert_eq!(all, b"[1/2] warning: slow step\r[2/2] Linking\n");

    assert_eq!(report.lines_seen, 2);
    assert_eq!(report.lines_logged, 1);
    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(matched_section(&log), "\n\n[1/2] warning: slow step\n\n");
}

#[tokio::test]
async fn test_failed_append_disables_further_appends() {
    let writer = SwitchableWriter::default();
    let mut record = LogRecord::from_writer(Path::new("memory.log"), writer.clone(), "p", "cmd")
        .await
        .unwrap();

    record.append_line("warning: kept").await;
    writer.break_now();
    record.append_line("warning: lost").await;
    record.append_line("error: skipped").await;

    assert!(!record.appends_enabled());
    assert_eq!(record.lines_written(), 1);
    assert_eq!(writer.failed_writes(), 1);
    assert!(writer.contents().ends_with("\n\nwarning: kept\n"));
    assert!(record.finish(1).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_broken_log_leaves_console_and_exit_code_intact() {
    let dir = TempDir::new().unwrap();
    let writer = SwitchableWriter::default();
    let record = LogRecord::from_writer(Path::new("memory.log"), writer.clone(), "p", "cmd")
        .await
        .unwrap();
    writer.break_now();

    let invocation = sh(&dir, "echo 'warning: one'; echo plain; echo 'error: two'; exit 3");
    let pattern = LinePattern::diagnostics();
    let mut console: Vec<u8> = Vec::new();
    let report = run_with_record(
        &invocation,
        record,
        &pattern,
        &mut console,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, Outcome::Exited(3));
    assert_eq!(report.lines_seen, 3);
    assert_eq!(report.lines_logged, 0);
    assert_eq!(
        String::from_utf8(console).unwrap(),
        "warning: one\nplain\nerror: two\n"
    );
    // One failed append, then only the footer attempt.
    assert_eq!(writer.failed_writes(), 2);
    assert!(writer.contents().starts_with(LOG_TITLE));
    assert!(!writer.contents().contains("warning: one"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_broken_console_keeps_draining_the_child() {
    let dir = TempDir::new().unwrap();
    let invocation = sh(&dir, "seq 1 30000; echo 'warning: tail'");
    let log_path = dir.path().join("drain.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let mut console = SwitchableWriter::broken();
    let report = run_captured(&request, &mut console, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Exited(0));
    assert_eq!(report.lines_seen, 30001);
    assert_eq!(report.lines_logged, 1);
    assert_eq!(console.failed_writes(), 1);
    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(matched_section(&log), "\n\nwarning: tail\n\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_output_queued_before_interrupt_is_kept() {
    let dir = TempDir::new().unwrap();
    let invocation = sh(&dir, "echo first; sleep 0.5; echo 'warning: queued'; sleep 30");
    let log_path = dir.path().join("queued.log");
    let pattern = LinePattern::diagnostics();
    let request = CaptureRequest::new(&invocation, &log_path, "p", &pattern);

    let cancel = CancellationToken::new();
    let mut console = StallingConsole {
        cancel: Some(cancel.clone()),
        stall: Duration::from_millis(1500),
        bytes: Vec::new(),
    };
    let report = run_captured(&request, &mut console, &cancel).await.unwrap();

    assert_eq!(report.outcome, Outcome::Interrupted);
    assert_eq!(
        String::from_utf8(console.bytes).unwrap(),
        "first\nwarning: queued\n"
    );
    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("\nwarning: queued\n"));
    assert!(log.ends_with("Exit code: 130\n"));
}

#[test]
fn test_failed_wait_still_gets_a_footer_code() {
    assert_eq!(footer_code(&Ok(Outcome::Exited(4))), 4);
    assert_eq!(footer_code(&Ok(Outcome::Interrupted)), 130);
    assert_eq!(
        footer_code(&Err(BuildError::Wait(io::Error::other("wait failed")))),
        UNKNOWN_EXIT_CODE
    );
    assert!(render_footer(UNKNOWN_EXIT_CODE).ends_with("Exit code: -1\n"));
}
