//! Helpers for running child processes with timeouts and bounded output.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

/// One step of a [`LineStream`].
#[derive(Debug)]
pub enum LineEvent {
    Line(String),
    /// Every source reached end-of-stream.
    End,
    /// No line arrived within the idle timeout.
    Idle,
    Failed(std::io::Error),
}

/// Lines merged from several readers, in the order each reader yields them.
///
/// One thread per reader forwards complete lines (lossily decoded, line
/// terminator stripped) over a channel; the stream ends once every reader
/// hits end-of-stream.
pub struct LineStream {
    rx: Receiver<std::io::Result<String>>,
}

impl LineStream {
    pub fn new(readers: Vec<Box<dyn Read + Send>>) -> Self {
        let (tx, rx) = mpsc::channel();
        for reader in readers {
            let tx = tx.clone();
            thread::spawn(move || forward_lines(reader, tx));
        }
        Self { rx }
    }

    /// Block until the next line, end-of-stream, or `idle` elapses.
    pub fn next_line(&self, idle: Duration) -> LineEvent {
        match self.rx.recv_timeout(idle) {
            Ok(Ok(line)) => LineEvent::Line(line),
            Ok(Err(err)) => LineEvent::Failed(err),
            Err(RecvTimeoutError::Timeout) => LineEvent::Idle,
            Err(RecvTimeoutError::Disconnected) => LineEvent::End,
        }
    }
}

fn forward_lines(reader: Box<dyn Read + Send>, tx: Sender<std::io::Result<String>>) {
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(Ok(text)).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(err));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn reader(text: &'static str) -> Box<dyn Read + Send> {
        Box::new(Cursor::new(text.as_bytes()))
    }

    #[test]
    fn line_stream_yields_lines_then_end() {
        let stream = LineStream::new(vec![reader("banner\r\nmychannel\nlast")]);
        let mut lines = Vec::new();
        loop {
            match stream.next_line(Duration::from_secs(5)) {
                LineEvent::Line(line) => lines.push(line),
                LineEvent::End => break,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(lines, vec!["banner", "mychannel", "last"]);
    }

    #[test]
    fn line_stream_merges_sources() {
        let stream = LineStream::new(vec![reader("a\n"), reader("b\n")]);
        let mut lines = Vec::new();
        while let LineEvent::Line(line) = stream.next_line(Duration::from_secs(5)) {
            lines.push(line);
        }
        lines.sort();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf hello; printf oops >&2");
        let out = run_command_with_timeout(cmd, Duration::from_secs(10), 1024).expect("run");
        assert!(out.status.success());
        assert_eq!(out.stdout_text(), "hello");
        assert_eq!(out.stderr_text(), "oops");
        assert!(!out.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_kills_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exec sleep 5");
        let out = run_command_with_timeout(cmd, Duration::from_millis(100), 1024).expect("run");
        assert!(out.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_truncates_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf 0123456789");
        let out = run_command_with_timeout(cmd, Duration::from_secs(10), 4).expect("run");
        assert_eq!(out.stdout, b"0123");
        assert_eq!(out.stdout_truncated, 6);
    }
}
