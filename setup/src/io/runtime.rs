//! Container runtime capability interface.
//!
//! [`ContainerRuntime`] is the only seam between interrogation logic and a
//! container engine. Every operation is single-shot and non-retrying; retry
//! policy belongs to callers. Implementations hold no per-call state, so one
//! instance may be shared by concurrent interrogations.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

use crate::core::types::ContainerDescriptor;
use crate::error::RuntimeError;
use crate::io::process::LineStream;

/// Command to run inside an already-running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub container_id: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// A created (not yet started) exec session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecHandle {
    pub id: String,
    pub request: ExecRequest,
}

/// A started exec session whose output has not been attached yet.
pub struct ExecSession {
    pub id: String,
    outputs: Option<Vec<Box<dyn Read + Send>>>,
    child: Option<Child>,
    preset_exit: Option<i64>,
}

impl ExecSession {
    /// Session backed by a spawned process with piped stdout/stderr.
    pub fn from_child(id: impl Into<String>, mut child: Child) -> Self {
        let mut outputs: Vec<Box<dyn Read + Send>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            outputs.push(Box::new(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            outputs.push(Box::new(stderr));
        }
        Self {
            id: id.into(),
            outputs: Some(outputs),
            child: Some(child),
            preset_exit: None,
        }
    }

    /// Session over already-captured output.
    pub fn from_output(id: impl Into<String>, output: Vec<u8>, exit_code: i64) -> Self {
        Self {
            id: id.into(),
            outputs: Some(vec![Box::new(Cursor::new(output))]),
            child: None,
            preset_exit: Some(exit_code),
        }
    }

    /// Take the combined output stream. Succeeds at most once.
    pub fn attach(&mut self) -> Option<LineStream> {
        self.outputs.take().map(LineStream::new)
    }

    /// Stop the session early (e.g. after an idle timeout).
    pub fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
        }
    }

    /// Reap the session and return its exit code, if known.
    pub fn finish(mut self) -> std::io::Result<Option<i64>> {
        match self.child.take() {
            Some(mut child) => Ok(child.wait()?.code().map(i64::from)),
            None => Ok(self.preset_exit),
        }
    }
}

impl std::fmt::Debug for ExecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecSession")
            .field("id", &self.id)
            .field("attached", &self.outputs.is_none())
            .finish()
    }
}

/// Host directory bind-mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

/// Parameters for creating a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub workdir: String,
    pub network: String,
    pub mounts: Vec<BindMount>,
    /// Allocate a TTY so stdout and stderr share one ordered log stream.
    pub tty: bool,
    /// Ask the runtime to delete the container once it exits.
    pub auto_remove: bool,
}

/// Which log streams to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStreams {
    pub stdout: bool,
    pub stderr: bool,
}

impl LogStreams {
    pub const BOTH: LogStreams = LogStreams {
        stdout: true,
        stderr: true,
    };
}

/// Terminal state reported by a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i64,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Abstraction over a container engine.
pub trait ContainerRuntime: Send + Sync {
    fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, RuntimeError>;

    fn exec_create(&self, request: &ExecRequest) -> Result<ExecHandle, RuntimeError>;

    fn exec_start(&self, handle: &ExecHandle) -> Result<ExecSession, RuntimeError>;

    /// Attach to the combined stdout/stderr of a started session.
    fn exec_attach(&self, session: &mut ExecSession) -> Result<LineStream, RuntimeError> {
        session
            .attach()
            .ok_or_else(|| RuntimeError::ExecAttachFailed {
                session: session.id.clone(),
                reason: "output already attached".to_string(),
            })
    }

    /// Create a container and return its id.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    fn start_container(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Block until the container is no longer running, or `timeout` elapses.
    fn wait_not_running(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> Result<ExitStatus, RuntimeError>;

    fn read_logs(&self, container_id: &str, streams: LogStreams) -> Result<Vec<u8>, RuntimeError>;

    fn kill_container(&self, container_id: &str) -> Result<(), RuntimeError>;

    fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError>;

    fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::process::LineEvent;

    #[test]
    fn captured_session_attaches_once() {
        let mut session = ExecSession::from_output("s1", b"banner\nmychannel\n".to_vec(), 0);
        let stream = session.attach().expect("first attach");
        assert!(session.attach().is_none());

        let mut lines = Vec::new();
        while let LineEvent::Line(line) = stream.next_line(Duration::from_secs(5)) {
            lines.push(line);
        }
        assert_eq!(lines, vec!["banner", "mychannel"]);
        assert_eq!(session.finish().expect("finish"), Some(0));
    }
}
