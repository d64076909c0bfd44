//! Typed failures for runtime interrogation and peer discovery.
//!
//! [`RuntimeError`] is what the adapter reports, one variant per operation.
//! [`ProbeError`] is what the locator, channel parser and discovery runner
//! report to their callers; it keeps the underlying runtime error (and raw
//! bytes where the runtime produced any) so the caller can decide whether to
//! retry.

use thiserror::Error;

/// Failure of a single container-runtime operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("failed to list containers: {reason}")]
    ListFailed { reason: String },

    #[error("exec create failed in container {container_id}: {reason}")]
    ExecCreateFailed { container_id: String, reason: String },

    #[error("exec start failed in container {container_id}: {reason}")]
    ExecStartFailed { container_id: String, reason: String },

    #[error("exec attach failed for session {session}: {reason}")]
    ExecAttachFailed { session: String, reason: String },

    #[error("failed to create container from {image}: {reason}")]
    ContainerCreateFailed { image: String, reason: String },

    #[error("failed to start container {container_id}: {reason}")]
    ContainerStartFailed { container_id: String, reason: String },

    #[error("wait failed for container {container_id}: {reason}")]
    WaitFailed { container_id: String, reason: String },

    #[error("timed out after {timeout_secs}s waiting for container {container_id}")]
    WaitTimedOut {
        container_id: String,
        timeout_secs: u64,
    },

    #[error("failed to read logs of container {container_id}: {reason}")]
    LogReadFailed { container_id: String, reason: String },

    #[error("failed to remove container {container_id}: {reason}")]
    ContainerRemoveFailed { container_id: String, reason: String },

    #[error("failed to pull image {image}: {reason}")]
    ImagePullFailed { image: String, reason: String },
}

impl RuntimeError {
    /// True when the runtime itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RuntimeError::Unavailable(_))
    }
}

/// Failure of an interrogation step (locate, list channels, discover).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    RuntimeUnavailable(RuntimeError),

    #[error("container list unusable: {0}")]
    ListFailed(#[source] RuntimeError),

    #[error("no running container named {peer}")]
    PeerNotFound { peer: String },

    #[error("exec session failed: {reason}")]
    ExecSessionFailed {
        reason: String,
        #[source]
        source: Option<RuntimeError>,
        /// Lines read before the session failed.
        captured: Vec<String>,
    },

    #[error("failed to launch discovery helper: {0}")]
    DiscoveryLaunchFailed(#[source] RuntimeError),

    #[error("discovery helper did not finish: {0}")]
    DiscoveryWaitFailed(#[source] RuntimeError),

    #[error("discovery helper logs unavailable: {0}")]
    LogsUnavailable(#[source] RuntimeError),

    #[error("discovery report malformed: {reason}")]
    DiscoveryReportMalformed { reason: String, raw: Vec<u8> },

    #[error("no selection made for: {prompt}")]
    NoSelectionMade { prompt: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProbeError {
    /// Raw runtime output preserved for the operator, if any.
    pub fn raw_output(&self) -> Option<&[u8]> {
        match self {
            ProbeError::DiscoveryReportMalformed { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// First `limit` bytes of [`raw_output`](Self::raw_output) as lossy text,
    /// with a note of how much was cut.
    pub fn raw_excerpt(&self, limit: usize) -> Option<String> {
        let raw = self.raw_output()?;
        let shown = &raw[..raw.len().min(limit)];
        let mut text = String::from_utf8_lossy(shown).trim_end().to_string();
        if raw.len() > limit {
            text.push_str(&format!("\n[{} more bytes]", raw.len() - limit));
        }
        Some(text)
    }

    /// Map a runtime failure of an exec step, promoting daemon outages.
    pub(crate) fn exec(reason: impl Into<String>, err: RuntimeError) -> Self {
        if err.is_unavailable() {
            return ProbeError::RuntimeUnavailable(err);
        }
        ProbeError::ExecSessionFailed {
            reason: reason.into(),
            source: Some(err),
            captured: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_report_keeps_raw_bytes() {
        let err = ProbeError::DiscoveryReportMalformed {
            reason: "expected value".to_string(),
            raw: b"connection refused".to_vec(),
        };
        assert_eq!(err.raw_output(), Some(&b"connection refused"[..]));
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn raw_excerpt_is_bounded() {
        let err = ProbeError::DiscoveryReportMalformed {
            reason: "expected value".to_string(),
            raw: b"Error: connection refused\n".to_vec(),
        };
        assert_eq!(err.raw_excerpt(1024).as_deref(), Some("Error: connection refused"));
        assert_eq!(
            err.raw_excerpt(5).as_deref(),
            Some("Error\n[21 more bytes]")
        );
        assert_eq!(ProbeError::InvalidRequest("x".to_string()).raw_excerpt(10), None);
    }

    #[test]
    fn exec_failure_promotes_daemon_outage() {
        let err = ProbeError::exec(
            "create",
            RuntimeError::Unavailable("cannot connect".to_string()),
        );
        assert!(matches!(err, ProbeError::RuntimeUnavailable(_)));

        let err = ProbeError::exec(
            "create",
            RuntimeError::ExecCreateFailed {
                container_id: "abc".to_string(),
                reason: "not running".to_string(),
            },
        );
        assert!(matches!(err, ProbeError::ExecSessionFailed { .. }));
    }
}
