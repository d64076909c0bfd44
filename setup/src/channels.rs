//! Channel discovery by running `peer channel list` inside a peer container.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::candidates::CandidateParser;
use crate::core::types::CandidateSet;
use crate::error::ProbeError;
use crate::io::config::ChannelsConfig;
use crate::io::process::LineEvent;
use crate::io::runtime::{ContainerRuntime, ExecRequest, ExecSession};

/// List the channels the peer in `container_id` has joined.
pub fn list_channels<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    container_id: &str,
    cfg: &ChannelsConfig,
) -> Result<CandidateSet, ProbeError> {
    let request = ExecRequest {
        container_id: container_id.to_string(),
        command: cfg.command.clone(),
        env: cfg.env.clone(),
    };
    collect_candidates(runtime, &request, Duration::from_secs(cfg.idle_timeout_secs))
}

/// Run `request` and decode its output as a banner line followed by candidates.
///
/// An empty result means the command succeeded and printed nothing but the
/// banner. Failures to create, start or attach the session, an `idle` gap
/// between lines, or a non-zero exit all fail with `ExecSessionFailed`.
#[instrument(skip_all, fields(container = %request.container_id, command = %request.command.join(" ")))]
pub fn collect_candidates<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    request: &ExecRequest,
    idle: Duration,
) -> Result<CandidateSet, ProbeError> {
    let handle = runtime
        .exec_create(request)
        .map_err(|err| ProbeError::exec("create exec session", err))?;
    let mut session = runtime
        .exec_start(&handle)
        .map_err(|err| ProbeError::exec("start exec session", err))?;
    let stream = match runtime.exec_attach(&mut session) {
        Ok(stream) => stream,
        Err(err) => {
            abandon(session);
            return Err(ProbeError::exec("attach exec session", err));
        }
    };

    let mut parser = CandidateParser::new();
    let mut captured = Vec::new();
    loop {
        match stream.next_line(idle) {
            LineEvent::Line(line) => {
                debug!(line = %line, "exec output");
                parser.push_line(&line);
                captured.push(line);
            }
            LineEvent::End => break,
            LineEvent::Idle => {
                warn!(idle_secs = idle.as_secs(), "exec session went silent");
                abandon(session);
                return Err(ProbeError::ExecSessionFailed {
                    reason: format!("no output for {}s", idle.as_secs()),
                    source: None,
                    captured,
                });
            }
            LineEvent::Failed(err) => {
                abandon(session);
                return Err(ProbeError::ExecSessionFailed {
                    reason: format!("read exec output: {err}"),
                    source: None,
                    captured,
                });
            }
        }
    }

    let exit_code = session
        .finish()
        .map_err(|err| ProbeError::ExecSessionFailed {
            reason: format!("reap exec session: {err}"),
            source: None,
            captured: captured.clone(),
        })?;
    if let Some(code) = exit_code.filter(|code| *code != 0) {
        return Err(ProbeError::ExecSessionFailed {
            reason: format!("command exited with status {code}"),
            source: None,
            captured,
        });
    }

    let candidates = parser.finish();
    debug!(count = candidates.len(), "collected candidates");
    Ok(candidates)
}

fn abandon(mut session: ExecSession) {
    session.kill();
    if let Err(err) = session.finish() {
        warn!(err = %err, "failed to reap exec session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::test_support::FakeRuntime;

    fn cfg() -> ChannelsConfig {
        ChannelsConfig::default()
    }

    #[test]
    fn banner_is_dropped_and_channel_kept() {
        let runtime = FakeRuntime::new().with_exec_output("2024-01-01 INFO banner\nmychannel\n", 0);
        let channels = list_channels(&runtime, "c1", &cfg()).expect("channels");
        assert_eq!(channels, vec!["mychannel"]);

        let execs = runtime.exec_requests();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].command, vec!["peer", "channel", "list"]);
        assert_eq!(
            execs[0].env.get("FABRIC_LOGGING_SPEC").map(String::as_str),
            Some("critical")
        );
    }

    #[test]
    fn banner_only_is_an_empty_success() {
        let runtime = FakeRuntime::new().with_exec_output("Channels peers has joined:\n", 0);
        let channels = list_channels(&runtime, "c1", &cfg()).expect("channels");
        assert!(channels.is_empty());
    }

    #[test]
    fn create_failure_is_exec_session_failed() {
        let runtime = FakeRuntime::new().fail_exec_create(RuntimeError::ExecCreateFailed {
            container_id: "c1".to_string(),
            reason: "container is not running".to_string(),
        });
        let err = list_channels(&runtime, "c1", &cfg()).unwrap_err();
        assert!(matches!(err, ProbeError::ExecSessionFailed { .. }));
    }

    #[test]
    fn attach_failure_is_exec_session_failed() {
        let runtime = FakeRuntime::new()
            .with_exec_output("banner\nmychannel\n", 0)
            .fail_exec_attach();
        let err = list_channels(&runtime, "c1", &cfg()).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::ExecSessionFailed {
                source: Some(RuntimeError::ExecAttachFailed { .. }),
                ..
            }
        ));
    }

    #[test]
    fn non_zero_exit_is_failure_with_captured_output() {
        let runtime = FakeRuntime::new().with_exec_output("Error: peer not reachable\n", 1);
        let err = list_channels(&runtime, "c1", &cfg()).unwrap_err();
        match err {
            ProbeError::ExecSessionFailed { captured, .. } => {
                assert_eq!(captured, vec!["Error: peer not reachable"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
