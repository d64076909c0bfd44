//! Stable exit codes for `explorer-setup` commands.

use crate::error::ProbeError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, topology, credentials or arguments, and any other failure.
pub const INVALID: i32 = 1;
/// The named peer container is not running.
pub const NOT_FOUND: i32 = 2;
/// The operator aborted a selection.
pub const ABORTED: i32 = 3;
/// The container runtime failed or returned unusable output.
pub const RUNTIME: i32 = 4;

/// Exit code for a command failure, based on the first [`ProbeError`] in its chain.
pub fn for_error(err: &anyhow::Error) -> i32 {
    let Some(probe) = err.chain().find_map(|cause| cause.downcast_ref::<ProbeError>()) else {
        return INVALID;
    };
    match probe {
        ProbeError::PeerNotFound { .. } => NOT_FOUND,
        ProbeError::NoSelectionMade { .. } => ABORTED,
        ProbeError::InvalidRequest(_) => INVALID,
        ProbeError::RuntimeUnavailable(_)
        | ProbeError::ListFailed(_)
        | ProbeError::ExecSessionFailed { .. }
        | ProbeError::DiscoveryLaunchFailed(_)
        | ProbeError::DiscoveryWaitFailed(_)
        | ProbeError::LogsUnavailable(_)
        | ProbeError::DiscoveryReportMalformed { .. } => RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn maps_probe_errors_through_context() {
        let err: anyhow::Result<()> = Err(ProbeError::PeerNotFound {
            peer: "peer0".to_string(),
        })
        .context("locate peer");
        assert_eq!(for_error(&err.unwrap_err()), NOT_FOUND);

        let err = anyhow::Error::new(ProbeError::NoSelectionMade {
            prompt: "channel".to_string(),
        });
        assert_eq!(for_error(&err), ABORTED);
    }

    #[test]
    fn other_errors_are_invalid() {
        assert_eq!(for_error(&anyhow::anyhow!("bad config")), INVALID);
    }
}
