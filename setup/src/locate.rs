//! Peer container lookup on the live runtime.

use tracing::{info, instrument, warn};

use crate::core::locator::find_peer;
use crate::error::ProbeError;
use crate::io::runtime::ContainerRuntime;

/// A located peer container.
///
/// Valid only for the interrogation that produced it; never cache it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerContainer {
    pub id: String,
    pub name: String,
    pub network: String,
}

/// Find the running container whose short name equals `peer`.
///
/// When several containers share the name, the first one in runtime list
/// order wins and the others are logged.
#[instrument(skip(runtime))]
pub fn locate_peer<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    peer: &str,
) -> Result<PeerContainer, ProbeError> {
    let containers = runtime.list_containers().map_err(|err| {
        if err.is_unavailable() {
            ProbeError::RuntimeUnavailable(err)
        } else {
            ProbeError::ListFailed(err)
        }
    })?;
    let located = find_peer(&containers, peer).ok_or_else(|| ProbeError::PeerNotFound {
        peer: peer.to_string(),
    })?;

    for other in &located.shadowed {
        warn!(
            chosen = %located.container.id,
            ignored = %other.id,
            "several containers share this name; using the first listed"
        );
    }
    info!(container = %located.container.id, network = %located.container.network, "found peer");
    Ok(PeerContainer {
        id: located.container.id.clone(),
        name: peer.to_string(),
        network: located.container.network.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::test_support::{FakeRuntime, container};

    #[test]
    fn returns_id_and_network_of_match() {
        let runtime = FakeRuntime::new()
            .with_containers(vec![container("c1", "/net/peer0.org1.example.com", "net_default")]);
        let peer = locate_peer(&runtime, "peer0.org1.example.com").expect("locate");
        assert_eq!(
            peer,
            PeerContainer {
                id: "c1".to_string(),
                name: "peer0.org1.example.com".to_string(),
                network: "net_default".to_string(),
            }
        );
    }

    #[test]
    fn unknown_peer_is_not_found() {
        let runtime = FakeRuntime::new()
            .with_containers(vec![container("c1", "/net/peer0.org1.example.com", "net_default")]);
        let err = locate_peer(&runtime, "peer1.org1.example.com").unwrap_err();
        assert!(matches!(err, ProbeError::PeerNotFound { peer } if peer == "peer1.org1.example.com"));
    }

    #[test]
    fn list_failure_is_runtime_unavailable() {
        let runtime = FakeRuntime::new().fail_list(RuntimeError::Unavailable("down".to_string()));
        let err = locate_peer(&runtime, "peer0.org1.example.com").unwrap_err();
        assert!(matches!(err, ProbeError::RuntimeUnavailable(_)));
    }

    #[test]
    fn other_list_failure_is_not_an_outage() {
        let runtime = FakeRuntime::new().fail_list(RuntimeError::ListFailed {
            reason: "unexpected inspect output".to_string(),
        });
        let err = locate_peer(&runtime, "peer0.org1.example.com").unwrap_err();
        assert!(matches!(err, ProbeError::ListFailed(_)));
    }
}
