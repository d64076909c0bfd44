//! Match a peer identifier against the runtime's container list.

use crate::core::types::ContainerDescriptor;

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<'a> {
    pub container: &'a ContainerDescriptor,
    /// Other listed containers carrying the same short name.
    ///
    /// The first match in runtime order wins; these are reported so the
    /// caller can warn about the ambiguity instead of silently picking.
    pub shadowed: Vec<&'a ContainerDescriptor>,
}

/// Find the first container whose short name equals `peer` (case-sensitive).
pub fn find_peer<'a>(containers: &'a [ContainerDescriptor], peer: &str) -> Option<Located<'a>> {
    let mut matches = containers
        .iter()
        .filter(|container| container.short_name() == Some(peer));
    let container = matches.next()?;
    Some(Located {
        container,
        shadowed: matches.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, name: &str, network: &str) -> ContainerDescriptor {
        ContainerDescriptor {
            id: id.to_string(),
            names: vec![name.to_string()],
            network: network.to_string(),
            running: true,
        }
    }

    #[test]
    fn finds_exact_short_name() {
        let list = vec![
            container("a", "/orderer.example.com", "net_default"),
            container("b", "/net/peer0.org1.example.com", "net_default"),
        ];
        let located = find_peer(&list, "peer0.org1.example.com").expect("match");
        assert_eq!(located.container.id, "b");
        assert_eq!(located.container.network, "net_default");
        assert!(located.shadowed.is_empty());
    }

    #[test]
    fn no_match_for_other_peer() {
        let list = vec![container("b", "/net/peer0.org1.example.com", "net_default")];
        assert!(find_peer(&list, "peer1.org1.example.com").is_none());
    }

    #[test]
    fn comparison_is_case_sensitive_and_exact() {
        let list = vec![container("b", "/peer0.org1.example.com", "n")];
        assert!(find_peer(&list, "PEER0.org1.example.com").is_none());
        assert!(find_peer(&list, "peer0.org1").is_none());
    }

    #[test]
    fn first_match_wins_and_duplicates_are_reported() {
        let list = vec![
            container("first", "/peer0.org1.example.com", "net_a"),
            container("second", "/peer0.org1.example.com", "net_b"),
        ];
        let located = find_peer(&list, "peer0.org1.example.com").expect("match");
        assert_eq!(located.container.id, "first");
        assert_eq!(located.shadowed.len(), 1);
        assert_eq!(located.shadowed[0].id, "second");
    }
}
