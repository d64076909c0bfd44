//! Shared data types for runtime interrogation.
//!
//! These are plain values: produced by the runtime adapter or the discovery
//! tool, read by core logic, never cached across interrogations.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// A container as reported by the runtime's list operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// Opaque runtime identity.
    pub id: String,
    /// Registered names, e.g. `/peer0.org1.example.com`.
    pub names: Vec<String>,
    /// Network attachment (`HostConfig.NetworkMode`).
    pub network: String,
    pub running: bool,
}

impl ContainerDescriptor {
    /// Last path segment of the first registered name.
    pub fn short_name(&self) -> Option<&str> {
        let first = self.names.first()?;
        first.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

/// Ordered channel (or other) candidates extracted from exec output.
pub type CandidateSet = Vec<String>;

/// Everything needed to run one discovery helper container.
///
/// Built once per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub peer_host: String,
    pub peer_port: u16,
    pub network: String,
    pub channel: String,
    pub domain: String,
    pub mspid: String,
    /// User whose credentials are mounted (e.g. `User1`).
    pub user: String,
    /// Private key file name inside `msp/keystore`.
    pub skname: String,
    pub tls_dir: PathBuf,
    pub msp_dir: PathBuf,
    /// Full image reference, e.g. `hyperledger/fabric-tools:1.4.2`.
    pub image: String,
}

/// One reachable peer as reported by the discovery tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    #[serde(rename = "MSPID")]
    pub mspid: String,
    #[serde(rename = "LedgerHeight", deserialize_with = "string_or_number")]
    pub ledger_height: String,
    #[serde(rename = "Endpoint")]
    pub endpoint: String,
    #[serde(rename = "Identity")]
    pub identity: String,
    #[serde(rename = "Chaincodes", default, deserialize_with = "null_as_empty")]
    pub chaincodes: Vec<String>,
}

impl DiscoveryRecord {
    /// Host part of `host:port`.
    pub fn host(&self) -> &str {
        match self.endpoint.rsplit_once(':') {
            Some((host, _)) => host,
            None => &self.endpoint,
        }
    }
}

/// A report entry that could not be decoded as a [`DiscoveryRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
    pub raw: serde_json::Value,
}

/// Decoded discovery output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoveryReport {
    pub records: Vec<DiscoveryRecord>,
    pub rejected: Vec<RejectedRecord>,
    /// Exit code of the helper container, when the runtime reported one.
    pub exit_code: Option<i64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Height {
        Text(String),
        Number(u64),
    }

    Ok(match Height::deserialize(deserializer)? {
        Height::Text(text) => text,
        Height::Number(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(names: &[&str]) -> ContainerDescriptor {
        ContainerDescriptor {
            id: "id".to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
            network: "net_default".to_string(),
            running: true,
        }
    }

    #[test]
    fn short_name_takes_last_segment_of_first_name() {
        let d = descriptor(&["/net/peer0.org1.example.com", "/other"]);
        assert_eq!(d.short_name(), Some("peer0.org1.example.com"));
        assert_eq!(descriptor(&["/orderer"]).short_name(), Some("orderer"));
    }

    #[test]
    fn short_name_is_none_without_names() {
        assert_eq!(descriptor(&[]).short_name(), None);
        assert_eq!(descriptor(&["/"]).short_name(), None);
    }

    #[test]
    fn record_accepts_numeric_height_and_null_chaincodes() {
        let record: DiscoveryRecord = serde_json::from_str(
            r#"{"MSPID":"Org1MSP","LedgerHeight":12,"Endpoint":"peer0:7051","Identity":"x","Chaincodes":null}"#,
        )
        .expect("decode");
        assert_eq!(record.ledger_height, "12");
        assert!(record.chaincodes.is_empty());
        assert_eq!(record.host(), "peer0");
    }
}
