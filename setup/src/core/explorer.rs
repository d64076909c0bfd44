//! Explorer connection profile assembled from wizard answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::DiscoveryRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub name: String,
    pub version: String,
    pub license: String,
    pub client: ClientSection,
    pub channels: BTreeMap<String, ChannelSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(rename = "tlsEnable")]
    pub tls_enable: bool,
    #[serde(rename = "adminUser")]
    pub admin_user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSection {
    pub peers: BTreeMap<String, PeerSection>,
}

/// Per-peer options; empty for now, kept as an object for the explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSection {}

impl ExplorerConfig {
    pub fn new(name: &str, version: &str, license: &str, client: ClientSection) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            license: license.to_string(),
            client,
            channels: BTreeMap::new(),
        }
    }

    /// Register `channel` with the discovered peers, or `fallback_peer` when
    /// discovery returned none.
    pub fn add_channel(&mut self, channel: &str, records: &[DiscoveryRecord], fallback_peer: &str) {
        let section = self.channels.entry(channel.to_string()).or_default();
        for record in records {
            section
                .peers
                .insert(record.host().to_string(), PeerSection::default());
        }
        if section.peers.is_empty() {
            section
                .peers
                .insert(fallback_peer.to_string(), PeerSection::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(endpoint: &str) -> DiscoveryRecord {
        DiscoveryRecord {
            mspid: "Org1MSP".to_string(),
            ledger_height: "1".to_string(),
            endpoint: endpoint.to_string(),
            identity: String::new(),
            chaincodes: Vec::new(),
        }
    }

    fn config() -> ExplorerConfig {
        ExplorerConfig::new(
            "first-network-generated",
            "1.0.0",
            "Apache-2.0",
            ClientSection {
                tls_enable: true,
                admin_user: "admin".to_string(),
            },
        )
    }

    #[test]
    fn serializes_explorer_shape() {
        let mut cfg = config();
        cfg.add_channel("mychannel", &[record("peer0.org1.example.com:7051")], "x");
        let json = serde_json::to_value(&cfg).expect("json");
        assert_eq!(json["client"]["tlsEnable"], true);
        assert_eq!(json["client"]["adminUser"], "admin");
        assert!(json["channels"]["mychannel"]["peers"]["peer0.org1.example.com"].is_object());
    }

    #[test]
    fn falls_back_to_selected_peer() {
        let mut cfg = config();
        cfg.add_channel("mychannel", &[], "peer0.org1.example.com");
        let peers = &cfg.channels["mychannel"].peers;
        assert_eq!(peers.len(), 1);
        assert!(peers.contains_key("peer0.org1.example.com"));
    }
}
