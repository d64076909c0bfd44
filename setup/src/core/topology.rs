//! Typed network topology: organizations from `configtx.yaml` and peer
//! organizations from `crypto-config.yaml`.
//!
//! Both files are decoded once and checked by [`Topology::new`]; call sites
//! never look at untyped YAML.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use serde::Deserialize;

/// `configtx.yaml` root (only the parts this tool reads).
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigTx {
    #[serde(rename = "Organizations", default)]
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    #[serde(rename = "Name")]
    pub name: String,
    /// MSP identifier, e.g. `Org1MSP`.
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "MSPDir")]
    pub msp_dir: String,
}

impl Organization {
    /// Domain encoded in `MSPDir` (the segment before the final `msp`).
    pub fn domain(&self) -> Result<&str> {
        let segments: Vec<&str> = self
            .msp_dir
            .trim_end_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() < 2 {
            bail!(
                "organization {}: MSPDir {:?} has no domain segment",
                self.name,
                self.msp_dir
            );
        }
        Ok(segments[segments.len() - 2])
    }
}

/// `crypto-config.yaml` root.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    #[serde(rename = "PeerOrgs", default)]
    pub peer_orgs: Vec<PeerOrg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerOrg {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Specs", default)]
    pub specs: Vec<HostSpec>,
    #[serde(rename = "Template")]
    pub template: Option<HostTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostSpec {
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "CommonName")]
    pub common_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostTemplate {
    #[serde(rename = "Count")]
    pub count: u32,
    #[serde(rename = "Start", default)]
    pub start: u32,
}

impl PeerOrg {
    /// Peer host names: explicit specs first, then template-generated hosts.
    pub fn peer_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .specs
            .iter()
            .map(|spec| match &spec.common_name {
                Some(cn) => cn.clone(),
                None => format!("{}.{}", spec.hostname, self.domain),
            })
            .collect();
        if let Some(template) = &self.template {
            let indices = (0..template.count).filter_map(|i| template.start.checked_add(i));
            hosts.extend(indices.map(|i| format!("peer{i}.{}", self.domain)));
        }
        hosts
    }

    /// Reject templates whose host indices leave the `u32` range.
    fn check_template(&self) -> Result<()> {
        if let Some(template) = &self.template
            && template.count > 0
            && template.start.checked_add(template.count - 1).is_none()
        {
            bail!(
                "peer org {}: Template Start {} + Count {} overflows",
                self.name,
                template.start,
                template.count
            );
        }
        Ok(())
    }
}

/// Validated pairing of both descriptors.
#[derive(Debug, Clone)]
pub struct Topology {
    pub organizations: Vec<Organization>,
    pub peer_orgs: Vec<PeerOrg>,
}

impl Topology {
    pub fn new(configtx: ConfigTx, crypto: CryptoConfig) -> Result<Self> {
        if configtx.organizations.is_empty() {
            bail!("configtx declares no Organizations");
        }
        for org in &configtx.organizations {
            org.domain()?;
        }
        for peer_org in &crypto.peer_orgs {
            peer_org.check_template()?;
        }
        Ok(Self {
            organizations: configtx.organizations,
            peer_orgs: crypto.peer_orgs,
        })
    }

    pub fn organization(&self, name: &str) -> Result<&Organization> {
        self.organizations
            .iter()
            .find(|org| org.name == name)
            .ok_or_else(|| anyhow!("organization {name} not found in configtx"))
    }

    /// Peer organization whose `Domain` matches the organization's MSP domain.
    pub fn peer_org_for(&self, org: &Organization) -> Result<&PeerOrg> {
        let domain = org.domain()?;
        self.peer_orgs
            .iter()
            .find(|peer_org| peer_org.domain == domain)
            .ok_or_else(|| anyhow!("no PeerOrgs entry with Domain {domain}"))
    }
}

/// Host credential directories of one member identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDirs {
    pub tls: PathBuf,
    pub msp: PathBuf,
}

impl CredentialDirs {
    /// `{crypto_root}/peerOrganizations/{domain}/users/{user}@{domain}/{tls,msp}`.
    pub fn for_user(crypto_root: &Path, domain: &str, user: &str) -> Self {
        let base = crypto_root
            .join("peerOrganizations")
            .join(domain)
            .join("users")
            .join(format!("{user}@{domain}"));
        Self {
            tls: base.join("tls"),
            msp: base.join("msp"),
        }
    }
}
