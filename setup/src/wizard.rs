//! The interactive flow: organization, peer, channel, discovery, profile.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::channels::list_channels;
use crate::core::explorer::{ClientSection, ExplorerConfig};
use crate::core::topology::{CredentialDirs, Organization};
use crate::core::types::DiscoveryReport;
use crate::discover::{DiscoveryOptions, build_request, discover_peers};
use crate::io::config::{OutputConfig, SetupConfig, TopologyConfig};
use crate::io::explorer_store::write_explorer_config;
use crate::io::runtime::ContainerRuntime;
use crate::io::selection::{SelectOption, Selector};
use crate::io::topology::load_topology;
use crate::locate::locate_peer;

/// What a completed wizard run chose and produced.
#[derive(Debug, Clone)]
pub struct WizardOutcome {
    pub organization: String,
    pub peer: String,
    pub channel: String,
    pub report: DiscoveryReport,
    /// Written explorer profile.
    pub path: PathBuf,
}

/// Walk the operator through one peer and one channel and write the
/// explorer profile into `out_dir`.
///
/// Every runtime step acts on the peer chosen in this run only; nothing is
/// carried over from earlier runs.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn run_wizard<R, S>(
    runtime: &R,
    selector: &S,
    cfg: &SetupConfig,
    out_dir: &Path,
) -> Result<WizardOutcome>
where
    R: ContainerRuntime + ?Sized,
    S: Selector,
{
    let topology = load_topology(&cfg.topology.configtx_path, &cfg.topology.crypto_config_path)?;

    let org_options: Vec<SelectOption<Organization>> = topology
        .organizations
        .iter()
        .filter(|org| topology.peer_org_for(org).is_ok())
        .map(|org| SelectOption::new(org.name.clone(), org.clone()))
        .collect();
    if org_options.is_empty() {
        bail!("no organization in configtx has a matching PeerOrgs entry");
    }
    let org = selector
        .select("Organization", &org_options)
        .context("select organization")?;
    let domain = org.domain()?.to_string();

    let hosts = topology.peer_org_for(&org)?.peer_hosts();
    let peer_host = selector
        .select("Peer", &SelectOption::plain(&hosts))
        .context("select peer")?;

    let peer = locate_peer(runtime, &peer_host)
        .with_context(|| format!("locate peer {peer_host}"))?;
    let channels = list_channels(runtime, &peer.id, &cfg.channels)
        .with_context(|| format!("list channels of {peer_host}"))?;
    let channel = selector
        .select("Channel", &SelectOption::plain(&channels))
        .context("select channel")?;

    let creds = member_credentials(&cfg.topology, &domain, &cfg.discovery.user, None, None);
    let request = build_request(&cfg.discovery, &org, &peer_host, &peer.network, &channel, &creds)?;
    let report = discover_peers(runtime, &request, &DiscoveryOptions::from_config(&cfg.discovery))
        .with_context(|| format!("discover peers of {channel} via {peer_host}"))?;

    let mut profile = explorer_profile(&cfg.output);
    profile.add_channel(&channel, &report.records, &peer_host);
    let path = write_explorer_config(out_dir, &profile)?;
    info!(path = %path.display(), peers = profile.channels[&channel].peers.len(), "wrote explorer profile");

    Ok(WizardOutcome {
        organization: org.name,
        peer: peer_host,
        channel,
        report,
        path,
    })
}

/// Credential directories of `user`, with explicit overrides taking priority.
pub fn member_credentials(
    cfg: &TopologyConfig,
    domain: &str,
    user: &str,
    tls: Option<PathBuf>,
    msp: Option<PathBuf>,
) -> CredentialDirs {
    let derived = CredentialDirs::for_user(&cfg.crypto_root, domain, user);
    CredentialDirs {
        tls: tls.unwrap_or(derived.tls),
        msp: msp.unwrap_or(derived.msp),
    }
}

/// Empty explorer profile carrying the configured header fields.
pub fn explorer_profile(cfg: &OutputConfig) -> ExplorerConfig {
    ExplorerConfig::new(
        &cfg.name,
        &cfg.version,
        &cfg.license,
        ClientSection {
            tls_enable: cfg.tls_enable,
            admin_user: cfg.admin_user.clone(),
        },
    )
}
