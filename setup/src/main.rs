//! Fabric explorer setup wizard.
//!
//! Reads the network's topology descriptors, interrogates the running peer
//! containers and writes an explorer connection profile.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use explorer_setup::channels::list_channels;
use explorer_setup::core::script::render_script;
use explorer_setup::discover::{DiscoveryOptions, build_request, discover_peers, pull_tool_image};
use explorer_setup::error::ProbeError;
use explorer_setup::exit_codes;
use explorer_setup::io::config::{DEFAULT_CONFIG_PATH, SetupConfig, load_config};
use explorer_setup::io::docker::DockerCli;
use explorer_setup::io::selection::TerminalSelector;
use explorer_setup::io::topology::load_topology;
use explorer_setup::locate::locate_peer;
use explorer_setup::logging;
use explorer_setup::wizard::{member_credentials, run_wizard};

/// Bytes of preserved runtime output echoed after a failure.
const RAW_OUTPUT_LIMIT: usize = 8 * 1024;

#[derive(Parser)]
#[command(
    name = "explorer-setup",
    version,
    about = "Generate a Fabric explorer profile from a running network"
)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Choose an organization, peer and channel, then write the explorer profile.
    Wizard {
        /// Directory for the generated profile.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the channels a peer has joined, one per line.
    Channels {
        #[arg(long)]
        peer: String,
    },
    /// Run peer discovery on a channel and print the records as JSON.
    Discover {
        #[arg(long)]
        peer: String,
        #[arg(long)]
        channel: String,
        /// Organization name as declared in configtx.
        #[arg(long)]
        org: String,
        /// TLS directory of the member (default: derived from crypto_root).
        #[arg(long)]
        tls: Option<PathBuf>,
        /// MSP directory of the member (default: derived from crypto_root).
        #[arg(long)]
        msp: Option<PathBuf>,
    },
    /// Print the discovery script without touching the container runtime.
    Script {
        #[arg(long)]
        peer: String,
        #[arg(long)]
        channel: String,
        #[arg(long)]
        org: String,
        #[arg(long)]
        msp: Option<PathBuf>,
    },
    /// Pull the configured discovery tool image.
    Pull,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let failure = err.chain().find_map(|cause| cause.downcast_ref::<ProbeError>());
        if let Some(raw) = failure.and_then(|failure| failure.raw_excerpt(RAW_OUTPUT_LIMIT)) {
            eprintln!("discovery helper output:\n{raw}");
        }
        std::process::exit(exit_codes::for_error(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Command::Wizard { out } => cmd_wizard(&cfg, &out),
        Command::Channels { peer } => cmd_channels(&cfg, &peer),
        Command::Discover {
            peer,
            channel,
            org,
            tls,
            msp,
        } => cmd_discover(&cfg, &peer, &channel, &org, tls, msp),
        Command::Script {
            peer,
            channel,
            org,
            msp,
        } => cmd_script(&cfg, &peer, &channel, &org, msp),
        Command::Pull => cmd_pull(&cfg),
    }
}

fn cmd_wizard(cfg: &SetupConfig, out: &Path) -> Result<()> {
    let runtime = DockerCli::new(&cfg.runtime);
    let outcome = run_wizard(&runtime, &TerminalSelector::new(), cfg, out)?;
    for rejected in &outcome.report.rejected {
        eprintln!("skipped discovery record {}: {}", rejected.index, rejected.reason);
    }
    println!("{}", outcome.path.display());
    Ok(())
}

fn cmd_channels(cfg: &SetupConfig, peer: &str) -> Result<()> {
    let runtime = DockerCli::new(&cfg.runtime);
    let container = locate_peer(&runtime, peer).with_context(|| format!("locate peer {peer}"))?;
    let channels = list_channels(&runtime, &container.id, &cfg.channels)
        .with_context(|| format!("list channels of {peer}"))?;
    for channel in channels {
        println!("{channel}");
    }
    Ok(())
}

fn cmd_discover(
    cfg: &SetupConfig,
    peer: &str,
    channel: &str,
    org: &str,
    tls: Option<PathBuf>,
    msp: Option<PathBuf>,
) -> Result<()> {
    let topology = load_topology(&cfg.topology.configtx_path, &cfg.topology.crypto_config_path)?;
    let org = topology.organization(org)?;
    let creds = member_credentials(&cfg.topology, org.domain()?, &cfg.discovery.user, tls, msp);

    let runtime = DockerCli::new(&cfg.runtime);
    let container = locate_peer(&runtime, peer).with_context(|| format!("locate peer {peer}"))?;
    let request = build_request(&cfg.discovery, org, peer, &container.network, channel, &creds)?;
    let report = discover_peers(&runtime, &request, &DiscoveryOptions::from_config(&cfg.discovery))
        .with_context(|| format!("discover peers of {channel} via {peer}"))?;

    for rejected in &report.rejected {
        eprintln!(
            "skipped discovery record {}: {} ({})",
            rejected.index, rejected.reason, rejected.raw
        );
    }
    let json = serde_json::to_string_pretty(&report.records).context("serialize records")?;
    println!("{json}");
    Ok(())
}

fn cmd_script(
    cfg: &SetupConfig,
    peer: &str,
    channel: &str,
    org: &str,
    msp: Option<PathBuf>,
) -> Result<()> {
    let topology = load_topology(&cfg.topology.configtx_path, &cfg.topology.crypto_config_path)?;
    let org = topology.organization(org)?;
    let creds = member_credentials(&cfg.topology, org.domain()?, &cfg.discovery.user, None, msp);
    // The script never mentions the network; it only matters to the helper container.
    let request = build_request(&cfg.discovery, org, peer, "", channel, &creds)?;
    println!("{}", render_script(&request)?);
    Ok(())
}

fn cmd_pull(cfg: &SetupConfig) -> Result<()> {
    let runtime = DockerCli::new(&cfg.runtime);
    let image = pull_tool_image(&runtime, &cfg.discovery)?;
    println!("{image}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wizard_defaults() {
        let cli = Cli::parse_from(["explorer-setup", "wizard"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(cli.command, Command::Wizard { out } if out == Path::new(".")));
    }

    #[test]
    fn parse_discover_with_overrides() {
        let cli = Cli::parse_from([
            "explorer-setup",
            "discover",
            "--peer",
            "peer0.org1.example.com",
            "--channel",
            "mychannel",
            "--org",
            "Org1MSP",
            "--msp",
            "/creds/msp",
            "--config",
            "alt.toml",
        ]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        match cli.command {
            Command::Discover {
                peer, tls, msp, ..
            } => {
                assert_eq!(peer, "peer0.org1.example.com");
                assert_eq!(tls, None);
                assert_eq!(msp, Some(PathBuf::from("/creds/msp")));
            }
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn script_requires_channel() {
        let parsed = Cli::try_parse_from([
            "explorer-setup",
            "script",
            "--peer",
            "peer0.org1.example.com",
            "--org",
            "Org1MSP",
        ]);
        assert!(parsed.is_err());
    }
}
