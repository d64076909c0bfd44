//! Operator configuration stored in `explorer-setup.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "explorer-setup.toml";

/// Setup configuration (TOML).
///
/// Missing fields default to values that match a stock `first-network`
/// deployment on the local Docker daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupConfig {
    pub runtime: RuntimeConfig,
    pub channels: ChannelsConfig,
    pub discovery: DiscoveryConfig,
    pub topology: TopologyConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Docker client executable.
    pub docker_bin: String,

    /// Upper bound for a single short runtime call (list, inspect, create, ...).
    pub command_timeout_secs: u64,

    /// Upper bound for `docker pull`.
    pub pull_timeout_secs: u64,

    /// Truncate captured runtime output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            command_timeout_secs: 60,
            pull_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Command run inside the peer container to list joined channels.
    pub command: Vec<String>,

    /// Environment overrides for the exec session.
    pub env: BTreeMap<String, String>,

    /// Give up when the exec session is silent for this long.
    pub idle_timeout_secs: u64,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "peer".to_string(),
                "channel".to_string(),
                "list".to_string(),
            ],
            env: BTreeMap::from([("FABRIC_LOGGING_SPEC".to_string(), "critical".to_string())]),
            idle_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub image: String,
    pub tool_version: String,
    /// Tool root inside the helper container; credentials mount beneath it.
    pub workdir: String,
    pub peer_port: u16,
    /// User whose credentials are mounted into the helper.
    pub user: String,
    pub wait_timeout_secs: u64,
    /// Leave the helper container behind for debugging.
    pub keep_helper: bool,
    /// Run the helper with a TTY so its stdout and stderr share one ordered
    /// log. When off, only stdout is read back and tool errors printed on
    /// stderr are not part of the preserved output.
    pub tty: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            image: "hyperledger/fabric-tools".to_string(),
            tool_version: "1.4.2".to_string(),
            workdir: "/etc/hyperledger/fabric".to_string(),
            peer_port: 7051,
            user: "User1".to_string(),
            wait_timeout_secs: 120,
            keep_helper: false,
            tty: true,
        }
    }
}

impl DiscoveryConfig {
    /// `image:tool_version`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tool_version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopologyConfig {
    pub configtx_path: PathBuf,
    pub crypto_config_path: PathBuf,
    /// Root of the cryptogen output tree holding member credentials.
    pub crypto_root: PathBuf,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            configtx_path: PathBuf::from("configtx.yaml"),
            crypto_config_path: PathBuf::from("crypto-config.yaml"),
            crypto_root: PathBuf::from("crypto-config"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub name: String,
    pub version: String,
    pub license: String,
    pub admin_user: String,
    pub tls_enable: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: "first-network-generated".to_string(),
            version: "1.0.0".to_string(),
            license: "Apache-2.0".to_string(),
            admin_user: "admin".to_string(),
            tls_enable: true,
        }
    }
}

impl SetupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runtime.docker_bin.trim().is_empty() {
            return Err(anyhow!("runtime.docker_bin must be non-empty"));
        }
        if self.runtime.command_timeout_secs == 0 {
            return Err(anyhow!("runtime.command_timeout_secs must be > 0"));
        }
        if self.runtime.pull_timeout_secs == 0 {
            return Err(anyhow!("runtime.pull_timeout_secs must be > 0"));
        }
        if self.runtime.output_limit_bytes == 0 {
            return Err(anyhow!("runtime.output_limit_bytes must be > 0"));
        }
        if self.channels.command.is_empty() || self.channels.command[0].trim().is_empty() {
            return Err(anyhow!("channels.command must be a non-empty array"));
        }
        if self.channels.idle_timeout_secs == 0 {
            return Err(anyhow!("channels.idle_timeout_secs must be > 0"));
        }
        if self.discovery.wait_timeout_secs == 0 {
            return Err(anyhow!("discovery.wait_timeout_secs must be > 0"));
        }
        if self.discovery.image.trim().is_empty() || self.discovery.tool_version.trim().is_empty()
        {
            return Err(anyhow!("discovery.image and discovery.tool_version must be set"));
        }
        if !self.discovery.workdir.starts_with('/') {
            return Err(anyhow!("discovery.workdir must be an absolute container path"));
        }
        if self.output.name.trim().is_empty() {
            return Err(anyhow!("output.name must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SetupConfig::default()`.
pub fn load_config(path: &Path) -> Result<SetupConfig> {
    if !path.exists() {
        let cfg = SetupConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SetupConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
