//! Loading of topology descriptors and member credential material.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::topology::{ConfigTx, CryptoConfig, Topology};
use crate::error::ProbeError;

/// Read and validate `configtx.yaml` and `crypto-config.yaml`.
pub fn load_topology(configtx_path: &Path, crypto_config_path: &Path) -> Result<Topology> {
    let configtx: ConfigTx = read_yaml(configtx_path)?;
    let crypto: CryptoConfig = read_yaml(crypto_config_path)?;
    debug!(
        organizations = configtx.organizations.len(),
        peer_orgs = crypto.peer_orgs.len(),
        "loaded topology"
    );
    Topology::new(configtx, crypto)
        .with_context(|| format!("validate {}", configtx_path.display()))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Name of the signing key in `{msp_dir}/keystore`.
///
/// Prefers the single `*_sk` file; a keystore holding exactly one file of any
/// name is accepted as well.
pub fn find_private_key(msp_dir: &Path) -> Result<String, ProbeError> {
    let keystore = msp_dir.join("keystore");
    let entries = fs::read_dir(&keystore).map_err(|err| {
        ProbeError::InvalidRequest(format!("read keystore {}: {err}", keystore.display()))
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            ProbeError::InvalidRequest(format!("read keystore {}: {err}", keystore.display()))
        })?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let keys: Vec<&String> = names.iter().filter(|name| name.ends_with("_sk")).collect();
    match (keys.as_slice(), names.as_slice()) {
        ([key], _) => Ok((*key).clone()),
        ([], [only]) => Ok(only.clone()),
        ([], []) => Err(ProbeError::InvalidRequest(format!(
            "keystore {} is empty",
            keystore.display()
        ))),
        _ => Err(ProbeError::InvalidRequest(format!(
            "keystore {} holds several keys: {}",
            keystore.display(),
            names.join(", ")
        ))),
    }
}
