//! Writing the generated explorer connection profile.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::explorer::ExplorerConfig;

/// Write `{dir}/{name}.json` atomically (temp file + rename); returns the path.
pub fn write_explorer_config(dir: &Path, config: &ExplorerConfig) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let path = dir.join(format!("{}.json", config.name));
    let mut payload = serde_json::to_string_pretty(config).context("serialize explorer config")?;
    payload.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path).with_context(|| format!("replace {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::explorer::ClientSection;

    #[test]
    fn writes_named_json_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = ExplorerConfig::new(
            "net",
            "1.0.0",
            "Apache-2.0",
            ClientSection {
                tls_enable: false,
                admin_user: "admin".to_string(),
            },
        );
        cfg.add_channel("mychannel", &[], "peer0.org1.example.com");
        let path = write_explorer_config(temp.path(), &cfg).expect("write");
        assert_eq!(path, temp.path().join("net.json"));
        let loaded: ExplorerConfig =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(loaded, cfg);
        assert!(!temp.path().join("net.json.tmp").exists());
    }
}
