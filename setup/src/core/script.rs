//! Discovery script rendering.
//!
//! The helper container runs two `discover` sub-commands in sequence: the
//! first persists a connection profile (`conf.yaml`) from the mounted
//! credentials, the second queries the peers joined to a channel. All values
//! are spliced into a shell command line, so each one is checked against a
//! conservative character set before rendering.

use std::sync::LazyLock;

use minijinja::{Environment, context};
use regex::Regex;

use crate::core::types::DiscoveryRequest;
use crate::error::ProbeError;

const DISCOVER_TEMPLATE: &str = include_str!("templates/discover.sh");

/// Working-directory-relative path of the saved connection profile.
pub const PROFILE_PATH: &str = "conf.yaml";
/// Mount target (relative to the tool workdir) for TLS material.
pub const TLS_MOUNT: &str = "tls";
/// Mount target (relative to the tool workdir) for MSP material.
pub const MSP_MOUNT: &str = "msp";

static SAFE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._@-]+$").expect("safe param regex"));

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template("discover", DISCOVER_TEMPLATE)
        .expect("discover template should be valid");
    env
});

/// Render the discovery script for `request`.
pub fn render_script(request: &DiscoveryRequest) -> Result<String, ProbeError> {
    let params = [
        ("skname", request.skname.as_str()),
        ("user", request.user.as_str()),
        ("domain", request.domain.as_str()),
        ("mspid", request.mspid.as_str()),
        ("channel", request.channel.as_str()),
        ("peer_host", request.peer_host.as_str()),
    ];
    for (name, value) in params {
        check_param(name, value)?;
    }

    let template = ENGINE
        .get_template("discover")
        .map_err(|err| ProbeError::InvalidRequest(format!("load script template: {err}")))?;
    template
        .render(context! {
            profile => PROFILE_PATH,
            tls => TLS_MOUNT,
            msp => MSP_MOUNT,
            skname => request.skname,
            user => request.user,
            domain => request.domain,
            mspid => request.mspid,
            channel => request.channel,
            peer_host => request.peer_host,
            peer_port => request.peer_port,
        })
        .map_err(|err| ProbeError::InvalidRequest(format!("render script: {err}")))
}

/// Reject values that could escape their position in the shell command.
pub fn check_param(name: &str, value: &str) -> Result<(), ProbeError> {
    if SAFE_PARAM.is_match(value) {
        return Ok(());
    }
    Err(ProbeError::InvalidRequest(format!(
        "{name} {value:?} contains characters outside [A-Za-z0-9._@-]"
    )))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn request() -> DiscoveryRequest {
        DiscoveryRequest {
            peer_host: "peer0.org1.example.com".to_string(),
            peer_port: 7051,
            network: "net_byfn".to_string(),
            channel: "mychannel".to_string(),
            domain: "org1.example.com".to_string(),
            mspid: "Org1MSP".to_string(),
            user: "User1".to_string(),
            skname: "6b3cf49_sk".to_string(),
            tls_dir: PathBuf::from("/tmp/tls"),
            msp_dir: PathBuf::from("/tmp/msp"),
            image: "hyperledger/fabric-tools:1.4.2".to_string(),
        }
    }

    /// Recover `(domain, mspid, channel, peer_host)` from rendered text.
    fn parse_back(script: &str) -> (String, String, String, String) {
        let re = Regex::new(
            r"(?s)--userCert=msp/signcerts/[^@\s]+@(?P<domain>\S+)-cert\.pem.*--MSP (?P<mspid>\S+).*--channel (?P<channel>\S+).*--server (?P<host>[^:\s]+):\d+",
        )
        .expect("regex");
        let caps = re.captures(script).expect("script matches");
        (
            caps["domain"].to_string(),
            caps["mspid"].to_string(),
            caps["channel"].to_string(),
            caps["host"].to_string(),
        )
    }

    #[test]
    fn rendered_script_round_trips_parameters() {
        let req = request();
        let script = render_script(&req).expect("render");
        assert_eq!(
            parse_back(&script),
            (
                req.domain.clone(),
                req.mspid.clone(),
                req.channel.clone(),
                req.peer_host.clone()
            )
        );
    }

    #[test]
    fn script_saves_profile_then_queries_peers() {
        let script = render_script(&request()).expect("render");
        let save = script.find("saveConfig").expect("saveConfig");
        let peers = script.find("peers").expect("peers");
        assert!(save < peers);
        assert!(script.contains("--userKey=msp/keystore/6b3cf49_sk"));
        assert!(script.contains("--server peer0.org1.example.com:7051"));
        assert!(script.contains(&format!("--configFile {PROFILE_PATH}")));
    }

    #[test]
    fn rejects_shell_metacharacters() {
        let mut req = request();
        req.channel = "mychannel; rm -rf /".to_string();
        let err = render_script(&req).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest(msg) if msg.contains("channel")));
    }
}
