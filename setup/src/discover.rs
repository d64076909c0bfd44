//! Peer discovery through a short-lived `fabric-tools` helper container.
//!
//! One call walks `Building -> Created -> Running -> WaitingExit` and ends in
//! exactly one terminal outcome: a decoded report, unavailable logs, a
//! malformed report, or a runtime failure. Nothing is retried. The helper is
//! removed on every exit path unless the caller asked to keep it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::report::decode_report;
use crate::core::script::{MSP_MOUNT, TLS_MOUNT, render_script};
use crate::core::topology::{CredentialDirs, Organization};
use crate::core::types::{DiscoveryReport, DiscoveryRequest};
use crate::error::{ProbeError, RuntimeError};
use crate::io::config::DiscoveryConfig;
use crate::io::runtime::{BindMount, ContainerRuntime, ContainerSpec, LogStreams};
use crate::io::topology::find_private_key;

/// Knobs for one discovery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub workdir: String,
    pub wait_timeout: Duration,
    pub keep_helper: bool,
    pub tty: bool,
}

impl DiscoveryOptions {
    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self {
            workdir: cfg.workdir.clone(),
            wait_timeout: Duration::from_secs(cfg.wait_timeout_secs),
            keep_helper: cfg.keep_helper,
            tty: cfg.tty,
        }
    }
}

/// Progress of a discovery call, for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Building,
    Created,
    Running,
    WaitingExit,
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryPhase::Building => "building",
            DiscoveryPhase::Created => "created",
            DiscoveryPhase::Running => "running",
            DiscoveryPhase::WaitingExit => "waiting-exit",
        };
        f.write_str(name)
    }
}

/// Assemble a discovery request for `org`'s member `cfg.user`.
///
/// The signing key name is read from the host keystore under `creds.msp`.
pub fn build_request(
    cfg: &DiscoveryConfig,
    org: &Organization,
    peer_host: &str,
    network: &str,
    channel: &str,
    creds: &CredentialDirs,
) -> Result<DiscoveryRequest, ProbeError> {
    let domain = org
        .domain()
        .map_err(|err| ProbeError::InvalidRequest(format!("{err:#}")))?;
    let skname = find_private_key(&creds.msp)?;
    Ok(DiscoveryRequest {
        peer_host: peer_host.to_string(),
        peer_port: cfg.peer_port,
        network: network.to_string(),
        channel: channel.to_string(),
        domain: domain.to_string(),
        mspid: org.id.clone(),
        user: cfg.user.clone(),
        skname,
        tls_dir: creds.tls.clone(),
        msp_dir: creds.msp.clone(),
        image: cfg.image_ref(),
    })
}

/// Run the discovery helper for `request` and decode its report.
#[instrument(skip_all, fields(peer = %request.peer_host, channel = %request.channel, network = %request.network))]
pub fn discover_peers<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    request: &DiscoveryRequest,
    options: &DiscoveryOptions,
) -> Result<DiscoveryReport, ProbeError> {
    let mut phase = DiscoveryPhase::Building;
    debug!(%phase, "discovery");
    let spec = helper_spec(request, options)?;

    let id = runtime.create_container(&spec).map_err(launch_failure)?;
    let helper = HelperContainer {
        runtime,
        id,
        keep: options.keep_helper,
    };
    phase = DiscoveryPhase::Created;
    debug!(%phase, container = %helper.id, "discovery");

    runtime
        .start_container(&helper.id)
        .map_err(launch_failure)?;
    phase = DiscoveryPhase::Running;
    debug!(%phase, "discovery");

    phase = DiscoveryPhase::WaitingExit;
    debug!(%phase, timeout_secs = options.wait_timeout.as_secs(), "discovery");
    let status = match runtime.wait_not_running(&helper.id, options.wait_timeout) {
        Ok(status) => status,
        Err(err) => {
            if matches!(err, RuntimeError::WaitTimedOut { .. })
                && let Err(kill_err) = runtime.kill_container(&helper.id)
            {
                warn!(err = %kill_err, "failed to stop timed out helper");
            }
            return Err(ProbeError::DiscoveryWaitFailed(err));
        }
    };
    if !status.success() {
        warn!(exit_code = status.code, "discovery helper exited with failure, reading logs anyway");
    }

    let logs = runtime
        .read_logs(&helper.id, report_streams(options.tty))
        .map_err(ProbeError::LogsUnavailable)?;
    let mut report = decode_report(&logs)?;
    report.exit_code = Some(status.code);
    for rejected in &report.rejected {
        warn!(index = rejected.index, reason = %rejected.reason, "skipped unusable discovery record");
    }
    info!(
        records = report.records.len(),
        rejected = report.rejected.len(),
        "discovery finished"
    );
    Ok(report)
}

/// Container spec for the helper: shell script, network, credential mounts.
pub fn helper_spec(
    request: &DiscoveryRequest,
    options: &DiscoveryOptions,
) -> Result<ContainerSpec, ProbeError> {
    let tls = existing_dir("TLS", &request.tls_dir)?;
    let msp = existing_dir("MSP", &request.msp_dir)?;
    let script = render_script(request)?;
    let workdir = options.workdir.trim_end_matches('/');
    Ok(ContainerSpec {
        image: request.image.clone(),
        command: vec!["sh".to_string(), "-c".to_string(), script],
        workdir: workdir.to_string(),
        network: request.network.clone(),
        mounts: vec![
            BindMount {
                source: msp,
                target: format!("{workdir}/{MSP_MOUNT}"),
                read_only: false,
            },
            BindMount {
                source: tls,
                target: format!("{workdir}/{TLS_MOUNT}"),
                read_only: false,
            },
        ],
        tty: options.tty,
        // Logs are read after exit, so removal is done by the guard instead.
        auto_remove: false,
    })
}

/// Pull the discovery tool image ahead of the first run.
pub fn pull_tool_image<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    cfg: &DiscoveryConfig,
) -> Result<String, ProbeError> {
    let image = cfg.image_ref();
    runtime.pull_image(&image).map_err(|err| {
        if err.is_unavailable() {
            ProbeError::RuntimeUnavailable(err)
        } else {
            ProbeError::DiscoveryLaunchFailed(err)
        }
    })?;
    Ok(image)
}

fn existing_dir(label: &str, path: &Path) -> Result<PathBuf, ProbeError> {
    if !path.is_dir() {
        return Err(ProbeError::InvalidRequest(format!(
            "{label} directory {} does not exist",
            path.display()
        )));
    }
    path.canonicalize().map_err(|err| {
        ProbeError::InvalidRequest(format!("resolve {label} directory {}: {err}", path.display()))
    })
}

/// Log streams holding the report.
///
/// With a TTY the runtime keeps one ordered stream. Without one, stdout and
/// stderr come back separately and cannot be re-interleaved, so only stdout
/// (where the report is printed) is read.
fn report_streams(tty: bool) -> LogStreams {
    if tty {
        LogStreams::BOTH
    } else {
        LogStreams {
            stdout: true,
            stderr: false,
        }
    }
}

fn launch_failure(err: RuntimeError) -> ProbeError {
    if err.is_unavailable() {
        return ProbeError::RuntimeUnavailable(err);
    }
    ProbeError::DiscoveryLaunchFailed(err)
}

/// Removes the helper container when dropped.
struct HelperContainer<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    id: String,
    keep: bool,
}

impl<R: ContainerRuntime + ?Sized> Drop for HelperContainer<'_, R> {
    fn drop(&mut self) {
        if self.keep {
            info!(container = %self.id, "keeping discovery helper container");
            return;
        }
        match self.runtime.remove_container(&self.id) {
            Ok(()) => debug!(container = %self.id, "removed discovery helper"),
            Err(err) => warn!(container = %self.id, err = %err, "failed to remove discovery helper"),
        }
    }
}
