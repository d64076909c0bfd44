//! [`ContainerRuntime`] over the `docker` command-line client.
//!
//! Each operation is one bounded `docker` invocation. Daemon-unreachable
//! failures are recognised from stderr and reported as
//! [`RuntimeError::Unavailable`] so callers can abort the whole interrogation.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::core::types::ContainerDescriptor;
use crate::error::RuntimeError;
use crate::io::config::RuntimeConfig;
use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::io::runtime::{
    ContainerRuntime, ContainerSpec, ExecHandle, ExecRequest, ExecSession, ExitStatus, LogStreams,
};

/// Docker CLI binding.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: PathBuf,
    command_timeout: Duration,
    pull_timeout: Duration,
    output_limit_bytes: usize,
}

/// Why a `docker` invocation did not succeed.
#[derive(Debug)]
enum CallError {
    Unavailable(String),
    Failed(String),
}

impl CallError {
    fn into_runtime(self, op: impl FnOnce(String) -> RuntimeError) -> RuntimeError {
        match self {
            CallError::Unavailable(reason) => RuntimeError::Unavailable(reason),
            CallError::Failed(reason) => op(reason),
        }
    }
}

/// Subset of `docker inspect` output used to describe a container.
#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "HostConfig", default)]
    host_config: InspectHostConfig,
    #[serde(rename = "State", default)]
    state: InspectState,
}

#[derive(Debug, Default, Deserialize)]
struct InspectHostConfig {
    #[serde(rename = "NetworkMode", default)]
    network_mode: String,
}

#[derive(Debug, Default, Deserialize)]
struct InspectState {
    #[serde(rename = "Running", default)]
    running: bool,
}

impl From<InspectEntry> for ContainerDescriptor {
    fn from(entry: InspectEntry) -> Self {
        ContainerDescriptor {
            id: entry.id,
            names: vec![entry.name],
            network: entry.host_config.network_mode,
            running: entry.state.running,
        }
    }
}

impl DockerCli {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            bin: PathBuf::from(&config.docker_bin),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        cmd
    }

    fn call(&self, args: &[String]) -> Result<CommandOutput, CallError> {
        self.call_with_timeout(args, self.command_timeout)
    }

    #[instrument(skip_all, fields(op = args.first().map(String::as_str).unwrap_or_default()))]
    fn call_with_timeout(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, CallError> {
        let output = self.run(args, timeout)?;
        if !output.status.success() {
            return Err(exit_failure(&render_command(&self.bin, args), &output));
        }
        Ok(output)
    }

    /// Run `docker args`, failing only on spawn errors and timeouts.
    fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput, CallError> {
        let rendered = render_command(&self.bin, args);
        debug!(command = %rendered, "running docker");
        let output = run_command_with_timeout(self.command(args), timeout, self.output_limit_bytes)
            .map_err(|err| spawn_failure(&err, &rendered))?;
        if output.timed_out {
            return Err(CallError::Failed(format!(
                "`{rendered}` timed out after {}s",
                timeout.as_secs()
            )));
        }
        Ok(output)
    }

    /// `docker inspect ids`, skipping containers removed since they were listed.
    fn inspect_listed(&self, ids: Vec<String>) -> Result<Vec<InspectEntry>, RuntimeError> {
        let mut inspect = args(&["inspect"]);
        inspect.extend(ids);
        let listing_failed = |reason| RuntimeError::ListFailed { reason };
        let out = self
            .run(&inspect, self.command_timeout)
            .map_err(|err| err.into_runtime(listing_failed))?;
        if !out.status.success() {
            let stderr = out.stderr_text();
            let only_missing = !stderr.is_empty() && stderr.lines().all(is_missing_object);
            if !only_missing {
                return Err(exit_failure(&render_command(&self.bin, &inspect), &out)
                    .into_runtime(listing_failed));
            }
            for line in stderr.lines() {
                debug!(detail = %line, "container vanished before inspect");
            }
        }
        if out.stdout_text().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&out.stdout)
            .map_err(|err| listing_failed(format!("parse docker inspect: {err}")))
    }
}

impl ContainerRuntime for DockerCli {
    #[instrument(skip_all)]
    fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, RuntimeError> {
        let ids_out = self
            .call(&args(&["ps", "-q", "--no-trunc"]))
            .map_err(|err| err.into_runtime(|reason| RuntimeError::ListFailed { reason }))?;
        let ids: Vec<String> = ids_out
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            debug!("no running containers");
            return Ok(Vec::new());
        }

        let entries = self.inspect_listed(ids)?;
        debug!(count = entries.len(), "listed containers");
        Ok(entries.into_iter().map(ContainerDescriptor::from).collect())
    }

    /// The CLI has no separate exec create, so this only checks that the
    /// target is running. `exec_start` runs the command.
    #[instrument(skip_all, fields(container = %request.container_id))]
    fn exec_create(&self, request: &ExecRequest) -> Result<ExecHandle, RuntimeError> {
        let failed = |reason| RuntimeError::ExecCreateFailed {
            container_id: request.container_id.clone(),
            reason,
        };
        let out = self
            .call(&args(&[
                "inspect",
                "--format",
                "{{.State.Running}}",
                &request.container_id,
            ]))
            .map_err(|err| err.into_runtime(failed))?;
        if out.stdout_text() != "true" {
            return Err(failed("container is not running".to_string()));
        }
        Ok(ExecHandle {
            id: format!("{}:{}", short_id(&request.container_id), request.command.join(" ")),
            request: request.clone(),
        })
    }

    #[instrument(skip_all, fields(session = %handle.id))]
    fn exec_start(&self, handle: &ExecHandle) -> Result<ExecSession, RuntimeError> {
        let request = &handle.request;
        let mut exec_args = args(&["exec"]);
        for (key, value) in &request.env {
            exec_args.push("-e".to_string());
            exec_args.push(format!("{key}={value}"));
        }
        exec_args.push(request.container_id.clone());
        exec_args.extend(request.command.iter().cloned());

        let mut cmd = self.command(&exec_args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let child = cmd.spawn().map_err(|err| {
            let reason = format!("spawn `{}`: {err}", render_command(&self.bin, &exec_args));
            if err.kind() == ErrorKind::NotFound {
                RuntimeError::Unavailable(reason)
            } else {
                RuntimeError::ExecStartFailed {
                    container_id: request.container_id.clone(),
                    reason,
                }
            }
        })?;
        debug!(pid = child.id(), "exec session started");
        Ok(ExecSession::from_child(handle.id.clone(), child))
    }

    #[instrument(skip_all, fields(image = %spec.image, network = %spec.network))]
    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut create = args(&["create"]);
        if spec.tty {
            create.push("--tty".to_string());
        }
        if spec.auto_remove {
            create.push("--rm".to_string());
        }
        create.push("--workdir".to_string());
        create.push(spec.workdir.clone());
        create.push("--network".to_string());
        create.push(spec.network.clone());
        for mount in &spec.mounts {
            let mut value = format!(
                "type=bind,source={},target={}",
                mount.source.display(),
                mount.target
            );
            if mount.read_only {
                value.push_str(",readonly");
            }
            create.push("--mount".to_string());
            create.push(value);
        }
        create.push(spec.image.clone());
        create.extend(spec.command.iter().cloned());

        let out = self.call(&create).map_err(|err| {
            err.into_runtime(|reason| RuntimeError::ContainerCreateFailed {
                image: spec.image.clone(),
                reason,
            })
        })?;
        let id = out.stdout_text().lines().next_back().unwrap_or_default().to_string();
        if id.is_empty() {
            return Err(RuntimeError::ContainerCreateFailed {
                image: spec.image.clone(),
                reason: "docker create printed no container id".to_string(),
            });
        }
        info!(container = %short_id(&id), "created container");
        Ok(id)
    }

    #[instrument(skip_all, fields(container = %short_id(container_id)))]
    fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.call(&args(&["start", container_id])).map_err(|err| {
            err.into_runtime(|reason| RuntimeError::ContainerStartFailed {
                container_id: container_id.to_string(),
                reason,
            })
        })?;
        Ok(())
    }

    #[instrument(skip_all, fields(container = %short_id(container_id), timeout_secs = timeout.as_secs()))]
    fn wait_not_running(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> Result<ExitStatus, RuntimeError> {
        let wait_args = args(&["wait", container_id]);
        let rendered = render_command(&self.bin, &wait_args);
        let out = run_command_with_timeout(self.command(&wait_args), timeout, self.output_limit_bytes)
            .map_err(|err| {
                spawn_failure(&err, &rendered).into_runtime(|reason| RuntimeError::WaitFailed {
                    container_id: container_id.to_string(),
                    reason,
                })
            })?;
        if out.timed_out {
            warn!("container still running at wait deadline");
            return Err(RuntimeError::WaitTimedOut {
                container_id: container_id.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        if !out.status.success() {
            let stderr = out.stderr_text();
            if daemon_unreachable(&stderr) {
                return Err(RuntimeError::Unavailable(stderr));
            }
            return Err(RuntimeError::WaitFailed {
                container_id: container_id.to_string(),
                reason: stderr,
            });
        }
        let code = out
            .stdout_text()
            .lines()
            .next_back()
            .unwrap_or_default()
            .trim()
            .parse::<i64>()
            .map_err(|err| RuntimeError::WaitFailed {
                container_id: container_id.to_string(),
                reason: format!("unexpected docker wait output: {err}"),
            })?;
        debug!(exit_code = code, "container stopped");
        Ok(ExitStatus { code })
    }

    #[instrument(skip_all, fields(container = %short_id(container_id)))]
    fn read_logs(&self, container_id: &str, streams: LogStreams) -> Result<Vec<u8>, RuntimeError> {
        let out = self.call(&args(&["logs", container_id])).map_err(|err| {
            err.into_runtime(|reason| RuntimeError::LogReadFailed {
                container_id: container_id.to_string(),
                reason,
            })
        })?;
        let mut logs = Vec::new();
        if streams.stdout {
            logs.extend_from_slice(&out.stdout);
        }
        if streams.stderr {
            logs.extend_from_slice(&out.stderr);
        }
        if out.stdout_truncated > 0 || out.stderr_truncated > 0 {
            warn!(
                stdout_truncated = out.stdout_truncated,
                stderr_truncated = out.stderr_truncated,
                "container logs truncated"
            );
        }
        Ok(logs)
    }

    #[instrument(skip_all, fields(container = %short_id(container_id)))]
    fn kill_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.call(&args(&["kill", container_id])).map_err(|err| {
            err.into_runtime(|reason| RuntimeError::WaitFailed {
                container_id: container_id.to_string(),
                reason: format!("kill: {reason}"),
            })
        })?;
        Ok(())
    }

    #[instrument(skip_all, fields(container = %short_id(container_id)))]
    fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.call(&args(&["rm", "--force", container_id]))
            .map_err(|err| {
                err.into_runtime(|reason| RuntimeError::ContainerRemoveFailed {
                    container_id: container_id.to_string(),
                    reason,
                })
            })?;
        Ok(())
    }

    #[instrument(skip_all, fields(image = %image))]
    fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!("pulling image");
        self.call_with_timeout(&args(&["pull", image]), self.pull_timeout)
            .map_err(|err| {
                err.into_runtime(|reason| RuntimeError::ImagePullFailed {
                    image: image.to_string(),
                    reason,
                })
            })?;
        Ok(())
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn spawn_failure(err: &anyhow::Error, command: &str) -> CallError {
    let not_found = err
        .downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == ErrorKind::NotFound);
    if not_found {
        return CallError::Unavailable(format!("docker client not found while running `{command}`"));
    }
    CallError::Failed(format!("failed to run `{command}`: {err:#}"))
}

fn exit_failure(rendered: &str, output: &CommandOutput) -> CallError {
    let stderr = output.stderr_text();
    if daemon_unreachable(&stderr) {
        return CallError::Unavailable(stderr);
    }
    CallError::Failed(format!(
        "`{rendered}` exited with {:?}: {stderr}",
        output.status.code()
    ))
}

fn is_missing_object(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    line.is_empty() || line.contains("no such object") || line.contains("no such container")
}

fn daemon_unreachable(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("failed to connect to the docker api")
        || lower.contains("error during connect")
}

fn render_command(bin: &std::path::Path, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(bin.display().to_string());
    parts.extend(args.iter().map(|arg| {
        if arg.chars().any(char::is_whitespace) {
            format!("\"{}\"", arg.replace('"', "\\\""))
        } else {
            arg.clone()
        }
    }));
    parts.join(" ")
}
