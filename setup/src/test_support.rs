//! Test-only fakes: a scripted container runtime, a scripted selector, and
//! fixture builders for containers, credentials and topology files.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::topology::CredentialDirs;
use crate::core::types::ContainerDescriptor;
use crate::error::{ProbeError, RuntimeError};
use crate::io::process::LineStream;
use crate::io::runtime::{
    ContainerRuntime, ContainerSpec, ExecHandle, ExecRequest, ExecSession, ExitStatus, LogStreams,
};
use crate::io::selection::{SelectOption, Selector};

/// Create a running container descriptor with one registered name.
pub fn container(id: &str, name: &str, network: &str) -> ContainerDescriptor {
    ContainerDescriptor {
        id: id.to_string(),
        names: vec![name.to_string()],
        network: network.to_string(),
        running: true,
    }
}

/// Create `tls/` and `msp/keystore/priv_sk` under `root`.
pub fn credential_dirs(root: &Path) -> CredentialDirs {
    let dirs = CredentialDirs {
        tls: root.join("tls"),
        msp: root.join("msp"),
    };
    write_credentials(&dirs);
    dirs
}

/// Materialise a member's credential directories with a single signing key.
pub fn write_credentials(dirs: &CredentialDirs) {
    fs::create_dir_all(&dirs.tls).expect("create tls dir");
    fs::create_dir_all(dirs.msp.join("keystore")).expect("create keystore");
    fs::write(dirs.tls.join("ca.crt"), "ca").expect("write ca.crt");
    fs::write(dirs.msp.join("keystore").join("priv_sk"), "key").expect("write key");
}

pub const CONFIGTX_FIXTURE: &str = r#"
Organizations:
    - &OrdererOrg
        Name: OrdererOrg
        ID: OrdererMSP
        MSPDir: crypto-config/ordererOrganizations/example.com/msp
    - &Org1
        Name: Org1MSP
        ID: Org1MSP
        MSPDir: crypto-config/peerOrganizations/org1.example.com/msp
    - &Org2
        Name: Org2MSP
        ID: Org2MSP
        MSPDir: crypto-config/peerOrganizations/org2.example.com/msp
"#;

pub const CRYPTO_CONFIG_FIXTURE: &str = r#"
PeerOrgs:
  - Name: Org1
    Domain: org1.example.com
    EnableNodeOUs: true
    Template:
      Count: 2
    Users:
      Count: 1
  - Name: Org2
    Domain: org2.example.com
    EnableNodeOUs: true
    Template:
      Count: 2
    Users:
      Count: 1
"#;

/// Write `configtx.yaml`, `crypto-config.yaml` and User1 credentials for
/// `org1.example.com` under `root`.
pub fn write_network_fixture(root: &Path) {
    fs::write(root.join("configtx.yaml"), CONFIGTX_FIXTURE).expect("write configtx");
    fs::write(root.join("crypto-config.yaml"), CRYPTO_CONFIG_FIXTURE).expect("write crypto");
    let dirs = CredentialDirs::for_user(&root.join("crypto-config"), "org1.example.com", "User1");
    write_credentials(&dirs);
}

/// Write an executable `docker` stand-in at `{dir}/docker` and return its path.
///
/// Each invocation appends its arguments to `{dir}/docker.log` (one per line,
/// then a `--` line). `arms` are `case "$1"` branches producing the output.
#[cfg(unix)]
pub fn fake_docker(dir: &Path, arms: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("docker.log");
    let script = format!(
        "#!/bin/sh\nfor arg in \"$@\"; do printf '%s\\n' \"$arg\" >> '{log}'; done\nprintf '%s\\n' '--' >> '{log}'\ncase \"$1\" in\n{arms}\nesac\n",
        log = log.display(),
    );
    let path = dir.join("docker");
    fs::write(&path, script).expect("write fake docker");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake docker");
    path
}

/// Argument vectors recorded by [`fake_docker`], one per invocation.
pub fn docker_calls(dir: &Path) -> Vec<Vec<String>> {
    let log = fs::read_to_string(dir.join("docker.log")).unwrap_or_default();
    let mut calls = Vec::new();
    let mut current = Vec::new();
    for line in log.lines() {
        if line == "--" {
            calls.push(std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    calls
}

/// Runtime call recorded by [`FakeRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    List,
    ExecCreate(String),
    ExecStart(String),
    Create(String),
    Start(String),
    Wait(String),
    Logs(String),
    Kill(String),
    Remove(String),
    Pull(String),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RuntimeCall>,
    exec_requests: Vec<ExecRequest>,
    created: Vec<ContainerSpec>,
    log_streams: Vec<LogStreams>,
    next_helper: usize,
}

/// Scripted [`ContainerRuntime`] that records every call.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Vec<ContainerDescriptor>,
    exec_output: String,
    exec_exit: i64,
    helper_exit: i64,
    helper_logs: Vec<u8>,
    list_error: Option<RuntimeError>,
    exec_create_error: Option<RuntimeError>,
    exec_attach_fails: bool,
    create_error: Option<RuntimeError>,
    wait_error: Option<RuntimeError>,
    logs_error: Option<RuntimeError>,
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(mut self, containers: Vec<ContainerDescriptor>) -> Self {
        self.containers = containers;
        self
    }

    pub fn with_exec_output(mut self, output: &str, exit_code: i64) -> Self {
        self.exec_output = output.to_string();
        self.exec_exit = exit_code;
        self
    }

    /// Helper containers exit with `exit_code` and log `logs`.
    pub fn with_helper(mut self, exit_code: i64, logs: &str) -> Self {
        self.helper_exit = exit_code;
        self.helper_logs = logs.as_bytes().to_vec();
        self
    }

    pub fn fail_list(mut self, err: RuntimeError) -> Self {
        self.list_error = Some(err);
        self
    }

    pub fn fail_exec_create(mut self, err: RuntimeError) -> Self {
        self.exec_create_error = Some(err);
        self
    }

    pub fn fail_exec_attach(mut self) -> Self {
        self.exec_attach_fails = true;
        self
    }

    pub fn fail_create(mut self, err: RuntimeError) -> Self {
        self.create_error = Some(err);
        self
    }

    pub fn fail_wait(mut self, err: RuntimeError) -> Self {
        self.wait_error = Some(err);
        self
    }

    pub fn fail_logs(mut self, err: RuntimeError) -> Self {
        self.logs_error = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().expect("fake state").calls.clone()
    }

    pub fn exec_requests(&self) -> Vec<ExecRequest> {
        self.state.lock().expect("fake state").exec_requests.clone()
    }

    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state.lock().expect("fake state").created.clone()
    }

    /// Stream selections passed to `read_logs`, in call order.
    pub fn log_requests(&self) -> Vec<LogStreams> {
        self.state.lock().expect("fake state").log_streams.clone()
    }

    fn record(&self, call: RuntimeCall) {
        self.state.lock().expect("fake state").calls.push(call);
    }

    fn scripted(err: &Option<RuntimeError>) -> Result<(), RuntimeError> {
        match err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    fn list_containers(&self) -> Result<Vec<ContainerDescriptor>, RuntimeError> {
        self.record(RuntimeCall::List);
        Self::scripted(&self.list_error)?;
        Ok(self.containers.clone())
    }

    fn exec_create(&self, request: &ExecRequest) -> Result<ExecHandle, RuntimeError> {
        self.record(RuntimeCall::ExecCreate(request.container_id.clone()));
        self.state
            .lock()
            .expect("fake state")
            .exec_requests
            .push(request.clone());
        Self::scripted(&self.exec_create_error)?;
        Ok(ExecHandle {
            id: format!("exec-{}", request.container_id),
            request: request.clone(),
        })
    }

    fn exec_start(&self, handle: &ExecHandle) -> Result<ExecSession, RuntimeError> {
        self.record(RuntimeCall::ExecStart(handle.id.clone()));
        Ok(ExecSession::from_output(
            handle.id.clone(),
            self.exec_output.as_bytes().to_vec(),
            self.exec_exit,
        ))
    }

    fn exec_attach(&self, session: &mut ExecSession) -> Result<LineStream, RuntimeError> {
        if self.exec_attach_fails {
            return Err(RuntimeError::ExecAttachFailed {
                session: session.id.clone(),
                reason: "scripted attach failure".to_string(),
            });
        }
        session.attach().ok_or_else(|| RuntimeError::ExecAttachFailed {
            session: session.id.clone(),
            reason: "output already attached".to_string(),
        })
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.record(RuntimeCall::Create(spec.image.clone()));
        Self::scripted(&self.create_error)?;
        let mut state = self.state.lock().expect("fake state");
        state.created.push(spec.clone());
        state.next_helper += 1;
        Ok(format!("helper-{}", state.next_helper))
    }

    fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Start(container_id.to_string()));
        Ok(())
    }

    fn wait_not_running(
        &self,
        container_id: &str,
        _timeout: Duration,
    ) -> Result<ExitStatus, RuntimeError> {
        self.record(RuntimeCall::Wait(container_id.to_string()));
        Self::scripted(&self.wait_error)?;
        Ok(ExitStatus {
            code: self.helper_exit,
        })
    }

    fn read_logs(&self, container_id: &str, streams: LogStreams) -> Result<Vec<u8>, RuntimeError> {
        self.record(RuntimeCall::Logs(container_id.to_string()));
        self.state
            .lock()
            .expect("fake state")
            .log_streams
            .push(streams);
        Self::scripted(&self.logs_error)?;
        Ok(self.helper_logs.clone())
    }

    fn kill_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Kill(container_id.to_string()));
        Ok(())
    }

    fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Remove(container_id.to_string()));
        Ok(())
    }

    fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Pull(image.to_string()));
        Ok(())
    }
}

/// Selector that answers prompts from a queue of labels.
///
/// A label missing from the offered options (or an exhausted queue) behaves
/// like an operator abort.
pub struct ScriptedSelector {
    answers: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<(String, Vec<String>)>>,
}

impl ScriptedSelector {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts seen so far with the labels offered for each.
    pub fn prompts(&self) -> Vec<(String, Vec<String>)> {
        self.prompts.borrow().clone()
    }
}

impl Selector for ScriptedSelector {
    fn select<T: Clone>(&self, prompt: &str, options: &[SelectOption<T>]) -> Result<T, ProbeError> {
        let labels: Vec<String> = options.iter().map(|o| o.label.clone()).collect();
        self.prompts
            .borrow_mut()
            .push((prompt.to_string(), labels));
        let aborted = || ProbeError::NoSelectionMade {
            prompt: prompt.to_string(),
        };
        let answer = self.answers.borrow_mut().pop_front().ok_or_else(aborted)?;
        options
            .iter()
            .find(|option| option.label == answer)
            .map(|option| option.value.clone())
            .ok_or_else(aborted)
    }
}
