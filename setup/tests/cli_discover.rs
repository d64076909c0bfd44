//! CLI tests for `discover` against a scripted `docker` client.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;

use explorer_setup::exit_codes;
use explorer_setup::test_support::{docker_calls, fake_docker, write_network_fixture};

const HELPER_ERROR: &str =
    "Error: failed connecting to peer0.org1.example.com:7051: connection refused";

fn write_config(root: &Path, docker_bin: &Path) {
    let config = format!(
        "[runtime]\ndocker_bin = {:?}\n\n[topology]\nconfigtx_path = {:?}\ncrypto_config_path = {:?}\ncrypto_root = {:?}\n",
        docker_bin,
        root.join("configtx.yaml"),
        root.join("crypto-config.yaml"),
        root.join("crypto-config"),
    );
    fs::write(root.join("explorer-setup.toml"), config).expect("write config");
}

#[test]
fn failed_helper_output_is_shown_on_stderr() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_network_fixture(temp.path());
    let bin_dir = temp.path().join("bin");
    fs::create_dir(&bin_dir).expect("bin dir");
    let arms = format!(
        r#"ps) echo peer0id ;;
inspect)
  if [ "$2" = "--format" ]; then echo true
  else echo '[{{"Id":"peer0id","Name":"/peer0.org1.example.com","HostConfig":{{"NetworkMode":"net_byfn"}},"State":{{"Running":true}}}}]'
  fi ;;
create) echo helperid ;;
start|rm) echo "$2" ;;
wait) echo 1 ;;
logs) echo '{HELPER_ERROR}' ;;"#
    );
    let docker = fake_docker(&bin_dir, &arms);
    write_config(temp.path(), &docker);

    let output = Command::new(env!("CARGO_BIN_EXE_explorer-setup"))
        .current_dir(temp.path())
        .args([
            "discover",
            "--peer",
            "peer0.org1.example.com",
            "--channel",
            "mychannel",
            "--org",
            "Org1MSP",
        ])
        .output()
        .expect("explorer-setup discover");

    assert_eq!(output.status.code(), Some(exit_codes::RUNTIME));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed"), "stderr: {stderr}");
    assert!(stderr.contains(HELPER_ERROR), "stderr: {stderr}");

    let calls = docker_calls(&bin_dir);
    let ops: Vec<&str> = calls.iter().map(|call| call[0].as_str()).collect();
    assert_eq!(ops, vec!["ps", "inspect", "create", "start", "wait", "logs", "rm"]);
    assert_eq!(calls.last().expect("rm call"), &vec!["rm", "--force", "helperid"]);
}
