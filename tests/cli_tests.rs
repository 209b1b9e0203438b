//! CLI behavior that needs neither network nor a validator binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const PROGRAM_ID: &str = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS";

fn cli(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("localnet-sandbox").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CI")
        .env_remove("RUST_LOG")
        .env("LOCALNET_SANDBOX_HOME", dir.path().join("home"));
    cmd
}

fn write_config(dir: &TempDir, json: serde_json::Value) {
    std::fs::write(
        dir.path().join("localnet.json"),
        serde_json::to_vec_pretty(&json).unwrap(),
    )
    .unwrap();
}

fn config_with_program(deploy_path: &str) -> serde_json::Value {
    serde_json::json!({
        "accountsCluster": "https://api.devnet.solana.com",
        "jsonRpcUrl": "http://127.0.0.1:18899",
        "accounts": [
            { "label": "usdc", "accountId": USDC_MINT },
            { "label": "fixture", "accountId": "So11111111111111111111111111111111111111112", "dataOverride": "AQID" }
        ],
        "programs": [
            { "label": "my_program", "programId": PROGRAM_ID, "deployPath": deploy_path }
        ]
    })
}

#[test]
fn test_plan_prints_execution_plan() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("target/deploy")).unwrap();
    std::fs::write(dir.path().join("target/deploy/my_program.so"), b"\x7fELF").unwrap();
    write_config(&dir, config_with_program("target/deploy/my_program.so"));

    let output = cli(&dir).arg("plan").assert().success().get_output().stdout.clone();
    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(plan["validator"]["rpcPort"], 18899);
    assert_eq!(plan["validator"]["detached"], false);
    assert_eq!(plan["validator"]["clusterRpcUrl"], "https://api.devnet.solana.com");
    assert_eq!(plan["cloneTasks"].as_array().unwrap().len(), 2);
    assert_eq!(plan["cloneTasks"][0]["label"], "usdc");
    assert_eq!(plan["deployTasks"][0]["programId"], PROGRAM_ID);
    assert_eq!(plan["policy"]["fetchConcurrency"], 8);
}

#[test]
fn test_plan_in_ci_defaults_to_detached() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, serde_json::json!({ "accounts": [] }));

    let output = cli(&dir)
        .env("CI", "true")
        .arg("plan")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(plan["validator"]["detached"], true);
}

#[test]
fn test_plan_missing_artifact_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, config_with_program("target/deploy/missing.so"));

    cli(&dir)
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("my_program"));
}

#[test]
fn test_start_missing_artifact_reports_json() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, config_with_program("target/deploy/missing.so"));

    let output = cli(&dir)
        .args(["--json", "start"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["phase"], "resolving");
    assert_eq!(report["kind"], "config");
    assert_eq!(report["labels"][0], "my_program");
    assert!(!dir.path().join("home").join("snapshots").exists());
}

#[test]
fn test_unknown_config_field_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, serde_json::json!({ "accounts": [], "validatr": {} }));

    cli(&dir)
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("validatr"));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["--config", "nope.json", "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.json"));
}

#[test]
fn test_cache_stats_and_clear_on_empty_store() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 snapshot(s)"));

    let output = cli(&dir)
        .args(["--json", "cache", "clear"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let cleared: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(cleared["removed"], 0);
    assert!(dir.path().join("home").join("snapshots").is_dir());
}

#[test]
fn test_conflicting_detached_flags() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["start", "--detached", "--no-detached"])
        .assert()
        .failure();
}
