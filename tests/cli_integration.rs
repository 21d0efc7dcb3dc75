use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const HARDHAT: &str = "test test test test test test test test test test test junk";
const DVN: &str = "0x1111111111111111111111111111111111111111";
const NEW_SIGNER: &str = "0x2222222222222222222222222222222222222222";

fn data_dir(signers: usize) -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let addresses = json!({ "ethereum": DVN, "arbitrum": DVN });
    std::fs::write(dir.path().join("dvn-addresses-mainnet.json"), addresses.to_string()).expect("write addresses");

    let mnemonics: Vec<Value> = (0..signers)
        .map(|i| json!({ "mnemonic": HARDHAT, "path": format!("m/44'/60'/0'/0/{}", i) }))
        .collect();
    std::fs::write(dir.path().join("mnemonic.json"), Value::Array(mnemonics).to_string()).expect("write signers");
    dir
}

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    let binary_path = assert_cmd::cargo::cargo_bin!("dvn-governance");
    Command::new(binary_path)
        .args(args)
        .args(["--signer-mode", "local", "--data-dir"])
        .arg(dir)
        .arg("--output")
        .arg(dir.join("out.json"))
        .args(["--expiration", "1700000000000"])
        .output()
        .expect("cli runs")
}

fn read_output(dir: &Path) -> Value {
    let contents = std::fs::read_to_string(dir.join("out.json")).expect("output written");
    serde_json::from_str(&contents).expect("output is valid json")
}

#[test]
fn set_signer_writes_payload_per_chain() {
    let dir = data_dir(3);
    let output = run_cli(
        dir.path(),
        &[
            "set-signer",
            "-c",
            "ethereum,arbitrum",
            "--quorum",
            "2",
            "--signer-address",
            NEW_SIGNER,
            "--should-revoke",
            "0",
        ],
    );
    assert!(output.status.success(), "cli exited unsuccessfully: {:?}", output);

    let doc = read_output(dir.path());
    for (chain, vid) in [("ethereum", "101"), ("arbitrum", "110")] {
        let entry = &doc[chain];
        assert_eq!(entry["args"]["target"], DVN, "{} target", chain);
        assert_eq!(entry["args"]["vid"], vid, "{} vid", chain);
        assert_eq!(entry["args"]["expiration"], 1_700_000_000_000u64);
        // two 65-byte signatures, hex encoded
        assert_eq!(entry["args"]["signatures"].as_str().unwrap().len(), 2 + 2 * 130);
        assert_eq!(entry["info"]["signatures"].as_array().unwrap().len(), 3);
        assert_eq!(entry["info"]["signerAddress"], NEW_SIGNER);
        assert_eq!(entry["info"]["shouldRevoke"], false);
        assert!(entry.get("status").is_none());
    }
}

#[test]
fn set_quorum_is_deterministic() {
    let dir = data_dir(2);
    let args = ["set-quorum", "-c", "ethereum", "--old-quorum", "1", "--new-quorum", "2"];

    assert!(run_cli(dir.path(), &args).status.success());
    let first = read_output(dir.path());
    assert!(run_cli(dir.path(), &args).status.success());
    let second = read_output(dir.path());

    assert_eq!(first, second);
    assert_eq!(first["ethereum"]["info"]["oldQuorum"], 1);
    assert_eq!(first["ethereum"]["info"]["newQuorum"], 2);
}

#[test]
fn rejects_non_binary_flag() {
    let dir = data_dir(1);
    let output = run_cli(
        dir.path(),
        &["set-signer", "-c", "ethereum", "--quorum", "1", "--signer-address", NEW_SIGNER, "--should-revoke", "2"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--should-revoke must be 0 or 1"), "stderr: {}", stderr);
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn unknown_chain_fails_without_output() {
    let dir = data_dir(1);
    let output = run_cli(dir.path(), &["set-quorum", "-c", "ethereum,atlantis", "--old-quorum", "1", "--new-quorum", "2"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn partial_policy_records_failed_chain() {
    let dir = data_dir(1);
    let output = run_cli(
        dir.path(),
        &[
            "set-quorum",
            "-c",
            "ethereum,atlantis",
            "--old-quorum",
            "1",
            "--new-quorum",
            "2",
            "--failure-policy",
            "partial",
        ],
    );
    // the run still reports failure, but every chain is written
    assert!(!output.status.success());

    let doc = read_output(dir.path());
    assert_eq!(doc["ethereum"]["status"], "ok");
    assert_eq!(doc["atlantis"]["status"], "error");
    assert_eq!(doc["atlantis"]["error"]["code"], "unknown_chain");
}

#[test]
fn role_change_rejected_on_non_evm_chain() {
    let dir = data_dir(1);
    let output = run_cli(
        dir.path(),
        &["set-role", "-c", "sui", "--quorum", "1", "--message-lib-address", NEW_SIGNER, "--access", "0"],
    );
    assert!(!output.status.success());
}
