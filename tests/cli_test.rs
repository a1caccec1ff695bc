use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const SEED: &str = "tests/fixtures/seed.json";

#[test]
fn test_detect_key() -> Result<(), Box<dyn std::error::Error>> {
    Command::new(cargo_bin!("pixflow"))
        .args(["detect-key", "12345678000190"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cnpj 12.345.678/0001-90"));

    Command::new(cargo_bin!("pixflow"))
        .args(["detect-key", "abc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown abc"));

    Ok(())
}

#[test]
fn test_transfer_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("pixflow"));
    cmd.args([
        "--seed",
        SEED,
        "transfer",
        "--customer",
        "cust-ana",
        "--source-account",
        "acc-ana",
        "--key",
        "+5511987654321",
        "--amount",
        "10.50",
    ]);

    let output = cmd.output()?;
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["amount"], 10.5);
    assert_eq!(body["recipient"]["name"], "Bob Comercio LTDA");

    Ok(())
}

#[test]
fn test_transfer_rejection_exits_non_zero() {
    Command::new(cargo_bin!("pixflow"))
        .args([
            "transfer",
            "--customer",
            "cust-bob",
            "--source-account",
            "acc-bob",
            "--key",
            "ana@pixflow.dev",
            "--amount",
            "100",
            "--seed",
            SEED,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient funds"));
}

#[test]
fn test_unknown_key_type_is_rejected() {
    Command::new(cargo_bin!("pixflow"))
        .args([
            "--seed",
            SEED,
            "transfer",
            "--customer",
            "cust-ana",
            "--source-account",
            "acc-ana",
            "--key",
            "ana@x.com",
            "--key-type",
            "iban",
            "--amount",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown key type"));
}

#[test]
fn test_run_scheduled_with_nothing_due() {
    Command::new(cargo_bin!("pixflow"))
        .args(["--seed", SEED, "run-scheduled", "--date", "2026-03-10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"due\": 0"));
}
