use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "subtotal=£57.50 discounts=£2.50 promo=£0.00 credit=£0.00 tax=£0.00 total=£55.00 charge_now=£55.00 pay_later=£0.00",
        ))
        .stdout(predicate::str::contains(
            "loaded step=1/3 method=visa ****4242 charge=£55.00",
        ))
        .stdout(predicate::str::contains("success order="))
        .stdout(predicate::str::contains("status=Success total=£55.00"));

    Ok(())
}

#[test]
fn test_cli_promo_and_credit() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv")
        .args(["--promo", "welcome10", "--credit", "1000", "--use-credit"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("promo=£5.75 credit=£10.00"))
        .stdout(predicate::str::contains("total=£39.25"));
}

#[test]
fn test_cli_unknown_promo_is_reported() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv").args(["--promo", "BOGUS"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error applying promo code"))
        .stdout(predicate::str::contains("promo=£0.00"));
}

#[test]
fn test_cli_decline() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv").args(["--scenario", "decline"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "error kind=CARD_ERROR code=CARD_DECLINED retriable=false",
        ))
        .stdout(predicate::str::contains("success").not());
}

#[test]
fn test_cli_step_up() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv").args(["--scenario", "step-up"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("step=3/3").and(predicate::str::contains("requires_3ds=true")))
        .stdout(predicate::str::contains("success order="));
}

#[test]
fn test_cli_step_up_cancelled() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv").args(["--scenario", "step-up-cancel"]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().unwrap();
    assert_eq!(last, "loaded step=3/3 method=visa ****4242 charge=£55.00");
}

#[test]
fn test_cli_network_failure() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv")
        .args(["--scenario", "network"])
        .env("CHECKOUT_RETRY_BACKOFF_MS", "1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("code=NETWORK_ERROR retriable=true"));
}

#[test]
fn test_cli_deposit_plan() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/deposit_basket.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("charge_now=£30.00 pay_later=£90.00"))
        .stdout(predicate::str::contains("status=PaymentPending"));
}

#[test]
fn test_cli_json_output() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/basket.csv").arg("--json");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["status"], "success");
    assert_eq!(last["data"]["status"], "success");
}
