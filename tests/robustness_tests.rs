mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("robustness_test.csv");
    let mut wtr = csv::Writer::from_path(&path).unwrap();
    wtr.write_record(["kind", "offering", "title", "attendee", "price", "discount", "deposit"])
        .unwrap();

    // Valid course
    wtr.write_record(["course", "ballet", "Ballet", "Amy", "45.00", "", ""]).unwrap();
    // Unknown kind
    wtr.write_record(["workshop", "lyrical", "Lyrical", "Amy", "20.00", "", ""]).unwrap();
    // Deposit plan without a deposit
    wtr.write_record(["deposit_plan", "summer", "Summer", "Amy", "120.00", "", ""]).unwrap();
    // Same course for the same attendee
    wtr.write_record(["course", "ballet", "Ballet", "Amy", "45.00", "", ""]).unwrap();
    // Valid taster
    wtr.write_record(["taster_session", "tap", "Tap", "Rory", "10.00", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading line item"))
        .stdout(predicate::str::contains("subtotal=£55.00"));
}

#[test]
fn test_invalid_data_types() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data_type_test.csv");
    let mut wtr = csv::Writer::from_path(&path).unwrap();
    wtr.write_record(["kind", "offering", "title", "attendee", "price", "discount", "deposit"])
        .unwrap();

    // Text in price field
    wtr.write_record(["course", "ballet", "Ballet", "Amy", "forty", "", ""]).unwrap();
    // Negative price
    wtr.write_record(["course", "jazz", "Jazz", "Amy", "-5.00", "", ""]).unwrap();
    // Discount larger than price
    wtr.write_record(["course", "tap", "Tap", "Amy", "5.00", "6.00", ""]).unwrap();
    // Valid course
    wtr.write_record(["course", "hiphop", "Hip Hop", "Amy", "30.00", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading line item"))
        .stdout(predicate::str::contains("total=£30.00"));
}

#[test]
fn test_empty_basket_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    common::generate_basket_csv(&path, 0).unwrap();

    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("error kind=EMPTY_BASKET"));
}

#[test]
fn test_large_basket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.csv");
    common::generate_basket_csv(&path, 250).unwrap();

    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("total=£2500.00"))
        .stdout(predicate::str::contains("success order="));
}

#[test]
fn test_missing_basket_file() {
    let mut cmd = Command::new(cargo_bin!("studio-checkout"));
    cmd.arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}
