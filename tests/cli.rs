use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

mod common;

fn labelforge(data_root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("labelforge").unwrap();
    cmd.env_remove("LABELFORGE_CATALOG")
        .env_remove("LABELFORGE_SPLIT")
        .env_remove("LABELFORGE_SEED_PER_VERSION")
        .env("LABELFORGE_DATA_ROOT", data_root);
    cmd
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("run labelforge");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

#[test]
fn runs() {
    let temp = tempfile::tempdir().unwrap();
    labelforge(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("labelforge"));
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("labelforge").unwrap();
    cmd.arg("-V");
    cmd.assert().success().stdout("labelforge 0.1.0\n");
}

#[test]
fn upload_save_show_list_delete() {
    let temp = tempfile::tempdir().unwrap();
    let data = temp.path().join("data");
    let image = temp.path().join("in/dog.bmp");
    common::write_bmp(&image, 8, 8);

    let uploaded = json_stdout(labelforge(&data).args([
        "upload",
        "--owner",
        "1",
        "--name",
        "pets",
        "--output",
        "json",
        image.to_str().unwrap(),
    ]));
    let dataset_id = uploaded["dataset"]["id"].as_i64().unwrap();
    let asset_id = uploaded["uploaded"][0]["id"].as_i64().unwrap();

    let request = temp.path().join("request.json");
    fs::write(
        &request,
        serde_json::json!({
            "datasetId": dataset_id,
            "versionTag": "v1",
            "images": [{
                "imageId": asset_id,
                "annotations": [
                    {"xCenter": 0.5, "yCenter": 0.5, "width": 0.2, "height": 0.3, "label": "dog"}
                ]
            }]
        })
        .to_string(),
    )
    .unwrap();

    labelforge(&data)
        .args(["save", "--owner", "1", request.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("train=1 val=0 test=0"));

    let detail = json_stdout(labelforge(&data).args([
        "show",
        "--owner",
        "1",
        &dataset_id.to_string(),
        "v1",
        "--output",
        "json",
    ]));
    assert_eq!(detail["classes"][0]["name"], "dog");
    assert_eq!(detail["assets"][0]["annotations"][0]["label"], "dog");
    assert_eq!(detail["assets"][0]["split"], "train");

    labelforge(&data)
        .args(["list", "--owner", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pets"))
        .stdout(predicate::str::contains("v1 train=1 val=0 test=0"));

    labelforge(&data)
        .args(["delete", "--owner", "1", &dataset_id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted dataset"));

    labelforge(&data)
        .args(["list", "--owner", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No datasets"));
}

#[test]
fn invalid_request_prints_report_and_fails() {
    let temp = tempfile::tempdir().unwrap();
    let request = temp.path().join("request.json");
    fs::write(&request, r#"{"images": []}"#).unwrap();

    labelforge(&temp.path().join("data"))
        .args(["save", "--owner", "1", request.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("MissingDatasetId"))
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn malformed_json_fails() {
    let temp = tempfile::tempdir().unwrap();
    let request = temp.path().join("request.json");
    fs::write(&request, "{not json").unwrap();

    labelforge(&temp.path().join("data"))
        .args(["save", "--owner", "1", request.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse request JSON"));
}

#[test]
fn bad_split_ratios_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    labelforge(temp.path())
        .args(["--split", "0.5,0.5,0.5", "list", "--owner", "1"])
        .assert()
        .failure();
}

#[test]
fn show_of_missing_dataset_fails() {
    let temp = tempfile::tempdir().unwrap();
    labelforge(temp.path())
        .args(["show", "--owner", "1", "42", "v1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dataset 42 not found"));
}
