mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use csv_upsert::{
    inference::TypeAssignment,
    schema::FieldType,
    store::{DataStore, MemoryStore},
};
use predicates::str::contains;

const PEOPLE: &str = "Name,Age,Team\ntext,number,choice\nAlice,30,Red\nBob,notanumber,Blue\n";

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("csv-upsert").expect("binary exists");
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn probe_prints_and_saves_proposed_types() {
    let ws = TestWorkspace::new();
    let input = ws.write("people.csv", PEOPLE);
    let types = ws.path().join("types.yml");

    bin()
        .args(["probe", "-i", input.to_str().unwrap(), "-o", types.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Team"))
        .stdout(contains("choice"))
        .stdout(contains("Alice, Bob"));

    let assignment = TypeAssignment::load(&types).expect("load types");
    assert_eq!(assignment.type_of("Age"), FieldType::Number);
    assert_eq!(assignment.type_of("Team"), FieldType::Choice);
}

#[test]
fn probe_infers_types_without_hint_row() {
    let ws = TestWorkspace::new();
    let input = ws.write("plain.csv", "Name,Joined\nAlice,2024-01-02\n");

    bin()
        .args(["probe", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("datetime"));
}

#[tokio::test]
async fn create_then_import_upserts_by_title() {
    let ws = TestWorkspace::new();
    let input = ws.write("people.csv", PEOPLE);
    let store_path = ws.path().join("store.json");

    bin()
        .args([
            "create",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "People",
        ])
        .assert()
        .success()
        .stdout(contains("Created: 2, Updated: 0, Skipped: 0"));

    let update = ws.write("update.csv", "name,age\nalice,31\nCarol,22\n");
    bin()
        .args([
            "import",
            "-i",
            update.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "People",
            "--batch-pause-ms",
            "0",
        ])
        .assert()
        .success()
        .stdout(contains("Created: 1, Updated: 1, Skipped: 0"));

    let store = MemoryStore::load(&store_path).unwrap();
    let id = store.collection_by_name("People").unwrap().unwrap();
    let config = store.configuration(&id).await.unwrap();
    assert_eq!(config.field("team").unwrap().choices.len(), 2);
    assert_eq!(store.records(&id).await.unwrap().len(), 3);

    bin()
        .args(["collections", "-s", store_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("People"));
}

#[test]
fn create_applies_type_overrides() {
    let ws = TestWorkspace::new();
    let input = ws.write("tickets.csv", "Title,Status\nA,Open\nB,Closed\n");
    let store_path = ws.path().join("store.json");

    bin()
        .args([
            "create",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "Tickets",
            "--type",
            "Status=choice",
        ])
        .assert()
        .success();

    let snapshot = MemoryStore::load(&store_path).unwrap().snapshot().unwrap();
    let stored = snapshot.collections.values().next().unwrap();
    let status = stored.config.field("status").unwrap();
    assert_eq!(status.field_type, FieldType::Choice);
    assert_eq!(status.choices[1].label, "Closed");
}

#[test]
fn create_rejects_unknown_override_column() {
    let ws = TestWorkspace::new();
    let input = ws.write("tickets.csv", "Title\nA\n");
    let store_path = ws.path().join("store.json");

    bin()
        .args([
            "create",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "Tickets",
            "--type",
            "Missing=number",
        ])
        .assert()
        .failure()
        .stderr(contains("Column 'Missing' not found"));
    assert!(!store_path.exists());
}

#[test]
fn import_reports_malformed_csv() {
    let ws = TestWorkspace::new();
    let input = ws.write("people.csv", PEOPLE);
    let store_path = ws.path().join("store.json");
    bin()
        .args([
            "create",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "People",
        ])
        .assert()
        .success();
    let before = fs::read_to_string(&store_path).unwrap();

    let broken = ws.write("broken.csv", "onlyheader");
    bin()
        .args([
            "import",
            "-i",
            broken.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "People",
        ])
        .assert()
        .failure()
        .stderr(contains("at least a header row and one data row"));
    assert_eq!(fs::read_to_string(&store_path).unwrap(), before);
}

#[test]
fn import_reads_csv_from_stdin() {
    let ws = TestWorkspace::new();
    let input = ws.write("people.csv", PEOPLE);
    let store_path = ws.path().join("store.json");
    bin()
        .args([
            "create",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-n",
            "People",
        ])
        .assert()
        .success();

    bin()
        .args(["import", "-i", "-", "-s", store_path.to_str().unwrap(), "-n", "People"])
        .write_stdin("Name,Age\nBob,44\n")
        .assert()
        .success()
        .stdout(contains("Updated: 1"));
}

#[test]
fn import_requires_a_known_collection() {
    let ws = TestWorkspace::new();
    let input = ws.write("people.csv", "Name\nAlice\n");
    let store_path = ws.path().join("store.json");

    bin()
        .args([
            "import",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store_path.to_str().unwrap(),
            "-c",
            "does-not-exist",
        ])
        .assert()
        .failure()
        .stderr(contains("Collection 'does-not-exist' not found"));
}
