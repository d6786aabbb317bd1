//! CLI smoke tests.
//!
//! Stdout is never a TTY here, so the binary always emits JSON; tests
//! parse it instead of scraping text.

use assert_cmd::Command;
use crossdeck::store::ProfileStore;
use tempfile::TempDir;

fn crossdeck(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("crossdeck").unwrap();
    cmd.env_remove("CROSSDECK_PROFILE")
        .env_remove("CROSSDECK_PROFILES")
        .arg("--profiles-dir")
        .arg(root.path())
        .arg("--quiet");
    cmd
}

fn seed_bank(root: &TempDir) {
    let mut bank = ProfileStore::create(root.path(), "bank").unwrap();
    let nt = bank
        .add_notetype("Basic", &["Front".to_string(), "Back".to_string()])
        .unwrap();
    bank.add_note(
        nt.id,
        &["hello world".to_string(), "greeting".to_string()],
        &["lesson1".to_string()],
    )
    .unwrap();
}

#[test]
fn help_runs() {
    Command::cargo_bin("crossdeck")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn init_then_profiles() {
    let root = TempDir::new().unwrap();

    let output = crossdeck(&root).args(["init", "main"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["profile"], "main");

    let output = crossdeck(&root).arg("profiles").output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["profiles"], serde_json::json!(["main"]));
}

#[test]
fn init_twice_fails_with_validation_exit_code() {
    let root = TempDir::new().unwrap();
    crossdeck(&root).args(["init", "main"]).assert().success();

    let output = crossdeck(&root).args(["init", "main"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["error"]["code"], "PROFILE_EXISTS");
}

#[test]
fn search_finds_seeded_note() {
    let root = TempDir::new().unwrap();
    seed_bank(&root);

    let output = crossdeck(&root)
        .args(["search", "--from", "bank", "hello"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total_matches"], 1);
    assert_eq!(json["notes"][0]["fields"][0], "hello world");
}

#[test]
fn search_missing_profile_reports_source_error() {
    let root = TempDir::new().unwrap();

    let output = crossdeck(&root)
        .args(["search", "--from", "ghost", "hello"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["error"]["code"], "SOURCE_NOT_FOUND");
}

#[test]
fn import_end_to_end() {
    let root = TempDir::new().unwrap();
    seed_bank(&root);
    ProfileStore::create(root.path(), "main").unwrap();

    let output = crossdeck(&root)
        .args(["--profile", "main", "import", "--from", "bank", "hello"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["imported"], 1);

    let dest = ProfileStore::open(root.path(), "main").unwrap();
    assert_eq!(dest.note_count().unwrap(), 1);

    // second run: the note is now a duplicate
    let output = crossdeck(&root)
        .args(["--profile", "main", "import", "--from", "bank", "hello"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["imported"], 0);
    assert_eq!(json["report"]["skipped_duplicate"], 1);
}

#[test]
fn import_dry_run_writes_nothing() {
    let root = TempDir::new().unwrap();
    seed_bank(&root);
    ProfileStore::create(root.path(), "main").unwrap();

    let output = crossdeck(&root)
        .args([
            "--profile", "main", "import", "--from", "bank", "--dry-run", "hello",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["report"]["imported"], 1);

    let dest = ProfileStore::open(root.path(), "main").unwrap();
    assert_eq!(dest.note_count().unwrap(), 0);
}

#[test]
fn import_without_destination_is_invalid_argument() {
    let root = TempDir::new().unwrap();
    seed_bank(&root);

    let output = crossdeck(&root)
        .args(["import", "--from", "bank", "hello"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn import_into_itself_is_rejected() {
    let root = TempDir::new().unwrap();
    seed_bank(&root);

    let output = crossdeck(&root)
        .args(["--profile", "bank", "import", "--from", "bank", "hello"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["error"]["code"], "SAME_PROFILE");
}
