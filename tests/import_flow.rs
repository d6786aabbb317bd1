//! End-to-end tests of the search/import pipeline over the library API.

use std::path::Path;

use crossdeck::config::ImportOptions;
use crossdeck::error::Error;
use crossdeck::import::{Decision, ImportSession};
use crossdeck::store::ProfileStore;
use tempfile::TempDir;

fn basic_fields() -> Vec<String> {
    vec!["Front".to_string(), "Back".to_string()]
}

fn create_profile(root: &Path, name: &str) -> ProfileStore {
    let mut store = ProfileStore::create(root, name).unwrap();
    store.add_notetype("Basic", &basic_fields()).unwrap();
    store
}

fn add_note(store: &mut ProfileStore, fields: &[&str], tags: &[&str]) {
    let nt = store.notetype_by_name("Basic").unwrap().unwrap();
    store
        .add_note(
            nt.id,
            &fields.iter().map(ToString::to_string).collect::<Vec<_>>(),
            &tags.iter().map(ToString::to_string).collect::<Vec<_>>(),
        )
        .unwrap();
}

fn write_media(store: &ProfileStore, name: &str, bytes: &[u8]) {
    std::fs::write(store.media().file_path(name), bytes).unwrap();
}

fn run_import(root: &Path, from: &str, into: &str, query: &str) -> crossdeck::import::ImportReport {
    let mut session = ImportSession::new(root, ImportOptions::default());
    session.open(from).unwrap();
    session.search(query).unwrap();
    let mut dest = ProfileStore::open(root, into).unwrap();
    session.resolve(&dest).unwrap();
    session.commit(&mut dest).unwrap()
}

/// End-to-end scenario: one duplicate, one media collision, one entirely
/// new note.
#[test]
fn three_note_scenario_counts() {
    let tmp = TempDir::new().unwrap();
    let mut dest = create_profile(tmp.path(), "main");
    add_note(&mut dest, &["common front", "common back"], &[]);
    write_media(&dest, "pic.jpg", b"bytes-A");
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &["common front", "common back"], &["batch"]);
    add_note(
        &mut bank,
        &[r#"collider <img src="pic.jpg">"#, "b"],
        &["batch"],
    );
    add_note(&mut bank, &["entirely new", "b"], &["batch"]);
    write_media(&bank, "pic.jpg", b"bytes-B");
    drop(bank);

    let report = run_import(tmp.path(), "bank", "main", "tag:batch");

    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped_duplicate, 1);
    assert_eq!(report.renamed_media, 1);
    assert_eq!(report.failed, 0);

    let dest = ProfileStore::open(tmp.path(), "main").unwrap();
    assert_eq!(dest.note_count().unwrap(), 3);
}

/// Importing the same query twice leaves the destination unchanged: the
/// second run resolves everything to Skip-duplicate, including the note
/// whose media was renamed on the first run.
#[test]
fn import_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let dest = create_profile(tmp.path(), "main");
    write_media(&dest, "pic.jpg", b"bytes-A");
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &["word one", "def"], &["batch"]);
    add_note(
        &mut bank,
        &[r#"word two <img src="pic.jpg">"#, "def"],
        &["batch"],
    );
    write_media(&bank, "pic.jpg", b"bytes-B");
    drop(bank);

    let first = run_import(tmp.path(), "bank", "main", "tag:batch");
    assert_eq!(first.imported, 2);
    assert_eq!(first.renamed_media, 1);

    let dest = ProfileStore::open(tmp.path(), "main").unwrap();
    let notes_after_first = dest.note_count().unwrap();
    let media_after_first = dest.media().snapshot().unwrap().len();
    drop(dest);

    let second = run_import(tmp.path(), "bank", "main", "tag:batch");
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped_duplicate, 2);

    let dest = ProfileStore::open(tmp.path(), "main").unwrap();
    assert_eq!(dest.note_count().unwrap(), notes_after_first);
    assert_eq!(dest.media().snapshot().unwrap().len(), media_after_first);
}

/// Colliding filename with different bytes: the original file is
/// untouched, the incoming bytes land under a renamed file, and the
/// imported note references the new name.
#[test]
fn rename_keeps_both_files_and_rewrites_the_note() {
    let tmp = TempDir::new().unwrap();
    let dest = create_profile(tmp.path(), "main");
    write_media(&dest, "pic.jpg", b"bytes-A");
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &[r#"front <img src="pic.jpg">"#, "back"], &[]);
    write_media(&bank, "pic.jpg", b"bytes-B");
    drop(bank);

    let report = run_import(tmp.path(), "bank", "main", "front");
    assert_eq!(report.renames.len(), 1);
    let new_name = report.renames[0].to.clone();
    assert_ne!(new_name, "pic.jpg");

    let dest = ProfileStore::open(tmp.path(), "main").unwrap();
    assert_eq!(
        std::fs::read(dest.media().file_path("pic.jpg")).unwrap(),
        b"bytes-A"
    );
    assert_eq!(
        std::fs::read(dest.media().file_path(&new_name)).unwrap(),
        b"bytes-B"
    );

    let imported = dest
        .all_notes()
        .unwrap()
        .into_iter()
        .find(|n| n.first_field().starts_with("front"))
        .unwrap();
    assert!(imported.fields[0].contains(&new_name));
    assert!(!imported.fields[0].contains(r#"src="pic.jpg""#));
}

/// Same bytes under a different name: nothing is copied and the imported
/// note references the destination's existing file.
#[test]
fn same_content_is_deduplicated_across_names() {
    let tmp = TempDir::new().unwrap();
    let dest = create_profile(tmp.path(), "main");
    write_media(&dest, "pic.jpg", b"shared-bytes");
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &[r#"front <img src="clip.jpg">"#, "back"], &[]);
    write_media(&bank, "clip.jpg", b"shared-bytes");
    drop(bank);

    let report = run_import(tmp.path(), "bank", "main", "front");
    assert_eq!(report.imported, 1);
    assert_eq!(report.media_copied, 0);
    assert_eq!(report.media_deduped, 1);

    let dest = ProfileStore::open(tmp.path(), "main").unwrap();
    assert!(!dest.media().exists("clip.jpg"));

    let imported = dest.all_notes().unwrap().pop().unwrap();
    assert!(imported.fields[0].contains("pic.jpg"));
}

/// An injected media failure mid-commit rolls the whole batch back.
#[test]
fn failed_commit_leaves_destination_untouched() {
    let tmp = TempDir::new().unwrap();
    create_profile(tmp.path(), "main");

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &[r#"one <img src="a.jpg">"#, "b"], &[]);
    add_note(&mut bank, &[r#"two <img src="b.jpg">"#, "b"], &[]);
    add_note(&mut bank, &["three plain", "b"], &[]);
    write_media(&bank, "a.jpg", b"a-bytes");
    write_media(&bank, "b.jpg", b"b-bytes");
    let bank_media = bank.media().clone();
    drop(bank);

    let mut session = ImportSession::new(tmp.path(), ImportOptions {
        allow_empty_search: true,
        ..ImportOptions::default()
    });
    session.open("bank").unwrap();
    session.search("").unwrap();
    let mut dest = ProfileStore::open(tmp.path(), "main").unwrap();
    session.resolve(&dest).unwrap();

    // injected failure: the second note's blob vanishes between resolve
    // and commit
    std::fs::remove_file(bank_media.file_path("b.jpg")).unwrap();

    let err = session.commit(&mut dest).unwrap_err();
    assert!(matches!(err, Error::CommitFailed { .. }));

    assert_eq!(dest.note_count().unwrap(), 0);
    assert!(dest.media().snapshot().unwrap().is_empty());

    // the session survives a failed commit; restoring the blob lets the
    // retry succeed
    std::fs::write(bank_media.file_path("b.jpg"), b"b-bytes").unwrap();
    let report = session.commit(&mut dest).unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(dest.note_count().unwrap(), 3);
}

/// Resolving the same synthetic batch twice yields byte-identical
/// reports.
#[test]
fn resolution_reports_are_deterministic() {
    let tmp = TempDir::new().unwrap();
    let dest = create_profile(tmp.path(), "main");
    write_media(&dest, "pic.jpg", b"existing");
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    for i in 0..100 {
        add_note(
            &mut bank,
            &[&format!(r#"word{i} <img src="pic.jpg">"#), "def"],
            &["batch"],
        );
    }
    write_media(&bank, "pic.jpg", b"incoming");
    drop(bank);

    let preview = || {
        let mut session = ImportSession::new(tmp.path(), ImportOptions::default());
        session.open("bank").unwrap();
        session.search("tag:batch").unwrap();
        let dest = ProfileStore::open(tmp.path(), "main").unwrap();
        session.resolve(&dest).unwrap();
        serde_json::to_string(&session.preview().unwrap()).unwrap()
    };

    assert_eq!(preview(), preview());
}

/// Note types are created on demand by default and fail candidates when
/// creation is disabled.
#[test]
fn notetype_creation_policy() {
    let tmp = TempDir::new().unwrap();
    ProfileStore::create(tmp.path(), "empty").unwrap();

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &["front", "back"], &["batch"]);
    drop(bank);

    // default: create on demand
    let report = run_import(tmp.path(), "bank", "empty", "tag:batch");
    assert_eq!(report.imported, 1);
    assert_eq!(report.notetypes_created, vec!["Basic".to_string()]);

    // disabled: the candidate fails, the batch does not abort
    ProfileStore::create(tmp.path(), "empty2").unwrap();
    let options = ImportOptions {
        create_missing_notetypes: false,
        ..ImportOptions::default()
    };
    let mut session = ImportSession::new(tmp.path(), options);
    session.open("bank").unwrap();
    session.search("tag:batch").unwrap();
    let mut dest = ProfileStore::open(tmp.path(), "empty2").unwrap();
    let candidates = session.resolve(&dest).unwrap();
    assert!(matches!(candidates[0].decision, Decision::Fail(_)));

    let report = session.commit(&mut dest).unwrap();
    assert_eq!(report.imported, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(dest.note_count().unwrap(), 0);
}

/// Duplicate detection hashes content, not ids or markup.
#[test]
fn duplicate_detection_ignores_markup_differences() {
    let tmp = TempDir::new().unwrap();
    let mut dest = create_profile(tmp.path(), "main");
    add_note(&mut dest, &["<b>word</b>", "definition"], &[]);
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &["word", "definition"], &["batch"]);
    drop(bank);

    let report = run_import(tmp.path(), "bank", "main", "tag:batch");
    assert_eq!(report.imported, 0);
    assert_eq!(report.skipped_duplicate, 1);
}

/// The media content hash, not the filename, carries identity: a renamed
/// source file of the same bytes is still a duplicate note.
#[test]
fn duplicate_detection_survives_media_renames() {
    let tmp = TempDir::new().unwrap();
    let mut dest = create_profile(tmp.path(), "main");
    add_note(&mut dest, &[r#"x <img src="old.jpg">"#, "b"], &[]);
    write_media(&dest, "old.jpg", b"same-bytes");
    drop(dest);

    let mut bank = create_profile(tmp.path(), "bank");
    add_note(&mut bank, &[r#"x <img src="new.jpg">"#, "b"], &["batch"]);
    write_media(&bank, "new.jpg", b"same-bytes");
    drop(bank);

    let report = run_import(tmp.path(), "bank", "main", "tag:batch");
    assert_eq!(report.imported, 0);
    assert_eq!(report.skipped_duplicate, 1);
}
