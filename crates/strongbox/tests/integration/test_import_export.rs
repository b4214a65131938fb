//! Copying files between disk and the tree

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use strongbox::{ExportProgress, ImportExportError, ImportStatus};

use crate::common::{server, signed_up};

/// trip/a.txt, trip/sub/b.md and readme.md under `dir`
fn disk_fixture(dir: &Path) {
    fs::create_dir_all(dir.join("trip/sub")).unwrap();
    fs::write(dir.join("trip/a.txt"), "day one").unwrap();
    fs::write(dir.join("trip/sub/b.md"), "# Day two").unwrap();
    fs::write(dir.join("readme.md"), "read me").unwrap();
}

#[tokio::test]
async fn test_import_tree() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();
    let disk = tempfile::tempdir().unwrap();
    disk_fixture(disk.path());

    let events = Mutex::new(Vec::new());
    let record = |status: ImportStatus| events.lock().unwrap().push(status);
    let sources = [disk.path().join("trip"), disk.path().join("readme.md")];
    let imported = alice
        .import_files(&sources, root.id, Some(&record))
        .await
        .unwrap();

    let names: Vec<&str> = imported.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["trip", "readme.md"]);
    assert_eq!(
        alice.list_paths(None).await.unwrap(),
        vec!["/", "/readme.md", "/trip/", "/trip/a.txt", "/trip/sub/", "/trip/sub/b.md"]
    );
    let b = alice.get_by_path("/trip/sub/b.md").await.unwrap();
    assert_eq!(alice.read_document(b.id).await.unwrap(), b"# Day two");

    let events = events.into_inner().unwrap();
    assert_eq!(events[0], ImportStatus::CalculatedTotal(5));
    let finished = events
        .iter()
        .filter(|e| matches!(e, ImportStatus::FinishedItem(_)))
        .count();
    assert_eq!(finished, 5);
}

#[tokio::test]
async fn test_import_twice_picks_free_names() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();
    let disk = tempfile::tempdir().unwrap();
    disk_fixture(disk.path());

    let sources = [disk.path().join("trip"), disk.path().join("readme.md")];
    alice.import_files(&sources, root.id, None).await.unwrap();
    let again = alice.import_files(&sources, root.id, None).await.unwrap();

    let names: Vec<&str> = again.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["trip-1", "readme-1.md"]);
    assert!(alice.get_by_path("/trip-1/sub/b.md").await.is_ok());
}

#[tokio::test]
async fn test_import_into_document_fails() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/doc.md").await.unwrap();
    let disk = tempfile::tempdir().unwrap();
    disk_fixture(disk.path());

    assert_eq!(
        alice
            .import_files(&[disk.path().join("readme.md")], doc.id, None)
            .await,
        Err(ImportExportError::FileNotFolder)
    );
}

#[tokio::test]
async fn test_import_missing_source_fails() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();
    let disk = tempfile::tempdir().unwrap();

    let result = alice
        .import_files(&[disk.path().join("absent")], root.id, None)
        .await;
    assert!(matches!(result, Err(ImportExportError::DiskPathInvalid(_))));
}

#[tokio::test]
async fn test_export_folder() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let plan = alice.create_at_path("/work/plan.md").await.unwrap();
    alice.create_at_path("/work/archive/").await.unwrap();
    alice.write_document(plan.id, b"ship it").await.unwrap();
    let work = alice.get_by_path("/work/").await.unwrap();
    let out = tempfile::tempdir().unwrap();

    let written = Mutex::new(0);
    let count = |_: ExportProgress| *written.lock().unwrap() += 1;
    alice
        .export_file(work.id, out.path(), false, Some(&count))
        .await
        .unwrap();

    assert_eq!(*written.lock().unwrap(), 3);
    assert_eq!(
        fs::read_to_string(out.path().join("work/plan.md")).unwrap(),
        "ship it"
    );
    assert!(out.path().join("work/archive").is_dir());
}

#[tokio::test]
async fn test_export_collision_needs_edit() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let plan = alice.create_at_path("/plan.md").await.unwrap();
    alice.write_document(plan.id, b"v1").await.unwrap();
    let out = tempfile::tempdir().unwrap();

    alice
        .export_file(plan.id, out.path(), false, None)
        .await
        .unwrap();
    alice.write_document(plan.id, b"v2").await.unwrap();

    let result = alice.export_file(plan.id, out.path(), false, None).await;
    assert!(matches!(result, Err(ImportExportError::DiskPathTaken(_))));
    assert_eq!(
        fs::read_to_string(out.path().join("plan.md")).unwrap(),
        "v1"
    );

    alice
        .export_file(plan.id, out.path(), true, None)
        .await
        .unwrap();
    assert_eq!(
        fs::read_to_string(out.path().join("plan.md")).unwrap(),
        "v2"
    );
}

#[tokio::test]
async fn test_export_to_file_path_fails() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let plan = alice.create_at_path("/plan.md").await.unwrap();
    let out = tempfile::tempdir().unwrap();
    let not_a_dir = out.path().join("file");
    fs::write(&not_a_dir, "x").unwrap();

    let result = alice.export_file(plan.id, &not_a_dir, false, None).await;
    assert!(matches!(result, Err(ImportExportError::DiskPathInvalid(_))));
}
