//! Tree operations through the facade

use strongbox::{FileError, FileType, PathFilter};
use strongbox_core::domain::ChangeKind;

use crate::common::{server, signed_up};

#[tokio::test]
async fn test_create_write_sync_read() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();

    let notes = alice
        .create_file("Notes", root.id, FileType::Folder)
        .await
        .unwrap();
    let todo = alice
        .create_file("todo.md", notes.id, FileType::Document)
        .await
        .unwrap();
    alice.write_document(todo.id, b"buy milk").await.unwrap();

    let result = alice.sync(None).await.unwrap();
    assert_eq!(result.files_pushed, 2);
    assert!(alice.get_local_changes().await.unwrap().is_empty());

    assert_eq!(alice.read_document(todo.id).await.unwrap(), b"buy milk");
    assert_eq!(
        alice.get_path_by_id(todo.id).await.unwrap(),
        "/Notes/todo.md"
    );
    assert!(alice.get_usage().await.unwrap().server_usage.exact > 0);
}

#[tokio::test]
async fn test_new_document_reads_empty() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/empty.md").await.unwrap();
    assert!(alice.read_document(doc.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_to_taken_name_fails() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let a = alice.create_at_path("/a.md").await.unwrap();
    alice.create_at_path("/b.md").await.unwrap();

    assert_eq!(
        alice.rename_file(a.id, "b.md").await,
        Err(FileError::FileNameNotAvailable)
    );
    assert_eq!(alice.get_file_by_id(a.id).await.unwrap().name, "a.md");

    alice.rename_file(a.id, "c.md").await.unwrap();
    assert_eq!(
        alice.list_paths(None).await.unwrap(),
        vec!["/", "/b.md", "/c.md"]
    );
}

#[tokio::test]
async fn test_invalid_names_rejected() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();

    assert_eq!(
        alice.create_file("", root.id, FileType::Document).await,
        Err(FileError::FileNameEmpty)
    );
    assert_eq!(
        alice.create_file("a/b", root.id, FileType::Document).await,
        Err(FileError::FileNameContainsSlash)
    );
}

#[tokio::test]
async fn test_move_into_descendant_fails() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let outer = alice.create_at_path("/outer/").await.unwrap();
    let inner = alice.create_at_path("/outer/inner/").await.unwrap();

    assert_eq!(
        alice.move_file(outer.id, inner.id).await,
        Err(FileError::FolderMovedIntoItself)
    );
    assert_eq!(
        alice.list_folder_paths().await.unwrap(),
        vec!["/", "/outer/", "/outer/inner/"]
    );
}

#[tokio::test]
async fn test_move_document() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/inbox/letter.md").await.unwrap();
    let archive = alice.create_at_path("/archive/").await.unwrap();

    alice.move_file(doc.id, archive.id).await.unwrap();
    assert_eq!(
        alice.get_path_by_id(doc.id).await.unwrap(),
        "/archive/letter.md"
    );
    assert!(alice
        .get_children(archive.id)
        .await
        .unwrap()
        .iter()
        .any(|f| f.id == doc.id));
}

#[tokio::test]
async fn test_root_cannot_be_modified() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();

    assert_eq!(
        alice.delete_file(root.id).await,
        Err(FileError::RootModificationInvalid)
    );
    assert_eq!(
        alice.rename_file(root.id, "other").await,
        Err(FileError::RootModificationInvalid)
    );
}

#[tokio::test]
async fn test_delete_folder_cascades() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let folder = alice.create_at_path("/projects/").await.unwrap();
    let doc = alice.create_at_path("/projects/plan.md").await.unwrap();
    alice.sync(None).await.unwrap();

    alice.delete_file(folder.id).await.unwrap();
    assert_eq!(
        alice.get_file_by_id(doc.id).await,
        Err(FileError::FileNonexistent)
    );
    assert_eq!(alice.list_paths(None).await.unwrap(), vec!["/"]);

    alice.sync(None).await.unwrap();
    assert_eq!(
        alice.get_by_path("/projects/plan.md").await,
        Err(FileError::FileNonexistent)
    );
}

#[tokio::test]
async fn test_paths_round_trip() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    alice.create_at_path("/a/b/c.md").await.unwrap();
    alice.create_at_path("/a/d/").await.unwrap();
    alice.create_at_path("/e.txt").await.unwrap();

    for path in alice.list_folder_paths().await.unwrap() {
        let file = alice.get_by_path(&path).await.unwrap();
        assert_eq!(alice.get_path_by_id(file.id).await.unwrap(), path);
    }

    assert_eq!(
        alice
            .list_paths(Some(PathFilter::DocumentsOnly))
            .await
            .unwrap(),
        vec!["/a/b/c.md", "/e.txt"]
    );
    assert_eq!(
        alice
            .list_paths(Some(PathFilter::LeafNodesOnly))
            .await
            .unwrap(),
        vec!["/a/b/c.md", "/a/d/", "/e.txt"]
    );
}

#[tokio::test]
async fn test_children_recursively() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let top = alice.create_at_path("/top/").await.unwrap();
    alice.create_at_path("/top/one.md").await.unwrap();
    alice.create_at_path("/top/sub/two.md").await.unwrap();
    alice.create_at_path("/elsewhere.md").await.unwrap();

    let files = alice.get_and_get_children_recursively(top.id).await.unwrap();
    assert_eq!(files[0].id, top.id);
    let mut names: Vec<&str> = files[1..].iter().map(|f| f.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["one.md", "sub", "two.md"]);

    assert_eq!(alice.get_children(top.id).await.unwrap().len(), 2);
    assert_eq!(alice.list_metadatas().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_local_changes_collapse() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/draft.md").await.unwrap();
    alice.rename_file(doc.id, "final.md").await.unwrap();

    let changes = alice.get_local_changes().await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].file_id, doc.id);
    assert_eq!(changes[0].kind, ChangeKind::Create);

    let status = alice.calculate_work().await.unwrap();
    assert!(!status.is_empty());
}

#[tokio::test]
async fn test_unchanged_write_is_not_staged() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/same.md").await.unwrap();
    alice.write_document(doc.id, b"content").await.unwrap();
    alice.sync(None).await.unwrap();

    alice.write_document(doc.id, b"content").await.unwrap();
    assert!(alice.get_local_changes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_uncompressed_usage() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let a = alice.create_at_path("/a.md").await.unwrap();
    let b = alice.create_at_path("/dir/b.md").await.unwrap();
    alice.write_document(a.id, b"1234").await.unwrap();
    alice.write_document(b.id, b"5678").await.unwrap();

    let usage = alice.get_uncompressed_usage().await.unwrap();
    assert_eq!(usage.exact, 8);
    assert_eq!(usage.readable, "8 B");
}
