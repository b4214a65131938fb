//! Sharing between accounts

use strongbox::{DocumentError, FileError, FileType, ShareError, ShareMode};

use crate::common::{server, signed_up};

#[tokio::test]
async fn test_share_accept_and_read() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let bob = signed_up(&server, "bob").await;

    let folder = alice.create_at_path("/shared/").await.unwrap();
    let doc = alice.create_at_path("/shared/doc.md").await.unwrap();
    alice.write_document(doc.id, b"for bob").await.unwrap();
    alice
        .share_file(folder.id, "bob", ShareMode::Read)
        .await
        .unwrap();
    alice.sync(None).await.unwrap();

    let shared = alice.get_file_by_id(folder.id).await.unwrap();
    assert_eq!(shared.shares.len(), 1);
    assert_eq!(shared.shares[0].shared_with.as_str(), "bob");

    bob.sync(None).await.unwrap();
    let pending = bob.get_pending_shares().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, folder.id);
    assert_eq!(pending[0].owner.as_str(), "alice");
    assert!(bob.get_by_path("/shared/doc.md").await.is_err());

    let bob_root = bob.get_root().await.unwrap();
    bob.create_link("shared", bob_root.id, folder.id)
        .await
        .unwrap();
    assert!(bob.get_pending_shares().await.unwrap().is_empty());

    let via_path = bob.get_by_path("/shared/doc.md").await.unwrap();
    assert_eq!(via_path.id, doc.id);
    assert_eq!(bob.read_document(doc.id).await.unwrap(), b"for bob");

    // the link survives a sync
    bob.sync(None).await.unwrap();
    assert_eq!(
        bob.list_paths(None).await.unwrap(),
        vec!["/", "/shared/", "/shared/doc.md"]
    );
}

#[tokio::test]
async fn test_accept_share_by_path() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let bob = signed_up(&server, "bob").await;

    let doc = alice.create_at_path("/recipe.md").await.unwrap();
    alice.write_document(doc.id, b"flour").await.unwrap();
    alice.share_file(doc.id, "bob", ShareMode::Read).await.unwrap();
    alice.sync(None).await.unwrap();
    bob.sync(None).await.unwrap();

    let link = bob
        .create_link_at_path("/from alice/recipe.md", doc.id)
        .await
        .unwrap();
    assert!(matches!(link.file_type, FileType::Link { target } if target == doc.id));
    assert!(bob.get_pending_shares().await.unwrap().is_empty());
    assert_eq!(
        bob.list_paths(None).await.unwrap(),
        vec!["/", "/from alice/", "/from alice/recipe.md"]
    );
    assert_eq!(bob.read_document(doc.id).await.unwrap(), b"flour");

    assert_eq!(
        bob.create_link_at_path("/again.md", doc.id).await.err(),
        Some(FileError::MultipleLinksToSameFile)
    );
    let own = bob.create_at_path("/own.md").await.unwrap();
    assert_eq!(
        bob.create_link_at_path("/own link.md", own.id).await.err(),
        Some(FileError::LinkTargetIsOwned)
    );
}

#[tokio::test]
async fn test_read_share_is_read_only() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let bob = signed_up(&server, "bob").await;
    signed_up(&server, "carol").await;

    let doc = alice.create_at_path("/memo.md").await.unwrap();
    alice.share_file(doc.id, "bob", ShareMode::Read).await.unwrap();
    alice.sync(None).await.unwrap();
    bob.sync(None).await.unwrap();

    assert_eq!(
        bob.write_document(doc.id, b"edited").await,
        Err(DocumentError::InsufficientPermission)
    );
    assert_eq!(
        bob.share_file(doc.id, "carol", ShareMode::Read).await,
        Err(ShareError::InsufficientPermission)
    );
}

#[tokio::test]
async fn test_write_share_edits_reach_owner() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let bob = signed_up(&server, "bob").await;

    let folder = alice.create_at_path("/team/").await.unwrap();
    alice
        .share_file(folder.id, "bob", ShareMode::Write)
        .await
        .unwrap();
    alice.sync(None).await.unwrap();

    bob.sync(None).await.unwrap();
    let bob_root = bob.get_root().await.unwrap();
    let link = bob
        .create_link("team", bob_root.id, folder.id)
        .await
        .unwrap();
    let added = bob
        .create_file("from-bob.md", link.id, FileType::Document)
        .await
        .unwrap();
    bob.write_document(added.id, b"hi alice").await.unwrap();
    bob.sync(None).await.unwrap();

    alice.sync(None).await.unwrap();
    let seen = alice.get_by_path("/team/from-bob.md").await.unwrap();
    assert_eq!(seen.id, added.id);
    assert_eq!(seen.owner.as_str(), "alice");
    assert_eq!(alice.read_document(added.id).await.unwrap(), b"hi alice");
}

#[tokio::test]
async fn test_reject_pending_share() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let bob = signed_up(&server, "bob").await;

    let doc = alice.create_at_path("/unwanted.md").await.unwrap();
    alice.share_file(doc.id, "bob", ShareMode::Read).await.unwrap();
    alice.sync(None).await.unwrap();
    bob.sync(None).await.unwrap();
    assert_eq!(bob.get_pending_shares().await.unwrap().len(), 1);

    bob.delete_pending_share(doc.id).await.unwrap();
    assert!(bob.get_pending_shares().await.unwrap().is_empty());

    bob.sync(None).await.unwrap();
    assert!(bob.get_pending_shares().await.unwrap().is_empty());
    assert!(bob.delete_pending_share(doc.id).await.is_err());
}

#[tokio::test]
async fn test_share_errors() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    signed_up(&server, "bob").await;
    let root = alice.get_root().await.unwrap();
    let doc = alice.create_at_path("/doc.md").await.unwrap();

    assert_eq!(
        alice.share_file(root.id, "bob", ShareMode::Read).await,
        Err(ShareError::CannotShareRoot)
    );
    assert_eq!(
        alice.share_file(doc.id, "nobody", ShareMode::Read).await,
        Err(ShareError::UserNotFound)
    );
    assert_eq!(
        alice.share_file(doc.id, "Not Valid!", ShareMode::Read).await,
        Err(ShareError::UsernameInvalid)
    );

    alice.share_file(doc.id, "bob", ShareMode::Write).await.unwrap();
    assert_eq!(
        alice.share_file(doc.id, "bob", ShareMode::Read).await,
        Err(ShareError::ShareAlreadyExists)
    );
}

#[tokio::test]
async fn test_link_to_own_file_rejected() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let root = alice.get_root().await.unwrap();
    let doc = alice.create_at_path("/mine.md").await.unwrap();

    assert_eq!(
        alice.create_link("link", root.id, doc.id).await,
        Err(FileError::LinkTargetIsOwned)
    );
}
