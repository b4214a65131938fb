//! Account creation, import, export and removal

use strongbox::{
    AccountError, CreateAccountError, FileError, ImportAccountError, Strongbox, SyncError,
    UsageError,
};
use strongbox_core::domain::{Account, Username};

use crate::common::{config, device, second_device, server, signed_up, API_URL};

#[tokio::test]
async fn test_create_account() {
    let server = server();
    let alice = device(&server).await;

    let account = alice.create_account("alice", API_URL, false).await.unwrap();
    assert_eq!(account.username().as_str(), "alice");
    assert_eq!(alice.get_account().await.unwrap().username(), account.username());

    let root = alice.get_root().await.unwrap();
    assert_eq!(root.id, root.parent);
    assert_eq!(alice.list_paths(None).await.unwrap(), vec!["/"]);
}

#[tokio::test]
async fn test_second_account_on_device_rejected() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    assert_eq!(
        alice.create_account("bob", API_URL, false).await,
        Err(CreateAccountError::AccountExists)
    );
}

#[tokio::test]
async fn test_invalid_username() {
    let server = server();
    let device = device(&server).await;
    assert_eq!(
        device.create_account("Alice!", API_URL, false).await,
        Err(CreateAccountError::UsernameInvalid)
    );
    assert_eq!(device.get_account().await, Err(AccountError::NoAccount));
}

#[tokio::test]
async fn test_username_taken() {
    let server = server();
    signed_up(&server, "alice").await;

    let other = device(&server).await;
    assert_eq!(
        other.create_account("alice", API_URL, false).await,
        Err(CreateAccountError::UsernameTaken)
    );
}

#[tokio::test]
async fn test_server_unreachable_on_create() {
    let server = server();
    server.set_offline(true);
    let device = device(&server).await;
    assert_eq!(
        device.create_account("alice", API_URL, false).await,
        Err(CreateAccountError::ServerUnreachable)
    );
    assert_eq!(device.get_account().await, Err(AccountError::NoAccount));
}

#[tokio::test]
async fn test_welcome_document() {
    let server = server();
    let alice = device(&server).await;
    alice.create_account("alice", API_URL, true).await.unwrap();

    let welcome = alice.get_by_path("/welcome.md").await.unwrap();
    let content = alice.read_document(welcome.id).await.unwrap();
    assert!(String::from_utf8(content).unwrap().starts_with("# Welcome"));

    let result = alice.sync(None).await.unwrap();
    assert_eq!(result.files_pushed, 1);
}

#[tokio::test]
async fn test_import_on_second_device() {
    let server = server();
    let laptop = signed_up(&server, "alice").await;
    let doc = laptop.create_at_path("/notes/todo.md").await.unwrap();
    laptop.write_document(doc.id, b"buy milk").await.unwrap();
    laptop.sync(None).await.unwrap();

    let phone = second_device(&server, &laptop).await;
    assert_eq!(
        phone.list_paths(None).await.unwrap(),
        vec!["/", "/notes/", "/notes/todo.md"]
    );
    assert_eq!(phone.read_document(doc.id).await.unwrap(), b"buy milk");
}

#[tokio::test]
async fn test_import_before_sync_has_never_synced() {
    let server = server();
    let laptop = signed_up(&server, "alice").await;
    let phone = device(&server).await;
    phone
        .import_account(&laptop.export_account_string().await.unwrap(), None)
        .await
        .unwrap();

    assert_eq!(phone.get_last_synced_human_string().await.unwrap(), "never");
    phone.sync(None).await.unwrap();
    assert_ne!(phone.get_last_synced_human_string().await.unwrap(), "never");
    assert!(phone.get_last_synced().await.unwrap() > 0);
}

#[tokio::test]
async fn test_import_corrupted_string() {
    let server = server();
    let device = device(&server).await;
    assert_eq!(
        device.import_account("definitely not an account", None).await,
        Err(ImportAccountError::AccountStringCorrupted)
    );
}

#[tokio::test]
async fn test_import_key_mismatch() {
    let server = server();
    signed_up(&server, "alice").await;

    let impostor = Account::generate(Username::new("alice").unwrap(), API_URL);
    let device = device(&server).await;
    assert_eq!(
        device
            .import_account(&impostor.to_account_string().unwrap(), None)
            .await,
        Err(ImportAccountError::UsernamePublicKeyMismatch)
    );
    assert_eq!(device.get_account().await, Err(AccountError::NoAccount));
}

#[tokio::test]
async fn test_import_unknown_account() {
    let server = server();
    let stranger = Account::generate(Username::new("carol").unwrap(), API_URL);
    let device = device(&server).await;
    assert_eq!(
        device
            .import_account(&stranger.to_account_string().unwrap(), None)
            .await,
        Err(ImportAccountError::AccountDoesNotExist)
    );
}

#[tokio::test]
async fn test_import_when_account_exists() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let account_string = alice.export_account_string().await.unwrap();
    assert_eq!(
        alice.import_account(&account_string, None).await,
        Err(ImportAccountError::AccountExists)
    );
}

#[tokio::test]
async fn test_export_private_key() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let key = alice.export_account_private_key().await.unwrap();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_operations_without_account() {
    let server = server();
    let device = device(&server).await;

    assert_eq!(device.get_root().await, Err(FileError::NoAccount));
    assert_eq!(device.get_usage().await, Err(UsageError::NoAccount));
    assert_eq!(device.sync(None).await, Err(SyncError::NoAccount));
    assert_eq!(
        device.export_account_string().await,
        Err(AccountError::NoAccount)
    );
}

#[tokio::test]
async fn test_logout_wipes_device() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    alice.create_at_path("/unsynced.md").await.unwrap();

    let dir = alice.dir;
    alice.sb.logout_and_exit().await.unwrap();

    let reopened = Strongbox::open_with_server(config(&dir), server.clone())
        .await
        .unwrap();
    assert_eq!(reopened.get_account().await, Err(AccountError::NoAccount));

    // the account still exists on the server
    let again = reopened.create_account("alice", API_URL, false).await;
    assert_eq!(again, Err(CreateAccountError::UsernameTaken));
}

#[tokio::test]
async fn test_reopen_keeps_state() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    let doc = alice.create_at_path("/todo.md").await.unwrap();
    alice.write_document(doc.id, b"persisted").await.unwrap();

    let dir = alice.dir;
    drop(alice.sb);

    let reopened = Strongbox::open_with_server(config(&dir), server.clone())
        .await
        .unwrap();
    assert_eq!(reopened.read_document(doc.id).await.unwrap(), b"persisted");
    assert_eq!(reopened.get_local_changes().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_account() {
    let server = server();
    let alice = signed_up(&server, "alice").await;
    alice.delete_account().await.unwrap();

    assert_eq!(alice.get_account().await, Err(AccountError::NoAccount));
    assert_eq!(server.file_count().await, 0);
}
