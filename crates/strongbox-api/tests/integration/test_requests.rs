//! Successful calls through the IServerApi port

use strongbox_api::{RequestWrapper, CLIENT_VERSION};
use strongbox_api::request::GetUpdatesRequest;
use strongbox_core::domain::{FileId, FileUsage, LazyTree, ServerMeta};
use strongbox_core::ports::{IServerApi, UpdatesResponse};

use crate::common;

#[tokio::test]
async fn test_get_updates_decodes_response() {
    let (server, client, account) = common::setup().await;

    let root = LazyTree::create_root(&account).unwrap();
    let meta = ServerMeta {
        file: root.sign(&account),
        metadata_version: 7,
        content_version: 7,
    };
    let body = UpdatesResponse {
        as_of: 7,
        files: vec![meta.clone()],
    };
    common::mount_ok(&server, "/get-updates", &body).await;

    let updates = client.get_updates(&account, 0).await.expect("get_updates failed");
    assert_eq!(updates.as_of, 7);
    assert_eq!(updates.files, vec![meta]);
}

#[tokio::test]
async fn test_request_envelope_is_signed() {
    let (server, client, account) = common::setup().await;
    common::mount_ok(&server, "/get-updates", UpdatesResponse::default()).await;

    client.get_updates(&account, 42).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let wrapper: RequestWrapper<GetUpdatesRequest> =
        serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(wrapper.client_version, CLIENT_VERSION);
    assert_eq!(wrapper.signed_request.value.since_metadata_version, 42);
    assert_eq!(wrapper.signed_request.public_key, account.public_keys());
    assert!(wrapper.signed_request.verify().is_ok());
}

#[tokio::test]
async fn test_get_file_ids() {
    let (server, client, account) = common::setup().await;
    let ids = vec![FileId::new(), FileId::new()];
    common::mount_ok(&server, "/get-file-ids", serde_json::json!({ "ids": ids })).await;

    let fetched = client.get_file_ids(&account).await.unwrap();
    assert_eq!(fetched, ids);
}

#[tokio::test]
async fn test_get_usage() {
    let (server, client, account) = common::setup().await;
    let usage = FileUsage {
        file_id: FileId::new(),
        size_bytes: 1_500,
    };
    common::mount_ok(
        &server,
        "/get-usage",
        serde_json::json!({ "usages": [usage.clone()], "cap": 1_000_000 }),
    )
    .await;

    let fetched = client.get_usage(&account).await.unwrap();
    assert_eq!(fetched.cap, 1_000_000);
    assert_eq!(fetched.usages, vec![usage]);
}

#[tokio::test]
async fn test_unit_response_accepts_null_body() {
    let (server, client, account) = common::setup().await;
    common::mount_ok(&server, "/delete-account", serde_json::Value::Null).await;

    client.delete_account(&account).await.unwrap();
}

#[tokio::test]
async fn test_empty_batches_skip_the_network() {
    let (server, client, account) = common::setup().await;

    assert!(client.missing_chunks(&account, vec![]).await.unwrap().is_empty());
    assert!(client.get_chunks(&account, vec![]).await.unwrap().is_empty());
    client.put_chunks(&account, vec![]).await.unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}
