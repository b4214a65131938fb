//! Error mapping and retry behaviour

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use strongbox_api::{ApiClient, ErrorWrapper};
use strongbox_core::domain::Username;
use strongbox_core::ports::{EndpointError, IServerApi, ServerError};

use crate::common;

#[tokio::test]
async fn test_endpoint_error_is_mapped() {
    let (server, client, account) = common::setup().await;
    common::mount_error(
        &server,
        "/get-public-key",
        404,
        ErrorWrapper::Endpoint(EndpointError::UserNotFound),
    )
    .await;

    let err = client
        .get_public_key(&account, &Username::new("nobody").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, ServerError::Endpoint(EndpointError::UserNotFound));
}

#[tokio::test]
async fn test_client_update_required() {
    let (server, client, account) = common::setup().await;
    common::mount_error(&server, "/get-updates", 426, ErrorWrapper::ClientUpdateRequired).await;

    let err = client.get_updates(&account, 0).await.unwrap_err();
    assert_eq!(err, ServerError::ClientUpdateRequired);
}

#[tokio::test]
async fn test_bare_upgrade_required_status() {
    let (server, client, account) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/get-updates"))
        .respond_with(ResponseTemplate::new(426))
        .mount(&server)
        .await;

    let err = client.get_updates(&account, 0).await.unwrap_err();
    assert_eq!(err, ServerError::ClientUpdateRequired);
}

#[tokio::test]
async fn test_rejections_are_not_retried() {
    let (server, client, account) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/upsert"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(ErrorWrapper::Endpoint(
                EndpointError::OldVersionIncorrect,
            )),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client.upsert(&account, vec![], vec![]).await.unwrap_err();
    assert_eq!(err, ServerError::Endpoint(EndpointError::OldVersionIncorrect));
}

#[tokio::test]
async fn test_unparseable_error_body() {
    let (server, client, account) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/get-usage"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.get_usage(&account).await.unwrap_err();
    assert!(matches!(err, ServerError::Unexpected(msg) if msg.contains("boom")));
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (server, client, account) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/get-file-ids"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_ok(&server, "/get-file-ids", serde_json::json!({ "ids": [] })).await;

    let ids = client.get_file_ids(&account).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreachable_after_retries() {
    // nothing listens on the discard port
    let client = ApiClient::new("http://127.0.0.1:9").with_retry_policy(common::fast_retry(2));
    let server = wiremock::MockServer::start().await;
    let account = common::account(&server);

    let err = client.get_file_ids(&account).await.unwrap_err();
    assert_eq!(err, ServerError::Unreachable);
}
