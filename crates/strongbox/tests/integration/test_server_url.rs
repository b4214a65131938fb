//! Accounts talk to the server named by their URL, not the configured one

use strongbox::Strongbox;
use strongbox_api::request::{GetPublicKeyResponse, NewAccountRequest, NewAccountResponse};
use strongbox_api::RequestWrapper;
use strongbox_core::config::Config;
use strongbox_core::domain::{Account, ServerMeta, Username};
use strongbox_core::ports::UpdatesResponse;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common;

fn config_pointing_at(dir: &TempDir, server: &MockServer) -> Config {
    let mut config = common::config(dir);
    config.server.api_url = server.uri();
    config.server.max_retries = 0;
    config
}

/// Accepts whatever root folder a registration carries
async fn mount_registration(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/new-account"))
        .respond_with(|request: &Request| {
            let wrapper: RequestWrapper<NewAccountRequest> =
                serde_json::from_slice(&request.body).unwrap();
            ResponseTemplate::new(200).set_body_json(NewAccountResponse {
                root: ServerMeta {
                    file: wrapper.signed_request.value.root_folder,
                    metadata_version: 1,
                    content_version: 1,
                },
            })
        })
        .mount(server)
        .await;
}

async fn mount_json(server: &MockServer, route: &str, body: impl serde::Serialize) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn routes(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_create_account_registers_with_its_own_server() {
    let configured = MockServer::start().await;
    let chosen = MockServer::start().await;
    mount_registration(&chosen).await;
    mount_json(&chosen, "/get-usage", serde_json::json!({ "usages": [], "cap": 1000 })).await;
    mount_json(
        &chosen,
        "/get-updates",
        UpdatesResponse {
            as_of: 1,
            files: vec![],
        },
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let sb = Strongbox::open(config_pointing_at(&dir, &configured))
        .await
        .unwrap();
    let account = sb.create_account("alice", &chosen.uri(), false).await.unwrap();
    assert_eq!(account.api_url(), chosen.uri());

    // later calls from the handle and its sync engine follow the account
    assert_eq!(sb.get_usage().await.unwrap().server_usage.exact, 0);
    assert!(sb.calculate_work().await.unwrap().work_units.is_empty());

    assert!(configured.received_requests().await.unwrap().is_empty());
    assert_eq!(routes(&chosen).await, ["/new-account", "/get-usage", "/get-updates"]);
}

#[tokio::test]
async fn test_import_account_asks_the_account_server() {
    let configured = MockServer::start().await;
    let home = MockServer::start().await;
    let account = Account::generate(Username::new("alice").unwrap(), home.uri());
    mount_json(
        &home,
        "/get-public-key",
        GetPublicKeyResponse {
            key: account.public_keys(),
        },
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let sb = Strongbox::open(config_pointing_at(&dir, &configured))
        .await
        .unwrap();
    let imported = sb
        .import_account(&account.to_account_string().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(imported.api_url(), home.uri());
    assert!(configured.received_requests().await.unwrap().is_empty());
    assert_eq!(routes(&home).await, ["/get-public-key"]);
}

#[tokio::test]
async fn test_import_account_with_explicit_server() {
    let configured = MockServer::start().await;
    let stale = MockServer::start().await;
    let moved = MockServer::start().await;
    let account = Account::generate(Username::new("alice").unwrap(), stale.uri());
    mount_json(
        &moved,
        "/get-public-key",
        GetPublicKeyResponse {
            key: account.public_keys(),
        },
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_pointing_at(&dir, &configured);
    let sb = Strongbox::open(config.clone()).await.unwrap();
    let imported = sb
        .import_account(&account.to_account_string().unwrap(), Some(&moved.uri()))
        .await
        .unwrap();
    assert_eq!(imported.api_url(), moved.uri());
    assert!(configured.received_requests().await.unwrap().is_empty());
    assert!(stale.received_requests().await.unwrap().is_empty());
    assert_eq!(routes(&moved).await, ["/get-public-key"]);
    drop(sb);

    let reopened = Strongbox::open(config).await.unwrap();
    assert_eq!(reopened.get_account().await.unwrap().api_url(), moved.uri());
}
