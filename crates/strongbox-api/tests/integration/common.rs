//! Shared test helpers for API integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server and returns an
//! ApiClient pointing at it.

use std::time::Duration;

use serde::Serialize;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use strongbox_api::{ApiClient, RetryPolicy};
use strongbox_core::domain::{Account, Username};

/// Retries fast enough to keep tests quick
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
    }
}

pub fn account(server: &MockServer) -> Account {
    Account::generate(Username::new("alice").unwrap(), server.uri())
}

/// Starts a mock server and a client without rate limiting
pub async fn setup() -> (MockServer, ApiClient, Account) {
    let server = MockServer::start().await;
    let client = ApiClient::new(server.uri()).with_retry_policy(fast_retry(2));
    let account = account(&server);
    (server, client, account)
}

/// Mounts `route` answering 200 with `body` as JSON
pub async fn mount_ok(server: &MockServer, route: &str, body: impl Serialize) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts `route` answering `status` with `body` as JSON
pub async fn mount_error(server: &MockServer, route: &str, status: u16, body: impl Serialize) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}
