//! Integration tests for strongbox-api
//!
//! Uses wiremock to simulate the Strongbox server and verifies the
//! request envelope, response decoding, error mapping and retries of
//! the ApiClient.

mod common;

mod test_errors;
mod test_requests;
