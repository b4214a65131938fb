//! End-to-end tests for the strongbox facade
//!
//! Most tests open handles on temporary data directories, all talking to
//! the same in-process server. Server selection is tested against wiremock.

mod common;

mod test_account;
mod test_documents;
mod test_files;
mod test_import_export;
mod test_search;
mod test_server_url;
mod test_sharing;
