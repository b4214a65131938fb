//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IServerApi`] - Remote metadata, chunk and usage operations
//! - [`IMetadataStore`] - Local account, base/local metadata and change log
//! - [`IContentStore`] - Local encrypted chunks and document manifests

pub mod content_store;
pub mod metadata_store;
pub mod server_api;

pub use content_store::{GcStats, IContentStore};
pub use metadata_store::{IMetadataStore, SyncCommit};
pub use server_api::{
    DocumentUpload, EndpointError, FileDiff, IServerApi, ServerError, ServerUsage, UpdatesResponse,
};
