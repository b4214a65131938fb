//! Strongbox Server - In-process reference server
//!
//! [`InMemoryServer`] implements the `IServerApi` port entirely in memory.
//! It enforces the same rules a deployed server does:
//!
//! - Signed metadata and registered public keys
//! - A monotonic global version counter with optimistic concurrency
//! - Ownership and share-based authorization
//! - Structural validation of the resulting file tree
//! - Per-user data caps
//!
//! Test switches simulate an unreachable server, a minimum client
//! version, and disabled registration. Several clients (devices or
//! users) can share one instance through an `Arc`.

pub mod server;
mod state;

pub use server::{InMemoryServer, DEFAULT_DATA_CAP, METADATA_FEE};
