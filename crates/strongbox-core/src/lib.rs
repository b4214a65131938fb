//! Strongbox Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileMetadata`, `SignedMeta`, `Account`, `ChangeRecord`, `Drawing`
//! - **Tree logic** - `FileTree` validation and the decrypting `LazyTree` with its mutators
//! - **Port definitions** - Traits for adapters: `IServerApi`, `IMetadataStore`, `IContentStore`
//! - **State machine** - Sync phases and progress reporting
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
