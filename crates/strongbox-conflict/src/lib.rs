//! Strongbox Conflict - Conflict detection and resolution
//!
//! Provides:
//! - Classification of what changed on each side since the last sync
//! - Detection of concurrent changes to the same file
//! - Last-writer-wins and edit-preserving resolution rules
//! - Names for conflicted copies

pub mod detector;
pub mod error;
pub mod namer;
pub mod resolver;

pub use detector::{Conflict, ConflictDetector, ConflictKind, DetectionResult, FileChanges, Side};
pub use error::ConflictError;
pub use namer::ConflictNamer;
pub use resolver::{ConflictResolver, Resolution};
