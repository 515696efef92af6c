//! Storage layer for fairrank: the interaction log behind exposure counts,
//! the per-user profile vector store, and item pool files.

pub mod exposure;
pub mod pool;
pub mod profile_store;
pub mod wal;

pub use exposure::InteractionLog;
pub use pool::{load_items, load_pool, write_pool};
pub use profile_store::ProfileStore;
pub use wal::WriteAheadLog;

use thiserror::Error;

/// Failures inside the storage plumbing; surfaced as
/// [`fairrank_core::Error::Persistence`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("write-ahead log: {0:#}")]
    Wal(anyhow::Error),

    #[error("snapshot: {0}")]
    Snapshot(String),
}

impl From<StorageError> for fairrank_core::Error {
    fn from(e: StorageError) -> Self {
        fairrank_core::Error::Persistence(e.to_string())
    }
}
