//! # fairrank Core
//!
//! Core types for the fairrank recommendation engine.
//!
//! - [`Vector`] - Dense embedding with SIMD cosine and normalization
//! - [`Item`] - A pool entry with its embedding and metadata
//! - [`EmbeddingStore`] - Read-only pool with a precomputed id→row index
//! - [`Candidate`] / [`RankedCandidate`] - Reranker input and output records
//! - [`Interaction`] - Append-only like/pass/shown events
//! - [`ExposureSource`] / [`VectorStore`] - Collaborator seams
//!
//! ## Example
//!
//! ```rust
//! use fairrank_core::{EmbeddingStore, Item, Vector};
//!
//! let store = EmbeddingStore::from_items(vec![
//!     Item::new("job-1", Vector::new(vec![1.0, 0.0])).with_attribute("company_bucket", "small"),
//!     Item::new("job-2", Vector::new(vec![0.0, 1.0])).with_attribute("company_bucket", "large"),
//! ]).unwrap();
//!
//! let user = Vector::new(vec![1.0, 0.0]);
//! let scores = store.cosine_all(&user, |_| true).unwrap();
//! assert_eq!(scores.len(), 2);
//! ```

pub mod candidate;
pub mod config;
pub mod error;
pub mod interaction;
pub mod item;
pub mod source;
pub mod store;
pub mod vector;

/// SIMD-optimized vector kernels
///
/// - AVX2/FMA on x86_64
/// - NEON on ARM64
pub mod simd;

pub use candidate::{Candidate, RankedCandidate, DEFAULT_GROUP_ATTR};
pub use config::RankingConfig;
pub use error::{Error, Result};
pub use interaction::{ActionKind, Interaction};
pub use item::{Item, ItemId, UserId, UNKNOWN_GROUP};
pub use source::{ExposureSource, VectorStore};
pub use store::EmbeddingStore;
pub use vector::Vector;
