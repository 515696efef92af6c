//! # fairrank
//!
//! A fairness-aware job recommendation engine.
//!
//! Each request scores the job pool against the seeker's profile vector,
//! boosts rarely shown jobs, and reranks so every company group gets a
//! share of the shortlist proportional to its presence among qualified
//! candidates. Likes nudge the profile vector towards the liked job.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! fairrank --pool jobs.jsonl --data-dir ./data recommend --user u1
//! fairrank --pool jobs.jsonl --data-dir ./data interact --user u1 --item j42 --action like
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use std::sync::Arc;
//! use fairrank::prelude::*;
//!
//! let pool = EmbeddingStore::from_items(vec![
//!     Item::new("j1", Vector::new(vec![1.0, 0.0])).with_attribute("company_bucket", "small"),
//!     Item::new("j2", Vector::new(vec![0.0, 1.0])).with_attribute("company_bucket", "large"),
//! ])?;
//!
//! let engine = Recommender::new(
//!     Arc::new(pool),
//!     RelevanceScorer::new(),
//!     Arc::new(HashingEncoder::new(2)),
//!     Arc::new(InteractionLog::new()),
//!     Arc::new(ProfileStore::new()),
//!     RankingConfig::default(),
//! )?;
//!
//! let rec = engine.recommend(&UserId::from("u1"), None)?;
//! assert_eq!(rec.shortlist.len(), 2);
//! # Ok::<(), fairrank::Error>(())
//! ```
//!
//! ## Crate Structure
//!
//! - `fairrank-core` - value types, the embedding store, config and errors
//! - `fairrank-ranking` - scoring, fairness reranking, profile updates, evaluation
//! - `fairrank-storage` - interaction log, profile snapshots, pool files

use std::path::Path;
use std::sync::Arc;

// Re-export core types
pub use fairrank_core::{
    ActionKind, Candidate, EmbeddingStore, Error, ExposureSource, Interaction, Item, ItemId,
    RankedCandidate, RankingConfig, Result, UserId, Vector, VectorStore,
};

// Re-export ranking
pub use fairrank_ranking::{
    BenchmarkReport, Classifier, EvaluationHarness, FairnessReranker, FeedbackOutcome,
    HashingEncoder, MlpClassifier, ProfileDescription, ProfileSource, ProfileUpdate,
    ProfileUpdater, Recommendation, Recommender, RelevanceScorer, RerankMode, RerankParams,
    ScoringMode, TextEncoder,
};

// Re-export storage
pub use fairrank_storage::{load_pool, write_pool, InteractionLog, ProfileStore};

/// File names inside a data directory
pub const INTERACTIONS_FILE: &str = "interactions.jsonl";
pub const PROFILES_FILE: &str = "profiles.bin";

/// Build a recommender over the pool file at `pool_path`, keeping the
/// interaction log and profile snapshots under `data_dir`.
pub fn open_recommender<P: AsRef<Path>, D: AsRef<Path>>(
    pool_path: P,
    data_dir: D,
    config: RankingConfig,
    scorer: RelevanceScorer,
) -> Result<Recommender> {
    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir)?;

    let store = Arc::new(load_pool(pool_path)?);
    let exposure = Arc::new(InteractionLog::open(data_dir.join(INTERACTIONS_FILE))?);
    let profiles = Arc::new(ProfileStore::open(data_dir.join(PROFILES_FILE))?);
    let encoder = Arc::new(HashingEncoder::new(store.dim()));

    Recommender::new(store, scorer, encoder, exposure, profiles, config)
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionKind, Candidate, EmbeddingStore, Error, FairnessReranker, HashingEncoder,
        Interaction, InteractionLog, Item, ItemId, ProfileDescription, ProfileStore,
        ProfileUpdater, RankedCandidate, RankingConfig, Recommender, RelevanceScorer,
        RerankParams, Result, UserId, Vector,
    };
}

/// SIMD-optimized vector operations
pub mod simd {
    pub use fairrank_core::simd::{dot_product_simd, norm_simd};
}
