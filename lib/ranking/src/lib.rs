//! Ranking layer for fairrank
//!
//! Relevance scoring over the item pool, the fairness reranker that turns
//! scored candidates into a group-balanced shortlist, and online profile
//! updates driven by likes. [`Recommender`] wires them into one request.

pub mod classifier;
pub mod coldstart;
pub mod engine;
pub mod evaluation;
pub mod profile;
pub mod rerank;
pub mod scorer;

pub use classifier::{Classifier, ClassifierError, DenseLayer, MlpClassifier};
pub use coldstart::{HashingEncoder, ProfileDescription, TextEncoder};
pub use engine::{FeedbackOutcome, ProfileSource, Recommendation, Recommender};
pub use evaluation::{BenchmarkReport, EvaluationHarness};
pub use profile::{ProfileUpdate, ProfileUpdater, SkipReason};
pub use rerank::{FairnessReranker, RerankMode, RerankOutcome, RerankParams};
pub use scorer::{RelevanceScorer, ScoreOutcome, ScoredItem, ScoringMode};
