//! Content-based relevance scoring
//!
//! Cosine similarity of the user vector against every pool row, optionally
//! blended with an auxiliary classifier:
//!
//! ```text
//! final = (1 - w) * cosine + w * classifier(user ‖ item)
//! ```
//!
//! Excluded ids are dropped before ranking so they never take a slot.

use ahash::AHashSet;
use fairrank_core::config::validate_hybrid_weight;
use fairrank_core::{EmbeddingStore, ItemId, Result, Vector};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::classifier::{Classifier, ClassifierError};

/// A pool item with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub id: ItemId,
    /// Row in the embedding store
    pub row: usize,
    pub score: f32,
}

/// How the scores in a [`ScoreOutcome`] were produced
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringMode {
    /// Pure cosine, as requested (`hybrid_weight == 0`)
    Cosine,
    /// Cosine blended with the classifier
    Hybrid,
    /// Hybrid was requested but skipped; scores are pure cosine
    Degraded { reason: String },
}

impl ScoringMode {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ScoringMode::Degraded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// Descending by score, ties by item id
    pub items: Vec<ScoredItem>,
    pub mode: ScoringMode,
}

/// Scores a user vector against the item pool
#[derive(Clone, Default)]
pub struct RelevanceScorer {
    classifier: Option<Arc<dyn Classifier>>,
}

impl std::fmt::Debug for RelevanceScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelevanceScorer")
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

impl RelevanceScorer {
    /// Cosine-only scorer
    pub fn new() -> Self {
        Self { classifier: None }
    }

    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Score the whole pool minus `exclude_ids`.
    pub fn score(
        &self,
        user: &Vector,
        store: &EmbeddingStore,
        exclude_ids: &[ItemId],
        hybrid_weight: f32,
    ) -> Result<ScoreOutcome> {
        self.score_with_limit(user, store, exclude_ids, hybrid_weight, usize::MAX)
    }

    /// Like [`score`](Self::score), keeping only the best `limit` items.
    pub fn score_with_limit(
        &self,
        user: &Vector,
        store: &EmbeddingStore,
        exclude_ids: &[ItemId],
        hybrid_weight: f32,
        limit: usize,
    ) -> Result<ScoreOutcome> {
        validate_hybrid_weight(hybrid_weight)?;
        user.check_dim(store.dim())?;

        let excluded: AHashSet<usize> = exclude_ids
            .iter()
            .filter_map(|id| {
                let row = store.row_of(id);
                if row.is_none() {
                    debug!(item = %id, "excluded id is not in the pool");
                }
                row
            })
            .collect();

        let mut scored = store.cosine_all(user, |row| !excluded.contains(&row))?;

        let mode = if hybrid_weight > 0.0 {
            match &self.classifier {
                Some(classifier) => {
                    match Self::classifier_scores(classifier.as_ref(), user, store, &scored) {
                        Ok(probs) => {
                            for ((_, score), p) in scored.iter_mut().zip(probs) {
                                *score = (1.0 - hybrid_weight) * *score + hybrid_weight * p;
                            }
                            ScoringMode::Hybrid
                        }
                        Err(e) => {
                            warn!(error = %e, "classifier failed, falling back to cosine scores");
                            ScoringMode::Degraded {
                                reason: e.to_string(),
                            }
                        }
                    }
                }
                None => {
                    debug!(hybrid_weight, "no classifier configured, using cosine scores");
                    ScoringMode::Degraded {
                        reason: "no classifier configured".to_string(),
                    }
                }
            }
        } else {
            ScoringMode::Cosine
        };

        let mut items: Vec<ScoredItem> = scored
            .into_iter()
            .map(|(row, score)| ScoredItem {
                id: store.item_at(row).id.clone(),
                row,
                score,
            })
            .collect();

        items.sort_by(|a, b| {
            OrderedFloat(b.score)
                .cmp(&OrderedFloat(a.score))
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(limit);

        Ok(ScoreOutcome { items, mode })
    }

    /// Classifier probability for every scored row; the first failure or
    /// malformed output aborts the whole batch.
    fn classifier_scores(
        classifier: &dyn Classifier,
        user: &Vector,
        store: &EmbeddingStore,
        scored: &[(usize, f32)],
    ) -> std::result::Result<Vec<f32>, ClassifierError> {
        let expected = user.dim() + store.dim();
        if classifier.input_dim() != expected {
            return Err(ClassifierError::InputSize {
                expected: classifier.input_dim(),
                actual: expected,
            });
        }

        scored
            .par_iter()
            .map(|&(row, _)| {
                let mut features = Vec::with_capacity(expected);
                features.extend_from_slice(user.as_slice());
                features.extend_from_slice(store.row(row));
                let p = classifier.predict(&features)?;
                if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                    return Err(ClassifierError::Malformed(p));
                }
                Ok(p)
            })
            .collect()
    }
}
