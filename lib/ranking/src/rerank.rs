//! Fairness-aware reranking
//!
//! Conditional Demographic Parity on a shortlist, with a coverage boost for
//! under-exposed items. Each position is filled from the group whose share
//! of the shortlist lags furthest behind its share of the qualified pool:
//!
//! ```text
//! fair_score     = score + coverage_weight / (exposure + 1)
//! proportion[g]  = |qualified ∩ g| / |qualified|
//! deficit[g]     = proportion[g] * position - taken[g]
//! ```
//!
//! When no group has a positive deficit, or the lagging groups are empty,
//! the best remaining fair score across all groups is taken instead.

use fairrank_core::config::{validate_finite, validate_k};
use fairrank_core::{Candidate, RankedCandidate, Result};
use std::collections::VecDeque;
use tracing::{debug, info};

// Slack for deficits like 1/3 * 3 - 1
const DEFICIT_EPSILON: f64 = 1e-9;

/// Reranker parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RerankParams {
    pub k: usize,
    pub protected_attr: String,
    pub min_qualified_score: f32,
    pub coverage_weight: f32,
}

impl Default for RerankParams {
    fn default() -> Self {
        Self {
            k: 10,
            protected_attr: fairrank_core::DEFAULT_GROUP_ATTR.to_string(),
            min_qualified_score: 0.0,
            coverage_weight: 5.0,
        }
    }
}

impl RerankParams {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn protected_attr(mut self, attr: impl Into<String>) -> Self {
        self.protected_attr = attr.into();
        self
    }

    #[must_use]
    pub fn min_qualified_score(mut self, score: f32) -> Self {
        self.min_qualified_score = score;
        self
    }

    #[must_use]
    pub fn coverage_weight(mut self, weight: f32) -> Self {
        self.coverage_weight = weight;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_k("k", self.k)?;
        validate_finite("min_qualified_score", self.min_qualified_score)?;
        validate_finite("coverage_weight", self.coverage_weight)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankMode {
    /// Group quotas applied over the qualified pool
    Fair,
    /// Qualified pool was empty; plain top-k by raw score
    RelevanceFallback,
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// Selection order is rank order
    pub shortlist: Vec<RankedCandidate>,
    pub mode: RerankMode,
}

/// Qualified candidates of one group, best fair score first
struct GroupQueue {
    label: String,
    proportion: f64,
    taken: usize,
    queue: VecDeque<RankedCandidate>,
}

impl GroupQueue {
    fn deficit(&self, position: usize) -> f64 {
        self.proportion * position as f64 - self.taken as f64
    }

    fn head_fair_score(&self) -> Option<f32> {
        self.queue.front().map(|c| c.fair_score)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FairnessReranker;

impl FairnessReranker {
    pub fn new() -> Self {
        Self
    }

    /// Build a shortlist of at most `params.k` candidates.
    pub fn rerank(&self, candidates: &[Candidate], params: &RerankParams) -> Result<RerankOutcome> {
        params.validate()?;
        let attr = params.protected_attr.as_str();

        let qualified: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.qualified && c.score >= params.min_qualified_score)
            .collect();

        if qualified.is_empty() {
            info!(
                candidates = candidates.len(),
                "no qualified candidates, falling back to relevance top-k"
            );
            return Ok(RerankOutcome {
                shortlist: Self::relevance_top_k(candidates, params.k, attr),
                mode: RerankMode::RelevanceFallback,
            });
        }

        let mut groups = Self::partition(&qualified, params);

        debug!(
            qualified = qualified.len(),
            groups = ?groups.iter().map(|g| (g.label.as_str(), g.queue.len())).collect::<Vec<_>>(),
            "computed target proportions"
        );

        let mut shortlist = Vec::with_capacity(params.k.min(qualified.len()));
        for position in 1..=params.k {
            let from_quota = Self::quota_group(&groups, position)
                .and_then(|g| groups[g].queue.pop_front().map(|c| (g, c)));

            let picked = match from_quota {
                Some(picked) => Some(picked),
                None => Self::pop_best_global(&mut groups),
            };

            let Some((g, candidate)) = picked else {
                break;
            };
            groups[g].taken += 1;
            shortlist.push(candidate);
        }

        debug!(
            size = shortlist.len(),
            taken = ?groups.iter().map(|g| (g.label.as_str(), g.taken)).collect::<Vec<_>>(),
            "fair shortlist built"
        );

        Ok(RerankOutcome {
            shortlist,
            mode: RerankMode::Fair,
        })
    }

    /// Group queues in first-appearance order with fair scores attached.
    /// The stable sort keeps input order among equal fair scores.
    fn partition(qualified: &[&Candidate], params: &RerankParams) -> Vec<GroupQueue> {
        let attr = params.protected_attr.as_str();
        let mut groups: Vec<GroupQueue> = Vec::new();

        for candidate in qualified {
            let label = candidate.group(attr);
            let boost = params.coverage_weight / (candidate.exposure_count as f32 + 1.0);
            let ranked = RankedCandidate {
                id: candidate.id.clone(),
                score: candidate.score,
                fair_score: candidate.score + boost,
                group: label.to_string(),
                exposure_count: candidate.exposure_count,
            };

            match groups.iter_mut().find(|g| g.label == label) {
                Some(group) => group.queue.push_back(ranked),
                None => groups.push(GroupQueue {
                    label: label.to_string(),
                    proportion: 0.0,
                    taken: 0,
                    queue: VecDeque::from([ranked]),
                }),
            }
        }

        let total = qualified.len() as f64;
        for group in &mut groups {
            group.proportion = group.queue.len() as f64 / total;
            group
                .queue
                .make_contiguous()
                .sort_by(|a, b| b.fair_score.total_cmp(&a.fair_score));
        }

        groups
    }

    /// Group owed the next slot, if any group has a positive deficit.
    ///
    /// Groups tied at the largest deficit are separated by their best
    /// remaining fair score; empty tied groups are skipped.
    fn quota_group(groups: &[GroupQueue], position: usize) -> Option<usize> {
        let max_deficit = groups
            .iter()
            .map(|g| g.deficit(position))
            .fold(f64::NEG_INFINITY, f64::max);
        if max_deficit <= DEFICIT_EPSILON {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        for (i, group) in groups.iter().enumerate() {
            if max_deficit - group.deficit(position) > DEFICIT_EPSILON {
                continue;
            }
            if let Some(head) = group.head_fair_score() {
                if best.map_or(true, |(_, s)| head > s) {
                    best = Some((i, head));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// Highest remaining fair score across all groups; first group wins ties.
    fn pop_best_global(groups: &mut [GroupQueue]) -> Option<(usize, RankedCandidate)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, group) in groups.iter().enumerate() {
            if let Some(head) = group.head_fair_score() {
                if best.map_or(true, |(_, s)| head > s) {
                    best = Some((i, head));
                }
            }
        }
        let (g, _) = best?;
        groups[g].queue.pop_front().map(|c| (g, c))
    }

    /// Top-k of the full list by raw score, no boost and no quotas.
    fn relevance_top_k(candidates: &[Candidate], k: usize, attr: &str) -> Vec<RankedCandidate> {
        let mut sorted: Vec<&Candidate> = candidates.iter().collect();
        sorted.sort_by(|a, b| b.score.total_cmp(&a.score));
        sorted
            .into_iter()
            .take(k)
            .map(|c| RankedCandidate {
                id: c.id.clone(),
                score: c.score,
                fair_score: c.score,
                group: c.group(attr).to_string(),
                exposure_count: c.exposure_count,
            })
            .collect()
    }
}
