//! Per-request recommendation pipeline
//!
//! ```text
//! user vector ──> RelevanceScorer ──> exposure counts ──> FairnessReranker ──> shortlist
//!      ^                                                                         │
//!      └──── ProfileUpdater <── like events              record shown <──────────┘
//! ```
//!
//! Everything up to the shortlist is computed from read-only pool data.
//! Feedback writes (cold-start vector, shown records, like updates) are
//! best-effort: a failed write is logged and the response still returned.

use ahash::AHashMap;
use fairrank_core::{
    ActionKind, Candidate, EmbeddingStore, ExposureSource, Interaction, ItemId, RankedCandidate,
    RankingConfig, Result, UserId, Vector, VectorStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::coldstart::{ProfileDescription, TextEncoder};
use crate::profile::{ProfileUpdate, ProfileUpdater};
use crate::rerank::{FairnessReranker, RerankMode, RerankParams};
use crate::scorer::{RelevanceScorer, ScoringMode};

/// Where the user vector for a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Stored,
    ColdStart,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub user_id: UserId,
    pub shortlist: Vec<RankedCandidate>,
    pub scoring_mode: ScoringMode,
    pub rerank_mode: RerankMode,
    pub profile_source: ProfileSource,
}

/// What a recorded interaction did to the user's profile
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    /// Not a like; only appended to the log
    Logged,
    ProfileUpdated,
    /// A like that left the profile as it was
    ProfileSkipped(String),
}

/// Serializes profile writes per user; different users never contend.
///
/// An entry lives only while some thread holds or waits on it.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<AHashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn with_user<R>(&self, user_id: &UserId, f: impl FnOnce() -> R) -> R {
        let lock = self.locks.lock().entry(user_id.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock();
            f()
        };

        // clones are only handed out under the map lock, so a count of two
        // (map + ours) means nobody else is waiting
        let mut locks = self.locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

pub struct Recommender {
    store: Arc<EmbeddingStore>,
    scorer: RelevanceScorer,
    reranker: FairnessReranker,
    updater: ProfileUpdater,
    encoder: Arc<dyn TextEncoder>,
    exposure: Arc<dyn ExposureSource>,
    profiles: Arc<dyn VectorStore>,
    config: RankingConfig,
    user_locks: UserLocks,
}

impl Recommender {
    pub fn new(
        store: Arc<EmbeddingStore>,
        scorer: RelevanceScorer,
        encoder: Arc<dyn TextEncoder>,
        exposure: Arc<dyn ExposureSource>,
        profiles: Arc<dyn VectorStore>,
        config: RankingConfig,
    ) -> Result<Self> {
        config.validate()?;
        if encoder.dim() != store.dim() {
            return Err(fairrank_core::Error::InvalidDimension {
                expected: store.dim(),
                actual: encoder.dim(),
            });
        }
        Ok(Self {
            store,
            scorer,
            reranker: FairnessReranker::new(),
            updater: ProfileUpdater::new(),
            encoder,
            exposure,
            profiles,
            config,
            user_locks: UserLocks::default(),
        })
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    /// Produce a fairness-constrained shortlist for `user_id`.
    ///
    /// `description` seeds the vector on cold start; without one a default
    /// profile is used.
    pub fn recommend(
        &self,
        user_id: &UserId,
        description: Option<&ProfileDescription>,
    ) -> Result<Recommendation> {
        let (user_vector, profile_source) = self.resolve_profile(user_id, description)?;

        let seen = self.exposure.seen_items(user_id).unwrap_or_else(|e| {
            warn!(user = %user_id, error = %e, "could not load seen items, excluding none");
            Vec::new()
        });
        debug!(user = %user_id, seen = seen.len(), "excluding previously seen items");

        let scored = self.scorer.score_with_limit(
            &user_vector,
            &self.store,
            &seen,
            self.config.hybrid_weight,
            self.config.fetch_k,
        )?;

        let ids: Vec<_> = scored.items.iter().map(|s| s.id.clone()).collect();
        let counts = self.exposure.get_counts(&ids).unwrap_or_else(|e| {
            warn!(error = %e, "could not load exposure counts, assuming none");
            AHashMap::new()
        });

        let attr = self.config.protected_attr.as_str();
        let candidates: Vec<Candidate> = scored
            .items
            .iter()
            .map(|s| {
                let item = self.store.item_at(s.row);
                let mut candidate = Candidate {
                    id: s.id.clone(),
                    score: s.score,
                    qualified: true,
                    exposure_count: counts.get(&s.id).copied().unwrap_or(0),
                    attributes: Default::default(),
                };
                if let Some(group) = item.attribute(attr) {
                    candidate.attributes.insert(attr.to_string(), group.to_string());
                }
                candidate
            })
            .collect();

        let params = RerankParams::new(self.config.final_k)
            .protected_attr(attr)
            .min_qualified_score(self.config.min_qualified_score)
            .coverage_weight(self.config.coverage_weight);
        let reranked = self.reranker.rerank(&candidates, &params)?;

        let shown: Vec<_> = reranked.shortlist.iter().map(|c| c.id.clone()).collect();
        if let Err(e) = self.exposure.record_shown(&shown, user_id) {
            warn!(user = %user_id, error = %e, "failed to record shown items");
        }

        info!(
            user = %user_id,
            candidates = candidates.len(),
            returned = reranked.shortlist.len(),
            "recommendation served"
        );

        Ok(Recommendation {
            user_id: user_id.clone(),
            shortlist: reranked.shortlist,
            scoring_mode: scored.mode,
            rerank_mode: reranked.mode,
            profile_source,
        })
    }

    fn resolve_profile(
        &self,
        user_id: &UserId,
        description: Option<&ProfileDescription>,
    ) -> Result<(Vector, ProfileSource)> {
        match self.profiles.load_vector(user_id) {
            Ok(Some(vector)) if vector.dim() == self.store.dim() => {
                return Ok((vector, ProfileSource::Stored));
            }
            Ok(Some(vector)) => warn!(
                user = %user_id,
                dim = vector.dim(),
                "stored profile vector has the wrong dimension, rebuilding"
            ),
            Ok(None) => {}
            Err(e) => warn!(user = %user_id, error = %e, "could not load profile vector"),
        }

        let default_description = ProfileDescription::default();
        let text = description.unwrap_or(&default_description).to_text();
        let mut vector = self.encoder.encode(&text)?;
        vector.check_dim(self.store.dim())?;
        vector.normalize();

        info!(user = %user_id, "cold start, profile vector built from description");
        if let Err(e) = self.profiles.save_vector(user_id, &vector) {
            warn!(user = %user_id, error = %e, "could not save initial profile vector");
        }
        Ok((vector, ProfileSource::ColdStart))
    }

    /// Append an interaction; a like also moves the user's vector.
    pub fn record_interaction(&self, interaction: Interaction) -> Result<FeedbackOutcome> {
        let user_id = interaction.user_id.clone();
        let item_id = interaction.item_id.clone();
        let action = interaction.action;

        if let Err(e) = self.exposure.record(interaction) {
            warn!(user = %user_id, item = %item_id, error = %e, "failed to append interaction");
        }

        if action != ActionKind::Like {
            return Ok(FeedbackOutcome::Logged);
        }

        self.user_locks
            .with_user(&user_id, || self.apply_like(&user_id, &item_id))
    }

    /// Load, blend towards the liked item, save. Runs under the user's lock.
    fn apply_like(&self, user_id: &UserId, item_id: &ItemId) -> Result<FeedbackOutcome> {
        let current = match self.profiles.load_vector(user_id) {
            Ok(Some(vector)) => vector,
            Ok(None) => {
                warn!(user = %user_id, "no profile vector yet, skipping update");
                return Ok(FeedbackOutcome::ProfileSkipped("no stored profile vector".into()));
            }
            Err(e) => {
                warn!(user = %user_id, error = %e, "could not load profile vector, skipping update");
                return Ok(FeedbackOutcome::ProfileSkipped(e.to_string()));
            }
        };

        if current.dim() != self.store.dim() {
            warn!(
                user = %user_id,
                dim = current.dim(),
                expected = self.store.dim(),
                "stored profile vector has the wrong dimension, skipping update"
            );
            return Ok(FeedbackOutcome::ProfileSkipped(format!(
                "stored profile has dimension {}, pool has {}",
                current.dim(),
                self.store.dim()
            )));
        }

        match self
            .updater
            .update_profile(&current, item_id, self.config.alpha, &self.store)?
        {
            ProfileUpdate::Updated(vector) => match self.profiles.save_vector(user_id, &vector) {
                Ok(()) => {
                    info!(user = %user_id, item = %item_id, "profile updated from like");
                    Ok(FeedbackOutcome::ProfileUpdated)
                }
                Err(e) => {
                    warn!(user = %user_id, error = %e, "could not save updated profile vector");
                    Ok(FeedbackOutcome::ProfileSkipped(e.to_string()))
                }
            },
            ProfileUpdate::Unchanged { reason, .. } => {
                Ok(FeedbackOutcome::ProfileSkipped(format!("{reason:?}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coldstart::HashingEncoder;
    use ahash::AHashSet;
    use fairrank_core::{Error, Item};
    use parking_lot::RwLock;

    /// In-memory collaborators with switchable failures
    #[derive(Default)]
    struct FakeExposure {
        log: RwLock<Vec<Interaction>>,
        fail_writes: bool,
    }

    impl ExposureSource for FakeExposure {
        fn get_counts(&self, item_ids: &[ItemId]) -> Result<AHashMap<ItemId, u64>> {
            let log = self.log.read();
            Ok(item_ids
                .iter()
                .map(|id| (id.clone(), log.iter().filter(|i| &i.item_id == id).count() as u64))
                .collect())
        }

        fn record_shown(&self, item_ids: &[ItemId], user_id: &UserId) -> Result<()> {
            for id in item_ids {
                self.record(Interaction::shown(user_id.clone(), id.clone()))?;
            }
            Ok(())
        }

        fn record(&self, interaction: Interaction) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Persistence("log unavailable".into()));
            }
            self.log.write().push(interaction);
            Ok(())
        }

        fn seen_items(&self, user_id: &UserId) -> Result<Vec<ItemId>> {
            Ok(self
                .log
                .read()
                .iter()
                .filter(|i| &i.user_id == user_id && i.action.is_feedback())
                .map(|i| i.item_id.clone())
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeProfiles {
        vectors: RwLock<AHashMap<UserId, Vector>>,
        fail_writes: bool,
    }

    impl VectorStore for FakeProfiles {
        fn load_vector(&self, user_id: &UserId) -> Result<Option<Vector>> {
            Ok(self.vectors.read().get(user_id).cloned())
        }

        fn save_vector(&self, user_id: &UserId, vector: &Vector) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Persistence("profile store unavailable".into()));
            }
            self.vectors.write().insert(user_id.clone(), vector.clone());
            Ok(())
        }
    }

    fn pool() -> Arc<EmbeddingStore> {
        let items = vec![
            Item::new("j1", Vector::new(vec![1.0, 0.0, 0.0])).with_attribute("company_bucket", "small"),
            Item::new("j2", Vector::new(vec![0.9, 0.1, 0.0])).with_attribute("company_bucket", "large"),
            Item::new("j3", Vector::new(vec![0.0, 1.0, 0.0])).with_attribute("company_bucket", "small"),
            Item::new("j4", Vector::new(vec![0.0, 0.0, 1.0])),
        ];
        Arc::new(EmbeddingStore::from_items(items).unwrap())
    }

    fn recommender(
        exposure: Arc<FakeExposure>,
        profiles: Arc<FakeProfiles>,
        final_k: usize,
    ) -> Recommender {
        let config = RankingConfig {
            final_k,
            ..RankingConfig::default()
        };
        Recommender::new(
            pool(),
            RelevanceScorer::new(),
            Arc::new(HashingEncoder::new(3)),
            exposure,
            profiles,
            config,
        )
        .unwrap()
    }

    fn user() -> UserId {
        UserId::from("u1")
    }

    #[test]
    fn test_stored_profile_and_shown_feedback() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        profiles.save_vector(&user(), &Vector::new(vec![1.0, 0.0, 0.0])).unwrap();

        let engine = recommender(exposure.clone(), profiles, 2);
        let rec = engine.recommend(&user(), None).unwrap();

        assert_eq!(rec.profile_source, ProfileSource::Stored);
        assert_eq!(rec.rerank_mode, RerankMode::Fair);
        assert_eq!(rec.scoring_mode, ScoringMode::Cosine);
        assert_eq!(rec.shortlist.len(), 2);

        let shown: AHashSet<_> = rec.shortlist.iter().map(|c| c.id.clone()).collect();
        let counts = exposure.get_counts(&shown.iter().cloned().collect::<Vec<_>>()).unwrap();
        assert!(counts.values().all(|&c| c == 1));
        // shown items are not "seen": they can be recommended again
        assert!(exposure.seen_items(&user()).unwrap().is_empty());
    }

    #[test]
    fn test_exposure_rotates_shortlist() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        profiles.save_vector(&user(), &Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
        let engine = recommender(exposure, profiles, 1);

        let first = engine.recommend(&user(), None).unwrap();
        let second = engine.recommend(&user(), None).unwrap();
        assert_ne!(first.shortlist[0].id, second.shortlist[0].id);
        assert_eq!(second.shortlist[0].exposure_count, 0);
    }

    #[test]
    fn test_seen_items_excluded() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        profiles.save_vector(&user(), &Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
        let engine = recommender(exposure, profiles, 4);

        engine.record_interaction(Interaction::pass(user(), "j1")).unwrap();
        let rec = engine.recommend(&user(), None).unwrap();
        assert_eq!(rec.shortlist.len(), 3);
        assert!(rec.shortlist.iter().all(|c| c.id.as_str() != "j1"));
    }

    #[test]
    fn test_cold_start_saves_vector() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        let engine = recommender(exposure, profiles.clone(), 3);

        let rec = engine.recommend(&user(), Some(&ProfileDescription::default())).unwrap();
        assert_eq!(rec.profile_source, ProfileSource::ColdStart);
        let saved = profiles.load_vector(&user()).unwrap().unwrap();
        assert!((saved.norm() - 1.0).abs() < 1e-5);

        let again = engine.recommend(&user(), None).unwrap();
        assert_eq!(again.profile_source, ProfileSource::Stored);
    }

    #[test]
    fn test_like_moves_profile_towards_item() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        let start = Vector::new(vec![1.0, 0.0, 0.0]);
        profiles.save_vector(&user(), &start).unwrap();
        let engine = recommender(exposure, profiles.clone(), 2);

        let outcome = engine.record_interaction(Interaction::like(user(), "j3")).unwrap();
        assert_eq!(outcome, FeedbackOutcome::ProfileUpdated);

        let updated = profiles.load_vector(&user()).unwrap().unwrap();
        let j3 = Vector::new(vec![0.0, 1.0, 0.0]);
        assert!(updated.cosine_similarity(&j3) > start.cosine_similarity(&j3));
        assert!((updated.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_like_without_profile_or_item_is_skipped() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        let engine = recommender(exposure, profiles.clone(), 2);

        let outcome = engine.record_interaction(Interaction::like(user(), "j3")).unwrap();
        assert!(matches!(outcome, FeedbackOutcome::ProfileSkipped(_)));

        profiles.save_vector(&user(), &Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
        let outcome = engine.record_interaction(Interaction::like(user(), "gone")).unwrap();
        assert!(matches!(outcome, FeedbackOutcome::ProfileSkipped(_)));
        assert_eq!(
            profiles.load_vector(&user()).unwrap().unwrap(),
            Vector::new(vec![1.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_like_with_wrong_dimension_profile_is_skipped() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        let stale = Vector::new(vec![1.0, 0.0]);
        profiles.save_vector(&user(), &stale).unwrap();
        let engine = recommender(exposure.clone(), profiles.clone(), 2);

        let outcome = engine.record_interaction(Interaction::like(user(), "j1")).unwrap();
        assert!(matches!(outcome, FeedbackOutcome::ProfileSkipped(_)));
        assert_eq!(profiles.load_vector(&user()).unwrap(), Some(stale));
        assert_eq!(exposure.seen_items(&user()).unwrap(), vec![ItemId::from("j1")]);
    }

    #[test]
    fn test_user_locks_are_released() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        profiles.save_vector(&user(), &Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
        let engine = recommender(exposure, profiles, 2);

        for n in 0..5u64 {
            engine
                .record_interaction(Interaction::like(UserId::from(n), "j2"))
                .unwrap();
        }
        engine.record_interaction(Interaction::like(user(), "j2")).unwrap();
        assert_eq!(engine.user_locks.len(), 0);
    }

    #[test]
    fn test_pass_only_logged() {
        let engine = recommender(Arc::new(FakeExposure::default()), Arc::new(FakeProfiles::default()), 2);
        let outcome = engine.record_interaction(Interaction::pass(user(), "j1")).unwrap();
        assert_eq!(outcome, FeedbackOutcome::Logged);
    }

    #[test]
    fn test_write_failures_do_not_fail_the_request() {
        let exposure = Arc::new(FakeExposure {
            fail_writes: true,
            ..Default::default()
        });
        let profiles = Arc::new(FakeProfiles {
            fail_writes: true,
            ..Default::default()
        });
        let engine = recommender(exposure, profiles, 2);

        let rec = engine.recommend(&user(), None).unwrap();
        assert_eq!(rec.profile_source, ProfileSource::ColdStart);
        assert_eq!(rec.shortlist.len(), 2);
    }

    #[test]
    fn test_concurrent_likes_for_one_user_are_serialized() {
        let exposure = Arc::new(FakeExposure::default());
        let profiles = Arc::new(FakeProfiles::default());
        profiles.save_vector(&user(), &Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
        let engine = Arc::new(recommender(exposure.clone(), profiles.clone(), 2));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine.record_interaction(Interaction::like(user(), "j3")).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), FeedbackOutcome::ProfileUpdated);
        }

        // eight sequential updates with alpha 0.1, none lost
        let updater = ProfileUpdater::new();
        let j3 = Vector::new(vec![0.0, 1.0, 0.0]);
        let mut expected = Vector::new(vec![1.0, 0.0, 0.0]);
        for _ in 0..8 {
            expected = updater.update(&expected, &j3, 0.1).unwrap().into_vector();
        }
        let actual = profiles.load_vector(&user()).unwrap().unwrap();
        for (a, e) in actual.as_slice().iter().zip(expected.as_slice()) {
            assert!((a - e).abs() < 1e-5);
        }
        let counts = exposure.get_counts(&[ItemId::from("j3")]).unwrap();
        assert_eq!(counts.get(&ItemId::from("j3")).copied(), Some(8));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RankingConfig {
            hybrid_weight: 2.0,
            ..RankingConfig::default()
        };
        let result = Recommender::new(
            pool(),
            RelevanceScorer::new(),
            Arc::new(HashingEncoder::new(3)),
            Arc::new(FakeExposure::default()),
            Arc::new(FakeProfiles::default()),
            config,
        );
        assert!(matches!(result, Err(e) if e.is_invalid_parameter()));
    }
}
