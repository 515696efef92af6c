//! Interaction log and per-item exposure counters.
//!
//! Counters live behind `Arc<AtomicU64>` so concurrent requests only take
//! the map's write lock the first time an item is seen.

use ahash::{AHashMap, AHashSet};
use fairrank_core::{ActionKind, ExposureSource, Interaction, ItemId, Result, UserId};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::wal::WriteAheadLog;
use crate::StorageError;

/// Item ids in first-insertion order, without repeats
#[derive(Default)]
struct FirstSeen {
    order: Vec<ItemId>,
    members: AHashSet<ItemId>,
}

impl FirstSeen {
    fn insert(&mut self, item_id: &ItemId) {
        if self.members.insert(item_id.clone()) {
            self.order.push(item_id.clone());
        }
    }
}

/// Per-user feedback index, kept current by every append
#[derive(Default)]
struct UserFeedback {
    seen: FirstSeen,
    liked: FirstSeen,
    passed: FirstSeen,
}

pub struct InteractionLog {
    records: RwLock<Vec<Interaction>>,
    counters: RwLock<AHashMap<ItemId, Arc<AtomicU64>>>,
    feedback: RwLock<AHashMap<UserId, UserFeedback>>,
    wal: Option<WriteAheadLog>,
}

impl Default for InteractionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionLog {
    /// Memory-only log
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            counters: RwLock::new(AHashMap::new()),
            feedback: RwLock::new(AHashMap::new()),
            wal: None,
        }
    }

    /// Log backed by a JSON-lines file; existing records are replayed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (wal, replayed): (_, Vec<Interaction>) =
            WriteAheadLog::recover(path).map_err(StorageError::Wal)?;

        let log = Self {
            wal: Some(wal),
            ..Self::new()
        };
        for interaction in replayed {
            log.apply(interaction);
        }
        info!(path = %path.display(), records = log.len(), "interaction log opened");
        Ok(log)
    }

    fn counter(&self, item_id: &ItemId) -> Arc<AtomicU64> {
        if let Some(counter) = self.counters.read().get(item_id) {
            return counter.clone();
        }
        self.counters
            .write()
            .entry(item_id.clone())
            .or_default()
            .clone()
    }

    fn apply(&self, interaction: Interaction) {
        self.counter(&interaction.item_id)
            .fetch_add(1, Ordering::Relaxed);

        if interaction.action.is_feedback() {
            let mut feedback = self.feedback.write();
            let entry = feedback.entry(interaction.user_id.clone()).or_default();
            entry.seen.insert(&interaction.item_id);
            match interaction.action {
                ActionKind::Like => entry.liked.insert(&interaction.item_id),
                ActionKind::Pass => entry.passed.insert(&interaction.item_id),
                ActionKind::Shown => {}
            }
        }
        self.records.write().push(interaction);
    }

    /// Append one interaction; durable before it is counted.
    pub fn append(&self, interaction: Interaction) -> Result<()> {
        if let Some(wal) = &self.wal {
            wal.append(&interaction).map_err(StorageError::Wal)?;
        }
        debug!(
            user = %interaction.user_id,
            item = %interaction.item_id,
            action = %interaction.action,
            "interaction recorded"
        );
        self.apply(interaction);
        Ok(())
    }

    pub fn exposure_count(&self, item_id: &ItemId) -> u64 {
        self.counters
            .read()
            .get(item_id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// All interactions of `user_id`, oldest first
    pub fn interactions_for(&self, user_id: &UserId) -> Vec<Interaction> {
        self.records
            .read()
            .iter()
            .filter(|i| &i.user_id == user_id)
            .cloned()
            .collect()
    }

    fn feedback_list(
        &self,
        user_id: &UserId,
        pick: impl Fn(&UserFeedback) -> &FirstSeen,
    ) -> Vec<ItemId> {
        self.feedback
            .read()
            .get(user_id)
            .map(|f| pick(f).order.clone())
            .unwrap_or_default()
    }

    pub fn liked(&self, user_id: &UserId) -> Vec<ItemId> {
        self.feedback_list(user_id, |f| &f.liked)
    }

    pub fn passed(&self, user_id: &UserId) -> Vec<ItemId> {
        self.feedback_list(user_id, |f| &f.passed)
    }

    pub fn sync(&self) -> Result<()> {
        if let Some(wal) = &self.wal {
            wal.sync().map_err(StorageError::Wal)?;
        }
        Ok(())
    }
}

impl ExposureSource for InteractionLog {
    fn get_counts(&self, item_ids: &[ItemId]) -> Result<AHashMap<ItemId, u64>> {
        Ok(item_ids
            .iter()
            .map(|id| (id.clone(), self.exposure_count(id)))
            .collect())
    }

    fn record_shown(&self, item_ids: &[ItemId], user_id: &UserId) -> Result<()> {
        for item_id in item_ids {
            self.append(Interaction::shown(user_id.clone(), item_id.clone()))?;
        }
        Ok(())
    }

    fn record(&self, interaction: Interaction) -> Result<()> {
        self.append(interaction)
    }

    /// Liked or passed items, first occurrence order
    fn seen_items(&self, user_id: &UserId) -> Result<Vec<ItemId>> {
        Ok(self.feedback_list(user_id, |f| &f.seen))
    }
}
