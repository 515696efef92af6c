//! Per-user profile vectors with bincode snapshots.

use ahash::AHashMap;
use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, Utc};
use fairrank_core::{Result, UserId, Vector, VectorStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::StorageError;

#[derive(Debug, Serialize, Deserialize)]
struct ProfileSnapshot {
    saved_at: DateTime<Utc>,
    profiles: Vec<(UserId, Vector)>,
}

pub struct ProfileStore {
    vectors: RwLock<AHashMap<UserId, Vector>>,
    /// When set, every save rewrites this snapshot
    snapshot_path: Option<PathBuf>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(AHashMap::new()),
            snapshot_path: None,
        }
    }

    /// Store persisted at `path`; loads the snapshot if one exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let vectors = if path.exists() {
            read_snapshot(&path)?
        } else {
            AHashMap::new()
        };
        info!(path = %path.display(), users = vectors.len(), "profile store opened");
        Ok(Self {
            vectors: RwLock::new(vectors),
            snapshot_path: Some(path),
        })
    }

    pub fn get(&self, user_id: &UserId) -> Option<Vector> {
        self.vectors.read().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<_> = self.vectors.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Write every profile to `path` atomically (temp file + rename).
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_snapshot(path.as_ref(), &self.vectors.read())
    }

    /// Rewrite the backing snapshot, if any.
    pub fn persist(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => self.save_snapshot(path),
            None => Ok(()),
        }
    }
}

fn write_snapshot(path: &Path, vectors: &AHashMap<UserId, Vector>) -> Result<()> {
    let mut profiles: Vec<(UserId, Vector)> = vectors
        .iter()
        .map(|(id, v)| (id.clone(), v.clone()))
        .collect();
    profiles.sort_by(|a, b| a.0.cmp(&b.0));

    let snapshot = ProfileSnapshot {
        saved_at: Utc::now(),
        profiles,
    };
    let data = bincode::serialize(&snapshot)
        .map_err(|e| StorageError::Snapshot(format!("encoding: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(&data))
        .map_err(|e| StorageError::Snapshot(format!("writing {}: {e}", path.display())))?;

    debug!(path = %path.display(), users = snapshot.profiles.len(), "profile snapshot written");
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<AHashMap<UserId, Vector>> {
    let data = std::fs::read(path)?;
    let snapshot: ProfileSnapshot = bincode::deserialize(&data)
        .map_err(|e| StorageError::Snapshot(format!("decoding {}: {e}", path.display())))?;
    debug!(saved_at = %snapshot.saved_at, users = snapshot.profiles.len(), "profile snapshot read");
    Ok(snapshot.profiles.into_iter().collect())
}

impl VectorStore for ProfileStore {
    fn load_vector(&self, user_id: &UserId) -> Result<Option<Vector>> {
        Ok(self.get(user_id))
    }

    /// The write lock is held until the snapshot is renamed into place, so
    /// snapshots land on disk in the order the saves happened.
    fn save_vector(&self, user_id: &UserId, vector: &Vector) -> Result<()> {
        let mut vectors = self.vectors.write();
        vectors.insert(user_id.clone(), vector.clone());
        match &self.snapshot_path {
            Some(path) => write_snapshot(path, &vectors),
            None => Ok(()),
        }
    }
}
