// Collaborator seams: exposure counts and stored user vectors.
use ahash::AHashMap;

use crate::{Interaction, ItemId, Result, UserId, Vector};

/// Source of exposure counts, backed by an append-only interaction log.
pub trait ExposureSource: Send + Sync {
    /// Prior like/pass/shown interactions per item; missing ids map to 0.
    fn get_counts(&self, item_ids: &[ItemId]) -> Result<AHashMap<ItemId, u64>>;

    /// Append one `shown` interaction per item.
    fn record_shown(&self, item_ids: &[ItemId], user_id: &UserId) -> Result<()>;

    /// Append an arbitrary interaction.
    fn record(&self, interaction: Interaction) -> Result<()>;

    /// Items the user already liked or passed.
    fn seen_items(&self, user_id: &UserId) -> Result<Vec<ItemId>>;
}

/// Persistence of user preference vectors
pub trait VectorStore: Send + Sync {
    fn load_vector(&self, user_id: &UserId) -> Result<Option<Vector>>;
    fn save_vector(&self, user_id: &UserId, vector: &Vector) -> Result<()>;
}
