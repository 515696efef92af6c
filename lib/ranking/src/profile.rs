//! Online profile updates
//!
//! A like nudges the user's vector towards the liked item:
//! `normalize((1 - alpha) * old + alpha * item)`. Similarity is cosine, so
//! only direction matters and the result is kept at unit norm.

use fairrank_core::config::validate_alpha;
use fairrank_core::{EmbeddingStore, ItemId, Result, Vector};
use tracing::{debug, warn};

/// Below this norm the blended vector has no usable direction
const MIN_BLEND_NORM: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    Updated(Vector),
    /// The vector was left as it was
    Unchanged { vector: Vector, reason: SkipReason },
}

impl ProfileUpdate {
    pub fn vector(&self) -> &Vector {
        match self {
            ProfileUpdate::Updated(v) => v,
            ProfileUpdate::Unchanged { vector, .. } => vector,
        }
    }

    pub fn into_vector(self) -> Vector {
        match self {
            ProfileUpdate::Updated(v) => v,
            ProfileUpdate::Unchanged { vector, .. } => vector,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, ProfileUpdate::Updated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ItemNotFound(ItemId),
    DegenerateBlend,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileUpdater;

impl ProfileUpdater {
    pub fn new() -> Self {
        Self
    }

    /// Blend and renormalize. `alpha` must lie in `(0, 1)`.
    pub fn update(&self, old: &Vector, item: &Vector, alpha: f32) -> Result<ProfileUpdate> {
        validate_alpha(alpha)?;
        let mut blended = old.blend(item, alpha)?;

        if blended.norm() < MIN_BLEND_NORM {
            warn!(alpha, "blended profile vector has no direction, keeping previous vector");
            return Ok(ProfileUpdate::Unchanged {
                vector: old.clone(),
                reason: SkipReason::DegenerateBlend,
            });
        }

        blended.normalize();
        Ok(ProfileUpdate::Updated(blended))
    }

    /// Resolve the liked item in the pool, then [`update`](Self::update).
    /// An unknown item leaves the vector unchanged.
    pub fn update_profile(
        &self,
        old: &Vector,
        liked_item: &ItemId,
        alpha: f32,
        store: &EmbeddingStore,
    ) -> Result<ProfileUpdate> {
        validate_alpha(alpha)?;
        match store.lookup(liked_item) {
            Ok(item_vector) => {
                debug!(item = %liked_item, alpha, "updating profile vector");
                self.update(old, item_vector, alpha)
            }
            Err(_) => {
                warn!(item = %liked_item, "liked item has no embedding, profile unchanged");
                Ok(ProfileUpdate::Unchanged {
                    vector: old.clone(),
                    reason: SkipReason::ItemNotFound(liked_item.clone()),
                })
            }
        }
    }
}
