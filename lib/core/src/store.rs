use ahash::AHashMap;
use rayon::prelude::*;

use crate::{Error, Item, ItemId, Result, Vector};

/// Read-only pool of item embeddings.
///
/// Vectors live in one row-major matrix with their norms precomputed, and
/// an id→row table built once at load time serves every later lookup and
/// batched similarity pass.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    dim: usize,
    items: Vec<Item>,
    matrix: Vec<f32>,
    norms: Vec<f32>,
    index: AHashMap<ItemId, usize>,
}

impl EmbeddingStore {
    /// Build the store from a pool snapshot.
    ///
    /// The first item fixes the dimension; every other item must match it.
    pub fn from_items(items: Vec<Item>) -> Result<Self> {
        let dim = match items.first() {
            Some(first) if first.vector.dim() > 0 => first.vector.dim(),
            Some(first) => {
                return Err(Error::InvalidDimension {
                    expected: 1,
                    actual: first.vector.dim(),
                })
            }
            None => return Err(Error::EmptyPool),
        };

        let mut matrix = Vec::with_capacity(items.len() * dim);
        let mut norms = Vec::with_capacity(items.len());
        let mut index = AHashMap::with_capacity(items.len());

        for (row, item) in items.iter().enumerate() {
            item.vector.check_dim(dim)?;
            if index.insert(item.id.clone(), row).is_some() {
                return Err(Error::DuplicateItem(item.id.to_string()));
            }
            matrix.extend_from_slice(item.vector.as_slice());
            norms.push(item.vector.norm());
        }

        tracing::debug!(items = items.len(), dim, "embedding store loaded");

        Ok(Self {
            dim,
            items,
            matrix,
            norms,
            index,
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    #[inline]
    pub fn row_of(&self, id: &ItemId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Embedding slice of a row
    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.matrix[row * self.dim..(row + 1) * self.dim]
    }

    #[inline]
    pub fn item_at(&self, row: usize) -> &Item {
        &self.items[row]
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.row_of(id).map(|row| &self.items[row])
    }

    /// Resolve an item's vector, or `ItemNotFound`
    pub fn lookup(&self, id: &ItemId) -> Result<&Vector> {
        self.item(id)
            .map(|item| &item.vector)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))
    }

    /// The whole matrix, row `i` belonging to `ids()[i]`
    #[inline]
    pub fn all_vectors(&self) -> &[f32] {
        &self.matrix
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.id)
    }

    /// Cosine similarity of `query` against every row accepted by `keep`.
    ///
    /// Rows are scored in parallel; the result is in row order.
    pub fn cosine_all<F>(&self, query: &Vector, keep: F) -> Result<Vec<(usize, f32)>>
    where
        F: Fn(usize) -> bool + Sync,
    {
        query.check_dim(self.dim)?;
        let query_norm = query.norm();
        let q = query.as_slice();

        Ok((0..self.items.len())
            .into_par_iter()
            .filter(|&row| keep(row))
            .map(|row| {
                let denom = query_norm * self.norms[row];
                let score = if denom == 0.0 {
                    0.0
                } else {
                    crate::simd::dot_product_simd(q, self.row(row)) / denom
                };
                (row, score)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Vec<Item> {
        vec![
            Item::new("a", Vector::new(vec![1.0, 0.0])),
            Item::new("b", Vector::new(vec![0.0, 2.0])),
            Item::new("c", Vector::new(vec![1.0, 1.0])),
        ]
    }

    #[test]
    fn test_lookup_and_rows() {
        let store = EmbeddingStore::from_items(pool()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.dim(), 2);
        assert_eq!(store.row_of(&"b".into()), Some(1));
        assert_eq!(store.row(1), &[0.0, 2.0]);
        assert_eq!(store.lookup(&"c".into()).unwrap().as_slice(), &[1.0, 1.0]);
        assert_eq!(store.all_vectors().len(), 6);
    }

    #[test]
    fn test_lookup_missing() {
        let store = EmbeddingStore::from_items(pool()).unwrap();
        assert!(matches!(store.lookup(&"zzz".into()), Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_rejects_empty_pool() {
        assert!(matches!(EmbeddingStore::from_items(vec![]), Err(Error::EmptyPool)));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let mut items = pool();
        items.push(Item::new("d", Vector::new(vec![1.0, 0.0, 0.0])));
        assert!(matches!(
            EmbeddingStore::from_items(items),
            Err(Error::InvalidDimension { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut items = pool();
        items.push(Item::new("a", Vector::new(vec![0.5, 0.5])));
        assert!(matches!(EmbeddingStore::from_items(items), Err(Error::DuplicateItem(_))));
    }

    #[test]
    fn test_cosine_all_respects_filter() {
        let store = EmbeddingStore::from_items(pool()).unwrap();
        let query = Vector::new(vec![1.0, 0.0]);
        let scores = store.cosine_all(&query, |row| row != 0).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].0, 1);
        assert!(scores[0].1.abs() < 1e-6);
        assert!((scores[1].1 - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_all_checks_query_dim() {
        let store = EmbeddingStore::from_items(pool()).unwrap();
        let query = Vector::new(vec![1.0]);
        assert!(store.cosine_all(&query, |_| true).is_err());
    }
}
