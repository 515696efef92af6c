use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A dense embedding (user preference or item content)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        crate::simd::norm_simd(&self.data)
    }

    /// Cosine similarity; 0.0 when either side has zero norm or the
    /// dimensions differ.
    #[inline]
    pub fn cosine_similarity(&self, other: &Vector) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }
        let norm_a = self.norm();
        let norm_b = other.norm();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        crate::simd::dot_product_simd(&self.data, &other.data) / (norm_a * norm_b)
    }

    /// Normalize to unit length. Zero vectors are left untouched.
    #[inline]
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > f32::EPSILON {
            let inv = 1.0 / norm;
            for x in &mut self.data {
                *x *= inv;
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut v = self.clone();
        v.normalize();
        v
    }

    /// `(1 - weight) * self + weight * other`, without normalizing.
    pub fn blend(&self, other: &Vector, weight: f32) -> Result<Vector> {
        other.check_dim(self.dim())?;
        Ok(Vector::new(crate::simd::weighted_sum(
            &self.data,
            1.0 - weight,
            &other.data,
            weight,
        )))
    }

    #[inline]
    pub fn check_dim(&self, expected: usize) -> Result<()> {
        if self.dim() != expected {
            return Err(Error::InvalidDimension {
                expected,
                actual: self.dim(),
            });
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}
