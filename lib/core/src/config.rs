use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Tuning knobs for one recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Candidates pulled from the scorer before reranking
    pub fetch_k: usize,
    /// Shortlist size
    pub final_k: usize,
    /// Blend factor towards the auxiliary classifier, in `[0, 1]`
    pub hybrid_weight: f32,
    /// Strength of the inverse-exposure boost
    pub coverage_weight: f32,
    pub min_qualified_score: f32,
    /// Item attribute the fairness quota is computed on
    pub protected_attr: String,
    /// Profile drift per like, in `(0, 1)`
    pub alpha: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            fetch_k: 50,
            final_k: 10,
            hybrid_weight: 0.0,
            coverage_weight: 5.0,
            min_qualified_score: 0.0,
            protected_attr: "company_bucket".to_string(),
            alpha: 0.1,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<()> {
        validate_k("fetch_k", self.fetch_k)?;
        validate_k("final_k", self.final_k)?;
        validate_hybrid_weight(self.hybrid_weight)?;
        validate_finite("coverage_weight", self.coverage_weight)?;
        validate_finite("min_qualified_score", self.min_qualified_score)?;
        validate_alpha(self.alpha)?;
        if self.protected_attr.is_empty() {
            return Err(Error::InvalidConfig("protected_attr must not be empty".into()));
        }
        Ok(())
    }

    /// Load overrides from a JSON file; absent fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: RankingConfig =
            serde_json::from_str(&raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

pub fn validate_k(name: &'static str, k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid_parameter(name, "must be positive"));
    }
    Ok(())
}

pub fn validate_hybrid_weight(weight: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(Error::invalid_parameter(
            "hybrid_weight",
            format!("{weight} is outside [0, 1]"),
        ));
    }
    Ok(())
}

pub fn validate_alpha(alpha: f32) -> Result<()> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::invalid_parameter(
            "alpha",
            format!("{alpha} is outside (0, 1)"),
        ));
    }
    Ok(())
}

pub fn validate_finite(name: &'static str, value: f32) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid_parameter(name, "must be finite"));
    }
    Ok(())
}
