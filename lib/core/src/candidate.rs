use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::item::{ItemId, UNKNOWN_GROUP};

/// Attribute key filled by [`Candidate::new`]
pub const DEFAULT_GROUP_ATTR: &str = "group";

/// A scored item handed to the reranker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ItemId,
    pub score: f32,
    #[serde(default = "default_qualified")]
    pub qualified: bool,
    #[serde(default)]
    pub exposure_count: u64,
    /// Fairness attributes; the reranker reads the protected one by name
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_qualified() -> bool {
    true
}

impl Candidate {
    /// Qualified candidate with no exposure, labelled under `group`
    pub fn new(id: impl Into<ItemId>, score: f32, group: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(DEFAULT_GROUP_ATTR.to_string(), group.into());
        Self {
            id: id.into(),
            score,
            qualified: true,
            exposure_count: 0,
            attributes,
        }
    }

    #[must_use]
    pub fn with_exposure(mut self, exposure_count: u64) -> Self {
        self.exposure_count = exposure_count;
        self
    }

    #[must_use]
    pub fn with_qualified(mut self, qualified: bool) -> Self {
        self.qualified = qualified;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Value of the protected attribute, `"unknown"` when absent
    pub fn group(&self, protected_attr: &str) -> &str {
        self.attributes
            .get(protected_attr)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_GROUP)
    }
}

/// One shortlist entry, in final rank order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: ItemId,
    pub score: f32,
    pub fair_score: f32,
    pub group: String,
    pub exposure_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_defaults_to_unknown() {
        let c = Candidate::new("j1", 0.5, "small");
        assert_eq!(c.group("group"), "small");
        assert_eq!(c.group("company_bucket"), UNKNOWN_GROUP);
    }

    #[test]
    fn test_boundary_shape_defaults() {
        let c: Candidate = serde_json::from_str(r#"{"id":"j1","score":0.4}"#).unwrap();
        assert!(c.qualified);
        assert_eq!(c.exposure_count, 0);
        assert_eq!(c.group("group"), UNKNOWN_GROUP);
    }
}
