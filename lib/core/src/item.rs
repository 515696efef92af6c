use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::vector::Vector;

/// Group label used when an item lacks the protected attribute
pub const UNKNOWN_GROUP: &str = "unknown";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<u64> for $name {
            fn from(i: u64) -> Self {
                Self(i.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a job in the pool
    ItemId
);

string_id!(
    /// Identifier of a user (job seeker)
    UserId
);

/// A pool entry: embedding plus free-form metadata such as `company_bucket`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub vector: Vector,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Item {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<ItemId>, vector: Vector) -> Self {
        Self {
            id: id.into(),
            vector,
            attributes: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
