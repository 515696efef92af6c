//! Cold start: a user with no stored vector gets one from a synthesized
//! profile description, encoded by a [`TextEncoder`].

use fairrank_core::{Result, Vector};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Attributes a job seeker filled in or had extracted from their resume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDescription {
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub interested_domain: Option<String>,
    pub projects: Vec<String>,
    pub python_level: Option<String>,
    pub sql_level: Option<String>,
    pub java_level: Option<String>,
}

impl ProfileDescription {
    fn age_bucket(&self) -> &'static str {
        match self.age {
            Some(age) if age >= 35 => "35plus",
            _ => "under35",
        }
    }

    /// Text in the same layout the item embeddings were trained against.
    pub fn to_text(&self) -> String {
        fn or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
            value.as_deref().filter(|v| !v.is_empty()).unwrap_or(default)
        }

        format!(
            "gender {}, age {}, interested domain {}, projects {}, skills python {}, sql {}, java {}.",
            or(&self.gender, "Unknown"),
            self.age_bucket(),
            or(&self.interested_domain, "Unknown"),
            self.projects.join(" "),
            or(&self.python_level, "Weak"),
            or(&self.sql_level, "Weak"),
            or(&self.java_level, "Weak"),
        )
    }
}

/// Turns profile text into a vector in the item embedding space
pub trait TextEncoder: Send + Sync {
    fn dim(&self) -> usize;
    fn encode(&self, text: &str) -> Result<Vector>;
}

/// Feature-hashing encoder over character trigrams and words.
///
/// Deterministic across runs; a stand-in where no sentence model is wired.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dim: usize,
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dim
    }
}

impl TextEncoder for HashingEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, text: &str) -> Result<Vector> {
        let normalized = text.to_lowercase();
        let mut data = vec![0.0f32; self.dim];

        for trigram in trigrams(&normalized) {
            data[self.bucket(&trigram)] += 1.0;
        }
        for word in normalized.split_whitespace() {
            data[self.bucket(word)] += 2.0;
        }

        let mut vector = Vector::new(data);
        vector.normalize();
        Ok(vector)
    }
}

fn trigrams(s: &str) -> HashSet<String> {
    let padded: Vec<char> = format!("  {s}  ").chars().collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}
