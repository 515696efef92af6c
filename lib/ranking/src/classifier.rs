//! Auxiliary relevance classifier
//!
//! The scorer only sees the [`Classifier`] trait. [`MlpClassifier`] runs
//! inference for a small feed-forward network exported as JSON weights:
//! dense layers with ReLU in between and a sigmoid on the single output.

use fairrank_core::simd::dot_product_simd;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("input size mismatch: expected {expected}, got {actual}")]
    InputSize { expected: usize, actual: usize },

    #[error("malformed output {0}, expected a probability in [0, 1]")]
    Malformed(f32),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("classifier backend failed: {0}")]
    Backend(String),
}

impl From<ClassifierError> for fairrank_core::Error {
    fn from(e: ClassifierError) -> Self {
        fairrank_core::Error::Classifier(e.to_string())
    }
}

/// Scores a `(user ‖ item)` feature vector.
pub trait Classifier: Send + Sync {
    /// Length of the concatenated input the model expects
    fn input_dim(&self) -> usize;

    /// Probability that the user likes the item
    fn predict(&self, features: &[f32]) -> Result<f32, ClassifierError>;
}

/// One fully connected layer; `weights` is `out × in`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    fn in_dim(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| dot_product_simd(row, input) + b)
            .collect()
    }
}

/// Stack of dense layers, ReLU between them and a sigmoid on the single
/// output. Deserializing goes through [`MlpClassifier::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "MlpWeights")]
pub struct MlpClassifier {
    layers: Vec<DenseLayer>,
}

/// Unchecked wire form of the weights
#[derive(Deserialize)]
struct MlpWeights {
    layers: Vec<DenseLayer>,
}

impl TryFrom<MlpWeights> for MlpClassifier {
    type Error = ClassifierError;

    fn try_from(weights: MlpWeights) -> Result<Self, Self::Error> {
        MlpClassifier::new(weights.layers)
    }
}

impl MlpClassifier {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ClassifierError> {
        if layers.is_empty() {
            return Err(ClassifierError::InvalidModel("no layers".into()));
        }

        for (i, layer) in layers.iter().enumerate() {
            if layer.out_dim() == 0 || layer.in_dim() == 0 {
                return Err(ClassifierError::InvalidModel(format!("layer {i} is empty")));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(ClassifierError::InvalidModel(format!(
                    "layer {i}: {} biases for {} outputs",
                    layer.bias.len(),
                    layer.out_dim()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != layer.in_dim()) {
                return Err(ClassifierError::InvalidModel(format!("layer {i}: ragged weights")));
            }
            if i > 0 && layers[i - 1].out_dim() != layer.in_dim() {
                return Err(ClassifierError::InvalidModel(format!(
                    "layer {i} expects {} inputs, previous layer yields {}",
                    layer.in_dim(),
                    layers[i - 1].out_dim()
                )));
            }
        }

        if layers[layers.len() - 1].out_dim() != 1 {
            return Err(ClassifierError::InvalidModel("final layer must have one output".into()));
        }

        Ok(Self { layers })
    }

    /// Load weights exported as `{"layers": [{"weights": [[..]], "bias": [..]}, ..]}`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> fairrank_core::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Classifier for MlpClassifier {
    fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::in_dim).unwrap_or(0)
    }

    fn predict(&self, features: &[f32]) -> Result<f32, ClassifierError> {
        if features.len() != self.input_dim() {
            return Err(ClassifierError::InputSize {
                expected: self.input_dim(),
                actual: features.len(),
            });
        }

        let last = self.layers.len() - 1;
        let mut activations = features.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if i != last {
                for x in &mut activations {
                    *x = x.max(0.0);
                }
            }
        }

        let logit = activations[0];
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}
