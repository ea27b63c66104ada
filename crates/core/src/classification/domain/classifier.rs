use serde::{Deserialize, Serialize};

/// Domain interface for a binary classifier over an aggregate vector.
///
/// Input values are already in the classifier's training column order.
pub trait Classifier: Send + Sync {
    /// Probability of the positive (palsy) class, in `[0, 1]`.
    fn probability(&self, features: &[Option<f64>]) -> Result<f64, Box<dyn std::error::Error>>;
}

/// Probability plus the thresholded 0/1 decision.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub probability: f64,
    /// 1 = suspected palsy, 0 = normal.
    pub label: u8,
}

impl Prediction {
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        Self {
            probability,
            label: u8::from(probability >= threshold),
        }
    }
}
