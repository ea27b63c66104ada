//! Classifier artefact: a base64-embedded booster plus its decision metadata.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::classification::domain::classifier::{Classifier, Prediction};
use crate::classification::infrastructure::xgboost_booster::XgbBooster;
use crate::features::domain::aggregate_vector::{aggregate_names, AggregateVector, AGGREGATE_LEN};

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid artefact JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model_base64 is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid booster: {0}")]
    Booster(String),
    #[error("threshold {0} is outside [0, 1]")]
    Threshold(f64),
    #[error("feat_cols has {0} entries, expected {AGGREGATE_LEN}")]
    ColumnCount(usize),
}

#[derive(Deserialize)]
struct ArtifactDocument {
    model_base64: String,
    threshold: f64,
    feat_cols: Vec<String>,
    #[serde(default)]
    xgb_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    xgb_version: Option<String>,
}

/// How the aggregate vector maps onto the classifier's input columns.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnOrder {
    /// Training columns are the aggregate slots in their own order.
    Positional,
    /// `order[i]` is the aggregate slot feeding training column `i`.
    Named(Vec<usize>),
}

impl ColumnOrder {
    /// Named when every column is a known aggregate slot name, else positional.
    pub fn from_feature_columns(columns: &[String]) -> Result<Self, ArtifactError> {
        if columns.len() != AGGREGATE_LEN {
            return Err(ArtifactError::ColumnCount(columns.len()));
        }
        let slots: HashMap<String, usize> = aggregate_names()
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();
        let order: Option<Vec<usize>> = columns.iter().map(|c| slots.get(c).copied()).collect();
        match order {
            Some(order) if order.iter().enumerate().all(|(i, &slot)| i == slot) => {
                Ok(ColumnOrder::Positional)
            }
            Some(order) => Ok(ColumnOrder::Named(order)),
            None => {
                log::warn!(
                    "Artefact feature columns do not match aggregate names; using positional order"
                );
                Ok(ColumnOrder::Positional)
            }
        }
    }
}

/// A loaded, read-only classifier with its threshold.
pub struct Artifact {
    classifier: Box<dyn Classifier>,
    threshold: f64,
    columns: ColumnOrder,
    version: Option<String>,
}

impl Artifact {
    pub fn new(
        classifier: Box<dyn Classifier>,
        threshold: f64,
        columns: ColumnOrder,
    ) -> Result<Self, ArtifactError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ArtifactError::Threshold(threshold));
        }
        Ok(Self {
            classifier,
            threshold,
            columns,
            version: None,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|e| ArtifactError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let doc: ArtifactDocument = serde_json::from_slice(bytes)?;
        let model_bytes = base64::engine::general_purpose::STANDARD.decode(doc.model_base64.trim())?;
        let booster = XgbBooster::from_json(&model_bytes).map_err(ArtifactError::Booster)?;
        if let Some(n) = booster.num_features().filter(|&n| n != AGGREGATE_LEN) {
            return Err(ArtifactError::Booster(format!(
                "booster expects {n} features, expected {AGGREGATE_LEN}"
            )));
        }
        let columns = ColumnOrder::from_feature_columns(&doc.feat_cols)?;

        log::debug!(
            "Loaded artefact: {} trees, threshold {:.3}, xgboost {}, {} params",
            booster.tree_count(),
            doc.threshold,
            doc.xgb_version.as_deref().unwrap_or("unknown"),
            doc.xgb_params.len()
        );

        let mut artifact = Self::new(Box::new(booster), doc.threshold, columns)?;
        artifact.version = doc.xgb_version;
        Ok(artifact)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn columns(&self) -> &ColumnOrder {
        &self.columns
    }

    pub fn predict(
        &self,
        vector: &AggregateVector,
    ) -> Result<Prediction, Box<dyn std::error::Error>> {
        let probability = match &self.columns {
            ColumnOrder::Positional => self.classifier.probability(vector.values())?,
            ColumnOrder::Named(order) => self.classifier.probability(vector.permuted(order).values())?,
        };
        if !(0.0..=1.0).contains(&probability) {
            return Err(format!("classifier returned probability {probability}").into());
        }
        Ok(Prediction::from_probability(probability, self.threshold))
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("threshold", &self.threshold)
            .field("columns", &self.columns)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
