use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_locator::FaceSelection;
use crate::detection::infrastructure::execution_provider::Device;
use crate::shared::constants::{
    DEFAULT_MIN_LANDMARK_CONFIDENCE, DEFAULT_SOURCE_FPS, DEFAULT_TARGET_FPS,
};
use crate::shared::face_box::DEFAULT_FACE_PADDING;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Tunables for one analysis run.
///
/// Every field has a default, so a settings file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_fps: f64,
    pub fallback_source_fps: f64,
    pub face_padding: f64,
    pub min_landmark_confidence: f32,
    pub face_selection: FaceSelection,
    pub device: Device,
    /// Directory checked first for the ONNX models.
    pub model_dir: Option<PathBuf>,
    pub face_detector_url: Option<String>,
    pub landmark_model_url: Option<String>,
    /// Parent of the frame scratch directory; system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            fallback_source_fps: DEFAULT_SOURCE_FPS,
            face_padding: DEFAULT_FACE_PADDING,
            min_landmark_confidence: DEFAULT_MIN_LANDMARK_CONFIDENCE,
            face_selection: FaceSelection::default(),
            device: Device::default(),
            model_dir: None,
            face_detector_url: None,
            landmark_model_url: None,
            scratch_root: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Settings = serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "target fps must be positive, got {}",
                self.target_fps
            )));
        }
        if !(self.fallback_source_fps.is_finite() && self.fallback_source_fps > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "fallback source fps must be positive, got {}",
                self.fallback_source_fps
            )));
        }
        if !(0.0..=1.0).contains(&self.face_padding) {
            return Err(SettingsError::Invalid(format!(
                "face padding must be between 0.0 and 1.0, got {}",
                self.face_padding
            )));
        }
        if !(0.0..=1.0).contains(&self.min_landmark_confidence) {
            return Err(SettingsError::Invalid(format!(
                "landmark confidence must be between 0.0 and 1.0, got {}",
                self.min_landmark_confidence
            )));
        }
        Ok(())
    }
}
