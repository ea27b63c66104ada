use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage that owns a model or resource, used for error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FaceLocation,
    Landmarks,
    Classification,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FaceLocation => write!(f, "face location"),
            Stage::Landmarks => write!(f, "landmark extraction"),
            Stage::Classification => write!(f, "classification"),
        }
    }
}

/// Fatal failures of one analysis invocation.
///
/// Per-frame detection misses and under-populated feature columns are not
/// errors; they travel through the pipeline as missing values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PalsyError {
    #[error("cannot open video {path}: {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    #[error("failed to decode video {path}: {reason}")]
    VideoDecode { path: PathBuf, reason: String },

    #[error("failed to load artefact {path}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("{stage} failed: {reason}")]
    Model { stage: Stage, reason: String },

    #[error("scratch storage error: {0}")]
    Scratch(String),

    #[error("worker process crashed ({status})")]
    WorkerCrash {
        status: String,
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("worker protocol error: {0}")]
    WorkerProtocol(String),

    #[error("invalid settings: {0}")]
    Settings(String),
}

impl PalsyError {
    pub fn model(stage: Stage, reason: impl fmt::Display) -> Self {
        PalsyError::Model {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Discriminant of [`PalsyError`] carried across the worker boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    VideoOpen,
    VideoDecode,
    ArtifactLoad,
    Model,
    Scratch,
    WorkerCrash,
    WorkerProtocol,
    Settings,
}

/// Serializable form of a [`PalsyError`].
///
/// Sources are flattened to strings, so a round trip through a worker
/// reproduces the variant and its message but not the original error chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl From<&PalsyError> for FailureReport {
    fn from(err: &PalsyError) -> Self {
        let (kind, message, path, stage) = match err {
            PalsyError::VideoOpen { path, reason } => {
                (FailureKind::VideoOpen, reason.clone(), Some(path.clone()), None)
            }
            PalsyError::VideoDecode { path, reason } => {
                (FailureKind::VideoDecode, reason.clone(), Some(path.clone()), None)
            }
            PalsyError::ArtifactLoad { path, reason } => {
                (FailureKind::ArtifactLoad, reason.clone(), Some(path.clone()), None)
            }
            PalsyError::Model { stage, reason } => {
                (FailureKind::Model, reason.clone(), None, Some(*stage))
            }
            PalsyError::Scratch(reason) => (FailureKind::Scratch, reason.clone(), None, None),
            PalsyError::WorkerCrash { status, .. } => {
                (FailureKind::WorkerCrash, status.clone(), None, None)
            }
            PalsyError::WorkerProtocol(reason) => {
                (FailureKind::WorkerProtocol, reason.clone(), None, None)
            }
            PalsyError::Settings(reason) => (FailureKind::Settings, reason.clone(), None, None),
        };
        Self {
            kind,
            message,
            path,
            stage,
        }
    }
}

impl From<FailureReport> for PalsyError {
    fn from(report: FailureReport) -> Self {
        let path = report.path.unwrap_or_default();
        let reason = report.message;
        match report.kind {
            FailureKind::VideoOpen => PalsyError::VideoOpen { path, reason },
            FailureKind::VideoDecode => PalsyError::VideoDecode { path, reason },
            FailureKind::ArtifactLoad => PalsyError::ArtifactLoad { path, reason },
            FailureKind::Model => PalsyError::Model {
                stage: report.stage.unwrap_or(Stage::Classification),
                reason,
            },
            FailureKind::Scratch => PalsyError::Scratch(reason),
            FailureKind::WorkerCrash => PalsyError::WorkerCrash {
                status: reason,
                code: None,
                signal: None,
            },
            FailureKind::WorkerProtocol => PalsyError::WorkerProtocol(reason),
            FailureKind::Settings => PalsyError::Settings(reason),
        }
    }
}
