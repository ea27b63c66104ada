use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::analyze_video_use_case::PalsyReport;
use crate::shared::error::PalsyError;
use crate::shared::settings::Settings;

/// Everything one analysis run needs; also the worker's stdin payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub video: PathBuf,
    pub artefact: PathBuf,
    #[serde(default)]
    pub settings: Settings,
}

/// Abstracts where the screening pipeline runs.
///
/// This is a port; infrastructure provides in-process and crash-isolated
/// implementations.
pub trait PipelineExecutor: Send + Sync {
    fn execute(&self, request: &AnalysisRequest) -> Result<PalsyReport, PalsyError>;
}
