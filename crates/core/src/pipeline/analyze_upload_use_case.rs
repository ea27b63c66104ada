use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::pipeline_executor::{AnalysisRequest, PipelineExecutor};
use crate::shared::error::PalsyError;

const UPLOAD_PREFIX: &str = "upload_";
const DEFAULT_UPLOAD_EXTENSION: &str = "mp4";

/// Response shape of the upload surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: u8,
    pub probability: f64,
}

/// Screens an uploaded video held in memory.
///
/// The bytes are stored in a unique temporary file for the duration of the
/// run; `template` supplies the artefact and settings.
pub fn analyze_upload(
    bytes: &[u8],
    file_name: &str,
    executor: &dyn PipelineExecutor,
    template: &AnalysisRequest,
) -> Result<PredictionResponse, PalsyError> {
    let suffix = format!(".{}", upload_extension(file_name));
    let mut builder = tempfile::Builder::new();
    builder.prefix(UPLOAD_PREFIX).suffix(&suffix);
    let created = match template.settings.scratch_root.as_deref() {
        Some(root) => builder.tempfile_in(root),
        None => builder.tempfile(),
    };
    let mut upload = created
        .map_err(|e| PalsyError::Scratch(format!("cannot create upload file: {e}")))?;
    upload
        .write_all(bytes)
        .and_then(|()| upload.flush())
        .map_err(|e| PalsyError::Scratch(format!("cannot store upload {file_name}: {e}")))?;
    log::info!(
        "Stored upload {file_name} ({} bytes) at {}",
        bytes.len(),
        upload.path().display()
    );

    let request = AnalysisRequest {
        video: upload.path().to_path_buf(),
        ..template.clone()
    };
    let result = executor.execute(&request);

    if let Err(e) = upload.close() {
        log::warn!("Could not remove upload file: {e}");
    }
    let report = result?;
    Ok(PredictionResponse {
        prediction: report.label,
        probability: report.probability,
    })
}

/// Client extension when it is a plain alphanumeric token, else `mp4`.
fn upload_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_UPLOAD_EXTENSION.to_string())
}
