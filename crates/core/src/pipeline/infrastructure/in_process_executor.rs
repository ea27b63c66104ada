use std::sync::Arc;

use crate::pipeline::analyze_video_use_case::{AnalyzeVideoUseCase, PalsyReport};
use crate::pipeline::pipeline_context::PipelineContext;
use crate::pipeline::pipeline_executor::{AnalysisRequest, PipelineExecutor};
use crate::pipeline::pipeline_logger::StdoutPipelineLogger;
use crate::shared::error::PalsyError;

/// Runs the pipeline on the calling thread.
///
/// A native crash in a decoder or inference runtime takes the whole process
/// down with it. The worker process uses this executor; callers outside a
/// worker should prefer
/// [`IsolatedProcessExecutor`](super::isolated_process_executor::IsolatedProcessExecutor).
pub struct InProcessExecutor {
    context: Option<Arc<PipelineContext>>,
}

impl InProcessExecutor {
    /// Loads a fresh context from each request's artefact and settings.
    pub fn new() -> Self {
        Self { context: None }
    }

    /// Explicit opt-out of process isolation.
    pub fn unisolated() -> Self {
        log::warn!(
            "Process isolation disabled: a crash in native code will terminate this process"
        );
        Self::new()
    }

    /// Runs every request against an already built context; the request's
    /// artefact and settings are ignored.
    pub fn with_context(context: Arc<PipelineContext>) -> Self {
        Self {
            context: Some(context),
        }
    }
}

impl Default for InProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for InProcessExecutor {
    fn execute(&self, request: &AnalysisRequest) -> Result<PalsyReport, PalsyError> {
        let context = match &self.context {
            Some(context) => Arc::clone(context),
            None => Arc::new(PipelineContext::load(
                request.settings.clone(),
                &request.artefact,
            )?),
        };
        AnalyzeVideoUseCase::new(&context, Box::new(StdoutPipelineLogger::default()))
            .execute(&request.video)
    }
}
