//! Long-lived resources for analysis runs, built once per process.

use std::path::Path;
use std::sync::Mutex;

use crate::classification::infrastructure::artifact::Artifact;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::landmark_model::LandmarkModel;
use crate::detection::infrastructure::model_resolver::{self, ModelSpec, ProgressFn};
use crate::detection::infrastructure::onnx_blazeface_detector::{
    OnnxBlazefaceDetector, DEFAULT_CONFIDENCE,
};
use crate::detection::infrastructure::onnx_face_mesh::OnnxFaceMesh;
use crate::shared::constants::{FACE_DETECTOR_MODEL_NAME, LANDMARK_MODEL_NAME};
use crate::shared::error::{PalsyError, Stage};
use crate::shared::settings::Settings;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::image_file_writer::ImageFileWriter;

/// Creates a fresh reader for each analyzed video.
pub type ReaderFactory = Box<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;
/// Creates the scratch image writer for each analyzed video.
pub type WriterFactory = Box<dyn Fn() -> Box<dyn ImageWriter> + Send + Sync>;

/// Models, classifier and I/O factories shared by every run in a process.
///
/// Immutable after construction. ONNX inference needs `&mut`, so the two
/// models sit behind mutexes and runs sharing a context are serialized on
/// them.
pub struct PipelineContext {
    settings: Settings,
    detector: Mutex<Box<dyn FaceDetector>>,
    landmark_model: Mutex<Box<dyn LandmarkModel>>,
    artifact: Artifact,
    reader_factory: ReaderFactory,
    writer_factory: WriterFactory,
}

impl PipelineContext {
    pub fn new(
        settings: Settings,
        detector: Box<dyn FaceDetector>,
        landmark_model: Box<dyn LandmarkModel>,
        artifact: Artifact,
        reader_factory: ReaderFactory,
        writer_factory: WriterFactory,
    ) -> Self {
        Self {
            settings,
            detector: Mutex::new(detector),
            landmark_model: Mutex::new(landmark_model),
            artifact,
            reader_factory,
            writer_factory,
        }
    }

    /// Loads the artefact and both ONNX models, with ffmpeg-backed video I/O.
    pub fn load(settings: Settings, artefact_path: &Path) -> Result<Self, PalsyError> {
        settings
            .validate()
            .map_err(|e| PalsyError::Settings(e.to_string()))?;

        let artifact = Artifact::load(artefact_path).map_err(|e| PalsyError::ArtifactLoad {
            path: artefact_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::info!(
            "Loaded artefact {} (threshold {:.3})",
            artefact_path.display(),
            artifact.threshold()
        );

        let device = settings.device;
        let detector_path = resolve_model(
            Stage::FaceLocation,
            ModelSpec::new(FACE_DETECTOR_MODEL_NAME, settings.face_detector_url.clone()),
            settings.model_dir.as_deref(),
        )?;
        let detector = OnnxBlazefaceDetector::new(&detector_path, DEFAULT_CONFIDENCE, device)
            .map_err(|e| PalsyError::model(Stage::FaceLocation, e))?;

        let mesh_path = resolve_model(
            Stage::Landmarks,
            ModelSpec::new(LANDMARK_MODEL_NAME, settings.landmark_model_url.clone()),
            settings.model_dir.as_deref(),
        )?;
        let mesh = OnnxFaceMesh::new(&mesh_path, device)
            .map_err(|e| PalsyError::model(Stage::Landmarks, e))?;

        Ok(Self::new(
            settings,
            Box::new(detector),
            Box::new(mesh),
            artifact,
            Box::new(|| Box::new(FfmpegReader::new())),
            Box::new(|| Box::new(ImageFileWriter::new())),
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn detector(&self) -> &Mutex<Box<dyn FaceDetector>> {
        &self.detector
    }

    pub fn landmark_model(&self) -> &Mutex<Box<dyn LandmarkModel>> {
        &self.landmark_model
    }

    pub fn new_reader(&self) -> Box<dyn VideoReader> {
        (self.reader_factory)()
    }

    pub fn new_image_writer(&self) -> Box<dyn ImageWriter> {
        (self.writer_factory)()
    }
}

fn resolve_model(
    stage: Stage,
    spec: ModelSpec,
    model_dir: Option<&Path>,
) -> Result<std::path::PathBuf, PalsyError> {
    let name = spec.file_name.clone();
    let progress: ProgressFn = Box::new(move |done, total| {
        if total > 0 {
            log::debug!("{name}: {done}/{total} bytes");
        }
    });
    let path = model_resolver::resolve(&spec, model_dir, Some(progress))
        .map_err(|e| PalsyError::model(stage, e))?;
    log::debug!("{stage} model: {}", path.display());
    Ok(path)
}
