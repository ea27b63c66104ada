use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detection::domain::face_locator::FaceLocator;
use crate::detection::domain::landmark_model::LandmarkExtractor;
use crate::features::domain::aggregate_vector::AggregateVector;
use crate::features::domain::asymmetry_tracker::AsymmetryTracker;
use crate::features::domain::feature_matrix::FeatureMatrix;
use crate::pipeline::pipeline_context::PipelineContext;
use crate::pipeline::pipeline_logger::{
    PipelineLogger, METRIC_MISS_RATE, STAGE_CLASSIFY, STAGE_DETECT, STAGE_FEATURES,
    STAGE_LANDMARKS,
};
use crate::shared::error::{PalsyError, Stage};
use crate::video::domain::frame_sampler::FrameSampler;

/// Outcome of one screened video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PalsyReport {
    /// File name of the analyzed video.
    pub video: String,
    pub probability: f64,
    /// 1 = suspected palsy, 0 = normal.
    pub label: u8,
}

/// Video screening pipeline: sample → locate face → landmarks → asymmetry
/// features → temporal aggregate → classifier.
pub struct AnalyzeVideoUseCase<'a> {
    context: &'a PipelineContext,
    logger: Box<dyn PipelineLogger>,
}

impl<'a> AnalyzeVideoUseCase<'a> {
    pub fn new(context: &'a PipelineContext, logger: Box<dyn PipelineLogger>) -> Self {
        Self { context, logger }
    }

    pub fn execute(&mut self, video: &Path) -> Result<PalsyReport, PalsyError> {
        let matrix = self.extract_features(video)?;

        let start = Instant::now();
        let vector = AggregateVector::from_matrix(&matrix);
        self.logger.timing(STAGE_FEATURES, elapsed_ms(start));

        let start = Instant::now();
        let prediction = self
            .context
            .artifact()
            .predict(&vector)
            .map_err(|e| PalsyError::model(Stage::Classification, e))?;
        self.logger.timing(STAGE_CLASSIFY, elapsed_ms(start));
        self.logger.summary();

        let name = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| video.display().to_string());
        log::info!(
            "{name}: probability {:.3}, label {} ({} of 168 aggregate values present)",
            prediction.probability,
            prediction.label,
            vector.present_count()
        );
        Ok(PalsyReport {
            video: name,
            probability: prediction.probability,
            label: prediction.label,
        })
    }

    /// Runs the per-frame stages and returns one row per sampled frame.
    pub fn extract_features(&mut self, video: &Path) -> Result<FeatureMatrix, PalsyError> {
        let settings = self.context.settings();
        let locator = FaceLocator::new(settings.face_padding, settings.face_selection);
        let extractor = LandmarkExtractor::new(settings.min_landmark_confidence);

        let mut detector = self
            .context
            .detector()
            .lock()
            .map_err(|_| PalsyError::model(Stage::FaceLocation, "detector lock poisoned"))?;
        let mut landmark_model = self
            .context
            .landmark_model()
            .lock()
            .map_err(|_| PalsyError::model(Stage::Landmarks, "landmark model lock poisoned"))?;

        let mut sampler = FrameSampler::new(
            self.context.new_reader(),
            self.context.new_image_writer(),
            settings.target_fps,
        )
        .with_fallback_fps(settings.fallback_source_fps)
        .with_scratch_root(settings.scratch_root.clone());
        let mut samples = sampler.open(video)?;
        let expected = samples.expected_len();
        let meta = samples.metadata();
        self.logger.info(&format!(
            "{}: {}x{} {} at {:.2} fps, {} frames, sampling every {} frame(s)",
            video.display(),
            meta.width,
            meta.height,
            meta.codec,
            meta.fps,
            meta.total_frames,
            samples.stride()
        ));

        let mut tracker = AsymmetryTracker::new();
        let mut misses = 0usize;
        for frame in samples.by_ref() {
            let frame = frame?;

            let start = Instant::now();
            let crop = locator
                .locate(&mut **detector, &frame)
                .map_err(|e| PalsyError::model(Stage::FaceLocation, e))?;
            self.logger.timing(STAGE_DETECT, elapsed_ms(start));

            let landmarks = match crop {
                Some(crop) => {
                    let start = Instant::now();
                    let landmarks = extractor
                        .extract(&mut **landmark_model, &crop.image)
                        .map_err(|e| PalsyError::model(Stage::Landmarks, e))?;
                    self.logger.timing(STAGE_LANDMARKS, elapsed_ms(start));
                    landmarks
                }
                None => None,
            };

            match landmarks {
                Some(landmarks) => {
                    tracker.observe(landmarks);
                }
                None => {
                    log::trace!("Frame {}: no face", frame.index());
                    misses += 1;
                    tracker.miss();
                }
            }
            self.logger.progress(tracker.len(), expected);
        }
        drop(samples);

        let matrix = tracker.finish();
        if !matrix.is_empty() {
            self.logger
                .metric(METRIC_MISS_RATE, misses as f64 / matrix.len() as f64);
        }
        log::debug!(
            "Extracted {} rows ({misses} without a face) from {}",
            matrix.len(),
            video.display()
        );
        Ok(matrix)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classification::domain::classifier::Classifier;
    use crate::classification::infrastructure::artifact::tests::artifact_json;
    use crate::classification::infrastructure::artifact::{Artifact, ColumnOrder};
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::detection::domain::landmark_model::{LandmarkModel, RawLandmarks};
    use crate::features::domain::aggregate_vector::aggregate_names;
    use crate::features::domain::asymmetry_index::AsymmetryIndex;
    use crate::features::domain::asymmetry_tracker::tests::symmetric_face;
    use crate::features::domain::statistics::{Statistic, STATISTIC_COUNT};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::face_box::FaceBox;
    use crate::shared::frame::Frame;
    use crate::shared::settings::Settings;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::video::domain::image_writer::ImageWriter;
    use crate::video::domain::video_reader::VideoReader;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const SIZE: u32 = 64;

    /// Serves `count` blank frames at `fps`; paths containing "missing" fail to open.
    /// With `fail_at`, decoding breaks at that source frame.
    pub(crate) struct StubReader {
        count: usize,
        fps: f64,
        fail_at: Option<usize>,
    }

    impl VideoReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if path.to_string_lossy().contains("missing") {
                return Err("No such file or directory".into());
            }
            Ok(VideoMetadata {
                width: SIZE,
                height: SIZE,
                fps: self.fps,
                total_frames: self.count,
                codec: "stub".into(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let fail_at = self.fail_at;
            Box::new((0..self.count).map(move |i| {
                if Some(i) == fail_at {
                    return Err("Invalid data found when processing input".into());
                }
                Ok(Frame::new(vec![0u8; (SIZE * SIZE * 3) as usize], SIZE, SIZE, i))
            }))
        }

        fn close(&mut self) {}
    }

    struct NullWriter;

    impl ImageWriter for NullWriter {
        fn write(&self, _path: &Path, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    /// Finds one centred face except on the listed sample indices.
    pub(crate) struct StubDetector {
        pub(crate) misses: HashSet<usize>,
        pub(crate) fail: bool,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("inference failed".into());
            }
            if self.misses.contains(&frame.index()) {
                return Ok(vec![]);
            }
            Ok(vec![FaceBox::new(10, 10, 50, 50, 0.9)])
        }
    }

    /// Returns the synthetic symmetric face regardless of input.
    pub(crate) struct StubMesh;

    impl LandmarkModel for StubMesh {
        fn infer(&mut self, _crop: &Frame) -> Result<Option<RawLandmarks>, Box<dyn std::error::Error>> {
            let points = symmetric_face()
                .points()
                .iter()
                .map(|p| (p.x as f32 / 200.0, p.y as f32 / 200.0))
                .collect();
            Ok(Some(RawLandmarks {
                points,
                confidence: 0.9,
            }))
        }
    }

    /// Stump on `NS_max`: static heads go left (margin -2), moving heads right.
    pub(crate) fn head_motion_artifact() -> Artifact {
        let slot = (AsymmetryIndex::Ns.column() * STATISTIC_COUNT + Statistic::Max.slot()) as u32;
        Artifact::from_json(artifact_json(slot, 0.5, 0.5, aggregate_names()).as_bytes()).unwrap()
    }

    pub(crate) fn stub_context(
        frames: usize,
        detector: StubDetector,
        settings: Settings,
    ) -> PipelineContext {
        PipelineContext::new(
            settings,
            Box::new(detector),
            Box::new(StubMesh),
            head_motion_artifact(),
            Box::new(move || Box::new(StubReader { count: frames, fps: 30.0, fail_at: None })),
            Box::new(|| Box::new(NullWriter)),
        )
    }

    fn always_face() -> StubDetector {
        StubDetector {
            misses: HashSet::new(),
            fail: false,
        }
    }

    fn run_features(context: &PipelineContext) -> Result<FeatureMatrix, PalsyError> {
        AnalyzeVideoUseCase::new(context, Box::new(NullPipelineLogger))
            .extract_features(Path::new("clip.mp4"))
    }

    #[test]
    fn test_row_count_matches_sampled_frames() {
        // 3 s at 30 fps sampled at 10 fps
        let context = stub_context(90, always_face(), Settings::default());
        let matrix = run_features(&context).unwrap();
        assert_eq!(matrix.len(), 30);
        assert_eq!(matrix.missing_rows(), 0);
    }

    #[test]
    fn test_movement_indices_missing_after_miss() {
        let detector = StubDetector {
            misses: [2].into_iter().collect(),
            fail: false,
        };
        let context = stub_context(15, detector, Settings::default());
        let matrix = run_features(&context).unwrap();
        let rows = matrix.rows();
        assert_eq!(rows.len(), 5);
        assert!(rows[2].is_missing());
        assert_eq!(rows[1].get(AsymmetryIndex::Ns), Some(0.0));
        for index in [AsymmetryIndex::Smm, AsymmetryIndex::Ns, AsymmetryIndex::Ja] {
            assert_eq!(rows[3].get(index), None);
        }
        assert_eq!(rows[4].get(AsymmetryIndex::Ja), Some(0.0));
    }

    #[test]
    fn test_single_frame_video() {
        let context = stub_context(1, always_face(), Settings::default());
        let matrix = run_features(&context).unwrap();
        assert_eq!(matrix.len(), 1);
        let row = matrix.rows()[0];
        for index in AsymmetryIndex::ALL {
            assert_eq!(row.get(index).is_none(), index.needs_previous(), "{index}");
        }
    }

    #[test]
    fn test_static_symmetric_face_is_normal() {
        let context = stub_context(60, always_face(), Settings::default());
        let report = AnalyzeVideoUseCase::new(&context, Box::new(NullPipelineLogger))
            .execute(Path::new("/videos/clip.mp4"))
            .unwrap();
        assert_eq!(report.video, "clip.mp4");
        assert_eq!(report.label, 0);
        assert!((report.probability - 1.0 / (1.0 + 2f64.exp())).abs() < 1e-6);
    }

    #[test]
    fn test_no_faces_at_all_uses_default_branches() {
        let detector = StubDetector {
            misses: (0..10).collect(),
            fail: false,
        };
        let context = stub_context(30, detector, Settings::default());
        let report = AnalyzeVideoUseCase::new(&context, Box::new(NullPipelineLogger))
            .execute(Path::new("clip.mp4"))
            .unwrap();
        // Missing NS_max defaults left.
        assert_eq!(report.label, 0);
    }

    #[test]
    fn test_unopenable_video_leaves_no_scratch() {
        let scratch = TempDir::new().unwrap();
        let settings = Settings {
            scratch_root: Some(scratch.path().to_path_buf()),
            ..Settings::default()
        };
        let context = stub_context(10, always_face(), settings);
        let err = AnalyzeVideoUseCase::new(&context, Box::new(NullPipelineLogger))
            .execute(Path::new("missing.mp4"))
            .unwrap_err();
        assert!(matches!(err, PalsyError::VideoOpen { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_removed_after_success() {
        let scratch = TempDir::new().unwrap();
        let settings = Settings {
            scratch_root: Some(scratch.path().to_path_buf()),
            ..Settings::default()
        };
        let context = stub_context(10, always_face(), settings);
        run_features(&context).unwrap();
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_detector_failure_is_model_error() {
        let detector = StubDetector {
            misses: HashSet::new(),
            fail: true,
        };
        let context = stub_context(10, detector, Settings::default());
        let err = run_features(&context).unwrap_err();
        assert!(matches!(
            err,
            PalsyError::Model {
                stage: Stage::FaceLocation,
                ..
            }
        ));
    }

    struct Broken;

    impl Classifier for Broken {
        fn probability(&self, _: &[Option<f64>]) -> Result<f64, Box<dyn std::error::Error>> {
            Err("corrupt ensemble".into())
        }
    }

    #[test]
    fn test_classifier_failure_is_model_error() {
        let context = PipelineContext::new(
            Settings::default(),
            Box::new(always_face()),
            Box::new(StubMesh),
            Artifact::new(Box::new(Broken), 0.5, ColumnOrder::Positional).unwrap(),
            Box::new(|| Box::new(StubReader { count: 3, fps: 30.0, fail_at: None })),
            Box::new(|| Box::new(NullWriter)),
        );
        let err = AnalyzeVideoUseCase::new(&context, Box::new(NullPipelineLogger))
            .execute(Path::new("clip.mp4"))
            .unwrap_err();
        assert!(matches!(
            err,
            PalsyError::Model {
                stage: Stage::Classification,
                ..
            }
        ));
    }

    #[test]
    fn test_mid_stream_decode_failure_aborts_analysis() {
        let context = PipelineContext::new(
            Settings::default(),
            Box::new(always_face()),
            Box::new(StubMesh),
            head_motion_artifact(),
            Box::new(|| Box::new(StubReader { count: 90, fps: 30.0, fail_at: Some(45) })),
            Box::new(|| Box::new(NullWriter)),
        );
        let err = AnalyzeVideoUseCase::new(&context, Box::new(NullPipelineLogger))
            .execute(Path::new("clip.mp4"))
            .unwrap_err();
        match err {
            PalsyError::VideoDecode { path, reason } => {
                assert_eq!(path, PathBuf::from("clip.mp4"));
                assert!(reason.contains("Invalid data"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Keeps every `info` line for inspection.
    struct InfoRecorder(Arc<Mutex<Vec<String>>>);

    impl PipelineLogger for InfoRecorder {
        fn progress(&mut self, _current: usize, _total: usize) {}
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn metric(&mut self, _name: &str, _value: f64) {}
        fn info(&mut self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_stream_details_reported_once_per_video() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let context = stub_context(30, always_face(), Settings::default());
        AnalyzeVideoUseCase::new(&context, Box::new(InfoRecorder(lines.clone())))
            .extract_features(Path::new("clip.mp4"))
            .unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("64x64 stub at 30.00 fps, 30 frames"), "{}", lines[0]);
        assert!(lines[0].contains("every 3 frame(s)"), "{}", lines[0]);
    }
}
