pub const FACE_DETECTOR_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const LANDMARK_MODEL_NAME: &str = "face_mesh_468.onnx";

/// Assumed source rate when the container reports none.
pub const DEFAULT_SOURCE_FPS: f64 = 30.0;

pub const DEFAULT_TARGET_FPS: f64 = 10.0;

/// Minimum face-presence confidence for the landmark model.
pub const DEFAULT_MIN_LANDMARK_CONFIDENCE: f32 = 0.3;

pub const DEFAULT_VIDEO_NAME: &str = "affected_4.mp4";
pub const DEFAULT_ARTEFACT_NAME: &str = "xgb_stroke.json";

/// Prefix of the per-invocation frame scratch directory.
pub const SCRATCH_PREFIX: &str = "palsy_frames_";

/// Environment variable naming a directory that holds the ONNX models.
pub const MODEL_DIR_ENV: &str = "PALSY_MODEL_DIR";
