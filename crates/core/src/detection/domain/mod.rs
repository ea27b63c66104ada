pub mod face_detector;
pub mod face_locator;
pub mod landmark_model;
pub mod landmark_set;
