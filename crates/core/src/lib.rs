//! Facial palsy screening from short face videos.
//!
//! Frames are sampled from a video, the primary face is located and meshed,
//! per-frame asymmetry indices are aggregated over time, and a gradient
//! boosted classifier turns the aggregate into a probability and a label.

pub mod classification;
pub mod detection;
pub mod features;
pub mod pipeline;
pub mod shared;
pub mod video;
