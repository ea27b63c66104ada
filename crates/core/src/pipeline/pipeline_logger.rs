use std::collections::BTreeMap;
use std::time::Instant;

/// Stage names reported by the analysis use case.
pub const STAGE_DETECT: &str = "detect";
pub const STAGE_LANDMARKS: &str = "landmarks";
pub const STAGE_FEATURES: &str = "features";
pub const STAGE_CLASSIFY: &str = "classify";

/// Fraction of sampled frames without a usable face.
pub const METRIC_MISS_RATE: &str = "detection_miss_rate";

/// Cross-cutting observer for analysis events.
///
/// Keeps the use case free of any particular output mechanism; the CLI logs
/// through `log`, tests and worker-side callers can stay silent.
pub trait PipelineLogger: Send {
    /// Report frame-level progress. `total` is an estimate from the container.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one frame (or one run).
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric.
    fn metric(&mut self, name: &str, value: f64);

    /// One-off informational line, such as per-video stream details.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Collects per-stage timings and metrics and reports them via `log`.
///
/// Progress lines are throttled to every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Analysis summary ({} frames, {:.1}s total):",
            self.frames_seen,
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = average(durations);
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({} calls)",
                durations.len()
            ));
        }
        for (name, values) in &self.metrics {
            lines.push(format!("  {name}: {:.3}", average(values)));
        }
        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(Vec::as_slice)
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        if current % self.throttle_frames == 0 {
            if total > 0 {
                log::info!("Analyzing: {current}/~{total} frames");
            } else {
                log::info!("Analyzing: {current} frames");
            }
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
