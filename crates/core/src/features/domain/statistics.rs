//! Summary statistics over the present values of one feature column.

/// Relative resolution below which a variance counts as zero
/// (matches `numpy.finfo(float64).resolution`).
const VARIANCE_RESOLUTION: f64 = 1e-15;

/// Absolute first difference above this many standard deviations is a spike.
const SPIKE_SIGMAS: f64 = 3.0;

/// Per-column summary statistics, in aggregate vector order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statistic {
    Mean,
    Std,
    Max,
    Min,
    Range,
    Skew,
    Kurtosis,
    MeanAbsDiff,
    MaxAbsDiff,
    SpikeCount,
    FirstSpike,
    PosDiffRatio,
    NegDiffRatio,
    PeakCount,
    ValleyCount,
}

pub const STATISTIC_COUNT: usize = 15;

impl Statistic {
    pub const ALL: [Statistic; STATISTIC_COUNT] = [
        Statistic::Mean,
        Statistic::Std,
        Statistic::Max,
        Statistic::Min,
        Statistic::Range,
        Statistic::Skew,
        Statistic::Kurtosis,
        Statistic::MeanAbsDiff,
        Statistic::MaxAbsDiff,
        Statistic::SpikeCount,
        Statistic::FirstSpike,
        Statistic::PosDiffRatio,
        Statistic::NegDiffRatio,
        Statistic::PeakCount,
        Statistic::ValleyCount,
    ];

    pub const fn slot(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Max => "max",
            Statistic::Min => "min",
            Statistic::Range => "range",
            Statistic::Skew => "skew",
            Statistic::Kurtosis => "kurtosis",
            Statistic::MeanAbsDiff => "mean_abs_diff",
            Statistic::MaxAbsDiff => "max_abs_diff",
            Statistic::SpikeCount => "spike_count",
            Statistic::FirstSpike => "first_spike",
            Statistic::PosDiffRatio => "pos_diff_ratio",
            Statistic::NegDiffRatio => "neg_diff_ratio",
            Statistic::PeakCount => "peak_count",
            Statistic::ValleyCount => "valley_count",
        }
    }
}

/// All statistics for `values`, or all missing with fewer than two values.
pub fn summarize(values: &[f64]) -> [Option<f64>; STATISTIC_COUNT] {
    let mut out = [None; STATISTIC_COUNT];
    if values.len() < 2 {
        return out;
    }

    let n = values.len() as f64;
    let mean = mean(values);
    let m2 = central_moment(values, mean, 2);
    let std = m2.sqrt();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let abs_diffs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let spike_threshold = SPIKE_SIGMAS * std;
    let spikes: Vec<usize> = abs_diffs
        .iter()
        .enumerate()
        .filter(|(_, &d)| d > spike_threshold)
        .map(|(i, _)| i)
        .collect();
    let d = diffs.len() as f64;

    let mut set = |stat: Statistic, value: Option<f64>| out[stat.slot()] = value;
    set(Statistic::Mean, Some(mean));
    set(Statistic::Std, Some(std));
    set(Statistic::Max, Some(max));
    set(Statistic::Min, Some(min));
    set(Statistic::Range, Some(max - min));
    let degenerate = m2 <= (VARIANCE_RESOLUTION * mean).powi(2);
    set(
        Statistic::Skew,
        (!degenerate).then(|| central_moment(values, mean, 3) / m2.powf(1.5)),
    );
    set(
        Statistic::Kurtosis,
        (!degenerate).then(|| central_moment(values, mean, 4) / (m2 * m2) - 3.0),
    );
    set(Statistic::MeanAbsDiff, Some(abs_diffs.iter().sum::<f64>() / d));
    set(
        Statistic::MaxAbsDiff,
        Some(abs_diffs.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
    );
    set(Statistic::SpikeCount, Some(spikes.len() as f64));
    set(
        Statistic::FirstSpike,
        Some(spikes.first().map_or(n, |&i| i as f64)),
    );
    set(
        Statistic::PosDiffRatio,
        Some(diffs.iter().filter(|&&x| x > 0.0).count() as f64 / d),
    );
    set(
        Statistic::NegDiffRatio,
        Some(diffs.iter().filter(|&&x| x < 0.0).count() as f64 / d),
    );
    set(Statistic::PeakCount, Some(count_local_maxima(values) as f64));
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    set(Statistic::ValleyCount, Some(count_local_maxima(&negated) as f64));
    out
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|v| (v - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Strict local maxima. A flat top counts once when both neighbours of
/// the plateau are lower; the first and last samples never count.
pub fn count_local_maxima(values: &[f64]) -> usize {
    if values.len() < 3 {
        return 0;
    }
    let last = values.len() - 1;
    let mut count = 0;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                count += 1;
                i = ahead;
            }
        }
        i += 1;
    }
    count
}

/// Pearson correlation over the positions where both series are present.
///
/// Missing with fewer than two joint pairs or zero variance on either side.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let mx = mean(&xs);
    let my = mean(&ys);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys.iter()) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    (denom > 0.0).then(|| (sxy / denom).clamp(-1.0, 1.0))
}
