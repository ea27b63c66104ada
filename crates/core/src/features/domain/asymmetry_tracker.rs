//! Per-frame asymmetry measurement with one frame of history.

use crate::detection::domain::landmark_set::{
    Landmark, LandmarkSet, Point, LEFT_CHEEK, MOUTH_CONTOUR, RIGHT_CHEEK,
};
use crate::features::domain::asymmetry_index::{AsymmetryIndex, INDEX_COUNT};
use crate::features::domain::feature_matrix::{FeatureMatrix, FeatureRow};

/// Builds the feature matrix frame by frame.
///
/// The previous landmark set is kept only across consecutive successful
/// frames; any miss clears it, so movement indices restart as missing.
#[derive(Debug, Default)]
pub struct AsymmetryTracker {
    prev: Option<LandmarkSet>,
    rows: Vec<FeatureRow>,
}

impl AsymmetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame with landmarks and returns its row.
    pub fn observe(&mut self, landmarks: LandmarkSet) -> FeatureRow {
        let row = measure(&landmarks, self.prev.as_ref());
        self.rows.push(row);
        self.prev = Some(landmarks);
        row
    }

    /// Records a frame without a usable face.
    pub fn miss(&mut self) {
        self.rows.push(FeatureRow::missing());
        self.prev = None;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self) -> FeatureMatrix {
        FeatureMatrix::from_rows(self.rows)
    }
}

/// All indices for `current`, in column order.
pub fn measure(current: &LandmarkSet, prev: Option<&LandmarkSet>) -> FeatureRow {
    let mut values = [None; INDEX_COUNT];
    for index in AsymmetryIndex::ALL {
        values[index.column()] = match (index, prev) {
            (AsymmetryIndex::Smm, Some(p)) => smile_movement(current, p),
            (AsymmetryIndex::Ns, Some(p)) => Some(horizontal_shift(current, p, Landmark::NoseTip)),
            (AsymmetryIndex::Ja, Some(p)) => Some(horizontal_shift(current, p, Landmark::Chin)),
            (AsymmetryIndex::Smm | AsymmetryIndex::Ns | AsymmetryIndex::Ja, None) => None,
            (AsymmetryIndex::Dms, _) => mouth_symmetry(current),
            (AsymmetryIndex::Eoa, _) => eye_opening_ratio(current),
            (AsymmetryIndex::Fca, _) => Some(contour_asymmetry(current)),
            (AsymmetryIndex::La, _) => lip_asymmetry(current),
            (AsymmetryIndex::Era, _) => Some(
                (current.y(Landmark::RightBrow) - current.y(Landmark::LeftBrow)).abs(),
            ),
            (AsymmetryIndex::Sca, _) => Some(corner_angle_difference(current)),
            (AsymmetryIndex::Hta, _) => head_tilt(current),
            (AsymmetryIndex::Eci, _) => {
                Some((right_eye_opening(current) + left_eye_opening(current)) / 2.0)
            }
        };
    }
    FeatureRow::new(values)
}

fn smile_movement(l: &LandmarkSet, p: &LandmarkSet) -> Option<f64> {
    let dr = l
        .point(Landmark::RightMouthCorner)
        .distance(&p.point(Landmark::RightMouthCorner));
    let dl = l
        .point(Landmark::LeftMouthCorner)
        .distance(&p.point(Landmark::LeftMouthCorner));
    let d = dr.hypot(dl);
    (d != 0.0).then(|| dr * dl / d)
}

fn horizontal_shift(l: &LandmarkSet, p: &LandmarkSet, landmark: Landmark) -> f64 {
    (l.x(landmark) - p.x(landmark)).abs()
}

fn contour_xs(l: &LandmarkSet) -> [f64; 11] {
    MOUTH_CONTOUR.map(|m| l.x(m))
}

/// Points on the corner midline count toward the left half.
fn mouth_symmetry(l: &LandmarkSet) -> Option<f64> {
    let mid = (l.x(Landmark::RightMouthCorner) + l.x(Landmark::LeftMouthCorner)) / 2.0;
    let (s_right_img, s_left_img) = contour_xs(l)
        .iter()
        .fold((0.0, 0.0), |(lo, hi), &x| if x < mid { (lo + x, hi) } else { (lo, hi + x) });
    let total = s_right_img + s_left_img;
    (total != 0.0).then(|| (s_right_img - s_left_img).abs() / total)
}

fn right_eye_opening(l: &LandmarkSet) -> f64 {
    (l.y(Landmark::RightUpperLid) - l.y(Landmark::RightLowerLid)).abs()
}

fn left_eye_opening(l: &LandmarkSet) -> f64 {
    (l.y(Landmark::LeftUpperLid) - l.y(Landmark::LeftLowerLid)).abs()
}

fn eye_opening_ratio(l: &LandmarkSet) -> Option<f64> {
    let left = left_eye_opening(l);
    (left != 0.0).then(|| right_eye_opening(l) / left)
}

fn mean_x(l: &LandmarkSet, points: &[Landmark]) -> f64 {
    points.iter().map(|&p| l.x(p)).sum::<f64>() / points.len() as f64
}

fn contour_asymmetry(l: &LandmarkSet) -> f64 {
    (mean_x(l, &RIGHT_CHEEK) - mean_x(l, &LEFT_CHEEK)).abs()
}

fn lip_asymmetry(l: &LandmarkSet) -> Option<f64> {
    let xs = contour_xs(l);
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let centre = (min + max) / 2.0;

    let (below, above): (Vec<f64>, Vec<f64>) = xs.iter().partition(|&&x| x < centre);
    if below.is_empty() || above.is_empty() {
        return None;
    }
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    let (m_below, m_above) = (mean(&below), mean(&above));
    let denom = m_below + m_above;
    (denom != 0.0).then(|| (m_below - m_above).abs() / denom)
}

fn corner_angle_difference(l: &LandmarkSet) -> f64 {
    let m = l.point(Landmark::UpperLipCenter);
    let r = l.point(Landmark::RightMouthCorner);
    let left = l.point(Landmark::LeftMouthCorner);
    let angle = |from: Point| {
        ((m.y - from.y) as f64).atan2((m.x - from.x) as f64)
    };
    (angle(r) - angle(left)).abs()
}

fn head_tilt(l: &LandmarkSet) -> Option<f64> {
    let dx = l.x(Landmark::RightUpperLid) - l.x(Landmark::LeftUpperLid);
    let dy = l.y(Landmark::RightUpperLid) - l.y(Landmark::LeftUpperLid);
    (dx != 0.0).then(|| dy.atan2(dx).to_degrees())
}
