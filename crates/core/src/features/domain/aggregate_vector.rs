//! Fixed-length temporal summary of a feature matrix.

use crate::features::domain::asymmetry_index::{AsymmetryIndex, INDEX_COUNT};
use crate::features::domain::feature_matrix::FeatureMatrix;
use crate::features::domain::statistics::{pearson, summarize, Statistic, STATISTIC_COUNT};

/// Column pairs whose correlation closes the vector.
pub const CORRELATED_PAIRS: [(AsymmetryIndex, AsymmetryIndex); 3] = [
    (AsymmetryIndex::Smm, AsymmetryIndex::Eoa),
    (AsymmetryIndex::Ns, AsymmetryIndex::Ja),
    (AsymmetryIndex::La, AsymmetryIndex::Era),
];

/// 11 columns × 15 statistics + 3 correlations.
pub const AGGREGATE_LEN: usize = INDEX_COUNT * STATISTIC_COUNT + CORRELATED_PAIRS.len();

/// Slot names in vector order: `<INDEX>_<stat>` then `corr_<A>_<B>`.
pub fn aggregate_names() -> Vec<String> {
    let mut names = Vec::with_capacity(AGGREGATE_LEN);
    for index in AsymmetryIndex::ALL {
        for stat in Statistic::ALL {
            names.push(format!("{}_{}", index.name(), stat.name()));
        }
    }
    for (a, b) in CORRELATED_PAIRS {
        names.push(format!("corr_{}_{}", a.name(), b.name()));
    }
    names
}

/// 168 aggregate values. `None` marks a statistic that could not be computed.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateVector {
    values: Vec<Option<f64>>,
}

impl AggregateVector {
    pub fn from_matrix(matrix: &FeatureMatrix) -> Self {
        let mut values = Vec::with_capacity(AGGREGATE_LEN);
        for index in AsymmetryIndex::ALL {
            values.extend(summarize(&matrix.present(index)));
        }
        for (a, b) in CORRELATED_PAIRS {
            values.push(pearson(&matrix.column(a), &matrix.column(b)));
        }
        Self { values }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, index: AsymmetryIndex, stat: Statistic) -> Option<f64> {
        self.values[index.column() * STATISTIC_COUNT + stat.slot()]
    }

    pub fn correlation(&self, pair: usize) -> Option<f64> {
        self.values[INDEX_COUNT * STATISTIC_COUNT + pair]
    }

    /// Reorders slots by position, e.g. into a classifier's training order.
    pub fn permuted(&self, order: &[usize]) -> Self {
        Self {
            values: order.iter().map(|&i| self.values[i]).collect(),
        }
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::domain::asymmetry_tracker::tests::symmetric_face;
    use crate::features::domain::asymmetry_tracker::AsymmetryTracker;
    use crate::features::domain::feature_matrix::FeatureRow;

    fn matrix_from_column(index: AsymmetryIndex, values: &[Option<f64>]) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            values
                .iter()
                .map(|&v| {
                    let mut row = [Some(1.0); INDEX_COUNT];
                    row[index.column()] = v;
                    FeatureRow::new(row)
                })
                .collect(),
        )
    }

    #[test]
    fn test_names_layout() {
        let names = aggregate_names();
        assert_eq!(names.len(), 168);
        assert_eq!(names[0], "SMM_mean");
        assert_eq!(names[14], "SMM_valley_count");
        assert_eq!(names[15], "DMS_mean");
        assert_eq!(names[164], "ECI_valley_count");
        assert_eq!(&names[165..], ["corr_SMM_EOA", "corr_NS_JA", "corr_LA_ERA"]);
    }

    #[test]
    fn test_empty_matrix_is_all_missing() {
        let v = AggregateVector::from_matrix(&FeatureMatrix::default());
        assert_eq!(v.values().len(), AGGREGATE_LEN);
        assert_eq!(v.present_count(), 0);
    }

    #[test]
    fn test_single_frame_video_is_all_missing() {
        let mut tracker = AsymmetryTracker::new();
        tracker.observe(symmetric_face());
        let v = AggregateVector::from_matrix(&tracker.finish());
        assert_eq!(v.values().len(), AGGREGATE_LEN);
        assert_eq!(v.present_count(), 0);
    }

    #[test]
    fn test_gaps_are_dropped_before_summarizing() {
        let m = matrix_from_column(AsymmetryIndex::Eoa, &[Some(1.0), None, Some(3.0), None]);
        let v = AggregateVector::from_matrix(&m);
        assert_eq!(v.get(AsymmetryIndex::Eoa, Statistic::Mean), Some(2.0));
        assert_eq!(v.get(AsymmetryIndex::Eoa, Statistic::FirstSpike), Some(2.0));
    }

    #[test]
    fn test_range_and_mean_bounds() {
        let m = matrix_from_column(
            AsymmetryIndex::Hta,
            &[Some(4.0), Some(-2.0), Some(7.5), None, Some(0.25)],
        );
        let v = AggregateVector::from_matrix(&m);
        let max = v.get(AsymmetryIndex::Hta, Statistic::Max).unwrap();
        let min = v.get(AsymmetryIndex::Hta, Statistic::Min).unwrap();
        let mean = v.get(AsymmetryIndex::Hta, Statistic::Mean).unwrap();
        assert_eq!(v.get(AsymmetryIndex::Hta, Statistic::Range), Some(max - min));
        assert!(min <= mean && mean <= max);
    }

    #[test]
    fn test_static_symmetric_face() {
        let mut tracker = AsymmetryTracker::new();
        for _ in 0..5 {
            tracker.observe(symmetric_face());
        }
        let v = AggregateVector::from_matrix(&tracker.finish());
        assert_eq!(v.get(AsymmetryIndex::Ns, Statistic::Max), Some(0.0));
        assert_eq!(v.get(AsymmetryIndex::Ja, Statistic::Mean), Some(0.0));
        assert_eq!(v.get(AsymmetryIndex::Eoa, Statistic::Mean), Some(1.0));
        assert_eq!(v.get(AsymmetryIndex::Eoa, Statistic::Std), Some(0.0));
        assert_eq!(v.get(AsymmetryIndex::Eoa, Statistic::Skew), None);
        assert_eq!(v.get(AsymmetryIndex::Smm, Statistic::Mean), None);
        // Constant columns cannot correlate.
        assert_eq!(v.correlation(1), None);
    }

    #[test]
    fn test_permuted() {
        let m = matrix_from_column(AsymmetryIndex::Smm, &[Some(1.0), Some(3.0)]);
        let v = AggregateVector::from_matrix(&m);
        let order: Vec<usize> = (0..AGGREGATE_LEN).rev().collect();
        let p = v.permuted(&order);
        assert_eq!(p.values()[AGGREGATE_LEN - 1], Some(2.0));
        assert_eq!(p.values()[0], v.values()[AGGREGATE_LEN - 1]);
    }

    #[test]
    fn test_aggregation_is_bit_identical() {
        let m = matrix_from_column(
            AsymmetryIndex::Sca,
            &[Some(0.1), Some(0.7), None, Some(0.3), Some(0.9), Some(0.2)],
        );
        let a = AggregateVector::from_matrix(&m);
        let b = AggregateVector::from_matrix(&m);
        let bits = |v: &AggregateVector| -> Vec<Option<u64>> {
            v.values().iter().map(|x| x.map(f64::to_bits)).collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }
}
