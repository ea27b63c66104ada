use crate::features::domain::asymmetry_index::{AsymmetryIndex, INDEX_COUNT};

/// One frame's asymmetry values. `None` marks a missing measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureRow {
    values: [Option<f64>; INDEX_COUNT],
}

impl FeatureRow {
    pub fn new(values: [Option<f64>; INDEX_COUNT]) -> Self {
        Self { values }
    }

    /// Row recorded for a frame without a usable face.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn get(&self, index: AsymmetryIndex) -> Option<f64> {
        self.values[index.column()]
    }

    pub fn values(&self) -> &[Option<f64>; INDEX_COUNT] {
        &self.values
    }

    pub fn is_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Frame-ordered rows of asymmetry values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn from_rows(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full column including missing entries, in frame order.
    pub fn column(&self, index: AsymmetryIndex) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.get(index)).collect()
    }

    /// Present values of a column, in frame order.
    pub fn present(&self, index: AsymmetryIndex) -> Vec<f64> {
        self.rows.iter().filter_map(|row| row.get(index)).collect()
    }

    pub fn missing_rows(&self) -> usize {
        self.rows.iter().filter(|row| row.is_missing()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(smm: Option<f64>, eoa: Option<f64>) -> FeatureRow {
        let mut values = [Some(0.0); INDEX_COUNT];
        values[AsymmetryIndex::Smm.column()] = smm;
        values[AsymmetryIndex::Eoa.column()] = eoa;
        FeatureRow::new(values)
    }

    #[test]
    fn test_column_keeps_gaps() {
        let m = FeatureMatrix::from_rows(vec![row(None, Some(1.0)), row(Some(2.0), None)]);
        assert_eq!(m.column(AsymmetryIndex::Smm), vec![None, Some(2.0)]);
        assert_eq!(m.present(AsymmetryIndex::Eoa), vec![1.0]);
    }

    #[test]
    fn test_missing_rows() {
        let m = FeatureMatrix::from_rows(vec![
            FeatureRow::missing(),
            row(None, None),
            FeatureRow::missing(),
        ]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.missing_rows(), 2);
    }

    #[test]
    fn test_empty() {
        let m = FeatureMatrix::default();
        assert!(m.is_empty());
        assert!(m.present(AsymmetryIndex::Hta).is_empty());
    }
}
