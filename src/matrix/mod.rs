//! Labeled dense matrices
//!
//! Every matrix in the propagation engine (drug targets, network, influence,
//! combined pairs, features) is a dense `f64` array with ordered, unique row
//! and column labels.

pub mod normalize;

pub use normalize::{normalize, Axis};

use indexmap::IndexSet;
use ndarray::{Array2, ArrayView1};
use std::fmt;
use thiserror::Error;

/// Matrix errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    /// Label count does not match the data
    #[error("{axis} labels: expected {expected}, found {found}")]
    LabelCount {
        axis: &'static str,
        expected: usize,
        found: usize,
    },

    /// The same label appears twice on one axis
    #[error("duplicate {axis} label: {label}")]
    DuplicateLabel { axis: &'static str, label: String },

    /// Lookup of a label that is not present
    #[error("unknown {axis} label: {label}")]
    UnknownLabel { axis: &'static str, label: String },

    /// Two matrices (or a matrix and a dataset) disagree on a dimension
    #[error("shape mismatch ({context}): expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Normalization axis outside row/column
    #[error("invalid normalization axis: {0}")]
    InvalidAxis(String),
}

pub type MatrixResult<T> = Result<T, MatrixError>;

/// Dense matrix with ordered row and column labels
#[derive(Debug, Clone)]
pub struct LabeledMatrix {
    rows: IndexSet<String>,
    cols: IndexSet<String>,
    values: Array2<f64>,
}

impl LabeledMatrix {
    /// Create a matrix, checking label counts and uniqueness
    pub fn new<R, C>(rows: R, cols: C, values: Array2<f64>) -> MatrixResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = collect_labels("row", rows)?;
        let cols = collect_labels("column", cols)?;

        if rows.len() != values.nrows() {
            return Err(MatrixError::LabelCount {
                axis: "row",
                expected: values.nrows(),
                found: rows.len(),
            });
        }
        if cols.len() != values.ncols() {
            return Err(MatrixError::LabelCount {
                axis: "column",
                expected: values.ncols(),
                found: cols.len(),
            });
        }

        Ok(Self { rows, cols, values })
    }

    /// All-zero matrix over the given labels
    pub fn zeros<R, C>(rows: R, cols: C) -> MatrixResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = collect_labels("row", rows)?;
        let cols = collect_labels("column", cols)?;
        let values = Array2::zeros((rows.len(), cols.len()));
        Ok(Self { rows, cols, values })
    }

    /// Assemble from label sets already known to be unique and sized to
    /// `values`.
    pub(crate) fn from_label_sets(
        rows: IndexSet<String>,
        cols: IndexSet<String>,
        values: Array2<f64>,
    ) -> Self {
        debug_assert_eq!((rows.len(), cols.len()), values.dim());
        Self { rows, cols, values }
    }

    /// Same labels, new values
    pub fn with_values(&self, values: Array2<f64>) -> MatrixResult<Self> {
        Self::new(self.rows.iter().cloned(), self.cols.iter().cloned(), values)
    }

    pub fn row_labels(&self) -> &IndexSet<String> {
        &self.rows
    }

    pub fn col_labels(&self) -> &IndexSet<String> {
        &self.cols
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn row_position(&self, label: &str) -> Option<usize> {
        self.rows.get_index_of(label)
    }

    pub fn col_position(&self, label: &str) -> Option<usize> {
        self.cols.get_index_of(label)
    }

    /// Value at (row label, column label)
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.row_position(row)?;
        let j = self.col_position(col)?;
        Some(self.values[[i, j]])
    }

    /// Row by label
    pub fn row(&self, label: &str) -> MatrixResult<ArrayView1<'_, f64>> {
        let i = self.row_position(label).ok_or_else(|| MatrixError::UnknownLabel {
            axis: "row",
            label: label.to_string(),
        })?;
        Ok(self.values.row(i))
    }

    /// Column by label
    pub fn column(&self, label: &str) -> MatrixResult<ArrayView1<'_, f64>> {
        let j = self.col_position(label).ok_or_else(|| MatrixError::UnknownLabel {
            axis: "column",
            label: label.to_string(),
        })?;
        Ok(self.values.column(j))
    }

    /// Swap axes, labels included
    pub fn transpose(&self) -> Self {
        Self {
            rows: self.cols.clone(),
            cols: self.rows.clone(),
            values: self.values.t().to_owned(),
        }
    }

    /// Elementwise map, labels preserved
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            rows: self.rows.clone(),
            cols: self.cols.clone(),
            values: self.values.mapv(f),
        }
    }

    /// `1 - x` elementwise
    pub fn complement(&self) -> Self {
        self.map(|v| 1.0 - v)
    }

    /// Reorder/subset columns. Every requested label must exist.
    pub fn select_columns<I, S>(&self, labels: I) -> MatrixResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positions = Vec::new();
        let mut cols = Vec::new();
        for label in labels {
            let label = label.as_ref();
            let j = self.col_position(label).ok_or_else(|| MatrixError::UnknownLabel {
                axis: "column",
                label: label.to_string(),
            })?;
            positions.push(j);
            cols.push(label.to_string());
        }

        let mut values = Array2::zeros((self.nrows(), positions.len()));
        for (out_j, &j) in positions.iter().enumerate() {
            values.column_mut(out_j).assign(&self.values.column(j));
        }
        Self::new(self.rows.iter().cloned(), cols, values)
    }

    /// Reorder/subset rows. Every requested label must exist.
    pub fn select_rows<I, S>(&self, labels: I) -> MatrixResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.transpose().select_columns(labels)?.transpose())
    }

    /// Number of nonzero cells
    pub fn nnz(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }

    /// Elementwise equality within `tolerance`, labels compared in order
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.same_labels(other)
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    fn same_labels(&self, other: &Self) -> bool {
        self.rows.iter().eq(other.rows.iter()) && self.cols.iter().eq(other.cols.iter())
    }
}

// IndexSet equality ignores order; matrices must not.
impl PartialEq for LabeledMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.same_labels(other) && self.values == other.values
    }
}

impl fmt::Display for LabeledMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabeledMatrix {}x{}", self.nrows(), self.ncols())
    }
}

fn collect_labels<I>(axis: &'static str, labels: I) -> MatrixResult<IndexSet<String>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut set = IndexSet::new();
    for label in labels {
        let label = label.into();
        if set.contains(&label) {
            return Err(MatrixError::DuplicateLabel { axis, label });
        }
        set.insert(label);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> LabeledMatrix {
        LabeledMatrix::new(
            ["d1", "d2"],
            ["g1", "g2", "g3"],
            array![[1.0, 0.0, 0.5], [0.0, 0.25, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_label_count_mismatch() {
        let err = LabeledMatrix::new(["a"], ["x", "y"], Array2::zeros((2, 2))).unwrap_err();
        assert_eq!(
            err,
            MatrixError::LabelCount {
                axis: "row",
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_new_rejects_duplicate_labels() {
        let err = LabeledMatrix::new(["a", "a"], ["x"], Array2::zeros((2, 1))).unwrap_err();
        assert!(matches!(err, MatrixError::DuplicateLabel { axis: "row", .. }));
    }

    #[test]
    fn test_get_and_row_lookup() {
        let m = sample();
        assert_eq!(m.get("d1", "g3"), Some(0.5));
        assert_eq!(m.get("d3", "g3"), None);
        assert_eq!(m.row("d2").unwrap().to_vec(), vec![0.0, 0.25, 0.0]);
        assert!(m.row("missing").is_err());
    }

    #[test]
    fn test_transpose_swaps_labels() {
        let t = sample().transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.get("g3", "d1"), Some(0.5));
    }

    #[test]
    fn test_select_columns_reorders() {
        let m = sample().select_columns(["g3", "g1"]).unwrap();
        assert_eq!(m.col_labels().iter().collect::<Vec<_>>(), vec!["g3", "g1"]);
        assert_eq!(m.values(), &array![[0.5, 1.0], [0.0, 0.0]]);

        let err = sample().select_columns(["g9"]).unwrap_err();
        assert!(matches!(err, MatrixError::UnknownLabel { axis: "column", .. }));
    }

    #[test]
    fn test_select_rows() {
        let m = sample().select_rows(["d2"]).unwrap();
        assert_eq!(m.shape(), (1, 3));
        assert_eq!(m.get("d2", "g2"), Some(0.25));
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let a = sample();
        let b = a.select_columns(["g2", "g1", "g3"]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_complement() {
        let c = sample().complement();
        assert_eq!(c.get("d1", "g1"), Some(0.0));
        assert_eq!(c.get("d2", "g1"), Some(1.0));
    }
}
