//! Row/column normalization

use super::{LabeledMatrix, MatrixError};
use ndarray::Axis as NdAxis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalization axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Each row sums to 1 (weight leaving a gene)
    Row,
    /// Each column sums to 1
    Column,
}

impl FromStr for Axis {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "row" | "rows" | "index" => Ok(Axis::Row),
            "1" | "column" | "columns" => Ok(Axis::Column),
            other => Err(MatrixError::InvalidAxis(other.to_string())),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Column => write!(f, "column"),
        }
    }
}

/// Divide every row (or column) by its own sum.
///
/// Rows/columns summing to zero are copied unchanged. The input is not
/// modified; labels and shape carry over.
pub fn normalize(matrix: &LabeledMatrix, axis: Axis) -> LabeledMatrix {
    let mut values = matrix.values().clone();
    let lanes = match axis {
        Axis::Row => values.axis_iter_mut(NdAxis(0)),
        Axis::Column => values.axis_iter_mut(NdAxis(1)),
    };

    for mut lane in lanes {
        let total: f64 = lane.sum();
        if total != 0.0 {
            lane.mapv_inplace(|v| v / total);
        }
    }

    LabeledMatrix {
        rows: matrix.row_labels().clone(),
        cols: matrix.col_labels().clone(),
        values,
    }
}
