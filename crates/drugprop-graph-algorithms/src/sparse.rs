//! Compressed sparse row matrices
//!
//! Dense inputs in this workspace (drug-target matrices, network matrices) are
//! overwhelmingly zero. `CsrMatrix` keeps only the nonzero entries so products
//! scale with the number of edges and targets instead of `n²`.

use ndarray::Array2;

/// Row-compressed sparse matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
    /// Offsets into `indices`/`values`. Size = rows + 1
    pub offsets: Vec<usize>,
    /// Column index of each stored entry
    pub indices: Vec<usize>,
    /// Stored values, aligned with `indices`
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Compress a dense matrix, dropping exact zeros.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (rows, cols) = dense.dim();
        let mut offsets = Vec::with_capacity(rows + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();

        offsets.push(0);
        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(j);
                    values.push(v);
                }
            }
            offsets.push(indices.len());
        }

        Self {
            rows,
            cols,
            offsets,
            indices,
            values,
        }
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of row `i`
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.offsets[i], self.offsets[i + 1]);
        (&self.indices[start..end], &self.values[start..end])
    }

    /// Expand back into a dense matrix
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows, self.cols));
        for i in 0..self.rows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                dense[[i, j]] = v;
            }
        }
        dense
    }

    /// Sparse × sparse product, materialized densely.
    ///
    /// # Panics
    /// Panics when the inner dimensions disagree.
    pub fn dot(&self, other: &CsrMatrix) -> Array2<f64> {
        assert_eq!(
            self.cols, other.rows,
            "inner dimensions differ: {}x{} · {}x{}",
            self.rows, self.cols, other.rows, other.cols
        );

        let mut out = Array2::zeros((self.rows, other.cols));
        for i in 0..self.rows {
            let (ks, a_vals) = self.row(i);
            let mut out_row = out.row_mut(i);
            for (&k, &a) in ks.iter().zip(a_vals) {
                let (js, b_vals) = other.row(k);
                for (&j, &b) in js.iter().zip(b_vals) {
                    out_row[j] += a * b;
                }
            }
        }
        out
    }

    /// Max-times product: `out[i][j] = max(0, max_k self[i][k] · other[k][j])`.
    ///
    /// The zero floor matches a dense reduction over all `k`, where every
    /// column with no stored entry contributes a product of 0.
    ///
    /// # Panics
    /// Panics when the inner dimensions disagree.
    pub fn max_product(&self, other: &CsrMatrix) -> Array2<f64> {
        assert_eq!(
            self.cols, other.rows,
            "inner dimensions differ: {}x{} · {}x{}",
            self.rows, self.cols, other.rows, other.cols
        );

        let mut out = Array2::zeros((self.rows, other.cols));
        for i in 0..self.rows {
            let (ks, a_vals) = self.row(i);
            let mut out_row = out.row_mut(i);
            for (&k, &a) in ks.iter().zip(a_vals) {
                let (js, b_vals) = other.row(k);
                for (&j, &b) in js.iter().zip(b_vals) {
                    let product = a * b;
                    if product > out_row[j] {
                        out_row[j] = product;
                    }
                }
            }
        }
        out
    }
}
