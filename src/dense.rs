//! Dense row-major matrix.
//!
//! Holds the coefficient matrix of a `LinearSystem`. Only the operations the
//! Jacobi orchestrator and its callers need are provided.

use crate::error::{JacobiError, Result};

/// Square or rectangular matrix stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    pub nrows: usize,
    pub ncols: usize,
    /// `values[row * ncols + col]`.
    pub values: Vec<f64>,
}

impl DenseMatrix {
    /// Create a zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            values: vec![0.0; nrows * ncols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.values[i * n + i] = 1.0;
        }
        m
    }

    /// Build a matrix from a slice of rows. All rows must have the same length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut values = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != ncols {
                return Err(JacobiError::InvalidInput(format!(
                    "ragged matrix: row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    ncols
                )));
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            nrows,
            ncols,
            values,
        })
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.ncols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.ncols..(row + 1) * self.ncols]
    }

    /// Matrix-vector multiply: y = A * x
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.ncols, "matvec dimension mismatch");
        (0..self.nrows)
            .map(|i| self.row(i).iter().zip(x).map(|(a, v)| a * v).sum())
            .collect()
    }

    /// Index of the first row whose diagonal entry is exactly zero.
    pub fn zero_diagonal(&self) -> Option<usize> {
        (0..self.nrows.min(self.ncols)).find(|&i| self.get(i, i) == 0.0)
    }

    /// Weak row diagonal dominance: |a_ii| >= sum_{j != i} |a_ij| for every row.
    pub fn is_diagonally_dominant(&self) -> bool {
        (0..self.nrows).all(|i| {
            let off: f64 = self
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, v)| v.abs())
                .sum();
            self.get(i, i).abs() >= off
        })
    }

    /// Copy into a `stride x stride` row-major block, zero-filling the padding.
    pub fn to_padded(&self, stride: usize) -> Vec<f64> {
        assert!(stride >= self.nrows && stride >= self.ncols);
        let mut out = vec![0.0; stride * stride];
        for i in 0..self.nrows {
            out[i * stride..i * stride + self.ncols].copy_from_slice(self.row(i));
        }
        out
    }
}
