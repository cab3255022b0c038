//! Dense row-major matrix on a single flat buffer.
//!
//! Covariance matrices, their inverses and the KKT systems of the portfolio
//! solver all live in [`DenseMatrix`]: one `Vec<f64>` addressed as
//! `data[i * stride + j]`. Frontier sweeps allocate one buffer per solve instead
//! of one per row.
//!
//! Elimination uses partial pivoting with a pivot tolerance relative to the
//! largest absolute entry; a pivot below it is reported as
//! [`QuantError::SingularCovariance`] carrying the matrix label, column and pivot.
//! Eigenvalue and Cholesky queries delegate to `nalgebra`.

use std::ops::Index;

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::core::{QuantError, Result};

/// Pivot magnitude, relative to the largest entry, below which a matrix is singular.
pub const PIVOT_RELATIVE_TOLERANCE: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Wraps a row-major buffer of `rows * cols` values.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(QuantError::invalid(
                "data",
                format!("expected {} values for {rows}x{cols}, got {}", rows * cols, data.len()),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Copies nested rows into a flat matrix; rows must share one length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(QuantError::invalid("rows", "rows must have equal length"));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let cols = self.cols;
        &mut self.data[i * cols..(i + 1) * cols]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i)).collect()
    }

    pub fn trace(&self) -> f64 {
        self.diagonal().iter().sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
    }

    /// Exact symmetry when `tol == 0`.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        (0..self.rows).all(|i| {
            (i + 1..self.cols).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= tol)
        })
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|x| x * factor).collect(),
        }
    }

    /// `self + lambda * I`.
    pub fn with_added_diagonal(&self, lambda: f64) -> Self {
        let mut out = self.clone();
        for i in 0..self.rows.min(self.cols) {
            out.data[i * self.cols + i] += lambda;
        }
        out
    }

    /// `self * x` into `out`.
    pub fn mul_vec_into(&self, x: &[f64], out: &mut [f64]) {
        for (i, out_i) in out.iter_mut().enumerate().take(self.rows) {
            *out_i = self.row(i).iter().zip(x).map(|(a, b)| a * b).sum();
        }
    }

    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.rows];
        self.mul_vec_into(x, &mut out);
        out
    }

    /// `wᵀ · self · w`.
    pub fn quad_form(&self, w: &[f64]) -> f64 {
        (0..self.rows)
            .map(|i| w[i] * self.row(i).iter().zip(w).map(|(a, b)| a * b).sum::<f64>())
            .sum()
    }

    fn pivot_tolerance(&self) -> f64 {
        PIVOT_RELATIVE_TOLERANCE * self.max_abs()
    }

    fn require_square(&self, label: &str) -> Result<()> {
        if self.is_square() && self.rows > 0 {
            Ok(())
        } else {
            Err(QuantError::invalid(
                "matrix",
                format!("`{label}` must be square and non-empty, got {}x{}", self.rows, self.cols),
            ))
        }
    }

    /// Gauss-Jordan inverse with partial pivoting.
    ///
    /// # Errors
    /// [`QuantError::SingularCovariance`] labelled `label` when a pivot falls below
    /// [`PIVOT_RELATIVE_TOLERANCE`] times the largest entry.
    pub fn inverse(&self, label: &str) -> Result<Self> {
        self.require_square(label)?;
        let n = self.rows;
        let tol = self.pivot_tolerance();
        let mut work = self.data.clone();
        let mut inv = Self::identity(n).data;

        for col in 0..n {
            let (pivot_row, pivot) = (col..n)
                .map(|r| (r, work[r * n + col]))
                .fold((col, 0.0_f64), |best, (r, v)| {
                    if v.abs() > best.1.abs() {
                        (r, v)
                    } else {
                        best
                    }
                });
            if pivot.abs() <= tol {
                return Err(QuantError::SingularCovariance {
                    matrix: label.to_string(),
                    column: col,
                    pivot: pivot.abs(),
                });
            }
            if pivot_row != col {
                for j in 0..n {
                    work.swap(col * n + j, pivot_row * n + j);
                    inv.swap(col * n + j, pivot_row * n + j);
                }
            }

            let inv_pivot = 1.0 / pivot;
            for j in 0..n {
                work[col * n + j] *= inv_pivot;
                inv[col * n + j] *= inv_pivot;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = work[r * n + col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    work[r * n + j] -= factor * work[col * n + j];
                    inv[r * n + j] -= factor * inv[col * n + j];
                }
            }
        }

        Ok(Self {
            rows: n,
            cols: n,
            data: inv,
        })
    }

    /// Solves `self * x = b` by Gaussian elimination with partial pivoting.
    pub fn solve(&self, b: &[f64], label: &str) -> Result<Vec<f64>> {
        self.require_square(label)?;
        let n = self.rows;
        if b.len() != n {
            return Err(QuantError::invalid(
                "rhs",
                format!("expected length {n}, got {}", b.len()),
            ));
        }
        let tol = self.pivot_tolerance();
        let mut a = self.data.clone();
        let mut x = b.to_vec();

        for col in 0..n {
            let mut pivot_row = col;
            for r in col + 1..n {
                if a[r * n + col].abs() > a[pivot_row * n + col].abs() {
                    pivot_row = r;
                }
            }
            let pivot = a[pivot_row * n + col];
            if pivot.abs() <= tol {
                return Err(QuantError::SingularCovariance {
                    matrix: label.to_string(),
                    column: col,
                    pivot: pivot.abs(),
                });
            }
            if pivot_row != col {
                for j in 0..n {
                    a.swap(col * n + j, pivot_row * n + j);
                }
                x.swap(col, pivot_row);
            }
            for r in col + 1..n {
                let factor = a[r * n + col] / pivot;
                if factor == 0.0 {
                    continue;
                }
                for j in col..n {
                    a[r * n + j] -= factor * a[col * n + j];
                }
                x[r] -= factor * x[col];
            }
        }

        for i in (0..n).rev() {
            let tail: f64 = (i + 1..n).map(|j| a[i * n + j] * x[j]).sum();
            x[i] = (x[i] - tail) / a[i * n + i];
        }
        Ok(x)
    }

    pub(crate) fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.rows, self.cols, &self.data)
    }

    fn from_dmatrix(m: &DMatrix<f64>) -> Self {
        let (rows, cols) = m.shape();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(m[(i, j)]);
            }
        }
        Self { rows, cols, data }
    }

    /// Smallest eigenvalue of a symmetric matrix.
    pub fn min_eigenvalue(&self) -> Option<f64> {
        if !self.is_square() || self.rows == 0 {
            return None;
        }
        let eig = SymmetricEigen::new(self.to_dmatrix());
        eig.eigenvalues.iter().copied().reduce(f64::min)
    }

    /// Returns `true` if the matrix is symmetric positive semidefinite within `tol`.
    pub fn is_positive_semidefinite(&self, tol: f64) -> bool {
        self.is_symmetric(tol.max(0.0)) && self.min_eigenvalue().is_some_and(|l| l >= -tol)
    }

    /// Lower Cholesky factor `L` with `L Lᵀ = self`, if positive definite.
    pub fn cholesky_lower(&self) -> Option<Self> {
        if !self.is_square() {
            return None;
        }
        Cholesky::new(self.to_dmatrix()).map(|c| Self::from_dmatrix(&c.l()))
    }

    pub fn to_nested(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}
