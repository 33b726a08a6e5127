//! Small dense linear algebra on `ndarray` matrices.
//!
//! The systems solved here are p × p with p the number of covariates (or
//! groups minus one), so Gauss-Jordan elimination is plenty.

use ndarray::{Array1, Array2};

use crate::error::{AnalysisError, Result};

/// Relative pivot size below which a matrix is treated as singular
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Invert a square matrix with Gauss-Jordan elimination and partial
/// pivoting.
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(AnalysisError::DimensionMismatch {
            expected: rows,
            actual: cols,
        });
    }
    let n = rows;
    // Pivots are judged relative to the largest entry.
    let scale = matrix.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(AnalysisError::SingularMatrix);
    }

    let mut a = matrix.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_abs = a[[col, col]].abs();
        for row in (col + 1)..n {
            let v = a[[row, col]].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }
        if !pivot_abs.is_finite() || pivot_abs <= SINGULAR_TOLERANCE * scale {
            return Err(AnalysisError::SingularMatrix);
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
                inv.swap([col, k], [pivot_row, k]);
            }
        }

        let pivot = a[[col, col]];
        for k in 0..n {
            a[[col, k]] /= pivot;
            inv[[col, k]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[[row, k]] -= factor * a[[col, k]];
                inv[[row, k]] -= factor * inv[[col, k]];
            }
        }
    }

    Ok(inv)
}

/// `vᵀ M v`
pub fn quadratic_form(v: &Array1<f64>, m: &Array2<f64>) -> f64 {
    v.dot(&m.dot(v))
}
