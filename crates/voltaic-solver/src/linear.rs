//! Linear system solvers behind each Newton iteration.
//!
//! Small systems factor densely through nalgebra's partial-pivoted LU;
//! systems at or above [`SPARSE_THRESHOLD`] go through faer's sparse LU.
//! Both paths surface a singular factorization and verify the solution is
//! finite.

use faer::prelude::*;
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Systems with this many or more variables use the sparse solver path.
pub const SPARSE_THRESHOLD: usize = 50;

/// Pivots with magnitude below this abort the factorization.
pub const PIVOT_THRESHOLD: f64 = 1e-12;

/// Failures local to one linear solve; the driver wraps these with
/// simulation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinearError {
    #[error("matrix is singular")]
    Singular,
    #[error("solution is not finite")]
    NonFinite,
}

/// Solve `A·x = b` with dense partial-pivoted LU.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, LinearError> {
    let n = a.nrows();
    let lu = a.clone().lu();

    // nalgebra reports only exact singularity; enforce the pivot floor on
    // the factor's diagonal.
    let u = lu.u();
    for i in 0..n {
        if u[(i, i)].abs() < PIVOT_THRESHOLD {
            return Err(LinearError::Singular);
        }
    }

    let x = lu.solve(b).ok_or(LinearError::Singular)?;
    ensure_finite(&x)?;
    Ok(x)
}

/// Solve `A·x = b` with faer's sparse LU, building the matrix from
/// `(row, col, value)` triplets. Duplicate entries are summed.
pub fn solve_sparse(
    size: usize,
    triplets: &[(usize, usize, f64)],
    rhs: &DVector<f64>,
) -> Result<DVector<f64>, LinearError> {
    let faer_triplets: Vec<_> = triplets
        .iter()
        .map(|&(r, c, v)| Triplet::new(r, c, v))
        .collect();

    let sparse_mat = SparseColMat::<usize, f64>::try_new_from_triplets(size, size, &faer_triplets)
        .map_err(|_| LinearError::Singular)?;

    let lu = sparse_mat.sp_lu().map_err(|_| LinearError::Singular)?;

    let faer_rhs = Col::<f64>::from_fn(size, |i| rhs[i]);
    let faer_x = lu.solve(&faer_rhs);

    let x = DVector::from_fn(size, |i, _| faer_x[i]);
    ensure_finite(&x)?;
    Ok(x)
}

/// Solve `A·x = b`, dispatching on system size.
pub fn solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, LinearError> {
    let size = a.nrows();
    if size >= SPARSE_THRESHOLD {
        let mut triplets = Vec::new();
        for i in 0..size {
            for j in 0..size {
                let v = a[(i, j)];
                if v != 0.0 {
                    triplets.push((i, j, v));
                }
            }
        }
        solve_sparse(size, &triplets, b)
    } else {
        solve_dense(a, b)
    }
}

fn ensure_finite(x: &DVector<f64>) -> Result<(), LinearError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(LinearError::NonFinite)
    }
}
