//! Validation helpers for structured covariance inputs.
//!
//! This module centralizes the cheap `O(Npix·Nh)` checks run before any
//! factorization:
//!
//! - **Shape checks**: [`validate_dims`] ensures `M.nrows() == D.len()`;
//!   [`validate_rhs_len`] checks right-hand sides against `Npix`.
//! - **Diagonal domain**: [`validate_diagonal`] rejects non-finite or
//!   non-positive entries of `D` before `1/D` or `ln D` is taken.
//! - **Factor entries**: [`validate_factor`] rejects non-finite entries of
//!   `M`.
//! - **Residuals**: [`validate_residual`] rejects non-finite residuals.
//!
//! Each helper reports the first offending entry via a [`CovError`] variant.
use crate::covariance::errors::{CovError, CovResult};
use ndarray::{ArrayView1, ArrayView2};

/// Validate that the low-rank factor and diagonal agree on `Npix`.
///
/// # Errors
/// Returns [`CovError::FactorRowMismatch`] if `m.nrows() != d.len()`.
pub fn validate_dims(m: &ArrayView2<f64>, d: &ArrayView1<f64>) -> CovResult<()> {
    if m.nrows() != d.len() {
        return Err(CovError::FactorRowMismatch { factor_rows: m.nrows(), diag_len: d.len() });
    }
    Ok(())
}

/// Validate the diagonal `D`: every entry finite and strictly positive.
///
/// Finiteness is checked first so that `NaN` is reported as non-finite
/// rather than as non-positive.
///
/// # Errors
/// - [`CovError::NonFiniteDiagonal`] for the first NaN/±inf entry.
/// - [`CovError::NonPositiveDiagonal`] for the first entry ≤ 0.
pub fn validate_diagonal(d: &ArrayView1<f64>) -> CovResult<()> {
    for (index, &value) in d.iter().enumerate() {
        if !value.is_finite() {
            return Err(CovError::NonFiniteDiagonal { index, value });
        }
        if value <= 0.0 {
            return Err(CovError::NonPositiveDiagonal { index, value });
        }
    }
    Ok(())
}

/// Validate that every entry of the low-rank factor `M` is finite.
///
/// # Errors
/// Returns [`CovError::NonFiniteFactor`] with the row/col of the first
/// offending entry.
pub fn validate_factor(m: &ArrayView2<f64>) -> CovResult<()> {
    for ((row, col), &value) in m.indexed_iter() {
        if !value.is_finite() {
            return Err(CovError::NonFiniteFactor { row, col, value });
        }
    }
    Ok(())
}

/// Validate a right-hand side length against `Npix`.
///
/// # Errors
/// Returns [`CovError::RhsLengthMismatch`] if `found != expected`.
pub fn validate_rhs_len(expected: usize, found: usize) -> CovResult<()> {
    if found != expected {
        return Err(CovError::RhsLengthMismatch { expected, found });
    }
    Ok(())
}

/// Validate a residual vector: correct length and finite entries.
///
/// # Errors
/// - [`CovError::RhsLengthMismatch`] if `r.len() != npix`.
/// - [`CovError::NonFiniteResidual`] for the first NaN/±inf entry.
pub fn validate_residual(r: &ArrayView1<f64>, npix: usize) -> CovResult<()> {
    validate_rhs_len(npix, r.len())?;
    for (index, &value) in r.iter().enumerate() {
        if !value.is_finite() {
            return Err(CovError::NonFiniteResidual { index, value });
        }
    }
    Ok(())
}

/// Run the full input validation for `(M, D)` in the order shape → `D` → `M`.
pub fn validate_inputs(m: &ArrayView2<f64>, d: &ArrayView1<f64>) -> CovResult<()> {
    validate_dims(m, d)?;
    validate_diagonal(d)?;
    validate_factor(m)
}
