//! Errors for structured covariance algebra (input validation and numerical
//! breakdown of the inner low-rank system).
//!
//! This module defines [`CovError`], the error type returned by every
//! operation in [`crate::covariance`], together with the coarse
//! classification [`CovErrorKind`] used by callers that only care whether a
//! failure was a shape problem, a bad input value, or a numerical breakdown.
//!
//! ## Conventions
//! - **Indices are 0-based** (match Rust/NumPy).
//! - The diagonal `D` must be **strictly positive and finite**; this is
//!   checked before any `1/D` or `ln D` is taken.
//! - Errors are deterministic: retrying with the same inputs yields the same
//!   error, so no variant is marked retryable.

/// Result alias for covariance operations that may produce [`CovError`].
pub type CovResult<T> = Result<T, CovError>;

/// Coarse failure category for [`CovError`].
///
/// - `ShapeMismatch`: `M`/`D`/right-hand-side dimensions disagree.
/// - `InvalidParameter`: an input value is outside its documented domain
///   (non-positive or non-finite `D`, non-finite `M`).
/// - `NumericalInstability`: the guaranteed positive-definite inner system
///   could not be factorized, or the result is not finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovErrorKind {
    ShapeMismatch,
    InvalidParameter,
    NumericalInstability,
}

/// Unified error type for structured covariance operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CovError {
    // ---- Shapes ----
    /// Rows of the low-rank factor `M` do not match the length of `D`.
    FactorRowMismatch { factor_rows: usize, diag_len: usize },

    /// Right-hand side / residual length does not match `Npix`.
    RhsLengthMismatch { expected: usize, found: usize },

    // ---- Input values ----
    /// A diagonal entry is ≤ 0.
    NonPositiveDiagonal { index: usize, value: f64 },

    /// A diagonal entry is NaN/±inf.
    NonFiniteDiagonal { index: usize, value: f64 },

    /// An entry of the low-rank factor is NaN/±inf.
    NonFiniteFactor { row: usize, col: usize, value: f64 },

    /// A residual entry is NaN/±inf.
    NonFiniteResidual { index: usize, value: f64 },

    // ---- Numerical breakdown ----
    /// `1 / D_p` overflows for a positive subnormal diagonal entry.
    DiagonalInverseOverflow { index: usize, value: f64 },

    /// Cholesky factorization of `I + Mᵗ·D⁻¹·M` failed: the matrix is
    /// numerically singular or indefinite.
    InnerNotPositiveDefinite { dim: usize },

    /// The assembled log-determinant is NaN/±inf.
    NonFiniteLogDet { value: f64 },

    /// A quadratic form `rᵗ·Σ⁻¹·r` came out negative or non-finite.
    InvalidQuadForm { value: f64 },
}

impl CovError {
    /// Classify the error into the three-way taxonomy of [`CovErrorKind`].
    pub fn kind(&self) -> CovErrorKind {
        match self {
            CovError::FactorRowMismatch { .. } | CovError::RhsLengthMismatch { .. } => {
                CovErrorKind::ShapeMismatch
            }
            CovError::NonPositiveDiagonal { .. }
            | CovError::NonFiniteDiagonal { .. }
            | CovError::NonFiniteFactor { .. }
            | CovError::NonFiniteResidual { .. } => CovErrorKind::InvalidParameter,
            CovError::DiagonalInverseOverflow { .. }
            | CovError::InnerNotPositiveDefinite { .. }
            | CovError::NonFiniteLogDet { .. }
            | CovError::InvalidQuadForm { .. } => CovErrorKind::NumericalInstability,
        }
    }
}

impl std::error::Error for CovError {}

impl std::fmt::Display for CovError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Shapes ----
            CovError::FactorRowMismatch { factor_rows, diag_len } => {
                write!(
                    f,
                    "Low-rank factor has {factor_rows} rows but the diagonal has {diag_len} entries"
                )
            }
            CovError::RhsLengthMismatch { expected, found } => {
                write!(f, "Right-hand side length mismatch: expected {expected}, found {found}")
            }

            // ---- Input values ----
            CovError::NonPositiveDiagonal { index, value } => {
                write!(f, "Diagonal entry at index {index} must be > 0; got: {value}")
            }
            CovError::NonFiniteDiagonal { index, value } => {
                write!(f, "Diagonal entry at index {index} is non-finite: {value}")
            }
            CovError::NonFiniteFactor { row, col, value } => {
                write!(f, "Low-rank factor entry at ({row}, {col}) is non-finite: {value}")
            }
            CovError::NonFiniteResidual { index, value } => {
                write!(f, "Residual at index {index} is non-finite: {value}")
            }

            // ---- Numerical breakdown ----
            CovError::DiagonalInverseOverflow { index, value } => {
                write!(
                    f,
                    "Numerical instability: 1/D at index {index} overflows for diagonal \
                     entry {value}"
                )
            }
            CovError::InnerNotPositiveDefinite { dim } => {
                write!(
                    f,
                    "Numerical instability: inner {dim}x{dim} system I + M^T D^-1 M is not \
                     numerically positive definite"
                )
            }
            CovError::NonFiniteLogDet { value } => {
                write!(f, "Numerical instability: log-determinant is non-finite: {value}")
            }
            CovError::InvalidQuadForm { value } => {
                write!(f, "Numerical instability: quadratic form r^T S^-1 r = {value}")
            }
        }
    }
}

/// Convert a [`CovError`] into a Python exception.
///
/// Numerical breakdowns surface as `ArithmeticError`; shape and domain
/// failures as `ValueError`.
#[cfg(feature = "python-bindings")]
impl std::convert::From<CovError> for pyo3::PyErr {
    fn from(err: CovError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyArithmeticError, PyValueError};
        match err.kind() {
            CovErrorKind::NumericalInstability => PyArithmeticError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}
