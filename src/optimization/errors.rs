//! Errors for the optimization layer (Adam state, hyperparameters, and
//! finite-difference gradients).
//!
//! [`OptError`] is returned by every fallible operation in
//! [`crate::optimization`]. Like the covariance errors, each variant maps
//! onto the three-way [`OptErrorKind`] taxonomy via [`OptError::kind`].
//!
//! ## Conventions
//! - Keys are reported exactly as supplied by the caller.
//! - Shapes are reported as full `Vec<usize>` shapes, matching
//!   `ndarray::ArrayD::shape()`.
//! - Flat indices in finite-difference errors are 0-based offsets into the
//!   named tensor in row-major order.
use crate::covariance::errors::{CovError, CovErrorKind};

/// Result alias for optimizer operations that may produce [`OptError`].
pub type OptResult<T> = Result<T, OptError>;

/// Coarse failure category for [`OptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptErrorKind {
    ShapeMismatch,
    InvalidParameter,
    NumericalInstability,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Parameter maps ----
    /// A key known to the optimizer is absent from `params` or the gradient.
    MissingKey { key: String, map: &'static str },

    /// A key not known to the optimizer is present in `params` or the gradient.
    UnexpectedKey { key: String, map: &'static str },

    /// A tensor's shape differs from the shape of its moment buffers.
    ShapeMismatch { key: String, map: &'static str, expected: Vec<usize>, found: Vec<usize> },

    // ---- Hyperparameters ----
    /// An Adam hyperparameter is outside its domain.
    InvalidHyperParameter { name: &'static str, value: f64, reason: &'static str },

    /// The step scheduler was configured with an unusable decay or period.
    InvalidScheduler { alpha: f64, step_size: usize, reason: &'static str },

    /// The schedule produced a NaN/±inf learning rate at `iteration`.
    NonFiniteLearningRate { iteration: usize, value: f64 },

    // ---- Finite differences ----
    /// A parameter entry handed to finite differencing is NaN/±inf.
    NonFiniteParameter { key: String, index: usize, value: f64 },

    /// The objective returned a non-finite value at the base point.
    NonFiniteCost { value: f64 },

    /// A finite-difference gradient entry is NaN/±inf on every scheme.
    InvalidGradient { key: String, index: usize, value: f64, reason: &'static str },

    // ---- Objective ----
    /// Wrapper for a covariance error raised inside an objective.
    Covariance { source: CovError },
}

impl OptError {
    /// Classify the error into the three-way taxonomy of [`OptErrorKind`].
    pub fn kind(&self) -> OptErrorKind {
        match self {
            OptError::MissingKey { .. }
            | OptError::UnexpectedKey { .. }
            | OptError::ShapeMismatch { .. } => OptErrorKind::ShapeMismatch,
            OptError::InvalidHyperParameter { .. }
            | OptError::InvalidScheduler { .. }
            | OptError::NonFiniteLearningRate { .. }
            | OptError::NonFiniteParameter { .. } => OptErrorKind::InvalidParameter,
            OptError::NonFiniteCost { .. } | OptError::InvalidGradient { .. } => {
                OptErrorKind::NumericalInstability
            }
            OptError::Covariance { source } => match source.kind() {
                CovErrorKind::ShapeMismatch => OptErrorKind::ShapeMismatch,
                CovErrorKind::InvalidParameter => OptErrorKind::InvalidParameter,
                CovErrorKind::NumericalInstability => OptErrorKind::NumericalInstability,
            },
        }
    }
}

impl std::error::Error for OptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptError::Covariance { source } => Some(source),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Parameter maps ----
            OptError::MissingKey { key, map } => {
                write!(f, "Missing key '{key}' in {map}")
            }
            OptError::UnexpectedKey { key, map } => {
                write!(f, "Unexpected key '{key}' in {map}")
            }
            OptError::ShapeMismatch { key, map, expected, found } => {
                write!(f, "Shape mismatch for '{key}' in {map}: expected {expected:?}, found {found:?}")
            }

            // ---- Hyperparameters ----
            OptError::InvalidHyperParameter { name, value, reason } => {
                write!(f, "Invalid hyperparameter {name} = {value}: {reason}")
            }
            OptError::InvalidScheduler { alpha, step_size, reason } => {
                write!(f, "Invalid step scheduler (alpha = {alpha}, step_size = {step_size}): {reason}")
            }

            OptError::NonFiniteLearningRate { iteration, value } => {
                write!(f, "Scheduled learning rate at iteration {iteration} is non-finite: {value}")
            }

            // ---- Finite differences ----
            OptError::NonFiniteParameter { key, index, value } => {
                write!(f, "Non-finite parameter '{key}' at index {index}: {value}")
            }
            OptError::NonFiniteCost { value } => {
                write!(f, "Non-finite cost value: {value}")
            }
            OptError::InvalidGradient { key, index, value, reason } => {
                write!(f, "Invalid gradient for '{key}' at index {index}: {value}: {reason}")
            }

            // ---- Objective ----
            OptError::Covariance { source } => {
                write!(f, "Covariance error: {source}")
            }
        }
    }
}

impl From<CovError> for OptError {
    fn from(source: CovError) -> Self {
        OptError::Covariance { source }
    }
}

#[cfg(feature = "python-bindings")]
impl std::convert::From<OptError> for pyo3::PyErr {
    fn from(err: OptError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyArithmeticError, PyKeyError, PyValueError};
        match (&err, err.kind()) {
            (OptError::MissingKey { .. } | OptError::UnexpectedKey { .. }, _) => {
                PyKeyError::new_err(err.to_string())
            }
            (_, OptErrorKind::NumericalInstability) => PyArithmeticError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}
