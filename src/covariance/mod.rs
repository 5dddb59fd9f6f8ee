//! covariance — low-rank plus diagonal covariance algebra.
//!
//! Purpose
//! -------
//! Provide the inverse, log-determinant, solves, and Gaussian
//! log-likelihood for covariance matrices of the form
//! `Σ = M·Mᵗ + diag(D)`, where `M` is a tall, narrow `Npix × Nh` factor
//! (`Nh ≪ Npix`) and `D` is a strictly positive per-pixel noise variance.
//! These are the expensive pieces of the spectrum likelihood, and this
//! module evaluates them without ever factorizing the dense
//! `Npix × Npix` matrix.
//!
//! Key behaviors
//! -------------
//! - [`inverse`] — `Σ⁻¹` via the Woodbury identity.
//! - [`log_det`] — `log det Σ` via the matrix determinant lemma.
//! - [`StructuredCovariance`] — validate and factorize once, then reuse for
//!   `log_det`, `solve`, `quad_form`, `inverse`, and `log_likelihood`.
//! - [`gaussian_log_likelihood`] — `ln N(r | 0, Σ)` for a residual vector.
//!
//! Invariants & assumptions
//! ------------------------
//! - `D` must be finite and strictly positive; `M` must be finite. Both are
//!   checked up front and reported as [`CovError`] values of kind
//!   `InvalidParameter`, never as panics.
//! - The only matrix factorized is the `Nh × Nh` capacitance matrix
//!   `I + Mᵗ·D⁻¹·M`, which is positive definite in exact arithmetic; a
//!   failure there is reported with kind `NumericalInstability`.
//!
//! Conventions
//! -----------
//! - Inputs are `ndarray` views over `f64`; outputs are owned `ndarray`
//!   arrays or scalars.
//! - Every public operation takes a [`Device`] handle, which is stored or
//!   ignored but never inspected.
//! - This module is pure: no logging, no I/O, no global state.
//!
//! Downstream usage
//! ----------------
//! - A fitting loop computes residuals and the model's `(M, D)`, calls
//!   [`gaussian_log_likelihood`] (or builds a [`StructuredCovariance`] when
//!   several quantities are needed), and hands gradients to
//!   [`crate::optimization::adam::Adam`].
//!
//! Testing notes
//! -------------
//! - Unit tests in [`woodbury`] compare against dense reference
//!   computations (identity product, LU determinant) and cover `Nh = 0`.
//! - Unit tests in [`likelihood`] compare against `statrs` univariate
//!   normal densities.
//! - Integration tests exercise the full covariance → likelihood →
//!   gradient → optimizer path.

pub mod errors;
pub mod likelihood;
pub mod validation;
pub mod woodbury;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{CovError, CovErrorKind, CovResult};
pub use self::likelihood::gaussian_log_likelihood;
pub use self::woodbury::{StructuredCovariance, inverse, log_det};

pub use crate::device::Device;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use spectral_fit::covariance::prelude::*;
//
// to import the main covariance surface in a single line.

pub mod prelude {
    pub use super::errors::{CovError, CovErrorKind, CovResult};
    pub use super::likelihood::gaussian_log_likelihood;
    pub use super::woodbury::{StructuredCovariance, inverse, log_det};
}
