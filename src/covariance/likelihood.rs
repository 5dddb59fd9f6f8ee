//! covariance::likelihood — Gaussian log-likelihood under a low-rank plus
//! diagonal covariance.
//!
//! Purpose
//! -------
//! Evaluate the multivariate normal log-density of a residual vector
//! `r = y − μ` (observed flux minus model mean) under
//! `Σ = M·Mᵗ + diag(D)`:
//!
//! `ℓ = −½ (rᵗ·Σ⁻¹·r + log det Σ + Npix·ln 2π)`
//!
//! using the same factorization for the quadratic form and the
//! log-determinant, so the cost is `O(Npix·Nh² + Nh³)` rather than
//! `O(Npix³)`.
//!
//! Conventions
//! -----------
//! - The returned value is the log-likelihood (to be maximized); an
//!   optimizer minimizing a loss should negate it.
//! - Residual validation (length, finiteness) happens before any work.
use crate::{
    covariance::{
        errors::CovResult,
        validation::validate_residual,
        woodbury::StructuredCovariance,
    },
    device::Device,
};
use ndarray::{ArrayView1, ArrayView2};
use statrs::consts::LN_SQRT_2PI;

/// gaussian_log_likelihood — `ln N(r | 0, M·Mᵗ + diag(D))`.
///
/// Parameters
/// ----------
/// - `residual`: `ArrayView1<f64>` — length `Npix`, finite entries.
/// - `m`, `d`, `device`: as for [`crate::covariance::inverse`].
///
/// Errors
/// ------
/// - Every input error of [`StructuredCovariance::new`].
/// - [`crate::covariance::CovError::RhsLengthMismatch`] /
///   [`crate::covariance::CovError::NonFiniteResidual`] for a bad residual.
/// - Numerical errors from the log-determinant or quadratic form.
pub fn gaussian_log_likelihood(
    residual: ArrayView1<f64>, m: ArrayView2<f64>, d: ArrayView1<f64>, device: &Device,
) -> CovResult<f64> {
    StructuredCovariance::new(m, d, device)?.log_likelihood(residual)
}

impl StructuredCovariance {
    /// Gaussian log-likelihood of `residual` under this covariance.
    ///
    /// See [`gaussian_log_likelihood`] for the formula and error surface.
    pub fn log_likelihood(&self, residual: ArrayView1<f64>) -> CovResult<f64> {
        validate_residual(&residual, self.npix())?;
        let quad = self.quad_form(residual)?;
        let log_det = self.log_det()?;
        Ok(-0.5 * (quad + log_det) - self.npix() as f64 * LN_SQRT_2PI)
    }
}
