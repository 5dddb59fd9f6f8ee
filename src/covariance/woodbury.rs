//! covariance::woodbury — inverse and log-determinant of `M·Mᵗ + diag(D)`.
//!
//! Purpose
//! -------
//! Evaluate `Σ⁻¹` and `log det Σ` for `Σ = M·Mᵗ + diag(D)` with a tall,
//! narrow factor `M` (`Npix × Nh`, `Nh ≪ Npix`) and a strictly positive
//! diagonal `D`, without ever factorizing the dense `Npix × Npix` matrix.
//!
//! Key behaviors
//! -------------
//! - Form the scaled factor `W = D⁻¹·M` and the `Nh × Nh` capacitance
//!   matrix `C = I + Mᵗ·W`, then Cholesky-factorize `C = L·Lᵗ`.
//! - Woodbury identity:
//!   `Σ⁻¹ = D⁻¹ − W·C⁻¹·Wᵗ`, with `C⁻¹·Wᵗ` obtained by a Cholesky solve.
//! - Matrix determinant lemma:
//!   `log det Σ = Σ_p ln D_p + log det C = Σ_p ln D_p + 2·Σ_k ln L_kk`.
//! - Apply `Σ⁻¹` to a vector in `O(Npix·Nh)` once factorized
//!   ([`StructuredCovariance::solve`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - `D > 0` makes `Σ` symmetric positive definite for any finite `M`, and
//!   `C` positive definite; a Cholesky failure therefore means numerical
//!   breakdown and is reported as [`CovError::InnerNotPositiveDefinite`].
//! - `C` is symmetrized before factorization so that rounding asymmetry in
//!   `Mᵗ·W` never reaches the Cholesky routine.
//! - `1 / D_p` must be finite. A positive subnormal `D_p` whose reciprocal
//!   overflows is rejected at construction for every `Nh`, so no `inf`
//!   reaches the inverse or the inner system.
//! - `Nh = 0` is a valid degenerate case: no inner system is formed,
//!   `Σ⁻¹ = D⁻¹` and `log det Σ = Σ ln D`.
//!
//! Conventions
//! -----------
//! - Inputs are `ndarray` views over `f64`; the small inner system is
//!   copied into `nalgebra::DMatrix` for the Cholesky factorization and
//!   solves, mirroring the `ndarray` ↔ `nalgebra` bridge used for Hessians
//!   elsewhere in numerical code.
//! - All products are accumulated in `f64`; nothing is formed in lower
//!   precision than the inputs.
//! - The dense inverse is `Npix × Npix` and symmetric only up to rounding;
//!   callers that need exact symmetry should symmetrize explicitly.
//!
//! Complexity
//! ----------
//! - Factorization: `O(Npix·Nh²)` for `Mᵗ·W` plus `O(Nh³)` for Cholesky.
//! - [`StructuredCovariance::log_det`]: `O(1)` after factorization.
//! - [`StructuredCovariance::solve`]: `O(Npix·Nh + Nh²)`.
//! - [`StructuredCovariance::inverse`]: `O(Npix²·Nh)`, dominated by writing
//!   the dense output.
use crate::{
    covariance::{
        errors::{CovError, CovResult},
        validation::{validate_inputs, validate_rhs_len},
    },
    device::Device,
};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// inverse — `(M·Mᵗ + diag(D))⁻¹` via the Woodbury identity.
///
/// Parameters
/// ----------
/// - `m`: `ArrayView2<f64>`
///   Low-rank factor of shape `(Npix, Nh)`; entries must be finite.
/// - `d`: `ArrayView1<f64>`
///   Diagonal of length `Npix`; entries must be finite and `> 0`.
/// - `device`: `&Device`
///   Opaque placement handle; passed through, never inspected.
///
/// Returns
/// -------
/// `CovResult<Array2<f64>>`
///   The dense `Npix × Npix` inverse.
///
/// Errors
/// ------
/// - [`CovError::FactorRowMismatch`] when `m.nrows() != d.len()`.
/// - [`CovError::NonPositiveDiagonal`] / [`CovError::NonFiniteDiagonal`] /
///   [`CovError::NonFiniteFactor`] for out-of-domain inputs.
/// - [`CovError::DiagonalInverseOverflow`] when some `1 / D_p` is not
///   representable.
/// - [`CovError::InnerNotPositiveDefinite`] when the `Nh × Nh` inner system
///   cannot be factorized.
///
/// Examples
/// --------
/// ```rust
/// # use ndarray::array;
/// # use spectral_fit::covariance::inverse;
/// # use spectral_fit::device::Device;
/// let m = array![[1.0], [1.0]];
/// let d = array![1.0, 1.0];
/// let inv = inverse(m.view(), d.view(), &Device::cpu()).unwrap();
/// // Σ = [[2, 1], [1, 2]] → Σ⁻¹ = [[2, -1], [-1, 2]] / 3
/// assert!((inv[[0, 0]] - 2.0 / 3.0).abs() < 1e-12);
/// assert!((inv[[0, 1]] + 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn inverse(m: ArrayView2<f64>, d: ArrayView1<f64>, device: &Device) -> CovResult<Array2<f64>> {
    Ok(StructuredCovariance::new(m, d, device)?.inverse())
}

/// log_det — `log det(M·Mᵗ + diag(D))` via the matrix determinant lemma.
///
/// Same inputs and input errors as [`inverse`]. The sum of logarithms
/// avoids forming the product of `Npix` diagonal terms, so the result is
/// stable for very small or very large `D`.
///
/// # Errors
/// In addition to the input errors of [`inverse`]:
/// - [`CovError::InnerNotPositiveDefinite`] when the inner determinant is
///   not numerically positive.
/// - [`CovError::NonFiniteLogDet`] when the assembled value is NaN/±inf.
pub fn log_det(m: ArrayView2<f64>, d: ArrayView1<f64>, device: &Device) -> CovResult<f64> {
    StructuredCovariance::new(m, d, device)?.log_det()
}

/// StructuredCovariance — factorized `Σ = M·Mᵗ + diag(D)`.
///
/// Purpose
/// -------
/// Validate and factorize `(M, D)` once, then serve the log-determinant,
/// solves, quadratic forms, and (if really needed) the dense inverse from
/// the same factorization. The free functions [`inverse`] and [`log_det`]
/// are thin wrappers that build one of these and discard it.
///
/// Fields
/// ------
/// - `dinv`: `Array1<f64>` — `1 / D`, length `Npix`.
/// - `log_det_d`: `f64` — `Σ_p ln D_p`.
/// - `scaled_factor`: `Array2<f64>` — `W = D⁻¹·M`, shape `(Npix, Nh)`.
/// - `inner`: `Option<Cholesky<f64, Dyn>>` — Cholesky of
///   `C = I + Mᵗ·W`; `None` iff `Nh = 0`.
/// - `device`: [`Device`] — handle supplied at construction.
///
/// Invariants
/// ----------
/// - All fields are derived from one validated `(M, D)` pair and are never
///   mutated after construction.
#[derive(Debug, Clone)]
pub struct StructuredCovariance {
    dinv: Array1<f64>,
    log_det_d: f64,
    scaled_factor: Array2<f64>,
    inner: Option<Cholesky<f64, Dyn>>,
    device: Device,
}

impl StructuredCovariance {
    /// Validate `(M, D)` and factorize the inner `Nh × Nh` system.
    ///
    /// # Errors
    /// See [`inverse`].
    pub fn new(m: ArrayView2<f64>, d: ArrayView1<f64>, device: &Device) -> CovResult<Self> {
        validate_inputs(&m, &d)?;

        let dinv = d.mapv(|x| 1.0 / x);
        if let Some(index) = dinv.iter().position(|x| !x.is_finite()) {
            return Err(CovError::DiagonalInverseOverflow { index, value: d[index] });
        }
        let log_det_d = d.iter().map(|x| x.ln()).sum::<f64>();

        let mut scaled_factor = m.to_owned();
        for (mut row, &dp) in scaled_factor.axis_iter_mut(Axis(0)).zip(d.iter()) {
            row /= dp;
        }

        let inner = if m.ncols() == 0 { None } else { Some(factor_inner(&m, &scaled_factor)?) };

        Ok(Self { dinv, log_det_d, scaled_factor, inner, device: device.clone() })
    }

    /// Number of pixels `Npix` (dimension of `Σ`).
    pub fn npix(&self) -> usize {
        self.dinv.len()
    }

    /// Rank `Nh` of the low-rank part.
    pub fn rank(&self) -> usize {
        self.scaled_factor.ncols()
    }

    /// Placement handle supplied at construction.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// `log det Σ = Σ ln D + 2·Σ ln diag(L)`.
    ///
    /// # Errors
    /// [`CovError::NonFiniteLogDet`] if the sum is NaN/±inf (e.g., overflow
    /// of the inner factor).
    pub fn log_det(&self) -> CovResult<f64> {
        let inner = match &self.inner {
            Some(chol) => 2.0 * chol.l_dirty().diagonal().iter().map(|x| x.ln()).sum::<f64>(),
            None => 0.0,
        };
        let value = self.log_det_d + inner;
        if !value.is_finite() {
            return Err(CovError::NonFiniteLogDet { value });
        }
        Ok(value)
    }

    /// Dense `Σ⁻¹ = D⁻¹ − W·C⁻¹·Wᵗ`.
    ///
    /// Allocates `Npix × Npix`; prefer [`StructuredCovariance::solve`] when
    /// only products with `Σ⁻¹` are needed.
    pub fn inverse(&self) -> Array2<f64> {
        let npix = self.npix();
        let mut out = Array2::<f64>::zeros((npix, npix));
        for (i, &v) in self.dinv.iter().enumerate() {
            out[[i, i]] = v;
        }
        if let Some(chol) = &self.inner {
            let wt = to_dmatrix(&self.scaled_factor.t());
            let c_inv_wt = from_dmatrix(&chol.solve(&wt));
            out -= &self.scaled_factor.dot(&c_inv_wt);
        }
        out
    }

    /// `Σ⁻¹·r` without materializing `Σ⁻¹`.
    ///
    /// # Errors
    /// [`CovError::RhsLengthMismatch`] if `rhs.len() != Npix`.
    pub fn solve(&self, rhs: ArrayView1<f64>) -> CovResult<Array1<f64>> {
        validate_rhs_len(self.npix(), rhs.len())?;
        let mut out = &rhs * &self.dinv;
        if let Some(chol) = &self.inner {
            let wt_r = self.scaled_factor.t().dot(&rhs);
            let y = chol.solve(&DVector::from_iterator(wt_r.len(), wt_r.iter().copied()));
            let y = Array1::from_iter(y.iter().copied());
            out -= &self.scaled_factor.dot(&y);
        }
        Ok(out)
    }

    /// Quadratic form `rᵗ·Σ⁻¹·r`.
    ///
    /// # Errors
    /// - [`CovError::RhsLengthMismatch`] if `r.len() != Npix`.
    /// - [`CovError::InvalidQuadForm`] if the result is negative or
    ///   non-finite, which cannot happen for a positive-definite `Σ` in exact
    ///   arithmetic.
    pub fn quad_form(&self, r: ArrayView1<f64>) -> CovResult<f64> {
        let value = r.dot(&self.solve(r)?);
        if !value.is_finite() || value < 0.0 {
            return Err(CovError::InvalidQuadForm { value });
        }
        Ok(value)
    }
}

// ---- Helper methods ----

/// Build and Cholesky-factorize `C = I + Mᵗ·W`.
///
/// Any non-finite entry in `C` (overflow of `D⁻¹·M` for tiny `D` or huge
/// `M`) is reported before factorization, as is a failed factorization.
fn factor_inner(m: &ArrayView2<f64>, w: &Array2<f64>) -> CovResult<Cholesky<f64, Dyn>> {
    let nh = m.ncols();
    let mtw = m.t().dot(w);
    if mtw.iter().any(|x| !x.is_finite()) {
        return Err(CovError::InnerNotPositiveDefinite { dim: nh });
    }
    let c = DMatrix::from_fn(nh, nh, |i, j| {
        let sym = 0.5 * (mtw[[i, j]] + mtw[[j, i]]);
        if i == j { 1.0 + sym } else { sym }
    });
    Cholesky::new(c).ok_or(CovError::InnerNotPositiveDefinite { dim: nh })
}

/// Copy an `ndarray` view into a column-major `nalgebra::DMatrix`.
fn to_dmatrix(a: &ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Copy a `nalgebra::DMatrix` back into an owned `ndarray` matrix.
fn from_dmatrix(a: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.nrows(), a.ncols()), |(i, j)| a[(i, j)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::errors::CovErrorKind;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `inverse` against the dense `M·Mᵗ + diag(D)` (product ≈ identity).
    // - `log_det` against a dense LU determinant for small `Npix`.
    // - The `Nh = 0` degenerate case for both operations.
    // - `solve` / `quad_form` consistency with the dense inverse.
    // - Error paths: shape mismatch, bad diagonal, overflowed inner system.
    // - The empty `Npix = 0` system and subnormal diagonals whose reciprocal
    //   overflows.
    // - The result guards of `log_det` and `quad_form` on a corrupted
    //   factorization.
    //
    // They intentionally DO NOT cover:
    // - The Gaussian log-likelihood; see `covariance::likelihood`.
    // -------------------------------------------------------------------------

    fn test_factor(npix: usize, nh: usize) -> Array2<f64> {
        Array2::from_shape_fn((npix, nh), |(i, j)| ((i * nh + j) as f64 * 0.7 + 0.3).sin())
    }

    fn test_diag(npix: usize) -> Array1<f64> {
        Array1::from_shape_fn(npix, |i| 0.5 + ((i as f64) * 1.3).cos().abs())
    }

    fn dense(m: &Array2<f64>, d: &Array1<f64>) -> Array2<f64> {
        let mut sigma = m.dot(&m.t());
        for (i, &v) in d.iter().enumerate() {
            sigma[[i, i]] += v;
        }
        sigma
    }

    #[test]
    // Purpose
    // -------
    // Verify the Woodbury inverse reproduces the identity when multiplied
    // by the dense covariance.
    //
    // Given
    // -----
    // - `Npix = 50`, `Nh = 5`, deterministic pseudo-random `M`, positive `D`.
    //
    // Expect
    // ------
    // - `max |inverse(M, D)·Σ − I| < 1e-9`.
    fn inverse_times_dense_is_identity() {
        // Arrange
        let m = test_factor(50, 5);
        let d = test_diag(50);
        let sigma = dense(&m, &d);

        // Act
        let inv = inverse(m.view(), d.view(), &Device::cpu()).unwrap();
        let prod = inv.dot(&sigma);

        // Assert
        let max_err = prod
            .indexed_iter()
            .map(|((i, j), &v)| (v - if i == j { 1.0 } else { 0.0 }).abs())
            .fold(0.0_f64, f64::max);
        assert!(max_err < 1e-9, "max abs error {max_err}");
    }

    #[test]
    // Purpose
    // -------
    // Check the determinant lemma against a dense reference determinant.
    //
    // Given
    // -----
    // - `Npix = 12`, `Nh = 3`.
    //
    // Expect
    // ------
    // - `log_det(M, D) ≈ ln det(Σ)` with relative tolerance 1e-10.
    fn log_det_matches_dense_determinant() {
        // Arrange
        let m = test_factor(12, 3);
        let d = test_diag(12);
        let sigma = dense(&m, &d);
        let reference = to_dmatrix(&sigma.view()).lu().determinant().ln();

        // Act
        let value = log_det(m.view(), d.view(), &Device::cpu()).unwrap();

        // Assert
        assert_relative_eq!(value, reference, max_relative = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Confirm the `Nh = 0` reduction for both operations.
    //
    // Given
    // -----
    // - An empty `(4, 0)` factor and `D = [1, 2, 4, 8]`.
    //
    // Expect
    // ------
    // - `inverse = diag(1/D)` exactly.
    // - `log_det = Σ ln D`.
    fn empty_factor_reduces_to_diagonal() {
        // Arrange
        let m = Array2::<f64>::zeros((4, 0));
        let d = array![1.0, 2.0, 4.0, 8.0];

        // Act
        let inv = inverse(m.view(), d.view(), &Device::cpu()).unwrap();
        let ld = log_det(m.view(), d.view(), &Device::cpu()).unwrap();

        // Assert
        let mut expected = Array2::<f64>::zeros((4, 4));
        for i in 0..4 {
            expected[[i, i]] = 1.0 / d[i];
        }
        assert_eq!(inv, expected);
        assert_relative_eq!(ld, d.iter().map(|x| x.ln()).sum::<f64>(), epsilon = 1e-14);
    }

    #[test]
    // Purpose
    // -------
    // Ensure `solve` and `quad_form` agree with the dense inverse.
    //
    // Given
    // -----
    // - `Npix = 20`, `Nh = 4`, a fixed residual vector.
    //
    // Expect
    // ------
    // - `solve(r) ≈ inverse()·r` entry-wise.
    // - `quad_form(r) ≈ rᵗ·inverse()·r` and is positive.
    fn solve_and_quad_form_match_dense_inverse() {
        // Arrange
        let m = test_factor(20, 4);
        let d = test_diag(20);
        let r = Array1::from_shape_fn(20, |i| (i as f64 * 0.37).cos());
        let cov = StructuredCovariance::new(m.view(), d.view(), &Device::cpu()).unwrap();
        let dense_inv = cov.inverse();

        // Act
        let x = cov.solve(r.view()).unwrap();
        let q = cov.quad_form(r.view()).unwrap();

        // Assert
        let x_ref = dense_inv.dot(&r);
        for (a, b) in x.iter().zip(x_ref.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-10);
        }
        assert!(q > 0.0);
        assert_relative_eq!(q, r.dot(&x_ref), max_relative = 1e-10);
        assert_eq!(cov.npix(), 20);
        assert_eq!(cov.rank(), 4);
    }

    #[test]
    // Purpose
    // -------
    // Exercise the three error categories.
    //
    // Given
    // -----
    // - A `(3, 1)` factor with a length-2 diagonal.
    // - A valid factor with a zero diagonal entry.
    // - `D = 1e-300` and `M = 1e10`, so `D⁻¹·M` overflows.
    //
    // Expect
    // ------
    // - `ShapeMismatch`, `InvalidParameter`, `NumericalInstability` kinds.
    fn error_paths_are_classified() {
        // Arrange
        let device = Device::cpu();
        let m3 = test_factor(3, 1);
        let short_d = array![1.0, 1.0];
        let zero_d = array![1.0, 0.0, 1.0];
        let huge_m = Array2::from_elem((2, 1), 1e10);
        let tiny_d = array![1e-300, 1e-300];

        // Act
        let shape = inverse(m3.view(), short_d.view(), &device).unwrap_err();
        let domain = log_det(m3.view(), zero_d.view(), &device).unwrap_err();
        let numeric = log_det(huge_m.view(), tiny_d.view(), &device).unwrap_err();

        // Assert
        assert_eq!(shape.kind(), CovErrorKind::ShapeMismatch);
        assert_eq!(domain, CovError::NonPositiveDiagonal { index: 1, value: 0.0 });
        assert_eq!(domain.kind(), CovErrorKind::InvalidParameter);
        assert_eq!(numeric, CovError::InnerNotPositiveDefinite { dim: 1 });
        assert_eq!(numeric.kind(), CovErrorKind::NumericalInstability);
    }

    #[test]
    // Purpose
    // -------
    // Confirm that the solve path rejects right-hand sides of the wrong
    // length instead of panicking inside `ndarray`.
    //
    // Given
    // -----
    // - A factorized covariance with `Npix = 5` and a length-4 vector.
    //
    // Expect
    // ------
    // - `RhsLengthMismatch { expected: 5, found: 4 }`.
    fn solve_rejects_wrong_length() {
        // Arrange
        let cov = StructuredCovariance::new(
            test_factor(5, 2).view(),
            test_diag(5).view(),
            &Device::new("cuda:0"),
        )
        .unwrap();
        let r = Array1::<f64>::ones(4);

        // Act
        let err = cov.solve(r.view()).unwrap_err();

        // Assert
        assert_eq!(err, CovError::RhsLengthMismatch { expected: 5, found: 4 });
        assert_eq!(cov.device().label(), "cuda:0");
    }

    #[test]
    // Purpose
    // -------
    // Confirm that an empty system is accepted for any rank.
    //
    // Given
    // -----
    // - `(0, 0)` and `(0, 3)` factors with an empty diagonal.
    //
    // Expect
    // ------
    // - `inverse` is `0 × 0` and `log_det` is exactly 0.
    // - With `Nh = 3` the inner system is `I₃`, so `log_det` stays 0.
    fn empty_pixel_set_gives_empty_inverse_and_zero_log_det() {
        // Arrange
        let d = Array1::<f64>::zeros(0);

        for nh in [0, 3] {
            let m = Array2::<f64>::zeros((0, nh));

            // Act
            let inv = inverse(m.view(), d.view(), &Device::cpu()).unwrap();
            let ld = log_det(m.view(), d.view(), &Device::cpu()).unwrap();

            // Assert
            assert_eq!(inv.dim(), (0, 0));
            assert_eq!(ld, 0.0);
        }
    }

    #[test]
    // Purpose
    // -------
    // A positive subnormal diagonal entry passes domain validation but its
    // reciprocal overflows; both the diagonal-only and the low-rank paths
    // must report the same numerical failure instead of `inf` entries or a
    // misattributed inner-system error.
    //
    // Given
    // -----
    // - `D = [1e-310, 1]` with `M` of shape `(2, 0)`.
    // - The same `D` with `M = [[0], [1]]`.
    //
    // Expect
    // ------
    // - `DiagonalInverseOverflow { index: 0, value: 1e-310 }` from `inverse`
    //   and `log_det` on both, with kind `NumericalInstability`.
    fn subnormal_diagonal_is_rejected_for_every_rank() {
        // Arrange
        let device = Device::cpu();
        let d = array![1e-310, 1.0];
        let no_factor = Array2::<f64>::zeros((2, 0));
        let zero_row = array![[0.0], [1.0]];
        let expected = CovError::DiagonalInverseOverflow { index: 0, value: 1e-310 };

        for m in [&no_factor, &zero_row] {
            // Act
            let inv_err = inverse(m.view(), d.view(), &device).unwrap_err();
            let ld_err = log_det(m.view(), d.view(), &device).unwrap_err();

            // Assert
            assert_eq!(inv_err, expected);
            assert_eq!(ld_err, expected);
            assert_eq!(ld_err.kind(), CovErrorKind::NumericalInstability);
        }
    }

    #[test]
    // Purpose
    // -------
    // Exercise the result guards of `log_det` and `quad_form`. Validated
    // finite inputs cannot trip them, so the factorization is assembled by
    // hand with a non-finite `Σ ln D` and a negative `D⁻¹`.
    //
    // Given
    // -----
    // - `log_det_d = +inf`.
    // - `dinv = [-1]` and residual `[2]`.
    //
    // Expect
    // ------
    // - `NonFiniteLogDet { value: inf }`.
    // - `InvalidQuadForm { value: -4 }`.
    fn result_guards_report_numerical_instability() {
        // Arrange
        let corrupted = |dinv: Array1<f64>, log_det_d: f64| StructuredCovariance {
            scaled_factor: Array2::zeros((dinv.len(), 0)),
            dinv,
            log_det_d,
            inner: None,
            device: Device::cpu(),
        };
        let overflowed = corrupted(array![1.0], f64::INFINITY);
        let indefinite = corrupted(array![-1.0], 0.0);
        let r = array![2.0];

        // Act
        let ld_err = overflowed.log_det().unwrap_err();
        let q_err = indefinite.quad_form(r.view()).unwrap_err();

        // Assert
        assert_eq!(ld_err, CovError::NonFiniteLogDet { value: f64::INFINITY });
        assert_eq!(q_err, CovError::InvalidQuadForm { value: -4.0 });
        assert_eq!(q_err.kind(), CovErrorKind::NumericalInstability);
    }
}
