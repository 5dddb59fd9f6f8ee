//! optimization — Adam updates, finite-difference gradients, and the
//! optimizer error surface.
//!
//! Purpose
//! -------
//! Provide the parameter-update half of a spectrum fit: given gradients of
//! a loss (usually the negative log-likelihood from
//! [`crate::covariance`]), produce updated parameter tensors.
//!
//! Key behaviors
//! -------------
//! - [`adam`]: Adam with weight decay, bias correction, and a closed set of
//!   learning-rate schedules over named `ndarray` tensors.
//! - [`finite_diff`]: gradient fallback for objectives without an analytic
//!   gradient.
//! - [`errors`]: a single error enum ([`OptError`]) and result alias
//!   ([`OptResult`]), classified by [`OptErrorKind`].
//!
//! Invariants & assumptions
//! ------------------------
//! - All arithmetic is `f64`.
//! - Invalid inputs are reported as [`OptError`], never as panics.
//! - Nothing here owns a training loop; callers drive `update` / `step`.
//!
//! Conventions
//! -----------
//! - Losses are minimized. Log-likelihoods should be negated before
//!   differencing.
//! - Only the optimizer logs, and only with the `obs_slog` feature and
//!   `verbose` set.
//!
//! Downstream usage
//! ----------------
//! - Import the curated surface with `optimization::prelude::*`.
//!
//! Testing notes
//! -------------
//! - Submodules carry unit tests for their local concerns; the integration
//!   tests under `tests/` cover convergence and the full
//!   likelihood → gradient → update path.

pub mod adam;
pub mod errors;
pub mod finite_diff;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{OptError, OptErrorKind, OptResult};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use spectral_fit::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::adam::{Adam, AdamOptions, LrScheduler, ParamMap};
    pub use super::errors::{OptError, OptErrorKind, OptResult};
    pub use super::finite_diff::fd_gradient;
}
