//! optimization::finite_diff — finite-difference gradients over named
//! parameter maps.
//!
//! Purpose
//! -------
//! Provide a derivative fallback for objectives that have no analytic or
//! autodiff gradient, returning a gradient [`ParamMap`] that can be fed
//! straight into [`crate::optimization::adam::Adam::update`].
//!
//! Key behaviors
//! -------------
//! - Flatten the map in sorted key order (row-major within each tensor),
//!   differentiate with `finitediff`, and unflatten back to the original
//!   keys and shapes.
//! - Prefer central differences; fall back to forward differences when an
//!   evaluation fails or the central estimate is not finite.
//! - Capture the first error raised by the objective during differencing
//!   and surface it as an [`OptError`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters must be finite and the objective must be finite at the base
//!   point; both are checked before differencing.
//! - The objective is deterministic; no caching is attempted.
//!
//! Conventions
//! -----------
//! - The objective is treated as a loss (to be minimized); callers
//!   maximizing a log-likelihood should pass its negation.
//!
//! Testing notes
//! -------------
//! - Unit tests cover an exact quadratic, the forward-difference fallback,
//!   and objective-error propagation.
use crate::optimization::{
    adam::types::{ParamMap, sorted_keys},
    errors::{OptError, OptResult},
};
use finitediff::FiniteDiff;
use ndarray::{ArrayD, Dimension, IxDyn};
use std::cell::RefCell;

/// fd_gradient — finite-difference gradient of a scalar objective.
///
/// Parameters
/// ----------
/// - `objective`: `F: Fn(&ParamMap) -> OptResult<f64>`
///   Loss evaluated on maps with the same keys and shapes as `params`.
/// - `params`: `&ParamMap`
///   Point at which to differentiate.
///
/// Returns
/// -------
/// `OptResult<ParamMap>`
///   Gradient with the keys and shapes of `params`.
///
/// Errors
/// ------
/// - [`OptError::NonFiniteParameter`] if `params` holds NaN/±inf.
/// - Any error returned by `objective` at the base point or during
///   differencing.
/// - [`OptError::NonFiniteCost`] if the objective is not finite at `params`.
/// - [`OptError::InvalidGradient`] if both schemes yield a non-finite entry.
///
/// Examples
/// --------
/// ```rust
/// # use spectral_fit::optimization::{adam::ParamMap, finite_diff::fd_gradient};
/// # use ndarray::{ArrayD, IxDyn};
/// let mut params = ParamMap::new();
/// params.insert("x".to_string(), ArrayD::from_elem(IxDyn(&[1]), 3.0));
///
/// let grad = fd_gradient(|p: &ParamMap| Ok(p["x"][0] * p["x"][0]), &params).unwrap();
/// assert!((grad["x"][0] - 6.0).abs() < 1e-5);
/// ```
pub fn fd_gradient<F>(objective: F, params: &ParamMap) -> OptResult<ParamMap>
where
    F: Fn(&ParamMap) -> OptResult<f64>,
{
    let layout = Layout::of(params);
    let theta = layout.flatten(params)?;

    let base = objective(params)?;
    if !base.is_finite() {
        return Err(OptError::NonFiniteCost { value: base });
    }

    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let cost_func = |x: &Vec<f64>| -> f64 {
        match objective(&layout.unflatten(x)) {
            Ok(val) => val,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };

    let central = theta.central_diff(&cost_func);
    if closure_err.borrow().is_none() && central.iter().all(|g| g.is_finite()) {
        return Ok(layout.unflatten(&central));
    }

    closure_err.replace(None);
    let forward = theta.forward_diff(&cost_func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    layout.validate_grad(&forward)?;
    Ok(layout.unflatten(&forward))
}

// ---- Helper methods ----

/// Flat layout of a [`ParamMap`]: keys in sorted order with their shapes
/// and offsets into the flat vector.
struct Layout {
    entries: Vec<(String, IxDyn, usize)>,
    len: usize,
}

impl Layout {
    fn of(params: &ParamMap) -> Self {
        let mut entries = Vec::with_capacity(params.len());
        let mut offset = 0;
        for key in sorted_keys(params) {
            let tensor = &params[key];
            entries.push((key.clone(), tensor.raw_dim(), offset));
            offset += tensor.len();
        }
        Self { entries, len: offset }
    }

    fn flatten(&self, params: &ParamMap) -> OptResult<Vec<f64>> {
        let mut flat = Vec::with_capacity(self.len);
        for (key, _, _) in &self.entries {
            for (index, &value) in params[key].iter().enumerate() {
                if !value.is_finite() {
                    return Err(OptError::NonFiniteParameter { key: key.clone(), index, value });
                }
                flat.push(value);
            }
        }
        Ok(flat)
    }

    fn unflatten(&self, flat: &[f64]) -> ParamMap {
        self.entries
            .iter()
            .map(|(key, shape, offset)| {
                let mut tensor = ArrayD::zeros(shape.clone());
                let chunk = flat.iter().skip(*offset);
                tensor.iter_mut().zip(chunk).for_each(|(dst, &src)| *dst = src);
                (key.clone(), tensor)
            })
            .collect()
    }

    fn validate_grad(&self, grad: &[f64]) -> OptResult<()> {
        for (key, shape, offset) in &self.entries {
            let size = shape.size();
            for index in 0..size {
                let value = grad[offset + index];
                if !value.is_finite() {
                    return Err(OptError::InvalidGradient {
                        key: key.clone(),
                        index,
                        value,
                        reason: "Finite-difference gradient must be finite.",
                    });
                }
            }
        }
        Ok(())
    }
}
