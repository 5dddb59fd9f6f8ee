//! spectral_fit — structured covariance algebra and Adam updates for
//! absorption-spectrum fitting, with optional Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the numerical core to Python via the `_spectral_fit` extension
//! module. The crate provides the two expensive primitives of a spectrum
//! fit: the inverse and log-determinant of `Σ = M·Mᵗ + diag(D)` with a tall
//! low-rank `M`, and an Adam optimizer over named parameter tensors.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`covariance`, `optimization`, `device`)
//!   as the public crate surface.
//! - Define `#[pyfunction]`s, the `Adam` `#[pyclass]`, and the `#[pymodule]`
//!   initializer for the `_spectral_fit` Python extension.
//! - Register the `covariance` and `optimization` submodules in
//!   `sys.modules` so dotted imports work.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs only
//!   FFI glue, input conversion, and error mapping.
//! - Python callers see the same semantics as Rust callers, including the
//!   separate `update` / `step` calls on `Adam`.
//!
//! Conventions
//! -----------
//! - Python-exposed items live under `_spectral_fit.<submodule>`.
//! - Core errors ([`covariance::CovError`], [`optimization::OptError`]) are
//!   converted to `ValueError` / `KeyError` / `ArithmeticError` at the PyO3
//!   boundary.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code depends on the inner modules and can ignore every item
//!   guarded by the `python-bindings` feature.
//!
//! Testing notes
//! -------------
//! - Core numerical behavior is covered by unit tests in the inner modules
//!   and by the integration tests under `tests/`.

pub mod covariance;
pub mod device;
pub mod optimization;
pub mod utils;

pub use crate::device::Device;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use crate::{
    optimization::{
        OptError,
        adam::{Adam, AdamOptions},
    },
    utils::{
        extract_matrix, extract_param_map, extract_scheduler, extract_vector, param_map_to_dict,
    },
};

#[cfg(feature = "python-bindings")]
use std::sync::{Arc, Mutex};

/// matrix_inverse — `Σ⁻¹` for `Σ = M·Mᵗ + diag(D)` from Python.
///
/// Parameters
/// ----------
/// - `m`: 2-D array-like `(Npix, Nh)`.
/// - `d`: 1-D array-like of length `Npix`, strictly positive.
/// - `device`: opaque placement label, default `"cpu"`.
///
/// Returns
/// -------
/// `numpy.ndarray` of shape `(Npix, Npix)`.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (m, d, device = "cpu"))]
pub fn matrix_inverse<'py>(
    py: Python<'py>, m: &Bound<'py, PyAny>, d: &Bound<'py, PyAny>, device: &str,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let m_arr = extract_matrix(py, m, "m")?;
    let d_arr = extract_vector(py, d, "d")?;
    let inv = covariance::inverse(m_arr.as_array(), d_arr.as_array(), &Device::new(device))?;
    Ok(inv.into_pyarray(py))
}

/// matrix_log_det — `log det Σ` for `Σ = M·Mᵗ + diag(D)` from Python.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (m, d, device = "cpu"))]
pub fn matrix_log_det<'py>(
    py: Python<'py>, m: &Bound<'py, PyAny>, d: &Bound<'py, PyAny>, device: &str,
) -> PyResult<f64> {
    let m_arr = extract_matrix(py, m, "m")?;
    let d_arr = extract_vector(py, d, "d")?;
    Ok(covariance::log_det(m_arr.as_array(), d_arr.as_array(), &Device::new(device))?)
}

/// gaussian_log_likelihood — `ln N(r | 0, M·Mᵗ + diag(D))` from Python.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(signature = (residual, m, d, device = "cpu"))]
pub fn gaussian_log_likelihood<'py>(
    py: Python<'py>, residual: &Bound<'py, PyAny>, m: &Bound<'py, PyAny>,
    d: &Bound<'py, PyAny>, device: &str,
) -> PyResult<f64> {
    let r_arr = extract_vector(py, residual, "residual")?;
    let m_arr = extract_matrix(py, m, "m")?;
    let d_arr = extract_vector(py, d, "d")?;
    Ok(covariance::gaussian_log_likelihood(
        r_arr.as_array(),
        m_arr.as_array(),
        d_arr.as_array(),
        &Device::new(device),
    )?)
}

/// Adam — Python-facing wrapper for [`Adam`].
///
/// Purpose
/// -------
/// Expose the optimizer to Python with dict-of-arrays parameters while
/// keeping the Rust state machine (`update`, `step`, `reset`) unchanged.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `Adam(params, device="cpu", learning_rate=1e-2, b1=0.9, b2=0.999,
/// eps=1e-8, weight_decay=1e-3, scheduler=None, verbose=False)`:
/// - `params`: `dict[str, numpy.ndarray]`; only keys and shapes are read.
/// - `scheduler`: `None` for a constant rate, `(alpha, step_size)` for
///   the staircase schedule, or a callable `(i, learning_rate) -> float`.
///
/// Notes
/// -----
/// - Hyperparameters are not range-checked, matching [`Adam::new`].
/// - An exception raised by a callable scheduler is re-raised from the
///   `update` (or `learning_rate` read) that evaluated it.
#[cfg(feature = "python-bindings")]
#[pyclass(name = "Adam", module = "spectral_fit.optimization")]
pub struct PyAdam {
    inner: Adam,
    scheduler_error: Arc<Mutex<Option<PyErr>>>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyAdam {
    #[new]
    #[pyo3(signature = (
        params, device = "cpu", learning_rate = 1e-2, b1 = 0.9, b2 = 0.999, eps = 1e-8,
        weight_decay = 1e-3, scheduler = None, verbose = false
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: &Bound<'_, PyDict>, device: &str, learning_rate: f64, b1: f64, b2: f64, eps: f64,
        weight_decay: f64, scheduler: Option<&Bound<'_, PyAny>>, verbose: bool,
    ) -> PyResult<Self> {
        let params = extract_param_map(params, "params")?;
        let scheduler_error = Arc::new(Mutex::new(None));
        let scheduler = match scheduler {
            Some(obj) if !obj.is_none() => Some(extract_scheduler(obj, &scheduler_error)?),
            _ => None,
        };
        let options = AdamOptions { learning_rate, b1, b2, eps, weight_decay, verbose };
        let inner = Adam::new(&params, Device::new(device), scheduler, options);
        Ok(PyAdam { inner, scheduler_error })
    }

    /// New parameters after one Adam update; the counter is not advanced.
    pub fn update<'py>(
        &mut self, py: Python<'py>, params: &Bound<'py, PyDict>, g: &Bound<'py, PyDict>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let params = extract_param_map(params, "params")?;
        let g = extract_param_map(g, "g")?;
        let updated = self.inner.update(&params, &g).map_err(|e| self.raise(e))?;
        param_map_to_dict(py, &updated)
    }

    /// `update` followed by `step`.
    pub fn update_and_step<'py>(
        &mut self, py: Python<'py>, params: &Bound<'py, PyDict>, g: &Bound<'py, PyDict>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let params = extract_param_map(params, "params")?;
        let g = extract_param_map(g, "g")?;
        let updated = self.inner.update_and_step(&params, &g).map_err(|e| self.raise(e))?;
        param_map_to_dict(py, &updated)
    }

    pub fn step(&mut self) {
        self.inner.step();
    }

    pub fn reset(&mut self, params: &Bound<'_, PyDict>) -> PyResult<()> {
        let params = extract_param_map(params, "params")?;
        self.inner.reset(&params);
        Ok(())
    }

    #[getter]
    pub fn iteration(&self) -> usize {
        self.inner.iteration()
    }

    /// Learning rate the next `update` will use.
    #[getter]
    pub fn learning_rate(&self) -> PyResult<f64> {
        let lr = self.inner.scheduled_lr();
        match self.take_scheduler_error() {
            Some(err) => Err(err),
            None => Ok(lr),
        }
    }

    #[getter]
    pub fn device(&self) -> String {
        self.inner.device().label().to_string()
    }

    pub fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}

#[cfg(feature = "python-bindings")]
impl PyAdam {
    /// Exception parked by a callable scheduler, if any.
    fn take_scheduler_error(&self) -> Option<PyErr> {
        self.scheduler_error.lock().ok().and_then(|mut parked| parked.take())
    }

    /// Prefer the scheduler's own exception over the generic rate error.
    fn raise(&self, err: OptError) -> PyErr {
        self.take_scheduler_error().unwrap_or_else(|| err.into())
    }
}

/// _spectral_fit — PyO3 module initializer for the Python extension.
///
/// Creates the `covariance` and `optimization` submodules, attaches them to
/// `_spectral_fit`, and registers them in `sys.modules` under
/// `spectral_fit.<name>`.
///
/// Errors
/// ------
/// - `PyErr` if creating submodules or manipulating `sys.modules` fails.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _spectral_fit<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let covariance_mod = PyModule::new(_py, "covariance")?;
    let optimization_mod = PyModule::new(_py, "optimization")?;
    covariance_functions(_py, m, &covariance_mod)?;
    optimization_classes(_py, m, &optimization_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    _py.import("sys")?.getattr("modules")?.set_item("spectral_fit.covariance", covariance_mod)?;

    _py.import("sys")?
        .getattr("modules")?
        .set_item("spectral_fit.optimization", optimization_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn covariance_functions<'py>(
    _py: Python, spectral_fit: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(matrix_inverse, m)?)?;
    m.add_function(wrap_pyfunction!(matrix_log_det, m)?)?;
    m.add_function(wrap_pyfunction!(gaussian_log_likelihood, m)?)?;
    spectral_fit.add_submodule(m)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn optimization_classes<'py>(
    _py: Python, spectral_fit: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_class::<PyAdam>()?;
    spectral_fit.add_submodule(m)?;
    Ok(())
}
