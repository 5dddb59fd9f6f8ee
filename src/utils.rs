//! Conversion helpers for the Python bindings.
//!
//! Everything here is compiled only with the `python-bindings` feature and
//! moves data between Python objects (NumPy arrays, pandas objects,
//! sequences, dicts) and the `ndarray` types used by the core modules.
#[cfg(feature = "python-bindings")]
use ndarray::{Array2, ArrayD, IxDyn};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use crate::optimization::adam::{LrScheduler, ParamMap, types::sorted_keys};

#[cfg(feature = "python-bindings")]
use std::sync::{Arc, Mutex};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // ndarray → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
    PyReadonlyArray2,
    PyReadonlyArrayDyn,
};

/// Borrow or copy a 1-D `float64` input.
///
/// Accepts a contiguous `numpy.ndarray`, anything with `to_numpy()`
/// (pandas), or a sequence of floats.
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_vector<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>, name: &str,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        return Ok(arr_ro);
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            return Ok(series_ro);
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err(format!(
            "{name}: expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64"
        ))
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Borrow or copy a 2-D `float64` input.
///
/// Accepts a `numpy.ndarray`, anything with `to_numpy()` (pandas
/// DataFrame), or a list of equal-length rows.
#[cfg(feature = "python-bindings")]
pub fn extract_matrix<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>, name: &str,
) -> PyResult<PyReadonlyArray2<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro);
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro);
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err(format!(
            "{name}: expected a 2-D numpy.ndarray, pandas.DataFrame, or list of float64 rows"
        ))
    })?;
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(PyValueError::new_err(format!("{name}: rows must all have the same length")));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let matrix = Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| PyValueError::new_err(format!("{name}: {e}")))?;
    Ok(matrix.into_pyarray(py).readonly())
}

/// Copy a `{name: array}` dict into a [`ParamMap`].
///
/// Values may be `float64` arrays of any rank or plain floats (stored as
/// 0-d tensors).
#[cfg(feature = "python-bindings")]
pub fn extract_param_map(dict: &Bound<'_, PyDict>, what: &str) -> PyResult<ParamMap> {
    let mut map = ParamMap::with_capacity(dict.len());
    for (key, value) in dict.iter() {
        let key: String = key
            .extract()
            .map_err(|_| PyTypeError::new_err(format!("{what}: keys must be str")))?;
        let tensor = if let Ok(arr_ro) = value.extract::<PyReadonlyArrayDyn<f64>>() {
            arr_ro.as_array().to_owned()
        } else if let Ok(x) = value.extract::<f64>() {
            ArrayD::from_elem(IxDyn(&[]), x)
        } else {
            return Err(PyTypeError::new_err(format!(
                "{what}['{key}']: expected a float64 numpy.ndarray or float"
            )));
        };
        map.insert(key, tensor);
    }
    Ok(map)
}

/// Build a `{name: numpy.ndarray}` dict from a [`ParamMap`], inserting keys
/// in sorted order.
#[cfg(feature = "python-bindings")]
pub fn param_map_to_dict<'py>(py: Python<'py>, map: &ParamMap) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    for key in sorted_keys(map) {
        dict.set_item(key, map[key].clone().into_pyarray(py))?;
    }
    Ok(dict)
}

/// Build an [`LrScheduler`] from a Python `scheduler` argument.
///
/// Accepts an `(alpha, step_size)` tuple for the staircase schedule or any
/// callable `(i, learning_rate) -> float`. An exception raised by the
/// callable is parked in `pending` and the schedule yields NaN, which makes
/// the next update fail; the caller then re-raises the parked exception.
#[cfg(feature = "python-bindings")]
pub fn extract_scheduler(
    obj: &Bound<'_, PyAny>, pending: &Arc<Mutex<Option<PyErr>>>,
) -> PyResult<LrScheduler> {
    if let Ok((alpha, step_size)) = obj.extract::<(f64, usize)>() {
        return Ok(LrScheduler::step(alpha, step_size)?);
    }
    if !obj.is_callable() {
        return Err(PyTypeError::new_err(
            "scheduler: expected None, an (alpha, step_size) tuple, or a callable \
             (i, learning_rate) -> float",
        ));
    }
    let callable: Py<PyAny> = obj.clone().unbind();
    let slot = Arc::clone(pending);
    Ok(LrScheduler::custom(move |i, lr| {
        Python::with_gil(|py| match callable.call1(py, (i, lr)).and_then(|v| v.extract::<f64>(py)) {
            Ok(value) => value,
            Err(err) => {
                if let Ok(mut parked) = slot.lock() {
                    *parked = Some(err);
                }
                f64::NAN
            }
        })
    }))
}
