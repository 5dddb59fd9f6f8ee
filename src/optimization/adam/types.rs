//! Shared type aliases for Adam state.
//!
//! - [`ParamMap`]: named tensors (parameters, gradients, moments).
use ndarray::ArrayD;
use std::collections::HashMap;

/// Named, dynamically-shaped `f64` tensors keyed by parameter name.
pub type ParamMap = HashMap<String, ArrayD<f64>>;

/// Zero tensors shaped like every entry of `params`.
///
/// Values of `params` are ignored; only their shapes are read, so moment
/// buffers are always fresh `f64` zeros.
pub fn zeros_like(params: &ParamMap) -> ParamMap {
    params.iter().map(|(key, value)| (key.clone(), ArrayD::zeros(value.raw_dim()))).collect()
}

/// Keys of `map` in ascending order, for deterministic traversal.
pub fn sorted_keys(map: &ParamMap) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}
