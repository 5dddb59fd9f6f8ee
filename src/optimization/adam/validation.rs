//! Validation helpers for Adam parameter and gradient maps.
//!
//! A map is compatible with the optimizer state when it has exactly the
//! state's key set and every tensor has the shape of its moment buffer.
//! Keys are visited in sorted order so the reported offender is
//! deterministic.
use crate::optimization::{
    adam::types::{ParamMap, sorted_keys},
    errors::{OptError, OptResult},
};

/// Check that `candidate` carries exactly the keys of `state`.
///
/// # Errors
/// - [`OptError::MissingKey`] for the first state key absent from `candidate`.
/// - [`OptError::UnexpectedKey`] for the first extra key in `candidate`.
pub fn validate_keys(state: &ParamMap, candidate: &ParamMap, map: &'static str) -> OptResult<()> {
    for key in sorted_keys(state) {
        if !candidate.contains_key(key) {
            return Err(OptError::MissingKey { key: key.clone(), map });
        }
    }
    for key in sorted_keys(candidate) {
        if !state.contains_key(key) {
            return Err(OptError::UnexpectedKey { key: key.clone(), map });
        }
    }
    Ok(())
}

/// Check that every tensor in `candidate` matches the shape in `state`.
///
/// Assumes [`validate_keys`] already passed; keys missing from `candidate`
/// are skipped.
///
/// # Errors
/// [`OptError::ShapeMismatch`] for the first mismatching key.
pub fn validate_shapes(state: &ParamMap, candidate: &ParamMap, map: &'static str) -> OptResult<()> {
    for key in sorted_keys(state) {
        let expected = state[key].shape();
        if let Some(found) = candidate.get(key).map(|t| t.shape()) {
            if found != expected {
                return Err(OptError::ShapeMismatch {
                    key: key.clone(),
                    map,
                    expected: expected.to_vec(),
                    found: found.to_vec(),
                });
            }
        }
    }
    Ok(())
}

/// Keys, then shapes.
pub fn validate_map(state: &ParamMap, candidate: &ParamMap, map: &'static str) -> OptResult<()> {
    validate_keys(state, candidate, map)?;
    validate_shapes(state, candidate, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;
    use ndarray::IxDyn;

    fn map(entries: &[(&str, &[usize])]) -> ParamMap {
        entries
            .iter()
            .map(|(k, shape)| (k.to_string(), ArrayD::zeros(IxDyn(shape))))
            .collect()
    }

    #[test]
    // Purpose
    // -------
    // Missing keys are reported before unexpected ones, in sorted order.
    //
    // Given
    // -----
    // - State `{a, b}`; candidates `{a}` and `{a, b, c}`.
    //
    // Expect
    // ------
    // - `MissingKey { key: "b" }` and `UnexpectedKey { key: "c" }`.
    fn validate_keys_reports_missing_and_unexpected() {
        // Arrange
        let state = map(&[("a", &[2]), ("b", &[3])]);
        let short = map(&[("a", &[2])]);
        let long = map(&[("a", &[2]), ("b", &[3]), ("c", &[1])]);

        // Act
        let missing = validate_keys(&state, &short, "params").unwrap_err();
        let unexpected = validate_keys(&state, &long, "gradient").unwrap_err();

        // Assert
        assert_eq!(missing, OptError::MissingKey { key: "b".into(), map: "params" });
        assert_eq!(unexpected, OptError::UnexpectedKey { key: "c".into(), map: "gradient" });
    }

    #[test]
    // Purpose
    // -------
    // Shapes are compared exactly, including rank.
    //
    // Given
    // -----
    // - State `a: [2, 3]`; candidate `a: [6]`.
    //
    // Expect
    // ------
    // - `ShapeMismatch` with both shapes; matching maps pass `validate_map`.
    fn validate_shapes_rejects_reshaped_tensor() {
        // Arrange
        let state = map(&[("a", &[2, 3])]);
        let flat = map(&[("a", &[6])]);

        // Act
        let err = validate_map(&state, &flat, "params").unwrap_err();

        // Assert
        assert_eq!(
            err,
            OptError::ShapeMismatch {
                key: "a".into(),
                map: "params",
                expected: vec![2, 3],
                found: vec![6],
            }
        );
        assert!(validate_map(&state, &state.clone(), "params").is_ok());
    }
}
