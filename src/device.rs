//! device — opaque compute-placement handle.
//!
//! Purpose
//! -------
//! Carry the caller's notion of "where tensors live" through the covariance
//! and optimizer APIs without interpreting it. All numerical work in this
//! crate runs on the host in `f64`; the handle exists so that callers that
//! manage several placements (e.g., one per spectrum batch) can tag results
//! and optimizer instances consistently.
//!
//! Invariants & assumptions
//! ------------------------
//! - The label is never parsed or inspected by numerical code; it is stored
//!   and handed back unchanged.
//! - Two handles compare equal iff their labels are equal.

use std::fmt;

/// Device — opaque placement token passed through unchanged.
///
/// Constructed via [`Device::cpu`] (the default) or [`Device::new`] with an
/// arbitrary caller-chosen label such as `"cuda:1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    label: String,
}

impl Device {
    /// Build a handle from an arbitrary label.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// Host placement, also the [`Default`].
    pub fn cpu() -> Self {
        Self::new("cpu")
    }

    /// The label supplied at construction.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Check that the handle stores its label verbatim and that the default
    // placement is the host.
    //
    // Given
    // -----
    // - A custom label and the default constructor.
    //
    // Expect
    // ------
    // - `label()` and `Display` both return the original text.
    // - `Device::default() == Device::cpu()`.
    fn device_label_is_passed_through_unchanged() {
        // Arrange
        let gpu = Device::new("cuda:1");

        // Act / Assert
        assert_eq!(gpu.label(), "cuda:1");
        assert_eq!(gpu.to_string(), "cuda:1");
        assert_eq!(Device::default(), Device::cpu());
        assert_ne!(gpu, Device::cpu());
    }
}
