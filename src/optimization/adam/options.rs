//! Configuration for the Adam optimizer.
//!
//! [`AdamOptions`] is plain data in the same spirit as the optimizer
//! options used elsewhere in this crate: [`AdamOptions::new`] validates,
//! struct literals and [`Default`] do not, and [`crate::optimization::adam::Adam::new`]
//! accepts whatever it is given. Callers that build options from untrusted
//! input should go through `new` or call [`AdamOptions::check`].
use crate::optimization::errors::{OptError, OptResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamOptions {
    /// Base learning rate fed to the scheduler.
    pub learning_rate: f64,
    /// First-moment decay.
    pub b1: f64,
    /// Second-moment decay.
    pub b2: f64,
    /// Denominator floor added to `sqrt(v̂)`.
    pub eps: f64,
    /// L2 coefficient folded into the gradient.
    pub weight_decay: f64,
    /// Emit progress records (requires the `obs_slog` feature).
    pub verbose: bool,
}

impl AdamOptions {
    /// Construct validated options.
    ///
    /// # Rules
    /// - `learning_rate` and `weight_decay` finite and `>= 0`.
    /// - `0 < b1 < 1`, `0 < b2 < 1`.
    /// - `eps` finite and `> 0`.
    ///
    /// # Errors
    /// [`OptError::InvalidHyperParameter`] naming the first offending field.
    pub fn new(
        learning_rate: f64, b1: f64, b2: f64, eps: f64, weight_decay: f64, verbose: bool,
    ) -> OptResult<Self> {
        let opts = Self { learning_rate, b1, b2, eps, weight_decay, verbose };
        opts.check()?;
        Ok(opts)
    }

    /// Validate every hyperparameter against its domain.
    ///
    /// # Errors
    /// [`OptError::InvalidHyperParameter`] naming the first offending field,
    /// checked in declaration order.
    pub fn check(&self) -> OptResult<()> {
        verify_non_negative("learning_rate", self.learning_rate)?;
        verify_open_unit("b1", self.b1)?;
        verify_open_unit("b2", self.b2)?;
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(OptError::InvalidHyperParameter {
                name: "eps",
                value: self.eps,
                reason: "Epsilon must be finite and strictly positive.",
            });
        }
        verify_non_negative("weight_decay", self.weight_decay)
    }
}

impl Default for AdamOptions {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            b1: 0.9,
            b2: 0.999,
            eps: 1e-8,
            weight_decay: 1e-3,
            verbose: false,
        }
    }
}

// ---- Helper methods ----

fn verify_open_unit(name: &'static str, value: f64) -> OptResult<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(OptError::InvalidHyperParameter {
            name,
            value,
            reason: "Decay rates must lie strictly between 0 and 1.",
        });
    }
    Ok(())
}

fn verify_non_negative(name: &'static str, value: f64) -> OptResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(OptError::InvalidHyperParameter {
            name,
            value,
            reason: "Value must be finite and non-negative.",
        });
    }
    Ok(())
}
