//! Learning-rate schedules for Adam.
//!
//! A schedule maps `(iteration, base_lr)` to the effective learning rate
//! for one update. The optimizer evaluates it once per
//! [`crate::optimization::adam::Adam::update`] with the current,
//! not-yet-incremented iteration counter.
use crate::optimization::errors::{OptError, OptResult};
use std::sync::Arc;

/// Shared schedule function of `(iteration, base_lr)`.
pub type ScheduleFn = Arc<dyn Fn(usize, f64) -> f64 + Send + Sync>;

/// Closed set of learning-rate schedules.
///
/// - `Constant`: the base rate at every iteration.
/// - `Step`: staircase decay `lr · alpha^((i + 1) / step_size)` with integer
///   division, so the first decay applies at `i = step_size - 1`.
/// - `Custom`: any function of `(iteration, base_lr)`, including capturing
///   closures; see [`LrScheduler::custom`].
#[derive(Clone, Default)]
pub enum LrScheduler {
    #[default]
    Constant,
    Step { alpha: f64, step_size: usize },
    Custom(ScheduleFn),
}

impl std::fmt::Debug for LrScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LrScheduler::Constant => f.write_str("Constant"),
            LrScheduler::Step { alpha, step_size } => f
                .debug_struct("Step")
                .field("alpha", alpha)
                .field("step_size", step_size)
                .finish(),
            LrScheduler::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl LrScheduler {
    /// Validated staircase schedule.
    ///
    /// # Errors
    /// [`OptError::InvalidScheduler`] if `step_size == 0` or `alpha` is not
    /// finite.
    pub fn step(alpha: f64, step_size: usize) -> OptResult<Self> {
        if step_size == 0 {
            return Err(OptError::InvalidScheduler {
                alpha,
                step_size,
                reason: "Step size must be greater than zero.",
            });
        }
        if !alpha.is_finite() {
            return Err(OptError::InvalidScheduler {
                alpha,
                step_size,
                reason: "Decay factor must be finite.",
            });
        }
        Ok(LrScheduler::Step { alpha, step_size })
    }

    /// Wrap a schedule function, which may capture its environment.
    pub fn custom<F>(schedule: F) -> Self
    where
        F: Fn(usize, f64) -> f64 + Send + Sync + 'static,
    {
        LrScheduler::Custom(Arc::new(schedule))
    }

    /// Effective learning rate at `iteration` for base rate `base_lr`.
    ///
    /// A `Step` with `step_size == 0` (only reachable through a struct
    /// literal) never decays.
    pub fn learning_rate(&self, iteration: usize, base_lr: f64) -> f64 {
        match self {
            LrScheduler::Constant => base_lr,
            &LrScheduler::Step { alpha, step_size } => {
                match (iteration + 1).checked_div(step_size) {
                    Some(decays) => base_lr * alpha.powf(decays as f64),
                    None => base_lr,
                }
            }
            LrScheduler::Custom(schedule) => schedule(iteration, base_lr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Pin the staircase boundaries for `alpha = 0.5`, `step_size = 10`.
    //
    // Given
    // -----
    // - Base rate 0.1.
    //
    // Expect
    // ------
    // - Iterations 0..=8 → 0.1; 9..=18 → 0.05; 19 → 0.025.
    fn step_schedule_follows_staircase() {
        // Arrange
        let sched = LrScheduler::step(0.5, 10).unwrap();

        // Act / Assert
        for i in 0..=8 {
            assert_relative_eq!(sched.learning_rate(i, 0.1), 0.1);
        }
        assert_relative_eq!(sched.learning_rate(9, 0.1), 0.05);
        assert_relative_eq!(sched.learning_rate(18, 0.1), 0.05);
        assert_relative_eq!(sched.learning_rate(19, 0.1), 0.025);
    }

    #[test]
    // Purpose
    // -------
    // Validate the builder and the non-staircase variants.
    //
    // Given
    // -----
    // - `step(0.5, 0)`, `step(NaN, 5)`, `Constant`, and a custom halving
    //   schedule.
    //
    // Expect
    // ------
    // - Both invalid builders fail with `InvalidScheduler`.
    // - `Constant` ignores the iteration; `Custom` is called verbatim.
    fn builder_validation_and_other_variants() {
        // Arrange
        fn halve_every_iter(i: usize, lr: f64) -> f64 {
            lr / (1u64 << i.min(60)) as f64
        }
        let custom = LrScheduler::Custom(Arc::new(halve_every_iter));

        // Act / Assert
        assert!(matches!(LrScheduler::step(0.5, 0), Err(OptError::InvalidScheduler { .. })));
        assert!(matches!(LrScheduler::step(f64::NAN, 5), Err(OptError::InvalidScheduler { .. })));
        assert_eq!(LrScheduler::Constant.learning_rate(1_000, 0.3), 0.3);
        assert_eq!(custom.learning_rate(2, 1.0), 0.25);
        assert!(matches!(LrScheduler::default(), LrScheduler::Constant));
    }

    #[test]
    // Purpose
    // -------
    // A custom schedule may capture state, and clones share the function.
    //
    // Given
    // -----
    // - A closure capturing a warm-up length of 3 iterations.
    //
    // Expect
    // ------
    // - Linear warm-up `lr·(i+1)/3` for `i < 3`, then the base rate.
    // - The clone evaluates identically and `Debug` hides the function.
    fn custom_schedule_can_capture_state() {
        // Arrange
        let warmup = 3_usize;
        let sched = LrScheduler::custom(move |i, lr| {
            if i < warmup { lr * (i + 1) as f64 / warmup as f64 } else { lr }
        });
        let copy = sched.clone();

        // Act / Assert
        assert_relative_eq!(sched.learning_rate(0, 0.3), 0.1, epsilon = 1e-15);
        assert_relative_eq!(sched.learning_rate(1, 0.3), 0.2, epsilon = 1e-15);
        assert_eq!(sched.learning_rate(3, 0.3), 0.3);
        assert_eq!(copy.learning_rate(10, 0.3), 0.3);
        assert_eq!(format!("{copy:?}"), "Custom(..)");
    }
}
