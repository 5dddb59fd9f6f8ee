//! adam — Adam with weight decay and learning-rate schedules.
//!
//! Purpose
//! -------
//! Turn gradients of a scalar objective (typically the negative spectrum
//! log-likelihood) into parameter updates for a set of named tensors.
//!
//! Key behaviors
//! -------------
//! - [`Adam`] keeps the moment buffers and the iteration counter.
//! - [`AdamOptions`] carries the hyperparameters, with opt-in validation.
//! - [`LrScheduler`] selects the effective learning rate per update.
//!
//! Conventions
//! -----------
//! - Parameters, gradients, and moments are [`ParamMap`]s: `HashMap`s from
//!   name to `ArrayD<f64>`.
//! - `update` and `step` are separate calls; [`Adam::update_and_step`]
//!   combines them.
//! - The `obs_slog` feature enables terminal progress records when
//!   `AdamOptions::verbose` is set.

pub mod optimizer;
pub mod options;
pub mod scheduler;
pub mod types;
pub mod validation;

#[cfg(feature = "obs_slog")]
pub mod observer;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::optimizer::Adam;
pub use self::options::AdamOptions;
pub use self::scheduler::LrScheduler;
pub use self::types::ParamMap;
