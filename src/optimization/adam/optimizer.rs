//! Adam optimizer with L2 weight decay and a pluggable learning-rate
//! schedule.
//!
//! Purpose
//! -------
//! Hold the first/second raw moment estimates for a set of named parameter
//! tensors and turn gradients into bias-corrected parameter updates.
//!
//! Key behaviors
//! -------------
//! - [`Adam::update`] folds weight decay into the gradient, updates the
//!   moments in place, and returns new parameters. It never touches the
//!   iteration counter or the caller's tensors.
//! - [`Adam::step`] advances the iteration counter; [`Adam::reset`] returns
//!   to the fresh state for a (possibly new) set of shapes.
//! - [`Adam::update_and_step`] is exactly `update` followed by `step`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `m` and `v` always share one key set and one shape per key.
//! - Bias correction divides by `1 − b^(i+1)` with the current counter
//!   `i`; `update` reads the counter and only `step`/`reset` change it.
//! - Inputs are validated before any mutation; a failed `update` leaves the
//!   optimizer exactly as it was.
//!
//! Conventions
//! -----------
//! - Moments are `f64` zeros on creation regardless of parameter values.
//! - Hyperparameters are taken as given; see
//!   [`crate::optimization::adam::AdamOptions::check`] for opt-in validation.
//!
//! Testing notes
//! -------------
//! - Unit tests below cover the first-step formula, zero gradients, reset
//!   reproducibility, and validation-before-mutation.
//! - Convergence on a quadratic is covered by the integration tests.
#[cfg(feature = "obs_slog")]
use crate::optimization::adam::observer::{map_l2_norm, term_noblock};
use crate::{
    device::Device,
    optimization::{
        adam::{
            options::AdamOptions,
            scheduler::LrScheduler,
            types::{ParamMap, zeros_like},
            validation::validate_map,
        },
        errors::{OptError, OptResult},
    },
};
use ndarray::Zip;

/// Adam — moment buffers and iteration counter for one set of named
/// parameter tensors.
///
/// Fields
/// ------
/// - `options`: [`AdamOptions`] — base rate, betas, epsilon, weight decay.
/// - `scheduler`: [`LrScheduler`] — maps `(iteration, base_lr)` to the rate
///   used by the next update.
/// - `device`: [`Device`] — placement handle, reported but never inspected.
/// - `m`, `v`: [`ParamMap`] — first/second raw moments, zero on creation.
/// - `iteration`: `usize` — number of `step` calls since the last reset.
///
/// Invariants
/// ----------
/// - `m` and `v` share one key set and one shape per key.
pub struct Adam {
    options: AdamOptions,
    scheduler: LrScheduler,
    device: Device,
    m: ParamMap,
    v: ParamMap,
    iteration: usize,
    #[cfg(feature = "obs_slog")]
    logger: Option<slog::Logger>,
}

impl Adam {
    /// Create an optimizer for the tensors in `params`.
    ///
    /// Parameters
    /// ----------
    /// - `params`: `&ParamMap`
    ///   Initial parameters; only keys and shapes are read.
    /// - `device`: [`Device`]
    ///   Placement handle, stored and reported but never inspected.
    /// - `scheduler`: `Option<LrScheduler>`
    ///   `None` behaves as [`LrScheduler::Constant`].
    /// - `options`: [`AdamOptions`]
    ///   Not validated here.
    ///
    /// Notes
    /// -----
    /// - With the `obs_slog` feature and `options.verbose`, a non-blocking
    ///   terminal logger is attached.
    pub fn new(
        params: &ParamMap, device: Device, scheduler: Option<LrScheduler>, options: AdamOptions,
    ) -> Self {
        #[cfg(feature = "obs_slog")]
        let logger = options.verbose.then(term_noblock);
        Self {
            options,
            scheduler: scheduler.unwrap_or_default(),
            device,
            m: zeros_like(params),
            v: zeros_like(params),
            iteration: 0,
            #[cfg(feature = "obs_slog")]
            logger,
        }
    }

    /// Compute one Adam update without advancing the iteration counter.
    ///
    /// For every key `k`, with `i` the current counter and `lr` the
    /// scheduled rate:
    ///
    /// 1. `g' = g + weight_decay · p`
    /// 2. `m = (1 − b1)·g' + b1·m`, `v = (1 − b2)·g'² + b2·v`
    /// 3. `m̂ = m / (1 − b1^(i+1))`, `v̂ = v / (1 − b2^(i+1))`
    /// 4. `p_new = p − lr · m̂ / (sqrt(v̂) + eps)`
    ///
    /// Returns
    /// -------
    /// `OptResult<ParamMap>`
    ///   New parameters with the same keys and shapes as `params`.
    ///
    /// Errors
    /// ------
    /// - [`OptError::MissingKey`] / [`OptError::UnexpectedKey`] if the key set
    ///   of `params` or `g` differs from the optimizer's.
    /// - [`OptError::ShapeMismatch`] if any tensor changed shape since
    ///   construction or the last reset.
    /// - [`OptError::NonFiniteLearningRate`] if the schedule yields NaN/±inf.
    ///
    /// On error, `m` and `v` are unchanged.
    pub fn update(&mut self, params: &ParamMap, g: &ParamMap) -> OptResult<ParamMap> {
        validate_map(&self.m, params, "params")?;
        validate_map(&self.m, g, "gradient")?;

        let AdamOptions { b1, b2, eps, weight_decay, .. } = self.options;
        let lr = self.scheduled_lr();
        if !lr.is_finite() {
            return Err(OptError::NonFiniteLearningRate { iteration: self.iteration, value: lr });
        }
        let t = (self.iteration + 1) as f64;
        let bias1 = 1.0 - b1.powf(t);
        let bias2 = 1.0 - b2.powf(t);

        let mut updated = ParamMap::with_capacity(params.len());
        for (key, m_k) in self.m.iter_mut() {
            let v_k = self
                .v
                .get_mut(key)
                .ok_or_else(|| OptError::MissingKey { key: key.clone(), map: "moments" })?;
            let mut p_new = params[key].to_owned();
            Zip::from(&mut p_new).and(m_k).and(v_k).and(&g[key]).for_each(|p, m, v, &gk| {
                let g_eff = gk + weight_decay * *p;
                *m = (1.0 - b1) * g_eff + b1 * *m;
                *v = (1.0 - b2) * g_eff * g_eff + b2 * *v;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
            updated.insert(key.clone(), p_new);
        }

        #[cfg(feature = "obs_slog")]
        if let Some(logger) = &self.logger {
            slog::debug!(logger, "update";
                "iteration" => self.iteration,
                "lr" => lr,
                "base_lr" => self.options.learning_rate,
                "grad_norm" => map_l2_norm(g)
            );
        }

        Ok(updated)
    }

    /// Advance the iteration counter by one.
    pub fn step(&mut self) {
        self.iteration += 1;
        #[cfg(feature = "obs_slog")]
        if let Some(logger) = &self.logger {
            slog::info!(logger, "step"; "iteration" => self.iteration, "lr" => self.scheduled_lr());
        }
    }

    /// Zero the moments with shapes taken from `params` and set the counter
    /// to 0. The key set may differ from the previous one.
    pub fn reset(&mut self, params: &ParamMap) {
        self.m = zeros_like(params);
        self.v = zeros_like(params);
        self.iteration = 0;
        #[cfg(feature = "obs_slog")]
        if let Some(logger) = &self.logger {
            slog::info!(logger, "reset"; "tensors" => params.len());
        }
    }

    /// [`Adam::update`] followed by [`Adam::step`]; the counter only advances
    /// if the update succeeded.
    pub fn update_and_step(&mut self, params: &ParamMap, g: &ParamMap) -> OptResult<ParamMap> {
        let updated = self.update(params, g)?;
        self.step();
        Ok(updated)
    }

    /// Number of `step` calls since construction or the last reset.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Learning rate the next `update` will use.
    pub fn scheduled_lr(&self) -> f64 {
        self.scheduler.learning_rate(self.iteration, self.options.learning_rate)
    }

    /// Placement handle supplied at construction.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Hyperparameters as given to [`Adam::new`].
    pub fn options(&self) -> &AdamOptions {
        &self.options
    }

    /// Active schedule; [`LrScheduler::Constant`] when none was supplied.
    pub fn scheduler(&self) -> &LrScheduler {
        &self.scheduler
    }

    /// First raw moment estimates.
    pub fn first_moment(&self) -> &ParamMap {
        &self.m
    }

    /// Second raw moment estimates.
    pub fn second_moment(&self) -> &ParamMap {
        &self.v
    }
}

impl std::fmt::Debug for Adam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.m.keys().collect();
        keys.sort();
        f.debug_struct("Adam")
            .field("options", &self.options)
            .field("scheduler", &self.scheduler)
            .field("device", &self.device)
            .field("keys", &keys)
            .field("iteration", &self.iteration)
            .finish()
    }
}
