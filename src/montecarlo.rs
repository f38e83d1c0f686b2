//! Monte-Carlo null distributions for a coherence measurement.
//!
//! Trial `t` always draws from `ChaCha8Rng::seed_from_u64(derive_trial_seed(seed, t))`
//! and results are folded in trial order, so a run is bit-identical whatever
//! the pool size. Every run executes inside a pool of `threads` workers; with
//! one worker trials run in order on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MonteCarloConfig, SurrogateTarget};
use crate::error::{ConfigurationError, Result};
use crate::field::Field;
use crate::measure::{CoherenceMeasurement, Measurement, Statistic};
use crate::spectrum::FftHelper2d;
use crate::stats::{evaluate, NullDistribution, SignificanceResult, Tail};
use crate::utils::derive_trial_seed;

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum TrialOutcome {
    Completed(Vec<Option<f64>>),
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize)]
pub struct TargetSignificance {
    pub label: String,
    /// `None` when the observed value or the null distribution was undefined.
    pub result: Option<SignificanceResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonteCarloReport {
    pub observed: Measurement,
    pub distributions: Vec<NullDistribution>,
    pub significance: Vec<TargetSignificance>,
    pub tail: Tail,
    pub trials_requested: usize,
    pub trials_completed: usize,
    pub trials_skipped: usize,
    pub trials_cancelled: usize,
}

impl MonteCarloReport {
    pub fn p_values(&self) -> Vec<Option<f64>> {
        self.significance
            .iter()
            .map(|s| s.result.map(|r| r.p))
            .collect()
    }
}

pub struct MonteCarloRunner<S: Statistic = CoherenceMeasurement> {
    measurement: S,
    config: MonteCarloConfig,
    tail: Option<Tail>,
    cancel: Option<CancelToken>,
}

impl<S: Statistic> MonteCarloRunner<S> {
    pub fn new(measurement: S, config: MonteCarloConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            measurement,
            config,
            tail: None,
            cancel: None,
        })
    }

    /// Overrides the measurement's default extremity convention.
    pub fn with_tail(mut self, tail: Tail) -> Self {
        self.tail = Some(tail);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn measurement(&self) -> &S {
        &self.measurement
    }

    pub fn tail(&self) -> Tail {
        self.tail.unwrap_or_else(|| self.measurement.default_tail())
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| ConfigurationError::ThreadPool(e.to_string()).into())
    }

    /// Builds the null distribution of every target, one entry per target.
    /// Returns the distributions with (completed, skipped, cancelled) counts.
    pub fn null_distributions(
        &self,
        a: &Field,
        b: &Field,
    ) -> Result<(Vec<NullDistribution>, usize, usize, usize)> {
        a.ensure_same_shape(b)?;
        self.pool()?.install(|| self.null_distributions_in_pool(a, b))
    }

    fn null_distributions_in_pool(
        &self,
        a: &Field,
        b: &Field,
    ) -> Result<(Vec<NullDistribution>, usize, usize, usize)> {
        let helper = FftHelper2d::new(a.rows(), a.cols())?;
        let trials = self.config.trials;

        let outcomes: Vec<TrialOutcome> = if self.config.threads > 1 {
            (0..trials)
                .into_par_iter()
                .map(|t| self.trial(t, a, b, &helper))
                .collect()
        } else {
            (0..trials).map(|t| self.trial(t, a, b, &helper)).collect()
        };

        let mut distributions = vec![NullDistribution::new(); self.measurement.n_targets()];
        let (mut completed, mut skipped, mut cancelled) = (0, 0, 0);
        for outcome in outcomes {
            match outcome {
                TrialOutcome::Completed(values) => {
                    completed += 1;
                    for (dist, value) in distributions.iter_mut().zip(values) {
                        dist.push(value);
                    }
                }
                TrialOutcome::Failed => skipped += 1,
                TrialOutcome::Cancelled => cancelled += 1,
            }
        }
        Ok((distributions, completed, skipped, cancelled))
    }

    fn trial(&self, t: usize, a: &Field, b: &Field, helper: &FftHelper2d) -> TrialOutcome {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return TrialOutcome::Cancelled;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(derive_trial_seed(self.config.seed, t));
        let result = match self.config.surrogate {
            SurrogateTarget::ChannelA => self
                .config
                .null_model
                .surrogate(a, helper, &mut rng)
                .and_then(|s| self.measurement.measure(&s, b)),
            SurrogateTarget::ChannelB => self
                .config
                .null_model
                .surrogate(b, helper, &mut rng)
                .and_then(|s| self.measurement.measure(a, &s)),
        };
        match result {
            Ok(m) => TrialOutcome::Completed(m.values),
            Err(e) => {
                warn!("trial {t} skipped: {e}");
                TrialOutcome::Failed
            }
        }
    }

    /// Observed statistic, null distributions and per-target significance.
    pub fn run(&self, a: &Field, b: &Field) -> Result<MonteCarloReport> {
        a.ensure_same_shape(b)?;
        self.pool()?.install(|| self.run_in_pool(a, b))
    }

    fn run_in_pool(&self, a: &Field, b: &Field) -> Result<MonteCarloReport> {
        let started = Instant::now();
        let observed = self.measurement.measure(a, b)?;
        info!(
            "monte-carlo: {} trials, null model {}, surrogate {:?}, {} thread(s), {} target(s)",
            self.config.trials,
            self.config.null_model,
            self.config.surrogate,
            self.config.threads,
            self.measurement.n_targets()
        );

        let (distributions, completed, skipped, cancelled) = self.null_distributions_in_pool(a, b)?;
        if cancelled > 0 {
            warn!("run cancelled after {completed} completed trial(s)");
        }

        let tail = self.tail();
        let significance = self
            .measurement
            .target_labels()
            .into_iter()
            .enumerate()
            .map(|(i, label)| {
                let value = observed.values.get(i).copied().flatten();
                let result = match evaluate(value, &distributions[i], tail, i) {
                    Ok(r) => Some(r),
                    Err(e) => {
                        debug!("{label}: no significance ({e})");
                        None
                    }
                };
                TargetSignificance { label, result }
            })
            .collect();

        info!(
            "monte-carlo done in {:.2}s: {completed} completed, {skipped} skipped",
            started.elapsed().as_secs_f64()
        );
        Ok(MonteCarloReport {
            observed,
            distributions,
            significance,
            tail,
            trials_requested: self.config.trials,
            trials_completed: completed,
            trials_skipped: skipped,
            trials_cancelled: cancelled,
        })
    }
}
