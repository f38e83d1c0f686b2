//! Null distributions and empirical significance.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{CoherenceError, DegenerateInput, Result};

/// Which null samples count as "at least as extreme" as the observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tail {
    /// `null >= observed`: larger statistics are more extreme.
    #[value(aliases = ["one-sided", "greater"])]
    Upper,
    /// `|null - mean| >= |observed - mean|`: distance from the null mean in
    /// either direction is what matters.
    #[value(aliases = ["two-sided", "symmetric"])]
    Deviation,
}

impl Default for Tail {
    fn default() -> Self {
        Tail::Upper
    }
}

impl Tail {
    pub fn name(self) -> &'static str {
        match self {
            Tail::Upper => "one-sided",
            Tail::Deviation => "two-sided",
        }
    }
}

impl fmt::Display for Tail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tail {
    type Err = CoherenceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <Tail as ValueEnum>::from_str(s.trim(), true).map_err(|_| CoherenceError::StatisticalConvention {
            name: s.to_string(),
        })
    }
}

/// Monte-Carlo replicate values of one target, plus the bookkeeping needed to
/// report how many trials actually contributed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NullDistribution {
    samples: Vec<f64>,
    /// Trials whose statistic was undefined for this target.
    pub undefined: usize,
}

impl NullDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<f64>) -> Self {
        Self {
            samples,
            undefined: 0,
        }
    }

    pub fn push(&mut self, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => self.samples.push(v),
            _ => self.undefined += 1,
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Sample standard deviation with the `N - 1` denominator; 0 for one sample.
    pub fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let n = self.samples.len();
        if n < 2 {
            return Some(0.0);
        }
        let var = self
            .samples
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>()
            / (n - 1) as f64;
        Some(var.sqrt())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SignificanceResult {
    pub observed: f64,
    pub null_mean: f64,
    pub null_std: f64,
    pub z: f64,
    pub p: f64,
    /// Null samples the p-value was computed from.
    pub n_null: usize,
    pub tail: Tail,
}

/// z-score and empirical p-value of `observed` against `null` (index `target`
/// is only used to label errors).
pub fn evaluate(
    observed: Option<f64>,
    null: &NullDistribution,
    tail: Tail,
    target: usize,
) -> Result<SignificanceResult> {
    let observed = observed
        .filter(|v| v.is_finite())
        .ok_or(DegenerateInput::UndefinedBin { bin: target })?;
    let (Some(mean), Some(std)) = (null.mean(), null.std()) else {
        return Err(DegenerateInput::EmptyNullDistribution { target }.into());
    };
    let z = if std > 0.0 {
        (observed - mean) / std
    } else {
        0.0
    };
    let extreme = match tail {
        Tail::Upper => null.samples().iter().filter(|&&v| v >= observed).count(),
        Tail::Deviation => {
            let observed_dev = (observed - mean).abs();
            null.samples()
                .iter()
                .filter(|&&v| (v - mean).abs() >= observed_dev)
                .count()
        }
    };
    Ok(SignificanceResult {
        observed,
        null_mean: mean,
        null_std: std,
        z,
        p: extreme as f64 / null.len() as f64,
        n_null: null.len(),
        tail,
    })
}
