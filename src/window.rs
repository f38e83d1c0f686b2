//! Tapering windows applied to each segment before the 2D transform.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    /// Rectangular; every weight is 1.
    #[default]
    Flat,
    #[value(aliases = ["taper-a", "hanning"])]
    Hann,
    #[value(alias = "taper-b")]
    Hamming,
    #[value(alias = "taper-c")]
    Blackman,
}

impl WindowKind {
    pub fn name(self) -> &'static str {
        match self {
            WindowKind::Flat => "flat",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
        }
    }

    /// Symmetric 1D weights of length `n`.
    pub fn weights(self, n: usize) -> Vec<f64> {
        if n == 0 {
            return Vec::new();
        }
        if n == 1 || self == WindowKind::Flat {
            return vec![1.0; n];
        }
        let denom = (n - 1) as f64;
        (0..n)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / denom;
                let w = match self {
                    WindowKind::Flat => 1.0,
                    WindowKind::Hann => 0.5 * (1.0 - x.cos()),
                    WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                };
                // Blackman dips to about -1e-17 at the end points.
                w.max(0.0)
            })
            .collect()
    }

    /// Row-major `n x n` outer product of the 1D window with itself.
    pub fn weights_2d(self, n: usize, normalize_rms: bool) -> Vec<f64> {
        let w1 = self.weights(n);
        let mut w2 = Vec::with_capacity(n * n);
        for &wr in &w1 {
            for &wc in &w1 {
                w2.push(wr * wc);
            }
        }
        if normalize_rms && !w2.is_empty() {
            let rms = (w2.iter().map(|w| w * w).sum::<f64>() / w2.len() as f64).sqrt();
            if rms > 0.0 {
                for w in w2.iter_mut() {
                    *w /= rms;
                }
            }
        }
        w2
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <WindowKind as ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| ConfigurationError::UnknownWindow(s.to_string()))
    }
}
