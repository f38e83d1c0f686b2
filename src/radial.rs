//! Radial shells of the 2D frequency plane.
//!
//! A sample at signed frequency `(k_row, k_col)` has radius
//! `r = sqrt(k_row^2 + k_col^2)` in cycles per field. Shells run from 0 to
//! `k_max = min(H, W) / 2`; samples beyond `k_max` (the grid corners) are not
//! binned under either policy.
//!
//! Segment spectra index frequencies in cycles per segment; a binner built
//! with `for_segments` scales them by `H/S` and `W/S` so windowed and direct
//! shells share one unit.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DegenerateInput, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinningPolicy {
    /// Whole weight to `round(r)`.
    Nearest,
    /// Weight `1 - frac` to `floor(r)` and `frac` to `ceil(r)`.
    #[default]
    #[value(alias = "split")]
    LinearSplit,
}

impl BinningPolicy {
    pub fn name(self) -> &'static str {
        match self {
            BinningPolicy::Nearest => "nearest",
            BinningPolicy::LinearSplit => "linear-split",
        }
    }
}

impl fmt::Display for BinningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BinningPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <BinningPolicy as ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| ConfigurationError::UnknownBinningPolicy(s.to_string()))
    }
}

/// Up to two `(bin, weight)` contributions of one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contributions {
    parts: [(usize, f64); 2],
    len: usize,
}

impl Contributions {
    const EMPTY: Self = Self {
        parts: [(0, 0.0); 2],
        len: 0,
    };

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.parts[..self.len].iter().copied()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RadialBinner {
    k_max: usize,
    policy: BinningPolicy,
    row_scale: f64,
    col_scale: f64,
}

impl RadialBinner {
    /// Shells for spectra of a whole `rows x cols` field.
    pub fn new(rows: usize, cols: usize, policy: BinningPolicy) -> Self {
        Self {
            k_max: rows.min(cols) / 2,
            policy,
            row_scale: 1.0,
            col_scale: 1.0,
        }
    }

    /// Shells in cycles per field for spectra of `segment x segment` patches
    /// cut from a `rows x cols` field.
    pub fn for_segments(rows: usize, cols: usize, segment: usize, policy: BinningPolicy) -> Self {
        let segment = segment.max(1) as f64;
        Self {
            k_max: rows.min(cols) / 2,
            policy,
            row_scale: rows as f64 / segment,
            col_scale: cols as f64 / segment,
        }
    }

    /// Radius of signed transform indices `(k_row, k_col)` in cycles per field.
    #[inline(always)]
    pub fn radius(&self, k_row: isize, k_col: isize) -> f64 {
        let kr = k_row as f64 * self.row_scale;
        let kc = k_col as f64 * self.col_scale;
        (kr * kr + kc * kc).sqrt()
    }

    pub fn k_max(&self) -> usize {
        self.k_max
    }

    pub fn policy(&self) -> BinningPolicy {
        self.policy
    }

    pub fn n_bins(&self) -> usize {
        self.k_max + 1
    }

    pub fn contributions(&self, r: f64) -> Contributions {
        if r.is_nan() || r < 0.0 || r > self.k_max as f64 {
            return Contributions::EMPTY;
        }
        match self.policy {
            BinningPolicy::Nearest => {
                let k = r.round() as usize;
                if k > self.k_max {
                    return Contributions::EMPTY;
                }
                Contributions {
                    parts: [(k, 1.0), (0, 0.0)],
                    len: 1,
                }
            }
            BinningPolicy::LinearSplit => {
                let lo = r.floor();
                let frac = r - lo;
                let lo = lo as usize;
                if frac == 0.0 {
                    Contributions {
                        parts: [(lo, 1.0), (0, 0.0)],
                        len: 1,
                    }
                } else {
                    Contributions {
                        parts: [(lo, 1.0 - frac), (lo + 1, frac)],
                        len: 2,
                    }
                }
            }
        }
    }

    /// Rejects targets the grid cannot resolve.
    pub fn check_target(&self, target: f64) -> Result<usize> {
        if target.is_nan() || target < 0.0 || target > self.k_max as f64 {
            return Err(DegenerateInput::TargetAboveNyquist {
                target,
                k_max: self.k_max,
            }
            .into());
        }
        Ok(target.round() as usize)
    }
}

/// Reads bin `k` of a per-bin series, turning `Undefined` into an error.
pub fn require_bin(values: &[Option<f64>], k: usize) -> Result<f64> {
    values
        .get(k)
        .copied()
        .flatten()
        .ok_or_else(|| DegenerateInput::UndefinedBin { bin: k }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn k_max_is_half_the_short_side() {
        assert_eq!(RadialBinner::new(64, 64, BinningPolicy::Nearest).k_max(), 32);
        assert_eq!(RadialBinner::new(33, 50, BinningPolicy::Nearest).k_max(), 16);
    }

    #[test]
    fn split_weights_sum_to_one() {
        let binner = RadialBinner::new(32, 32, BinningPolicy::LinearSplit);
        let parts: Vec<_> = binner.contributions(3.25).iter().collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, 3);
        assert_eq!(parts[1].0, 4);
        assert_relative_eq!(parts[0].1, 0.75);
        assert_relative_eq!(parts[1].1, 0.25);

        let exact: Vec<_> = binner.contributions(5.0).iter().collect();
        assert_eq!(exact, vec![(5, 1.0)]);
    }

    #[test]
    fn nearest_rounds_half_away_from_zero() {
        let binner = RadialBinner::new(32, 32, BinningPolicy::Nearest);
        assert_eq!(binner.contributions(3.49).iter().collect::<Vec<_>>(), vec![(3, 1.0)]);
        assert_eq!(binner.contributions(3.5).iter().collect::<Vec<_>>(), vec![(4, 1.0)]);
    }

    #[test]
    fn corners_beyond_k_max_are_not_binned() {
        for policy in [BinningPolicy::Nearest, BinningPolicy::LinearSplit] {
            let binner = RadialBinner::new(16, 16, policy);
            assert_eq!(binner.contributions(8.0).iter().count(), 1);
            assert_eq!(binner.contributions(8.3).iter().count(), 0);
            assert_eq!(binner.contributions(f64::NAN).iter().count(), 0);
        }
    }

    #[test]
    fn target_above_nyquist_is_degenerate() {
        let binner = RadialBinner::new(64, 64, BinningPolicy::LinearSplit);
        assert_eq!(binner.check_target(32.0).unwrap(), 32);
        let err = binner.check_target(33.0).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn segment_indices_are_scaled_to_field_cycles() {
        let binner = RadialBinner::for_segments(64, 128, 32, BinningPolicy::Nearest);
        assert_eq!(binner.k_max(), 32);
        assert_relative_eq!(binner.radius(5, 0), 10.0);
        assert_relative_eq!(binner.radius(0, 5), 20.0);
        assert_relative_eq!(binner.radius(-3, 2), (36.0f64 + 64.0).sqrt());
        let whole = RadialBinner::new(64, 64, BinningPolicy::Nearest);
        assert_relative_eq!(whole.radius(3, -4), 5.0);
    }

    #[test]
    fn undefined_bin_is_reported_not_zeroed() {
        let series = vec![None, Some(0.5)];
        assert!(require_bin(&series, 0).is_err());
        assert_eq!(require_bin(&series, 1).unwrap(), 0.5);
        assert!(require_bin(&series, 7).is_err());
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("nearest".parse::<BinningPolicy>().unwrap(), BinningPolicy::Nearest);
        assert_eq!("split".parse::<BinningPolicy>().unwrap(), BinningPolicy::LinearSplit);
        assert!("cubic".parse::<BinningPolicy>().is_err());
    }
}
