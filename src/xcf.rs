use num_complex::Complex;
use serde::Serialize;

use crate::error::{ConfigurationError, Result};
use crate::radial::{require_bin, BinningPolicy, RadialBinner};
use crate::spectrum::HalfSpectrum2d;
use crate::utils::safe_arg;

/// Per-shell phase coherence of one windowed pass.
#[derive(Clone, Debug, Serialize)]
pub struct CoherenceCurve {
    pub policy: BinningPolicy,
    /// `|mean unit phasor|` per shell, `None` where the shell is empty.
    pub coherence: Vec<Option<f64>>,
    /// Argument of the mean phasor per shell.
    pub mean_phase: Vec<Option<f64>>,
    pub weight: Vec<f64>,
    pub segments: usize,
    /// Samples dropped because one channel had zero magnitude.
    pub excluded_samples: usize,
}

impl CoherenceCurve {
    pub fn k_max(&self) -> usize {
        self.coherence.len().saturating_sub(1)
    }

    pub fn at(&self, k: usize) -> Result<f64> {
        require_bin(&self.coherence, k)
    }
}

/// Sums unit cross phasors `X conj(Y) / (|X||Y|)` into radial shells.
///
/// Only canonical half-plane samples contribute: the mirrored half of a real
/// frame carries the conjugate phasor and would cancel every phase offset
/// other than 0 or pi. The DC sample is skipped: segments are mean-removed,
/// so whatever is left there is rounding residue with no meaningful phase.
#[derive(Clone, Debug)]
pub struct CrossSpectrumAccumulator {
    binner: RadialBinner,
    sum: Vec<Complex<f64>>,
    weight: Vec<f64>,
    segments: usize,
    excluded_samples: usize,
}

impl CrossSpectrumAccumulator {
    pub fn new(binner: RadialBinner) -> Self {
        let n = binner.n_bins();
        Self {
            binner,
            sum: vec![Complex::new(0.0, 0.0); n],
            weight: vec![0.0; n],
            segments: 0,
            excluded_samples: 0,
        }
    }

    pub fn add(&mut self, x: &HalfSpectrum2d, y: &HalfSpectrum2d) -> Result<()> {
        if (x.rows, x.cols) != (y.rows, y.cols) {
            return Err(ConfigurationError::ShapeMismatch {
                a_rows: x.rows,
                a_cols: x.cols,
                b_rows: y.rows,
                b_cols: y.cols,
            }
            .into());
        }
        for r in 0..x.rows {
            let kr = x.signed_row(r);
            for c in 0..x.half_cols {
                if (r == 0 && c == 0) || !x.is_canonical(r, c) {
                    continue;
                }
                let a = x.get(r, c);
                let b = y.get(r, c);
                let mag = a.norm() * b.norm();
                if mag == 0.0 || !mag.is_finite() {
                    self.excluded_samples += 1;
                    continue;
                }
                let phasor = a * b.conj() / mag;
                for (k, w) in self.binner.contributions(self.binner.radius(kr, c as isize)).iter() {
                    self.sum[k] += phasor * w;
                    self.weight[k] += w;
                }
            }
        }
        self.segments += 1;
        Ok(())
    }

    /// Folds another partial accumulation into this one.
    pub fn merge(&mut self, other: &CrossSpectrumAccumulator) {
        debug_assert_eq!(self.sum.len(), other.sum.len());
        for (acc, v) in self.sum.iter_mut().zip(other.sum.iter()) {
            *acc += v;
        }
        for (acc, v) in self.weight.iter_mut().zip(other.weight.iter()) {
            *acc += v;
        }
        self.segments += other.segments;
        self.excluded_samples += other.excluded_samples;
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn finalize(self) -> CoherenceCurve {
        let mut coherence = Vec::with_capacity(self.sum.len());
        let mut mean_phase = Vec::with_capacity(self.sum.len());
        for (s, &w) in self.sum.iter().zip(self.weight.iter()) {
            if w > 0.0 {
                let mean = *s / w;
                coherence.push(Some(mean.norm().min(1.0)));
                mean_phase.push(Some(safe_arg(&mean)));
            } else {
                coherence.push(None);
                mean_phase.push(None);
            }
        }
        CoherenceCurve {
            policy: self.binner.policy(),
            coherence,
            mean_phase,
            weight: self.weight,
            segments: self.segments,
            excluded_samples: self.excluded_samples,
        }
    }
}
