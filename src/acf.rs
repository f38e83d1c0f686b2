//! Radially averaged auto (power) spectra.
//!
//! Works on the half plane of a real frame; each retained column counts with
//! its Hermitian multiplicity so shells see every full-plane sample once.
//! Shell radii come from the binner, so segment spectra land in cycles per
//! field next to the coherence curve of the same pass.

use serde::Serialize;

use crate::radial::{BinningPolicy, RadialBinner};
use crate::spectrum::HalfSpectrum2d;

#[derive(Clone, Debug, Serialize)]
pub struct RadialPowerSpectrum {
    pub policy: BinningPolicy,
    /// Mean density per shell; `None` where no sample landed.
    pub density: Vec<Option<f64>>,
    pub weight: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct AutoSpectrumAccumulator {
    binner: RadialBinner,
    sum: Vec<f64>,
    weight: Vec<f64>,
    frames: usize,
}

impl AutoSpectrumAccumulator {
    pub fn new(binner: RadialBinner) -> Self {
        let n = binner.n_bins();
        Self {
            binner,
            sum: vec![0.0; n],
            weight: vec![0.0; n],
            frames: 0,
        }
    }

    pub fn add(&mut self, half: &HalfSpectrum2d) {
        let norm = (half.rows * half.cols) as f64;
        for r in 0..half.rows {
            let kr = half.signed_row(r);
            for c in 0..half.half_cols {
                let density = half.get(r, c).norm_sqr() / norm;
                let m = half.multiplicity(c);
                for (k, w) in self.binner.contributions(self.binner.radius(kr, c as isize)).iter() {
                    self.sum[k] += m * w * density;
                    self.weight[k] += m * w;
                }
            }
        }
        self.frames += 1;
    }

    pub fn merge(&mut self, other: &AutoSpectrumAccumulator) {
        debug_assert_eq!(self.sum.len(), other.sum.len());
        for (acc, v) in self.sum.iter_mut().zip(other.sum.iter()) {
            *acc += v;
        }
        for (acc, v) in self.weight.iter_mut().zip(other.weight.iter()) {
            *acc += v;
        }
        self.frames += other.frames;
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn finalize(self) -> RadialPowerSpectrum {
        let density = finalize_auto_spectrum(&self.sum, &self.weight);
        RadialPowerSpectrum {
            policy: self.binner.policy(),
            density,
            weight: self.weight,
        }
    }
}

pub fn finalize_auto_spectrum(accumulated: &[f64], weight: &[f64]) -> Vec<Option<f64>> {
    accumulated
        .iter()
        .zip(weight.iter())
        .map(|(&sum, &w)| if w > 0.0 { Some(sum / w) } else { None })
        .collect()
}
