//! Whole-field ("direct") phase coherence between two channels.
//!
//! Unlike the windowed accumulator this answers a global question: are the
//! phases of the coefficients near `k_a` in channel A locked to those near
//! `k_b` in channel B across the entire field?

use num_complex::Complex;
use serde::{Serialize, Serializer};

use crate::error::{ConfigurationError, DegenerateInput, Result};
use crate::spectrum::HalfSpectrum2d;
use crate::utils::{mean_phasor, safe_arg};

/// Half-width of the radial window around a target frequency.
pub const RADIAL_TOLERANCE: f64 = 0.5;

/// R closer to 1 than this is treated as perfect locking.
const UNIT_RESULTANT_EPS: f64 = 1e-12;

/// Phases of the coefficients within `±0.5` of one target frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseSet {
    pub target: f64,
    pub phases: Vec<f64>,
    /// Signed `(k_row, k_col)` of each phase, in collection order.
    pub coords: Vec<(f64, f64)>,
}

impl PhaseSet {
    pub fn extract(spectrum: &HalfSpectrum2d, target: f64) -> Result<Self> {
        Self::extract_where(spectrum, target, |_, _| true)
    }

    /// Extraction restricted to samples accepted by `keep(row, col)`. Only
    /// canonical half-plane samples are visited, so each independent
    /// frequency of a real field contributes one phase.
    fn extract_where(
        spectrum: &HalfSpectrum2d,
        target: f64,
        keep: impl Fn(usize, usize) -> bool,
    ) -> Result<Self> {
        let k_max = spectrum.k_max();
        if target.is_nan() || target < 0.0 || target > k_max as f64 {
            return Err(DegenerateInput::TargetAboveNyquist { target, k_max }.into());
        }
        let mut phases = Vec::new();
        let mut coords = Vec::new();
        for r in 0..spectrum.rows {
            for c in 0..spectrum.half_cols {
                if (r == 0 && c == 0) || !spectrum.is_canonical(r, c) {
                    continue;
                }
                if (spectrum.radius(r, c) - target).abs() > RADIAL_TOLERANCE {
                    continue;
                }
                let z = spectrum.get(r, c);
                if z.norm() == 0.0 || !keep(r, c) {
                    continue;
                }
                phases.push(z.arg());
                coords.push((spectrum.signed_row(r) as f64, c as f64));
            }
        }
        Self::non_empty(target, phases, coords)
    }

    /// Builds a phase set from coefficients tagged with their own frequency
    /// coordinates, for spectra produced outside this crate. Pass one
    /// coefficient per independent frequency: for a real field, drop the
    /// conjugate mirror of every sample.
    pub fn from_coordinates(
        values: &[Complex<f64>],
        k_row: &[f64],
        k_col: &[f64],
        target: f64,
    ) -> Result<Self> {
        if values.len() != k_row.len() || values.len() != k_col.len() {
            return Err(ConfigurationError::InvalidField(format!(
                "{} coefficients but {} row and {} column coordinates",
                values.len(),
                k_row.len(),
                k_col.len()
            ))
            .into());
        }
        let mut phases = Vec::new();
        let mut coords = Vec::new();
        for ((z, &kr), &kc) in values.iter().zip(k_row).zip(k_col) {
            let r = (kr * kr + kc * kc).sqrt();
            if r == 0.0 || (r - target).abs() > RADIAL_TOLERANCE || z.norm() == 0.0 {
                continue;
            }
            phases.push(z.arg());
            coords.push((kr, kc));
        }
        Self::non_empty(target, phases, coords)
    }

    fn non_empty(target: f64, phases: Vec<f64>, coords: Vec<(f64, f64)>) -> Result<Self> {
        if phases.is_empty() {
            return Err(DegenerateInput::EmptyFrequencyWindow { target }.into());
        }
        Ok(Self {
            target,
            phases,
            coords,
        })
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// How phases of the two channels are paired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pairing {
    /// Sample `i` of A against sample `i` of B (same frequency coordinates).
    Matched,
    /// Every sample of A against every sample of B.
    AllPairs,
}

#[derive(Clone, Debug, Serialize)]
pub struct DirectCoherence {
    pub k_a: f64,
    pub k_b: f64,
    pub coherence: f64,
    pub mean_phase_difference: f64,
    #[serde(serialize_with = "serialize_concentration")]
    pub concentration: f64,
    pub pairing: Pairing,
    pub n_a: usize,
    pub n_b: usize,
}

fn serialize_concentration<S: Serializer>(value: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
    if value.is_infinite() {
        s.serialize_str("inf")
    } else {
        s.serialize_f64(*value)
    }
}

/// Concentration estimate `R(2 - R^2) / (1 - R^2)`, infinite at `R = 1`.
pub fn concentration(resultant: f64) -> f64 {
    let r = resultant.clamp(0.0, 1.0);
    if 1.0 - r <= UNIT_RESULTANT_EPS {
        f64::INFINITY
    } else {
        r * (2.0 - r * r) / (1.0 - r * r)
    }
}

/// Cross-coherence of two phase sets under the given pairing.
pub fn phase_coherence(a: &PhaseSet, b: &PhaseSet, pairing: Pairing) -> Result<DirectCoherence> {
    let mean = match pairing {
        Pairing::Matched => {
            if a.coords != b.coords {
                return Err(ConfigurationError::InvalidField(
                    "matched pairing needs identical frequency coordinates in both channels"
                        .into(),
                )
                .into());
            }
            let diffs: Vec<f64> = a
                .phases
                .iter()
                .zip(b.phases.iter())
                .map(|(pa, pb)| pa - pb)
                .collect();
            mean_phasor(&diffs)
        }
        // mean_ij exp(i(a_i - b_j)) factors into mean_i exp(i a_i) * conj(mean_j exp(i b_j)).
        Pairing::AllPairs => mean_phasor(&a.phases) * mean_phasor(&b.phases).conj(),
    };
    let coherence = mean.norm().min(1.0);
    Ok(DirectCoherence {
        k_a: a.target,
        k_b: b.target,
        coherence,
        mean_phase_difference: safe_arg(&mean),
        concentration: concentration(coherence),
        pairing,
        n_a: a.len(),
        n_b: b.len(),
    })
}

/// Direct-mode coherence between whole-field spectra at the target pair
/// `(k_a, k_b)`. Equal targets pair samples frequency by frequency; distinct
/// targets use all pairs.
pub fn direct_coherence(
    a: &HalfSpectrum2d,
    b: &HalfSpectrum2d,
    k_a: f64,
    k_b: f64,
) -> Result<DirectCoherence> {
    if (a.rows, a.cols) != (b.rows, b.cols) {
        return Err(ConfigurationError::ShapeMismatch {
            a_rows: a.rows,
            a_cols: a.cols,
            b_rows: b.rows,
            b_cols: b.cols,
        }
        .into());
    }
    if k_a == k_b {
        // A frequency counts only when both channels carry energy there.
        let both = |r: usize, c: usize| a.get(r, c).norm() > 0.0 && b.get(r, c).norm() > 0.0;
        let phases_a = PhaseSet::extract_where(a, k_a, both)?;
        let phases_b = PhaseSet::extract_where(b, k_b, both)?;
        return phase_coherence(&phases_a, &phases_b, Pairing::Matched);
    }
    let phases_a = PhaseSet::extract(a, k_a)?;
    let phases_b = PhaseSet::extract(b, k_b)?;
    phase_coherence(&phases_a, &phases_b, Pairing::AllPairs)
}
