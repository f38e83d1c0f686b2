//! Surrogate generators for the two supported null hypotheses.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use num_complex::Complex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::field::Field;
use crate::spectrum::FftHelper2d;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NullModel {
    /// Keep every Fourier magnitude, draw every phase uniformly. Preserves the
    /// power spectrum exactly and destroys all phase structure.
    #[default]
    GlobalPhaseRandomize,
    /// Roll each row by its own uniform offset. Preserves per-row content and
    /// destroys only the alignment between rows.
    RowCircularShift,
}

impl NullModel {
    pub fn name(self) -> &'static str {
        match self {
            NullModel::GlobalPhaseRandomize => "global-phase-randomize",
            NullModel::RowCircularShift => "row-circular-shift",
        }
    }

    /// One surrogate of `field`. The helper must match the field's shape; it is
    /// only consulted by the phase-randomising model.
    pub fn surrogate<R: Rng + ?Sized>(
        self,
        field: &Field,
        helper: &FftHelper2d,
        rng: &mut R,
    ) -> Result<Field> {
        match self {
            NullModel::GlobalPhaseRandomize => phase_randomize(field, helper, rng),
            NullModel::RowCircularShift => Ok(row_circular_shift(field, rng)),
        }
    }
}

impl fmt::Display for NullModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NullModel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <NullModel as ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| ConfigurationError::UnknownNullModel(s.to_string()))
    }
}

/// Phase-randomised surrogate with Hermitian symmetry kept, so the output is
/// real and `|F|` is unchanged at every frequency. Each independent
/// coefficient gets a uniform phase; its mirror gets the conjugate.
/// Self-conjugate coefficients (DC and the Nyquist intersections) are real
/// and keep their original value.
pub fn phase_randomize<R: Rng + ?Sized>(
    field: &Field,
    helper: &FftHelper2d,
    rng: &mut R,
) -> Result<Field> {
    if helper.shape() != field.shape() {
        return Err(ConfigurationError::ShapeMismatch {
            a_rows: field.rows(),
            a_cols: field.cols(),
            b_rows: helper.shape().0,
            b_cols: helper.shape().1,
        }
        .into());
    }
    let mut spectrum = helper.forward_real(field.data())?;
    let (rows, cols) = (spectrum.rows, spectrum.cols);
    let mut visited = vec![false; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let idx = r * cols + c;
            if visited[idx] {
                continue;
            }
            let (mr, mc) = spectrum.mirror(r, c);
            let midx = mr * cols + mc;
            visited[idx] = true;
            visited[midx] = true;
            if midx == idx {
                continue;
            }
            let magnitude = spectrum.data[idx].norm();
            let phase = rng.gen_range(-PI..PI);
            let z = Complex::from_polar(magnitude, phase);
            spectrum.data[idx] = z;
            spectrum.data[midx] = z.conj();
        }
    }
    let data = helper.inverse_to_real(&spectrum)?;
    Ok(Field::from_parts_unchecked(rows, cols, data))
}

/// Rolls row `r` right by an independent uniform offset in `[0, W)`.
pub fn row_circular_shift<R: Rng + ?Sized>(field: &Field, rng: &mut R) -> Field {
    let (rows, cols) = field.shape();
    let mut data = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        let shift = rng.gen_range(0..cols);
        let row = field.row(r);
        data.extend_from_slice(&row[cols - shift..]);
        data.extend_from_slice(&row[..cols - shift]);
    }
    Field::from_parts_unchecked(rows, cols, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::direct_coherence;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn textured_field(rows: usize, cols: usize) -> Field {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        Field::from_fn(rows, cols, |r, c| {
            (2.0 * PI * 3.0 * c as f64 / cols as f64).sin() * (1.0 + 0.1 * r as f64)
                + rng.gen::<f64>()
        })
        .unwrap()
    }

    #[test]
    fn phase_randomisation_preserves_power_spectrum() {
        for (rows, cols) in [(32usize, 32usize), (15, 20), (9, 7)] {
            let field = textured_field(rows, cols);
            let helper = FftHelper2d::new(rows, cols).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let surrogate = phase_randomize(&field, &helper, &mut rng).unwrap();

            let before = helper.forward_real(field.data()).unwrap().density();
            let after = helper.forward_real(surrogate.data()).unwrap().density();
            let scale = before.iter().cloned().fold(0.0, f64::max);
            for (a, b) in before.iter().zip(after.iter()) {
                assert!((a - b).abs() <= 1e-9 * scale, "{a} vs {b}");
            }
            assert_ne!(field.data(), surrogate.data());
        }
    }

    #[test]
    fn phase_randomisation_destroys_coherence_with_original() {
        let (rows, cols) = (64, 64);
        let field = textured_field(rows, cols);
        let helper = FftHelper2d::new(rows, cols).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let surrogate = phase_randomize(&field, &helper, &mut rng).unwrap();
        let a = helper.forward_real_half(field.data()).unwrap();
        let b = helper.forward_real_half(surrogate.data()).unwrap();
        let mut total = 0.0;
        let targets = [8.0, 12.0, 16.0, 20.0, 24.0];
        for &k in &targets {
            let c = direct_coherence(&a, &b, k, k).unwrap().coherence;
            assert!(c < 0.5, "coherence at {k} stayed high: {c}");
            total += c;
        }
        assert!(total / (targets.len() as f64) < 0.25);
    }

    #[test]
    fn row_shift_preserves_each_row_as_a_multiset() {
        let field = textured_field(10, 13);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let surrogate = row_circular_shift(&field, &mut rng);
        for r in 0..10 {
            let mut a = field.row(r).to_vec();
            let mut b = surrogate.row(r).to_vec();
            a.sort_by(f64::total_cmp);
            b.sort_by(f64::total_cmp);
            assert_eq!(a, b);
            let row_power_a: f64 = field.row(r).iter().map(|v| v * v).sum();
            let row_power_b: f64 = surrogate.row(r).iter().map(|v| v * v).sum();
            assert_relative_eq!(row_power_a, row_power_b, max_relative = 1e-12);
        }
    }

    #[test]
    fn row_shift_is_a_rotation() {
        let field = Field::from_fn(1, 5, |_, c| c as f64).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let shifted = row_circular_shift(&field, &mut rng);
        let start = shifted.row(0).iter().position(|&v| v == 0.0).unwrap();
        for i in 0..5 {
            assert_eq!(shifted.get(0, (start + i) % 5), i as f64);
        }
    }

    #[test]
    fn same_seed_same_surrogate() {
        let field = textured_field(16, 16);
        let helper = FftHelper2d::new(16, 16).unwrap();
        for model in [NullModel::GlobalPhaseRandomize, NullModel::RowCircularShift] {
            let a = model
                .surrogate(&field, &helper, &mut ChaCha8Rng::seed_from_u64(5))
                .unwrap();
            let b = model
                .surrogate(&field, &helper, &mut ChaCha8Rng::seed_from_u64(5))
                .unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn names_parse() {
        assert_eq!(
            "global-phase-randomize".parse::<NullModel>().unwrap(),
            NullModel::GlobalPhaseRandomize
        );
        assert_eq!(
            "row-circular-shift".parse::<NullModel>().unwrap(),
            NullModel::RowCircularShift
        );
        assert_eq!(
            "bootstrap".parse::<NullModel>().unwrap_err(),
            ConfigurationError::UnknownNullModel("bootstrap".into())
        );
    }
}
