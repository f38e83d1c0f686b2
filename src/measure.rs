//! The coherence statistic, in its windowed and direct forms.
//!
//! Both variants map a pair of fields to one value per target and feed the
//! same Monte-Carlo and significance machinery. A target whose value cannot
//! be formed (empty shell, empty frequency window) reports `None`.
//!
//! Targets are radii in cycles per field in both modes. Windowed shells are
//! built from segment spectra scaled by `H/S` and `W/S`, so a shell that no
//! scaled segment frequency reaches stays empty.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::acf::{AutoSpectrumAccumulator, RadialPowerSpectrum};
use crate::config::WindowedConfig;
use crate::direct::{direct_coherence, DirectCoherence};
use crate::error::{CoherenceError, ConfigurationError, DegenerateInput, Result};
use crate::field::Field;
use crate::radial::RadialBinner;
use crate::segment::Segmenter;
use crate::spectrum::FftHelper2d;
use crate::stats::Tail;
use crate::xcf::{CoherenceCurve, CrossSpectrumAccumulator};

/// A per-target statistic of a field pair, testable by the Monte-Carlo runner.
pub trait Statistic: Sync {
    fn n_targets(&self) -> usize;

    fn target_labels(&self) -> Vec<String>;

    fn default_tail(&self) -> Tail;

    fn measure(&self, a: &Field, b: &Field) -> Result<Measurement>;
}

pub struct WindowedMeasurement {
    config: WindowedConfig,
    field_shape: (usize, usize),
    targets: Vec<usize>,
    helper: Arc<FftHelper2d>,
    binner: RadialBinner,
}

pub struct DirectMeasurement {
    targets: Vec<(f64, f64)>,
    helper: Arc<FftHelper2d>,
}

pub enum CoherenceMeasurement {
    Windowed(WindowedMeasurement),
    Direct(DirectMeasurement),
}

/// Cross spectrum and the two auto spectra of one segment pair.
type SegmentPartial = (CrossSpectrumAccumulator, AutoSpectrumAccumulator, AutoSpectrumAccumulator);

/// Everything one windowed pass over a field pair produces.
#[derive(Clone, Debug, Serialize)]
pub struct WindowedPass {
    pub curve: CoherenceCurve,
    /// Radially averaged segment power of each channel, on the curve's shells.
    pub power_a: RadialPowerSpectrum,
    pub power_b: RadialPowerSpectrum,
}

#[derive(Clone, Debug, Serialize)]
pub enum MeasurementDetail {
    Windowed(WindowedPass),
    /// One entry per target pair; `None` where the frequency window was empty.
    Direct(Vec<Option<DirectCoherence>>),
}

#[derive(Clone, Debug, Serialize)]
pub struct Measurement {
    /// Statistic per target, parallel to the measurement's targets.
    pub values: Vec<Option<f64>>,
    pub detail: MeasurementDetail,
}

impl CoherenceMeasurement {
    /// Windowed mode on fields of shape `field_shape`. Targets are shell
    /// indices in cycles per field and must not exceed `min(H, W) / 2`.
    pub fn windowed(
        config: WindowedConfig,
        targets: &[f64],
        field_shape: (usize, usize),
    ) -> Result<Self> {
        config.validate()?;
        let (rows, cols) = field_shape;
        if config.window_size > rows || config.window_size > cols {
            return Err(ConfigurationError::WindowLargerThanField {
                size: config.window_size,
                rows,
                cols,
            }
            .into());
        }
        let binner = RadialBinner::for_segments(rows, cols, config.window_size, config.binning);
        let targets = targets
            .iter()
            .map(|&k| binner.check_target(k))
            .collect::<Result<Vec<_>>>()?;
        let helper = Arc::new(FftHelper2d::new(config.window_size, config.window_size)?);
        Ok(CoherenceMeasurement::Windowed(WindowedMeasurement {
            config,
            field_shape,
            targets,
            helper,
            binner,
        }))
    }

    /// Direct mode: one `(k_a, k_b)` pair per target, in cycles per field.
    pub fn direct(targets: &[(f64, f64)], field_shape: (usize, usize)) -> Result<Self> {
        let (rows, cols) = field_shape;
        let k_max = rows.min(cols) / 2;
        for &(k_a, k_b) in targets {
            for k in [k_a, k_b] {
                if k.is_nan() || k < 0.0 || k > k_max as f64 {
                    return Err(DegenerateInput::TargetAboveNyquist { target: k, k_max }.into());
                }
            }
        }
        Ok(CoherenceMeasurement::Direct(DirectMeasurement {
            targets: targets.to_vec(),
            helper: Arc::new(FftHelper2d::new(rows, cols)?),
        }))
    }

    pub fn n_targets(&self) -> usize {
        match self {
            CoherenceMeasurement::Windowed(m) => m.targets.len(),
            CoherenceMeasurement::Direct(m) => m.targets.len(),
        }
    }

    pub fn target_labels(&self) -> Vec<String> {
        match self {
            CoherenceMeasurement::Windowed(m) => {
                m.targets.iter().map(|k| format!("k={k}")).collect()
            }
            CoherenceMeasurement::Direct(m) => m
                .targets
                .iter()
                .map(|(a, b)| format!("k_a={a},k_b={b}"))
                .collect(),
        }
    }

    /// Extremity convention this statistic is tested under unless the caller
    /// overrides it: larger-is-more-extreme for windowed coherence, deviation
    /// from the null mean for direct cross-coherence.
    pub fn default_tail(&self) -> Tail {
        match self {
            CoherenceMeasurement::Windowed(_) => Tail::Upper,
            CoherenceMeasurement::Direct(_) => Tail::Deviation,
        }
    }

    pub fn measure(&self, a: &Field, b: &Field) -> Result<Measurement> {
        a.ensure_same_shape(b)?;
        match self {
            CoherenceMeasurement::Windowed(m) => m.measure(a, b),
            CoherenceMeasurement::Direct(m) => m.measure(a, b),
        }
    }
}

impl WindowedMeasurement {
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Cross and auto spectra of every segment pair, computed in parallel on
    /// the current rayon pool and merged in segment order.
    pub fn pass(&self, a: &Field, b: &Field) -> Result<WindowedPass> {
        a.ensure_same_shape(b)?;
        if a.shape() != self.field_shape {
            let (rows, cols) = self.field_shape;
            return Err(ConfigurationError::ShapeMismatch {
                a_rows: a.rows(),
                a_cols: a.cols(),
                b_rows: rows,
                b_cols: cols,
            }
            .into());
        }
        let cfg = &self.config;
        let seg_a = Segmenter::new(a, cfg.window_size, cfg.stride, cfg.window, cfg.normalize_rms)?;
        let seg_b = Segmenter::new(b, cfg.window_size, cfg.stride, cfg.window, cfg.normalize_rms)?;
        let coverage = seg_a.coverage();
        if coverage.dropped_rows > 0 || coverage.dropped_cols > 0 {
            debug!(
                "dropping {} trailing rows and {} trailing cols outside the segment grid",
                coverage.dropped_rows, coverage.dropped_cols
            );
        }

        let pairs: Vec<_> = seg_a.iter().zip(seg_b.iter()).collect();
        let partials = pairs
            .par_iter()
            .map(|(pa, pb)| -> Result<SegmentPartial> {
                let x = self.helper.forward_real_half(&pa.data)?;
                let y = self.helper.forward_real_half(&pb.data)?;
                let mut cross = CrossSpectrumAccumulator::new(self.binner);
                cross.add(&x, &y)?;
                let mut auto_a = AutoSpectrumAccumulator::new(self.binner);
                auto_a.add(&x);
                let mut auto_b = AutoSpectrumAccumulator::new(self.binner);
                auto_b.add(&y);
                Ok((cross, auto_a, auto_b))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut cross = CrossSpectrumAccumulator::new(self.binner);
        let mut auto_a = AutoSpectrumAccumulator::new(self.binner);
        let mut auto_b = AutoSpectrumAccumulator::new(self.binner);
        for (c, pa, pb) in &partials {
            cross.merge(c);
            auto_a.merge(pa);
            auto_b.merge(pb);
        }
        Ok(WindowedPass {
            curve: cross.finalize(),
            power_a: auto_a.finalize(),
            power_b: auto_b.finalize(),
        })
    }

    fn measure(&self, a: &Field, b: &Field) -> Result<Measurement> {
        let pass = self.pass(a, b)?;
        let values = self
            .targets
            .iter()
            .map(|&k| pass.curve.coherence.get(k).copied().flatten())
            .collect();
        Ok(Measurement {
            values,
            detail: MeasurementDetail::Windowed(pass),
        })
    }
}

impl DirectMeasurement {
    pub fn targets(&self) -> &[(f64, f64)] {
        &self.targets
    }

    fn measure(&self, a: &Field, b: &Field) -> Result<Measurement> {
        let spec_a = self.helper.forward_real_half(a.data())?;
        let spec_b = self.helper.forward_real_half(b.data())?;
        let mut values = Vec::with_capacity(self.targets.len());
        let mut detail = Vec::with_capacity(self.targets.len());
        for &(k_a, k_b) in &self.targets {
            match direct_coherence(&spec_a, &spec_b, k_a, k_b) {
                Ok(result) => {
                    values.push(Some(result.coherence));
                    detail.push(Some(result));
                }
                Err(CoherenceError::DegenerateInput(DegenerateInput::EmptyFrequencyWindow {
                    ..
                })) => {
                    values.push(None);
                    detail.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Measurement {
            values,
            detail: MeasurementDetail::Direct(detail),
        })
    }
}

impl Statistic for CoherenceMeasurement {
    fn n_targets(&self) -> usize {
        CoherenceMeasurement::n_targets(self)
    }

    fn target_labels(&self) -> Vec<String> {
        CoherenceMeasurement::target_labels(self)
    }

    fn default_tail(&self) -> Tail {
        CoherenceMeasurement::default_tail(self)
    }

    fn measure(&self, a: &Field, b: &Field) -> Result<Measurement> {
        CoherenceMeasurement::measure(self, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowKind;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn noise(seed: u64, n: usize) -> Field {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Field::from_fn(n, n, |_, _| rng.gen::<f64>() - 0.5).unwrap()
    }

    #[test]
    fn windowed_targets_share_the_field_nyquist_limit() {
        let config = WindowedConfig {
            window_size: 32,
            ..WindowedConfig::default()
        };
        assert!(CoherenceMeasurement::windowed(config.clone(), &[30.0, 32.0], (64, 64)).is_ok());
        let err = CoherenceMeasurement::windowed(config, &[33.0], (64, 64))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CoherenceError::DegenerateInput(DegenerateInput::TargetAboveNyquist { k_max: 32, .. })
        ));
    }

    #[test]
    fn windowed_and_direct_place_a_plane_wave_in_the_same_shell() {
        // Eight cycles across the 64-sample field, four per 32-sample segment.
        let field = Field::from_fn(64, 64, |_, c| (2.0 * std::f64::consts::PI * 8.0 * c as f64 / 64.0).cos()).unwrap();
        let windowed = CoherenceMeasurement::windowed(
            WindowedConfig {
                window_size: 32,
                stride: Some(16),
                binning: crate::radial::BinningPolicy::Nearest,
                ..WindowedConfig::default()
            },
            &[8.0],
            (64, 64),
        )
        .unwrap();
        let out = windowed.measure(&field, &field).unwrap();
        let MeasurementDetail::Windowed(pass) = out.detail else {
            panic!("expected a windowed pass");
        };
        let peak = |p: &RadialPowerSpectrum| {
            p.density
                .iter()
                .enumerate()
                .filter_map(|(k, d)| d.map(|d| (k, d)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(k, _)| k)
                .unwrap()
        };
        assert_eq!(peak(&pass.power_a), 8);
        assert_eq!(pass.power_a.density, pass.power_b.density);
        assert_eq!(pass.curve.k_max(), 32);
        assert_eq!(pass.curve.segments, 9);

        let direct = FftHelper2d::new(64, 64)
            .unwrap()
            .forward_real_half(field.data())
            .unwrap();
        assert!(direct.get(0, 8).norm() > 1.0);
    }

    #[test]
    fn segment_merge_order_does_not_depend_on_thread_count() {
        let a = noise(5, 64);
        let b = noise(6, 64);
        let m = CoherenceMeasurement::windowed(
            WindowedConfig {
                window_size: 16,
                ..WindowedConfig::default()
            },
            &[4.0, 12.0],
            (64, 64),
        )
        .unwrap();
        let run = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| m.measure(&a, &b).unwrap())
        };
        let (one, four) = (run(1), run(4));
        assert_eq!(one.values, four.values);
        let (MeasurementDetail::Windowed(p1), MeasurementDetail::Windowed(p4)) = (one.detail, four.detail) else {
            panic!("expected windowed passes");
        };
        assert_eq!(p1.curve.coherence, p4.curve.coherence);
        assert_eq!(p1.power_b.density, p4.power_b.density);
        assert_eq!(p1.curve.segments, 49);
    }

    #[test]
    fn fields_of_another_shape_are_rejected() {
        let m = CoherenceMeasurement::windowed(WindowedConfig::default(), &[4.0], (64, 64)).unwrap();
        let a = noise(7, 48);
        assert!(m.measure(&a, &a).is_err());
    }

    #[test]
    fn direct_targets_above_field_nyquist_are_rejected() {
        assert!(CoherenceMeasurement::direct(&[(32.0, 32.0)], (64, 64)).is_ok());
        let err = CoherenceMeasurement::direct(&[(10.0, 33.0)], (64, 64))
            .err()
            .unwrap();
        assert!(err.is_recoverable());
    }

    #[test]
    fn window_larger_than_field_is_a_configuration_error() {
        let config = WindowedConfig {
            window_size: 65,
            ..WindowedConfig::default()
        };
        let err = CoherenceMeasurement::windowed(config, &[4.0], (64, 64))
            .err()
            .unwrap();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn identical_channels_measure_one_in_both_modes() {
        let field = noise(1, 48);
        let windowed = CoherenceMeasurement::windowed(
            WindowedConfig {
                window: WindowKind::Hann,
                window_size: 16,
                ..WindowedConfig::default()
            },
            &[3.0, 15.0, 24.0],
            (48, 48),
        )
        .unwrap();
        let direct = CoherenceMeasurement::direct(&[(3.0, 3.0), (12.0, 12.0)], (48, 48)).unwrap();
        for m in [&windowed, &direct] {
            let out = m.measure(&field, &field).unwrap();
            assert_eq!(out.values.len(), m.n_targets());
            for v in out.values {
                assert!((v.unwrap() - 1.0).abs() < 1e-9);
            }
        }
        assert_eq!(windowed.default_tail(), Tail::Upper);
        assert_eq!(direct.default_tail(), Tail::Deviation);
    }

    #[test]
    fn mismatched_channels_are_rejected() {
        let m = CoherenceMeasurement::direct(&[(3.0, 3.0)], (16, 16)).unwrap();
        let a = noise(2, 16);
        let b = Field::new(16, 8, vec![0.0; 128]).unwrap();
        assert!(m.measure(&a, &b).is_err());
    }
}
