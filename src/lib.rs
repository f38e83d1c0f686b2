//! Spatial phase-coherence between two co-registered 2D fields, with
//! Monte-Carlo significance and Benjamini-Hochberg correction.
//!
//! Two measurement modes share one significance pipeline:
//!
//! * windowed: both fields are cut into overlapping tapered segments, each
//!   segment pair contributes unit cross-spectrum phasors to integer radial
//!   shells (cycles per field), and coherence is the length of the mean
//!   phasor per shell;
//! * direct: whole-field spectra are sampled in a narrow annulus around a
//!   target radius and the phase sets of the two channels are compared.
//!
//! ```no_run
//! use phasecoh::{CoherenceMeasurement, Field, MonteCarloConfig, MonteCarloRunner, WindowedConfig};
//!
//! # fn main() -> phasecoh::Result<()> {
//! let a = Field::new(64, 64, vec![0.0; 64 * 64])?;
//! let b = a.clone();
//! let measurement = CoherenceMeasurement::windowed(WindowedConfig::default(), &[4.0, 10.0], a.shape())?;
//! let report = MonteCarloRunner::new(measurement, MonteCarloConfig::default())?.run(&a, &b)?;
//! let outcome = phasecoh::benjamini_hochberg(&report.p_values(), 0.05)?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod acf;
pub mod config;
pub mod direct;
pub mod error;
pub mod fdr;
pub mod field;
pub mod measure;
pub mod montecarlo;
pub mod null;
pub mod radial;
pub mod segment;
pub mod spectrum;
pub mod stats;
pub mod utils;
pub mod window;
pub mod xcf;

pub use acf::{AutoSpectrumAccumulator, RadialPowerSpectrum};
pub use config::{CorrectionConfig, MonteCarloConfig, SurrogateTarget, WindowedConfig};
pub use direct::{direct_coherence, DirectCoherence, PhaseSet};
pub use error::{CoherenceError, ConfigurationError, DegenerateInput, ErrorKind, Result};
pub use fdr::{benjamini_hochberg, BatchReport, BhOutcome, TestBatch};
pub use field::Field;
pub use measure::{CoherenceMeasurement, Measurement, MeasurementDetail, Statistic, WindowedPass};
pub use montecarlo::{CancelToken, MonteCarloReport, MonteCarloRunner};
pub use null::NullModel;
pub use radial::{BinningPolicy, RadialBinner};
pub use spectrum::FftHelper2d;
pub use stats::{evaluate, NullDistribution, SignificanceResult, Tail};
pub use window::WindowKind;
pub use xcf::{CoherenceCurve, CrossSpectrumAccumulator};
