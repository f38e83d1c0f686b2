//! Run configuration.
//!
//! Each group derives `clap::Args`, so an orchestrating binary can flatten it
//! into its own command line with `#[command(flatten)]`. The library itself
//! never parses arguments.

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::null::NullModel;
use crate::radial::BinningPolicy;
use crate::window::WindowKind;

pub const DEFAULT_WINDOW_SIZE: usize = 32;
pub const DEFAULT_TRIALS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Which channel the null generator randomises.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurrogateTarget {
    #[value(alias = "a")]
    ChannelA,
    #[default]
    #[value(alias = "b")]
    ChannelB,
}

#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedConfig {
    /// Taper applied to every segment (flat, hann, hamming, blackman)
    #[arg(long, value_enum, default_value_t = WindowKind::Flat)]
    pub window: WindowKind,

    /// Side length of the square segments (samples)
    #[arg(long = "window-size", default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Offset between neighbouring segments (default: half the window size)
    #[arg(long)]
    pub stride: Option<usize>,

    /// Scale the 2D window to unit RMS
    #[arg(long = "normalize-window")]
    pub normalize_rms: bool,

    /// How radial distances map onto integer shells
    #[arg(long, value_enum, default_value_t = BinningPolicy::LinearSplit)]
    pub binning: BinningPolicy,
}

impl Default for WindowedConfig {
    fn default() -> Self {
        Self {
            window: WindowKind::Flat,
            window_size: DEFAULT_WINDOW_SIZE,
            stride: None,
            normalize_rms: false,
            binning: BinningPolicy::LinearSplit,
        }
    }
}

impl WindowedConfig {
    pub fn effective_stride(&self) -> usize {
        self.stride.unwrap_or((self.window_size / 2).max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ConfigurationError::NonPositive {
                parameter: "window size",
            }
            .into());
        }
        if self.stride == Some(0) {
            return Err(ConfigurationError::NonPositive { parameter: "stride" }.into());
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Null hypothesis used to build surrogates
    #[arg(long = "null-model", value_enum, default_value_t = NullModel::GlobalPhaseRandomize)]
    pub null_model: NullModel,

    /// Number of Monte-Carlo trials
    #[arg(long, default_value_t = DEFAULT_TRIALS)]
    pub trials: usize,

    /// Run seed; trial seeds are derived from it
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Channel replaced by surrogates
    #[arg(long, value_enum, default_value_t = SurrogateTarget::ChannelB)]
    pub surrogate: SurrogateTarget,

    /// Worker threads for trials and segment transforms (1 runs trials in order)
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            null_model: NullModel::GlobalPhaseRandomize,
            trials: DEFAULT_TRIALS,
            seed: DEFAULT_SEED,
            surrogate: SurrogateTarget::ChannelB,
            threads: 1,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(ConfigurationError::NonPositive { parameter: "trials" }.into());
        }
        if self.threads == 0 {
            return Err(ConfigurationError::NonPositive { parameter: "threads" }.into());
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// False-discovery-rate level for Benjamini-Hochberg
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl CorrectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigurationError::InvalidAlpha(self.alpha).into());
        }
        Ok(())
    }
}
