//! Error taxonomy for coherence measurement and significance testing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoherenceError>;

/// Coarse classification callers use to decide between retry and abort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    DegenerateInput,
    StatisticalConvention,
}

#[derive(Error, Debug)]
pub enum CoherenceError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("degenerate input: {0}")]
    DegenerateInput(#[from] DegenerateInput),

    /// One-sided vs deviation semantics could not be resolved from a name.
    #[error("unknown or ambiguous statistical convention '{name}' (expected one-sided or two-sided)")]
    StatisticalConvention { name: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown window '{0}' (expected flat, hann, hamming or blackman)")]
    UnknownWindow(String),

    #[error("unknown null model '{0}' (expected global-phase-randomize or row-circular-shift)")]
    UnknownNullModel(String),

    #[error("unknown binning policy '{0}' (expected nearest or linear-split)")]
    UnknownBinningPolicy(String),

    #[error("{parameter} must be positive")]
    NonPositive { parameter: &'static str },

    #[error("channel shapes differ: {a_rows}x{a_cols} vs {b_rows}x{b_cols}")]
    ShapeMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },

    #[error("window size {size} exceeds field extent {rows}x{cols}")]
    WindowLargerThanField { size: usize, rows: usize, cols: usize },

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("alpha must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DegenerateInput {
    #[error("radial bin {bin} has no accumulated weight")]
    UndefinedBin { bin: usize },

    #[error("target frequency {target} exceeds Nyquist-bounded k_max {k_max}")]
    TargetAboveNyquist { target: f64, k_max: usize },

    #[error("no spectral samples within ±0.5 of k = {target}")]
    EmptyFrequencyWindow { target: f64 },

    #[error("null distribution for target {target} is empty")]
    EmptyNullDistribution { target: usize },
}

impl CoherenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoherenceError::Configuration(_) => ErrorKind::Configuration,
            CoherenceError::DegenerateInput(_) => ErrorKind::DegenerateInput,
            CoherenceError::StatisticalConvention { .. } => ErrorKind::StatisticalConvention,
        }
    }

    /// Degenerate inputs depend on the data and may clear with other targets
    /// or another surrogate draw; configuration errors never do.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoherenceError::DegenerateInput(_))
    }
}
