use crate::error::{ConfigurationError, Result};

/// One immutable channel: a row-major `rows x cols` grid of finite samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Field {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(ConfigurationError::InvalidField(format!(
                "shape {rows}x{cols} is empty"
            ))
            .into());
        }
        if data.len() != rows * cols {
            return Err(ConfigurationError::InvalidField(format!(
                "expected {} samples for {rows}x{cols}, received {}",
                rows * cols,
                data.len()
            ))
            .into());
        }
        if let Some(idx) = data.iter().position(|v| !v.is_finite()) {
            return Err(ConfigurationError::InvalidField(format!(
                "non-finite sample at row {}, col {}",
                idx / cols,
                idx % cols
            ))
            .into());
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Result<Self> {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self::new(rows, cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Fails with `ShapeMismatch` unless both channels share one grid.
    pub fn ensure_same_shape(&self, other: &Field) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(ConfigurationError::ShapeMismatch {
                a_rows: self.rows,
                a_cols: self.cols,
                b_rows: other.rows,
                b_cols: other.cols,
            }
            .into());
        }
        Ok(())
    }

    /// Surrogates are produced internally from already-validated spectra.
    pub(crate) fn from_parts_unchecked(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }
}
