//! 2D discrete Fourier transforms with a power-density convention.
//!
//! Forward transforms are unscaled; `density` divides `|F|^2` by `H*W`.
//! Inverse transforms carry the full `1/(H*W)` factor so a forward/inverse
//! pair reproduces the input.

use std::sync::Arc;

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};

use crate::error::{ConfigurationError, Result};

/// FFT index `i` of an `n`-point transform as a signed frequency.
#[inline(always)]
pub fn signed_index(i: usize, n: usize) -> isize {
    if i <= n / 2 {
        i as isize
    } else {
        i as isize - n as isize
    }
}

/// Full-plane spectrum of a `rows x cols` frame, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum2d {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Complex<f64>>,
}

impl Spectrum2d {
    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> Complex<f64> {
        self.data[row * self.cols + col]
    }

    /// Radial distance of sample `(row, col)` from the origin, in cycles per frame.
    #[inline(always)]
    pub fn radius(&self, row: usize, col: usize) -> f64 {
        let kr = signed_index(row, self.rows) as f64;
        let kc = signed_index(col, self.cols) as f64;
        (kr * kr + kc * kc).sqrt()
    }

    pub fn density(&self) -> Vec<f64> {
        let norm = (self.rows * self.cols) as f64;
        self.data.iter().map(|z| z.norm_sqr() / norm).collect()
    }

    /// Index of the Hermitian mirror of `(row, col)`.
    #[inline(always)]
    pub fn mirror(&self, row: usize, col: usize) -> (usize, usize) {
        ((self.rows - row) % self.rows, (self.cols - col) % self.cols)
    }
}

/// Non-redundant half of a real frame's spectrum: columns `0..=cols/2`.
///
/// Columns 0 and (for even widths) `cols/2` still hold both members of each
/// conjugate row pair; `is_canonical` picks one of them.
#[derive(Clone, Debug, PartialEq)]
pub struct HalfSpectrum2d {
    pub rows: usize,
    pub cols: usize,
    pub half_cols: usize,
    pub data: Vec<Complex<f64>>,
}

impl HalfSpectrum2d {
    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> Complex<f64> {
        self.data[row * self.half_cols + col]
    }

    /// How many full-plane samples a retained column stands for. DC and (for
    /// even widths) Nyquist columns are their own mirrors.
    #[inline(always)]
    pub fn multiplicity(&self, col: usize) -> f64 {
        if col == 0 || (self.cols % 2 == 0 && col == self.cols / 2) {
            1.0
        } else {
            2.0
        }
    }

    #[inline(always)]
    pub fn radius(&self, row: usize, col: usize) -> f64 {
        let kr = signed_index(row, self.rows) as f64;
        let kc = col as f64;
        (kr * kr + kc * kc).sqrt()
    }

    #[inline(always)]
    pub fn signed_row(&self, row: usize) -> isize {
        signed_index(row, self.rows)
    }

    pub fn k_max(&self) -> usize {
        self.rows.min(self.cols) / 2
    }

    /// True for exactly one sample of every conjugate pair (and for every
    /// self-conjugate sample). Summing phases over canonical samples counts
    /// each independent frequency once.
    #[inline(always)]
    pub fn is_canonical(&self, row: usize, col: usize) -> bool {
        if col == 0 || (self.cols % 2 == 0 && col == self.cols / 2) {
            2 * row <= self.rows
        } else {
            true
        }
    }
}

/// Plans for one frame shape, reusable across segments and threads.
pub struct FftHelper2d {
    rows: usize,
    cols: usize,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
    row_forward_r2c: Arc<dyn RealToComplex<f64>>,
}

impl FftHelper2d {
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(ConfigurationError::NonPositive {
                parameter: "transform size",
            }
            .into());
        }
        let mut planner_c2c = FftPlanner::new();
        let mut planner_r2c = RealFftPlanner::new();

        Ok(Self {
            rows,
            cols,
            row_forward: planner_c2c.plan_fft_forward(cols),
            row_inverse: planner_c2c.plan_fft_inverse(cols),
            col_forward: planner_c2c.plan_fft_forward(rows),
            col_inverse: planner_c2c.plan_fft_inverse(rows),
            row_forward_r2c: planner_r2c.plan_fft_forward(cols),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.rows * self.cols {
            return Err(ConfigurationError::InvalidField(format!(
                "frame of {len} samples does not match transform shape {}x{}",
                self.rows, self.cols
            ))
            .into());
        }
        Ok(())
    }

    /// Full-plane forward transform of a real row-major frame.
    pub fn forward_real(&self, frame: &[f64]) -> Result<Spectrum2d> {
        self.check_len(frame.len())?;
        let mut buffer: Vec<Complex<f64>> =
            frame.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.forward_in_place(&mut buffer);
        Ok(Spectrum2d {
            rows: self.rows,
            cols: self.cols,
            data: buffer,
        })
    }

    /// Half-plane forward transform: real-to-complex along rows, then complex
    /// along the `cols/2 + 1` retained columns.
    pub fn forward_real_half(&self, frame: &[f64]) -> Result<HalfSpectrum2d> {
        self.check_len(frame.len())?;
        let half_cols = self.cols / 2 + 1;
        let mut data = vec![Complex::new(0.0, 0.0); self.rows * half_cols];
        let mut row_in = self.row_forward_r2c.make_input_vec();
        for (r, out) in data.chunks_exact_mut(half_cols).enumerate() {
            row_in.copy_from_slice(&frame[r * self.cols..(r + 1) * self.cols]);
            self.row_forward_r2c
                .process(&mut row_in, out)
                .map_err(|e| ConfigurationError::InvalidField(e.to_string()))?;
        }
        let mut cols_major = transpose(&data, self.rows, half_cols);
        self.col_forward.process(&mut cols_major);
        Ok(HalfSpectrum2d {
            rows: self.rows,
            cols: self.cols,
            half_cols,
            data: transpose(&cols_major, half_cols, self.rows),
        })
    }

    /// Inverse transform keeping only the real part.
    pub fn inverse_to_real(&self, spectrum: &Spectrum2d) -> Result<Vec<f64>> {
        if (spectrum.rows, spectrum.cols) != (self.rows, self.cols) {
            return Err(ConfigurationError::ShapeMismatch {
                a_rows: spectrum.rows,
                a_cols: spectrum.cols,
                b_rows: self.rows,
                b_cols: self.cols,
            }
            .into());
        }
        let mut buffer = spectrum.data.clone();
        self.row_inverse.process(&mut buffer);
        let mut cols_major = transpose(&buffer, self.rows, self.cols);
        self.col_inverse.process(&mut cols_major);
        let scale = 1.0 / (self.rows * self.cols) as f64;
        let spatial = transpose(&cols_major, self.cols, self.rows);
        Ok(spatial.into_iter().map(|z| z.re * scale).collect())
    }

    fn forward_in_place(&self, buffer: &mut Vec<Complex<f64>>) {
        // rustfft walks the buffer in chunks of the planned length.
        self.row_forward.process(buffer);
        let mut cols_major = transpose(buffer, self.rows, self.cols);
        self.col_forward.process(&mut cols_major);
        *buffer = transpose(&cols_major, self.cols, self.rows);
    }
}

fn transpose(data: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    pub fn noise_frame(seed: u64, rows: usize, cols: usize) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..rows * cols).map(|_| rng.gen::<f64>() - 0.5).collect()
    }

    /// Real frame whose canonical half-plane coefficients are those of
    /// `frame` turned by -90 degrees (mirrors by +90 so the result stays
    /// real). Self-conjugate samples are zeroed.
    pub fn quadrature_partner(frame: &[f64], rows: usize, cols: usize) -> Vec<f64> {
        let helper = FftHelper2d::new(rows, cols).unwrap();
        let mut spec = helper.forward_real(frame).unwrap();
        let minus_i = Complex::new(0.0, -1.0);
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                let (mr, mc) = spec.mirror(r, c);
                let canonical = if c == 0 || 2 * c == cols {
                    2 * r <= rows
                } else {
                    2 * c < cols
                };
                spec.data[idx] = if (mr, mc) == (r, c) {
                    Complex::new(0.0, 0.0)
                } else if canonical {
                    spec.data[idx] * minus_i
                } else {
                    spec.data[idx] * minus_i.conj()
                };
            }
        }
        helper.inverse_to_real(&spec).unwrap()
    }
}
