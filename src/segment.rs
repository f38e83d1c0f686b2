//! Sliding square windows over a field.
//!
//! Offsets advance in row-major order with a fixed stride. A trailing strip
//! narrower than the window is dropped rather than padded, so the last
//! `(H - S) % T` rows and `(W - S) % T` columns never enter a segment.

use crate::error::{ConfigurationError, Result};
use crate::field::Field;
use crate::window::WindowKind;

/// One mean-removed, windowed `size x size` patch.
#[derive(Clone, Debug)]
pub struct Segment {
    pub row: usize,
    pub col: usize,
    pub size: usize,
    pub data: Vec<f64>,
}

/// Extent of the field actually covered by segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coverage {
    pub segments_per_col: usize,
    pub segments_per_row: usize,
    pub dropped_rows: usize,
    pub dropped_cols: usize,
}

impl Coverage {
    pub fn total(&self) -> usize {
        self.segments_per_col * self.segments_per_row
    }
}

pub struct Segmenter<'a> {
    field: &'a Field,
    size: usize,
    stride: usize,
    window: Vec<f64>,
}

impl<'a> Segmenter<'a> {
    /// `stride = None` selects half the window size (at least 1).
    pub fn new(
        field: &'a Field,
        size: usize,
        stride: Option<usize>,
        window: WindowKind,
        normalize_rms: bool,
    ) -> Result<Self> {
        if size == 0 {
            return Err(ConfigurationError::NonPositive {
                parameter: "window size",
            }
            .into());
        }
        let stride = stride.unwrap_or((size / 2).max(1));
        if stride == 0 {
            return Err(ConfigurationError::NonPositive { parameter: "stride" }.into());
        }
        if size > field.rows() || size > field.cols() {
            return Err(ConfigurationError::WindowLargerThanField {
                size,
                rows: field.rows(),
                cols: field.cols(),
            }
            .into());
        }
        Ok(Self {
            field,
            size,
            stride,
            window: window.weights_2d(size, normalize_rms),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn coverage(&self) -> Coverage {
        let span_r = self.field.rows() - self.size;
        let span_c = self.field.cols() - self.size;
        Coverage {
            segments_per_col: span_r / self.stride + 1,
            segments_per_row: span_c / self.stride + 1,
            dropped_rows: span_r % self.stride,
            dropped_cols: span_c % self.stride,
        }
    }

    /// A fresh pass over the field; calling it again restarts from (0, 0).
    pub fn iter(&self) -> Segments<'_, 'a> {
        Segments {
            segmenter: self,
            next_row: 0,
            next_col: 0,
        }
    }

    fn extract(&self, row: usize, col: usize) -> Segment {
        let s = self.size;
        let mut data = Vec::with_capacity(s * s);
        for r in row..row + s {
            data.extend_from_slice(&self.field.row(r)[col..col + s]);
        }
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        for (value, w) in data.iter_mut().zip(self.window.iter()) {
            *value = (*value - mean) * w;
        }
        Segment {
            row,
            col,
            size: s,
            data,
        }
    }
}

pub struct Segments<'s, 'a> {
    segmenter: &'s Segmenter<'a>,
    next_row: usize,
    next_col: usize,
}

impl Iterator for Segments<'_, '_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let seg = self.segmenter;
        let last_row = seg.field.rows() - seg.size;
        let last_col = seg.field.cols() - seg.size;
        if self.next_row > last_row {
            return None;
        }
        let segment = seg.extract(self.next_row, self.next_col);
        self.next_col += seg.stride;
        if self.next_col > last_col {
            self.next_col = 0;
            self.next_row += seg.stride;
        }
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let cov = self.segmenter.coverage();
        let stride = self.segmenter.stride;
        let done_rows = self.next_row / stride;
        let done = done_rows * cov.segments_per_row + self.next_col / stride;
        let left = cov.total().saturating_sub(done);
        (left, Some(left))
    }
}
