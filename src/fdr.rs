//! Benjamini-Hochberg false-discovery-rate control.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ConfigurationError, Result};
use crate::stats::{SignificanceResult, Tail};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BhOutcome {
    /// Adjusted p-values in input order; `None` for excluded entries.
    pub q: Vec<Option<f64>>,
    pub significant: Vec<Option<bool>>,
    /// Indices of missing, non-finite or out-of-range p-values.
    pub excluded: Vec<usize>,
    /// Number of valid tests the correction was computed over.
    pub m: usize,
}

impl BhOutcome {
    pub fn n_significant(&self) -> usize {
        self.significant.iter().filter(|s| **s == Some(true)).count()
    }
}

/// Step-up BH adjustment: `q_(i) = min_{j >= i} p_(j) * M / j`, capped at 1.
pub fn benjamini_hochberg(p_values: &[Option<f64>], alpha: f64) -> Result<BhOutcome> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ConfigurationError::InvalidAlpha(alpha).into());
    }

    let mut excluded = Vec::new();
    let mut valid: Vec<(usize, f64)> = Vec::with_capacity(p_values.len());
    for (i, p) in p_values.iter().enumerate() {
        match p {
            Some(p) if p.is_finite() && (0.0..=1.0).contains(p) => valid.push((i, *p)),
            _ => excluded.push(i),
        }
    }
    if !excluded.is_empty() {
        debug!("excluding {} invalid p-value(s) from correction", excluded.len());
    }

    let m = valid.len();
    valid.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut q = vec![None; p_values.len()];
    let mut running = 1.0f64;
    for (rank, &(idx, p)) in valid.iter().enumerate().rev() {
        let adjusted = p * m as f64 / (rank + 1) as f64;
        running = running.min(adjusted);
        q[idx] = Some(running);
    }
    let significant = q.iter().map(|q| q.map(|q| q <= alpha)).collect();

    Ok(BhOutcome {
        q,
        significant,
        excluded,
        m,
    })
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchEntry {
    pub label: String,
    pub p: Option<f64>,
    pub tail: Option<Tail>,
    pub result: Option<SignificanceResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub alpha: f64,
    pub labels: Vec<String>,
    pub p: Vec<Option<f64>>,
    pub q: Vec<Option<f64>>,
    pub significant: Vec<Option<bool>>,
    pub excluded: Vec<String>,
    pub tails: Vec<Option<Tail>>,
    pub m: usize,
}

/// p-values gathered from many runs and configurations, corrected jointly.
#[derive(Clone, Debug, Default)]
pub struct TestBatch {
    entries: Vec<BatchEntry>,
}

impl TestBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, p: Option<f64>) {
        self.entries.push(BatchEntry {
            label: label.into(),
            p,
            tail: None,
            result: None,
        });
    }

    /// Adds an evaluated test; `None` stands for a target that could not be
    /// evaluated and is reported as excluded.
    pub fn push_result(&mut self, label: impl Into<String>, result: Option<SignificanceResult>) {
        self.entries.push(BatchEntry {
            label: label.into(),
            p: result.map(|r| r.p),
            tail: result.map(|r| r.tail),
            result,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn correct(&self, alpha: f64) -> Result<BatchReport> {
        let mut tails = self.entries.iter().filter_map(|e| e.tail);
        if let Some(first) = tails.next() {
            if tails.any(|t| t != first) {
                warn!("batch mixes one-sided and two-sided p-values; correcting them jointly");
            }
        }

        let p: Vec<Option<f64>> = self.entries.iter().map(|e| e.p).collect();
        let outcome = benjamini_hochberg(&p, alpha)?;
        Ok(BatchReport {
            alpha,
            labels: self.entries.iter().map(|e| e.label.clone()).collect(),
            excluded: outcome
                .excluded
                .iter()
                .map(|&i| self.entries[i].label.clone())
                .collect(),
            tails: self.entries.iter().map(|e| e.tail).collect(),
            p,
            q: outcome.q,
            significant: outcome.significant,
            m: outcome.m,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TEXTBOOK: [f64; 10] = [
        0.001, 0.008, 0.039, 0.041, 0.042, 0.06, 0.074, 0.205, 0.212, 0.216,
    ];

    fn wrap(p: &[f64]) -> Vec<Option<f64>> {
        p.iter().copied().map(Some).collect()
    }

    #[test]
    fn textbook_case() {
        let out = benjamini_hochberg(&wrap(&TEXTBOOK), 0.05).unwrap();
        assert_eq!(out.m, 10);
        // Five raw p-values clear alpha, only two survive the step-up.
        assert_eq!(TEXTBOOK.iter().filter(|&&p| p <= 0.05).count(), 5);
        assert_eq!(out.n_significant(), 2);
        for (i, s) in out.significant.iter().enumerate() {
            assert_eq!(*s, Some(i < 2), "index {i}");
        }
        let expected = [0.01, 0.04, 0.084, 0.084, 0.084, 0.1, 0.74 / 7.0, 0.216, 0.216, 0.216];
        for (q, e) in out.q.iter().zip(expected) {
            assert_relative_eq!(q.unwrap(), e, epsilon = 1e-12);
        }
        // At a looser level the first seven are discoveries.
        assert_eq!(benjamini_hochberg(&wrap(&TEXTBOOK), 0.11).unwrap().n_significant(), 7);
    }

    #[test]
    fn adjusted_values_are_monotone_and_dominate_p() {
        let shuffled = [0.205, 0.001, 0.074, 0.042, 0.216, 0.039, 0.008, 0.212, 0.06, 0.041];
        let out = benjamini_hochberg(&wrap(&shuffled), 0.05).unwrap();
        let mut pairs: Vec<(f64, f64)> = shuffled
            .iter()
            .zip(out.q.iter())
            .map(|(&p, q)| (p, q.unwrap()))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in pairs.windows(2) {
            assert!(w[0].1 <= w[1].1);
        }
        for (p, q) in pairs {
            assert!(q >= p && q <= 1.0);
        }
        assert_eq!(out.n_significant(), 2);
    }

    #[test]
    fn invalid_entries_are_excluded_not_coerced() {
        let input = vec![Some(0.01), None, Some(f64::NAN), Some(1.5), Some(0.02)];
        let out = benjamini_hochberg(&input, 0.05).unwrap();
        assert_eq!(out.excluded, vec![1, 2, 3]);
        assert_eq!(out.m, 2);
        assert_eq!(out.q[1], None);
        assert_eq!(out.significant[3], None);
        assert_relative_eq!(out.q[0].unwrap(), 0.02);
        assert_relative_eq!(out.q[4].unwrap(), 0.02);
    }

    #[test]
    fn large_p_values_cap_at_one() {
        let out = benjamini_hochberg(&wrap(&[0.9, 0.95, 1.0]), 0.05).unwrap();
        assert!(out.q.iter().all(|q| q.unwrap() <= 1.0));
        assert_eq!(out.n_significant(), 0);
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        assert!(benjamini_hochberg(&wrap(&[0.1]), 0.0).is_err());
        assert!(benjamini_hochberg(&wrap(&[0.1]), 1.0).is_err());
        assert!(benjamini_hochberg(&[], 0.05).unwrap().q.is_empty());
    }

    #[test]
    fn batches_report_labels_and_exclusions() {
        let mut batch = TestBatch::new();
        for (i, p) in TEXTBOOK.iter().enumerate() {
            batch.push(format!("run{i}"), Some(*p));
        }
        batch.push_result("undefined", None);
        batch.push_result(
            "evaluated",
            Some(SignificanceResult {
                observed: 0.9,
                null_mean: 0.1,
                null_std: 0.05,
                z: 16.0,
                p: 0.0,
                n_null: 100,
                tail: Tail::Upper,
            }),
        );
        let report = batch.correct(0.05).unwrap();
        assert_eq!(report.m, 11);
        assert_eq!(report.excluded, vec!["undefined".to_string()]);
        assert_eq!(report.labels.len(), 12);
        assert_eq!(report.significant[11], Some(true));
        assert_eq!(report.tails[11], Some(Tail::Upper));
    }
}
