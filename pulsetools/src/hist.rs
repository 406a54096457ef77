//! Fixed-range streaming histograms

use serde::{Deserialize, Serialize};

use crate::error::HistogramError;
use crate::Bin;

/// Equal-width bins over the half-open range `[low, high)`.
///
/// Fills outside the range are not counted in any bin nor in `entries()`;
/// they are tallied in `ignored()` so that edge bins stay clean.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    low: f64,
    high: f64,
    counts: Vec<u64>,
    entries: u64,
    ignored: u64,
}

impl Histogram {
    pub fn new(bins: usize, low: f64, high: f64) -> Result<Self, HistogramError> {
        if bins == 0 {
            return Err(HistogramError::NoBins);
        }
        if !(high > low) || !low.is_finite() || !high.is_finite() {
            return Err(HistogramError::EmptyRange { low, high });
        }
        Ok(Histogram {
            low,
            high,
            counts: vec![0; bins],
            entries: 0,
            ignored: 0,
        })
    }

    /// Bin index of `value`, or `None` if it is out of range (or NaN)
    pub fn index(&self, value: f64) -> Option<usize> {
        if !(value >= self.low && value < self.high) {
            return None;
        }
        let n = self.counts.len();
        let i = ((value - self.low) / (self.high - self.low) * n as f64).floor() as usize;
        // Rounding just below `high` can land on n
        Some(i.min(n - 1))
    }

    pub fn fill(&mut self, value: f64) {
        match self.index(value) {
            Some(i) => {
                self.counts[i] += 1;
                self.entries += 1;
            },
            None => self.ignored += 1,
        }
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.counts.len() as f64
    }

    pub fn bin_center(&self, i: usize) -> f64 {
        self.low + (i as f64 + 0.5) * self.bin_width()
    }

    /// (bin center, count) pairs for output
    pub fn bins(&self) -> Vec<Bin<f64, u64>> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &y)| Bin { x: self.bin_center(i), y })
            .collect()
    }

    pub fn reset(&mut self) {
        for c in self.counts.iter_mut() {
            *c = 0;
        }
        self.entries = 0;
        self.ignored = 0;
    }
}
