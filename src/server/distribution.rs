//! Streaming response time distribution over a bounded reservoir.

use serde::Serialize;

/// Summary statistics over the reservoir, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DistributionSummary {
    /// Samples the summary was computed over.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Median.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// A ring reservoir of the last `R` response time samples with lazily
/// recomputed summary statistics.
///
/// Writes are O(1); the summary is recomputed on read only when samples
/// arrived since the last computation.
#[derive(Debug)]
pub struct ResponseTimeDistribution {
    samples: Vec<f64>,
    capacity: usize,
    cursor: usize,
    dirty: bool,
    summary: DistributionSummary,
}

impl ResponseTimeDistribution {
    /// Create a reservoir holding up to `capacity` samples (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            dirty: false,
            summary: DistributionSummary::default(),
        }
    }

    /// Number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Record one sample, in milliseconds, evicting the oldest when full.
    pub fn record(&mut self, sample_ms: f64) {
        if !sample_ms.is_finite() || sample_ms < 0.0 {
            return;
        }
        if self.samples.len() < self.capacity {
            self.samples.push(sample_ms);
        } else {
            self.samples[self.cursor] = sample_ms;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
        self.dirty = true;
    }

    /// Current summary, recomputing if samples arrived since the last read.
    pub fn summary(&mut self) -> DistributionSummary {
        if self.dirty {
            self.summary = Self::compute(&self.samples);
            self.dirty = false;
        }
        self.summary
    }

    fn compute(samples: &[f64]) -> DistributionSummary {
        if samples.is_empty() {
            return DistributionSummary::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("samples are finite"));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count as f64;

        DistributionSummary {
            count,
            mean,
            stddev: variance.sqrt(),
            min: sorted[0],
            max: sorted[count - 1],
            p50: Self::percentile(&sorted, 50.0),
            p90: Self::percentile(&sorted, 90.0),
            p95: Self::percentile(&sorted, 95.0),
            p99: Self::percentile(&sorted, 99.0),
        }
    }

    // Nearest-rank percentile over an ascending slice.
    fn percentile(sorted: &[f64], pct: f64) -> f64 {
        let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1]
    }
}
