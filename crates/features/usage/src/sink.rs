use crate::error::UsageError;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::info;

/// Destination of sparse histogram samples.
pub trait HistogramSink: Debug + Send + Sync {
    /// Adds one occurrence of `sample` to `histogram`.
    ///
    /// # Errors
    /// Returns [`UsageError`] when the backend cannot take the sample.
    fn add_sample(&self, histogram: &str, sample: i32) -> Result<(), UsageError>;
}

/// Aggregates samples in memory. Shared between threads behind its lock.
#[derive(Debug, Default)]
pub struct MemoryHistograms {
    histograms: Mutex<FxHashMap<String, BTreeMap<i32, u64>>>,
}

impl MemoryHistograms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How often `sample` was added to `histogram`.
    #[must_use]
    pub fn count(&self, histogram: &str, sample: i32) -> u64 {
        self.histograms.lock().get(histogram).and_then(|h| h.get(&sample)).copied().unwrap_or(0)
    }

    /// Snapshot of one histogram, bucket to count.
    #[must_use]
    pub fn snapshot(&self, histogram: &str) -> BTreeMap<i32, u64> {
        self.histograms.lock().get(histogram).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self, histogram: &str) -> u64 {
        self.histograms.lock().get(histogram).map_or(0, |h| h.values().sum())
    }

    pub fn clear(&self) {
        self.histograms.lock().clear();
    }
}

impl HistogramSink for MemoryHistograms {
    fn add_sample(&self, histogram: &str, sample: i32) -> Result<(), UsageError> {
        *self.histograms.lock().entry(histogram.to_owned()).or_default().entry(sample).or_insert(0) += 1;
        Ok(())
    }
}

/// Emits every sample as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHistograms;

impl HistogramSink for TracingHistograms {
    fn add_sample(&self, histogram: &str, sample: i32) -> Result<(), UsageError> {
        info!(target: "vexil::histograms", histogram, sample, "Histogram sample");
        Ok(())
    }
}

impl<S: HistogramSink + ?Sized> HistogramSink for std::sync::Arc<S> {
    fn add_sample(&self, histogram: &str, sample: i32) -> Result<(), UsageError> {
        (**self).add_sample(histogram, sample)
    }
}
