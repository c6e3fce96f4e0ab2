//! Usage reporting for applied flags.
//!
//! Each applied switch and feature override becomes one sample in a sparse
//! histogram, bucketed by a hash of its name. Reporting is best effort and
//! never blocks flag application.

mod error;
mod report;
mod sink;

pub use error::{UsageError, UsageErrorExt};
pub use report::{UsageReport, record_uma_statistics, record_usage, sample_id};
pub use sink::{HistogramSink, MemoryHistograms, TracingHistograms};
