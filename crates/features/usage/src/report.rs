use crate::sink::HistogramSink;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use vexil_engine::{FLAG_SWITCHES_BEGIN, FLAG_SWITCHES_END, FlagsState, SWITCH_PREFIX, SwitchesAndFeatures};
use vexil_storage::FlagsStorage;

const ENABLED_SUFFIX: &str = ":enabled";
const DISABLED_SUFFIX: &str = ":disabled";

/// What was reported, one entry per emitted sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub switches: BTreeSet<String>,
    /// `Feature:enabled` names.
    pub enabled_features: BTreeSet<String>,
    /// `Feature:disabled` names.
    pub disabled_features: BTreeSet<String>,
    /// Samples the sink rejected.
    pub failed: usize,
}

impl UsageReport {
    /// Every reported name, switches first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.switches
            .iter()
            .chain(&self.enabled_features)
            .chain(&self.disabled_features)
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.switches.len() + self.enabled_features.len() + self.disabled_features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stable histogram bucket of a reported name: the first four bytes of its
/// SHA-256 digest, big-endian.
#[must_use]
pub fn sample_id(name: &str) -> i32 {
    let digest = Sha256::digest(name.as_bytes());
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Reports each applied switch and feature override once to `histogram`.
///
/// Variation parameters and trial names never leave this function. Sink
/// failures are logged and counted, never propagated.
pub fn record_usage<S>(switch_set: &SwitchesAndFeatures, sink: &S, histogram: &str) -> UsageReport
where
    S: HistogramSink + ?Sized,
{
    let mut report = UsageReport::default();

    for switch in &switch_set.switches {
        let bare = switch.strip_prefix(SWITCH_PREFIX).unwrap_or(switch);
        if bare == FLAG_SWITCHES_BEGIN || bare == FLAG_SWITCHES_END {
            continue;
        }
        report.switches.insert(switch.clone());
    }
    for entry in &switch_set.features {
        if let Some(feature) = entry.strip_suffix(ENABLED_SUFFIX) {
            report.enabled_features.insert(format!("{}{ENABLED_SUFFIX}", bare_feature(feature)));
        } else if let Some(feature) = entry.strip_suffix(DISABLED_SUFFIX) {
            report.disabled_features.insert(format!("{}{DISABLED_SUFFIX}", bare_feature(feature)));
        } else {
            debug!(entry, "Skipping feature entry without state");
        }
    }

    let names: Vec<String> = report.names().map(str::to_owned).collect();
    for name in names {
        if let Err(e) = sink.add_sample(histogram, sample_id(&name)) {
            warn!(histogram, name, error = %e, "Dropping usage sample");
            report.failed += 1;
        }
    }

    debug!(histogram, reported = report.len(), failed = report.failed, "Flag usage recorded");
    report
}

/// Reports the selection currently stored in `storage`.
pub fn record_uma_statistics<S>(
    state: &FlagsState,
    storage: &mut dyn FlagsStorage,
    sink: &S,
    histogram: &str,
) -> UsageReport
where
    S: HistogramSink + ?Sized,
{
    let switch_set = state.switches_and_features(storage);
    record_usage(&switch_set, sink, histogram)
}

/// Feature identifier without any `:param/value` suffix.
fn bare_feature(feature: &str) -> &str {
    feature.split(':').next().unwrap_or(feature)
}
