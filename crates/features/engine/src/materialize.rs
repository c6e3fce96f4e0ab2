//! Pure transform from a resolved selection to switches and feature overrides.

use crate::command_line::CommandLine;
use crate::origin;
use crate::registry::Registry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use vexil_domain::{FeatureState, FlagDefinition, FlagKind, SwitchSpec};
use vexil_storage::FlagsStorage;

/// Incoming switch that disables every experiment.
pub const NO_EXPERIMENTS_SWITCH: &str = "no-experiments";

/// Separator between a feature and its parameters, and between parameters.
const FEATURE_PARAMS_SEPARATOR: char = ':';
const PARAM_SEPARATOR: char = '/';

/// What one stored option turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SwitchEntry {
    /// Default option of a multi-option definition: contributes nothing.
    Nothing,
    Switch { name: String, value: String },
    Feature { feature: String, params: String, enabled: bool, variation_id: Option<String> },
}

/// Output of [`materialize`]. Ephemeral; rebuilt on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSwitchSet {
    /// `(name, value)` pairs in stored-name order. Values may be empty.
    pub switches: Vec<(String, String)>,
    /// `Feature` or `Feature:param/value/...` entries.
    pub enabled_features: Vec<String>,
    pub disabled_features: Vec<String>,
    pub variation_ids: Vec<String>,
    /// Trials behind the chosen variations. Diagnostics only; never emitted.
    pub trial_names: BTreeSet<String>,
}

impl ResolvedSwitchSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty() && self.enabled_features.is_empty() && self.disabled_features.is_empty()
    }

    /// Switches rendered as they appear on a command line.
    #[must_use]
    pub fn switch_strings(&self) -> Vec<String> {
        self.switches
            .iter()
            .map(|(name, value)| {
                if value.is_empty() { format!("--{name}") } else { format!("--{name}={value}") }
            })
            .collect()
    }
}

/// Inputs of one materialization.
#[derive(Debug)]
pub struct MaterializeContext<'a> {
    pub registry: &'a Registry,
    /// Stored names already sanitized for this platform, with inert
    /// (expired) definitions removed.
    pub enabled: &'a BTreeSet<String>,
    /// Source of string and origin-list values.
    pub storage: &'a dyn FlagsStorage,
    pub ignore_experiments: bool,
}

/// Deterministic: the same inputs always give byte-identical output.
#[must_use]
pub fn materialize(context: &MaterializeContext<'_>, command_line: &CommandLine) -> ResolvedSwitchSet {
    let mut resolved = ResolvedSwitchSet::default();
    if context.ignore_experiments || command_line.has_switch(NO_EXPERIMENTS_SWITCH) {
        return resolved;
    }

    // Keyed by bare feature name so one feature never lands in both lists.
    let mut features: BTreeMap<String, (bool, String)> = BTreeMap::new();

    for stored in context.enabled {
        let Some(definition) = context.registry.find_stored(stored) else {
            continue;
        };
        match switch_entry(definition, stored, context.storage, command_line) {
            SwitchEntry::Nothing => {},
            SwitchEntry::Switch { name, value } => resolved.switches.push((name, value)),
            SwitchEntry::Feature { feature, params, enabled, variation_id } => {
                if let FlagKind::FeatureWithParams { trial_name, .. } = &definition.kind {
                    if enabled && !params.is_empty() && !trial_name.is_empty() {
                        resolved.trial_names.insert(trial_name.clone());
                    }
                }
                resolved.variation_ids.extend(variation_id);
                let rendered = if params.is_empty() {
                    feature.clone()
                } else {
                    format!("{feature}{FEATURE_PARAMS_SEPARATOR}{params}")
                };
                features.insert(feature, (enabled, rendered));
            },
        }
    }

    for (enabled, rendered) in features.into_values() {
        if enabled {
            resolved.enabled_features.push(rendered);
        } else {
            resolved.disabled_features.push(rendered);
        }
    }
    resolved
}

/// Maps one stored name of `definition` to its effect.
pub(crate) fn switch_entry(
    definition: &FlagDefinition,
    stored: &str,
    storage: &dyn FlagsStorage,
    command_line: &CommandLine,
) -> SwitchEntry {
    let name = &definition.internal_name;
    match &definition.kind {
        FlagKind::Single { switch } | FlagKind::SingleDisable { switch } => plain(switch),
        FlagKind::OriginList { switch } => SwitchEntry::Switch {
            name: switch.clone(),
            value: origin::combine_and_sanitize(
                command_line.switch_value(switch),
                &storage.origin_list_flag(name),
            ),
        },
        FlagKind::String { switch } => {
            let stored_value = storage.string_flag(name);
            let value = if stored_value.is_empty() {
                command_line.switch_value(switch).to_owned()
            } else {
                stored_value
            };
            SwitchEntry::Switch { name: switch.clone(), value }
        },
        FlagKind::Multi { choices } => definition
            .option_index(stored)
            .and_then(|i| choices.get(i))
            .and_then(|choice| choice.switch.as_ref())
            .map_or(SwitchEntry::Nothing, plain),
        FlagKind::EnableDisable { enable, disable } => {
            match definition.option_index(stored).map(|i| definition.feature_state_for_option(i)) {
                Some(FeatureState::Enabled) => plain(enable),
                Some(FeatureState::Disabled) => plain(disable),
                _ => SwitchEntry::Nothing,
            }
        },
        FlagKind::Feature { feature } | FlagKind::FeatureWithParams { feature, .. } => {
            let Some(index) = definition.option_index(stored) else {
                return SwitchEntry::Nothing;
            };
            let state = definition.feature_state_for_option(index);
            if state == FeatureState::Default {
                return SwitchEntry::Nothing;
            }
            let variation = definition.variation_for_option(index);
            SwitchEntry::Feature {
                feature: feature.clone(),
                params: variation.map(|v| feature_params(v.params.iter().map(|p| (&p.name, &p.value)))).unwrap_or_default(),
                enabled: state == FeatureState::Enabled,
                variation_id: variation.and_then(|v| v.variation_id.clone()),
            }
        },
    }
}

fn plain(switch: &SwitchSpec) -> SwitchEntry {
    SwitchEntry::Switch { name: switch.name.clone(), value: switch.value.clone() }
}

/// `param/value/param2/value2`, each part escaped.
fn feature_params<'a>(params: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    let mut out = String::new();
    for (name, value) in params {
        if !out.is_empty() {
            out.push(PARAM_SEPARATOR);
        }
        out.push_str(&escape_value(name));
        out.push(PARAM_SEPARATOR);
        out.push_str(&escape_value(value));
    }
    out
}

/// Percent-escapes everything except unreserved characters, so list syntax
/// (`,` `/` `:` `*` `<`) cannot be forged from parameter data.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_protects_list_syntax() {
        assert_eq!(escape_value("fast"), "fast");
        assert_eq!(escape_value("a/b,c:d%"), "a%2Fb%2Cc%3Ad%25");
        assert_eq!(escape_value("ü"), "%C3%BC");
    }

    #[test]
    fn params_are_joined_with_slashes() {
        let a = ("mode".to_owned(), "fast".to_owned());
        let b = ("level".to_owned(), "2".to_owned());
        let pairs = [(&a.0, &a.1), (&b.0, &b.1)];
        assert_eq!(feature_params(pairs.into_iter()), "mode/fast/level/2");
    }
}
