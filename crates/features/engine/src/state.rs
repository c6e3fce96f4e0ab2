//! Per-session flag bookkeeping on top of a [`FlagsStorage`].
//!
//! [`FlagsState`] owns the registry handle, the visibility filter and what it
//! injected into the command line. Storage is passed into every call; the
//! engine never holds it.

use crate::command_line::{CommandLine, SWITCH_PREFIX, split_feature_list};
use crate::filter::VisibilityFilter;
use crate::materialize::{MaterializeContext, ResolvedSwitchSet, SwitchEntry, materialize, switch_entry};
use crate::origin;
use crate::registry::{self, Registry};
use crate::variations::{FeatureRuntime, register_trials};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vexil_domain::{
    BuildInfo, FeatureState, FlagAccess, FlagDefinition, FlagKind, FlagListing, FlagRecord,
    FlagState, FlagValue, OptionRecord, Platform, split_option_name,
};
use vexil_domain::config::CommandLineSettings;
use vexil_storage::FlagsStorage;

pub const FLAG_SWITCHES_BEGIN: &str = "flag-switches-begin";
pub const FLAG_SWITCHES_END: &str = "flag-switches-end";

/// Whether [`FlagsState::convert_flags_to_switches`] brackets what it adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelsMode {
    Add,
    None,
}

/// Flat view of what the current selection turns on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchesAndFeatures {
    /// Switches as written on a command line (`--name`), without value.
    pub switches: BTreeSet<String>,
    /// `Feature:enabled` / `Feature:disabled`.
    pub features: BTreeSet<String>,
    pub variation_ids: BTreeSet<String>,
}

#[derive(Debug)]
pub struct FlagsState {
    registry: Arc<Registry>,
    filter: VisibilityFilter,
    switch_names: CommandLineSettings,
    needs_restart: bool,
    /// Switches the last conversion put on the command line.
    flags_switches: IndexMap<String, String>,
    /// List entries the last conversion appended, per list switch.
    appended_switches: BTreeMap<String, BTreeSet<String>>,
}

impl FlagsState {
    #[must_use]
    pub fn new(registry: Arc<Registry>, build: BuildInfo) -> Self {
        let filter = VisibilityFilter::new(build, registry.rules());
        Self {
            registry,
            filter,
            switch_names: CommandLineSettings::default(),
            needs_restart: false,
            flags_switches: IndexMap::new(),
            appended_switches: BTreeMap::new(),
        }
    }

    /// Engine over whatever registry is installed process-wide.
    #[must_use]
    pub fn from_installed(build: BuildInfo) -> Self {
        Self::new(registry::current(), build)
    }

    #[must_use]
    pub fn with_command_line_settings(mut self, settings: CommandLineSettings) -> Self {
        self.switch_names = settings;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    #[must_use]
    pub const fn build(&self) -> &BuildInfo {
        self.filter.build()
    }

    pub fn set_build(&mut self, build: BuildInfo) {
        self.filter.set_build(build);
    }

    #[must_use]
    pub const fn is_restart_needed(&self) -> bool {
        self.needs_restart
    }

    // --- Reads ---

    /// Stored set with names no definition claims removed. The cleaned set is
    /// written back when anything was dropped.
    pub fn sanitized_flags(&self, storage: &mut dyn FlagsStorage) -> BTreeSet<String> {
        let stored = storage.flags();
        let (known, unknown): (BTreeSet<String>, BTreeSet<String>) =
            stored.into_iter().partition(|name| self.registry.find_stored(name).is_some());
        if !unknown.is_empty() {
            debug!(dropped = ?unknown, "Dropping stored names without a definition");
            storage.set_flags(known.clone());
        }
        known
    }

    /// Sanitized set restricted to definitions that can take effect on this
    /// platform: available here and not expired.
    pub fn effective_flags(&self, storage: &mut dyn FlagsStorage) -> BTreeSet<String> {
        let stored = self.sanitized_flags(storage);
        let mask = self.build().platform.materialization_mask();
        stored
            .iter()
            .filter(|name| {
                self.registry.find_stored(name).is_some_and(|definition| {
                    definition.is_available_on(mask) && !self.filter.is_expired(definition, &stored)
                })
            })
            .cloned()
            .collect()
    }

    /// Every visible definition with its current state, split by platform
    /// support.
    pub fn enumerate(&self, storage: &mut dyn FlagsStorage, access: FlagAccess) -> FlagListing {
        let stored = self.sanitized_flags(storage);
        let mut platforms = self.build().platform;
        if access == FlagAccess::Owner {
            platforms |= Platform::CHROMEOS_OWNER_ONLY;
        }

        let mut listing = FlagListing::default();
        for definition in self.registry.definitions() {
            if let Some(reason) = self.filter.skip_reason(definition, &stored) {
                debug!(flag = %definition.internal_name, ?reason, "Not listed");
                continue;
            }
            let record = self.record(definition, &stored, &*storage);
            if definition.is_available_on(platforms) {
                listing.supported.push(record);
            } else {
                listing.unsupported.push(record);
            }
        }
        listing
    }

    /// Computed state of one definition, `None` for unknown names.
    #[must_use]
    pub fn state_of(&self, storage: &dyn FlagsStorage, internal_name: &str) -> Option<FlagState> {
        let definition = self.registry.find(internal_name)?;
        let stored = storage.flags();
        if self.filter.is_expired(definition, &stored) {
            return Some(FlagState::Expired);
        }
        Some(stored_state(definition, &stored))
    }

    fn record(&self, definition: &FlagDefinition, stored: &BTreeSet<String>, storage: &dyn FlagsStorage) -> FlagRecord {
        let state = stored_state(definition, stored);
        let name = &definition.internal_name;

        let options = if definition.is_multi_option() {
            (0..definition.num_options())
                .map(|i| {
                    let option = definition.option_name(i);
                    let selected = stored.contains(&option) || (i == 0 && state == FlagState::Unset);
                    OptionRecord { internal_name: option, label: definition.option_label(i), selected }
                })
                .collect()
        } else {
            Vec::new()
        };

        let value = match &definition.kind {
            FlagKind::String { .. } => Some(FlagValue::String(storage.string_flag(name))),
            FlagKind::OriginList { .. } => Some(FlagValue::OriginList(storage.origin_list_flag(name))),
            _ => None,
        };

        let enabled = match (&definition.kind, state) {
            (FlagKind::SingleDisable { .. }, FlagState::DisabledExplicitly) => false,
            (FlagKind::SingleDisable { .. }, _) => true,
            (_, FlagState::Unset | FlagState::DisabledExplicitly | FlagState::Expired) => false,
            (_, FlagState::Enabled | FlagState::ChosenVariant(_)) => true,
        };

        FlagRecord {
            internal_name: name.clone(),
            label: definition.label.clone(),
            description: definition.description.clone(),
            kind: definition.kind.as_str(),
            state,
            is_default: state == FlagState::Unset,
            enabled,
            supported_platforms: definition.supported_platforms,
            options,
            value,
        }
    }

    // --- Writes ---

    /// Turns a definition on or off. `name` is either an internal name or an
    /// option name (`"name@i"`), which selects that option.
    ///
    /// A plain enable of a multi-option definition selects option 1; a plain
    /// disable clears every option.
    pub fn set_entry_enabled(&mut self, storage: &mut dyn FlagsStorage, name: &str, enable: bool) {
        if let (entry, Some(index)) = split_option_name(name) {
            let Some(definition) = self.registry.find_stored(name).cloned() else {
                debug!(flag = name, "Ignoring write to unknown option");
                return;
            };
            if enable {
                self.select_option(storage, &definition, index);
            } else if storage.flags().contains(name) {
                self.select_option(storage, &definition, 0);
            } else {
                debug!(flag = entry, option = index, "Option not selected, nothing to disable");
            }
            return;
        }

        let Some(definition) = self.registry.find(name).cloned() else {
            debug!(flag = name, "Ignoring write to unknown flag");
            return;
        };

        match &definition.kind {
            FlagKind::Single { .. } | FlagKind::String { .. } | FlagKind::OriginList { .. } => {
                self.update_flags(storage, |flags| toggle(flags, name, enable));
            },
            FlagKind::SingleDisable { .. } => {
                self.update_flags(storage, |flags| toggle(flags, name, !enable));
            },
            _ => self.select_option(storage, &definition, usize::from(enable)),
        }
    }

    /// Selects option `index` of a multi-option definition.
    pub fn set_choice(&mut self, storage: &mut dyn FlagsStorage, name: &str, index: usize) {
        let Some(definition) = self.registry.find(name).cloned() else {
            debug!(flag = name, "Ignoring choice for unknown flag");
            return;
        };
        if !definition.is_multi_option() {
            kind_mismatch(&definition, "set_choice");
            return;
        }
        if index >= definition.num_options() {
            warn!(flag = name, index, options = definition.num_options(), "Choice out of range");
            return;
        }
        self.select_option(storage, &definition, index);
    }

    /// Stores the free-text value of a string definition. An empty value clears it.
    pub fn set_string(&mut self, storage: &mut dyn FlagsStorage, name: &str, value: &str) {
        let Some(definition) = self.registry.find(name) else {
            debug!(flag = name, "Ignoring value for unknown flag");
            return;
        };
        if !matches!(definition.kind, FlagKind::String { .. }) {
            kind_mismatch(definition, "set_string");
            return;
        }
        if storage.string_flag(name) != value {
            storage.set_string_flag(name, value);
            self.needs_restart = true;
        }
    }

    /// Stores an origin list, sanitized before it is persisted.
    pub fn set_origin_list(&mut self, storage: &mut dyn FlagsStorage, name: &str, value: &str) {
        let Some(definition) = self.registry.find(name) else {
            debug!(flag = name, "Ignoring origins for unknown flag");
            return;
        };
        if !matches!(definition.kind, FlagKind::OriginList { .. }) {
            kind_mismatch(definition, "set_origin_list");
            return;
        }
        let sanitized = origin::sanitize(value);
        if storage.origin_list_flag(name) != sanitized {
            storage.set_origin_list_flag(name, &sanitized);
            self.needs_restart = true;
        }
    }

    /// Clears every stored selection and value.
    pub fn reset_all(&mut self, storage: &mut dyn FlagsStorage) {
        let had_flags = !storage.flags().is_empty();
        let values = storage.value_names();
        storage.set_flags(BTreeSet::new());
        for name in &values {
            storage.clear_value(name);
        }
        if had_flags || !values.is_empty() {
            self.needs_restart = true;
        }
        info!("All flags reset");
    }

    /// Drops selections of definitions expired beyond the unexpire window and
    /// values whose definition no longer takes one. Returns how many entries
    /// went away.
    ///
    /// Pruned entries were inert, so this never requests a restart.
    pub fn prune_stale_selections(&mut self, storage: &mut dyn FlagsStorage) -> usize {
        let before = storage.flags();
        let stored = self.sanitized_flags(storage);
        let (kept, expired): (BTreeSet<String>, BTreeSet<String>) =
            stored.iter().cloned().partition(|name| {
                self.registry
                    .find_stored(name)
                    .is_some_and(|definition| !self.filter.is_expired(definition, &stored))
            });
        if !expired.is_empty() {
            storage.set_flags(kept);
        }
        let mut removed = before.len() - stored.len() + expired.len();

        for name in storage.value_names() {
            let takes_value = self.registry.find(&name).is_some_and(|definition| {
                matches!(definition.kind, FlagKind::String { .. } | FlagKind::OriginList { .. })
                    && !self.filter.is_expired(definition, &stored)
            });
            if !takes_value {
                storage.clear_value(&name);
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Stale flag selections pruned");
        }
        removed
    }

    fn select_option(&mut self, storage: &mut dyn FlagsStorage, definition: &FlagDefinition, index: usize) {
        self.update_flags(storage, |flags| {
            flags.retain(|stored| !definition.matches_name(stored));
            if index != 0 {
                flags.insert(definition.option_name(index));
            }
        });
    }

    /// Applies `edit` to the sanitized set and persists it. The restart flag
    /// is raised only if the stored set ends up different.
    fn update_flags(&mut self, storage: &mut dyn FlagsStorage, edit: impl FnOnce(&mut BTreeSet<String>)) {
        let original = self.sanitized_flags(storage);
        let mut flags = original.clone();
        edit(&mut flags);
        if flags != original {
            storage.set_flags(flags);
            self.needs_restart = true;
        }
    }

    // --- Materialization ---

    /// Switches and feature overrides the current selection implies, merged
    /// with values already present on `command_line`.
    pub fn materialize(&self, storage: &mut dyn FlagsStorage, command_line: &CommandLine) -> ResolvedSwitchSet {
        let enabled = self.effective_flags(storage);
        let context = MaterializeContext {
            registry: &self.registry,
            enabled: &enabled,
            storage: &*storage,
            ignore_experiments: self.build().ignore_experiments,
        };
        materialize(&context, command_line)
    }

    /// Switch names and `Feature:enabled` / `Feature:disabled` entries for
    /// the current selection, without values or parameters.
    pub fn switches_and_features(&self, storage: &mut dyn FlagsStorage) -> SwitchesAndFeatures {
        let enabled = self.effective_flags(storage);
        let command_line = CommandLine::default();
        let mut out = SwitchesAndFeatures::default();
        for stored in &enabled {
            let Some(definition) = self.registry.find_stored(stored) else {
                continue;
            };
            match switch_entry(definition, stored, &*storage, &command_line) {
                SwitchEntry::Nothing => {},
                SwitchEntry::Switch { name, .. } => {
                    out.switches.insert(format!("{SWITCH_PREFIX}{name}"));
                },
                SwitchEntry::Feature { feature, enabled, variation_id, .. } => {
                    let state = if enabled { "enabled" } else { "disabled" };
                    out.features.insert(format!("{feature}:{state}"));
                    out.variation_ids.extend(variation_id);
                },
            }
        }
        out
    }

    /// Materializes the selection into `command_line`, keeping what was already
    /// there. Everything added is remembered for [`Self::remove_flags_switches`].
    pub fn convert_flags_to_switches(
        &mut self,
        storage: &mut dyn FlagsStorage,
        command_line: &mut CommandLine,
        sentinels: SentinelsMode,
    ) {
        let resolved = self.materialize(storage, command_line);
        let bracket = sentinels == SentinelsMode::Add && self.switch_names.sentinels;

        if bracket {
            self.add_switch(command_line, FLAG_SWITCHES_BEGIN, String::new());
        }
        for (name, value) in resolved.switches {
            self.add_switch(command_line, &name, value);
        }

        let enable = self.switch_names.enable_features_switch.clone();
        let disable = self.switch_names.disable_features_switch.clone();
        let force_ids = self.switch_names.force_variation_ids_switch.clone();
        self.merge_list_switch(command_line, &enable, &resolved.enabled_features);
        self.merge_list_switch(command_line, &disable, &resolved.disabled_features);
        self.merge_list_switch(command_line, &force_ids, &resolved.variation_ids);

        if bracket {
            self.add_switch(command_line, FLAG_SWITCHES_END, String::new());
        }
        debug!(switches = self.flags_switches.len(), "Flags converted to switches");
    }

    /// Removes what the last [`Self::convert_flags_to_switches`] added. List
    /// entries the user supplied stay.
    pub fn remove_flags_switches(&mut self, command_line: &mut CommandLine) {
        for name in self.flags_switches.keys() {
            command_line.remove_switch(name);
        }
        self.flags_switches.clear();

        for (switch, added) in std::mem::take(&mut self.appended_switches) {
            let remaining: Vec<&str> = split_feature_list(command_line.switch_value(&switch))
                .into_iter()
                .filter(|entry| !added.contains(*entry))
                .collect();
            if remaining.is_empty() {
                command_line.remove_switch(&switch);
            } else {
                let value = remaining.join(",");
                command_line.append_switch_value(switch, value);
            }
        }
    }

    /// Hands chosen variation parameters to `runtime`, one trial per
    /// parameterized feature. Returns the variation ids of the chosen options.
    pub fn register_all_feature_variation_parameters<R>(
        &self,
        storage: &mut dyn FlagsStorage,
        runtime: &mut R,
    ) -> Vec<String>
    where
        R: FeatureRuntime + ?Sized,
    {
        let enabled = self.effective_flags(storage);
        let mut features_by_trial: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut params_by_trial: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut variation_ids = Vec::new();

        for definition in self.registry.definitions() {
            let FlagKind::FeatureWithParams { feature, trial_name, .. } = &definition.kind else {
                continue;
            };
            for index in 0..definition.num_options() {
                if definition.feature_state_for_option(index) != FeatureState::Enabled
                    || !enabled.contains(&definition.option_name(index))
                {
                    continue;
                }
                features_by_trial.entry(trial_name.clone()).or_default().push(feature.clone());
                if let Some(variation) = definition.variation_for_option(index) {
                    let params = params_by_trial.entry(trial_name.clone()).or_default();
                    for param in &variation.params {
                        params.insert(param.name.clone(), param.value.clone());
                    }
                    variation_ids.extend(variation.variation_id.clone());
                }
            }
        }

        register_trials(runtime, &features_by_trial, &params_by_trial);
        variation_ids
    }

    fn add_switch(&mut self, command_line: &mut CommandLine, name: &str, value: String) {
        command_line.append_switch_value(name, value.clone());
        self.flags_switches.insert(name.to_owned(), value);
    }

    /// Appends the `entries` missing from the comma-separated `switch`.
    fn merge_list_switch(&mut self, command_line: &mut CommandLine, switch: &str, entries: &[String]) {
        if entries.is_empty() {
            return;
        }
        let mut current: Vec<String> =
            split_feature_list(command_line.switch_value(switch)).into_iter().map(str::to_owned).collect();
        let appended = self.appended_switches.entry(switch.to_owned()).or_default();
        for entry in entries {
            if !current.contains(entry) {
                current.push(entry.clone());
                appended.insert(entry.clone());
            }
        }
        command_line.append_switch_value(switch, current.join(","));
    }
}

fn toggle(flags: &mut BTreeSet<String>, name: &str, present: bool) {
    if present {
        flags.insert(name.to_owned());
    } else {
        flags.remove(name);
    }
}

fn stored_state(definition: &FlagDefinition, stored: &BTreeSet<String>) -> FlagState {
    let name = &definition.internal_name;
    match &definition.kind {
        FlagKind::Single { .. } | FlagKind::String { .. } | FlagKind::OriginList { .. } => {
            if stored.contains(name) { FlagState::Enabled } else { FlagState::Unset }
        },
        FlagKind::SingleDisable { .. } => {
            if stored.contains(name) { FlagState::DisabledExplicitly } else { FlagState::Unset }
        },
        FlagKind::Multi { .. } => selected_option(definition, stored)
            .map_or(FlagState::Unset, FlagState::ChosenVariant),
        FlagKind::EnableDisable { .. } | FlagKind::Feature { .. } | FlagKind::FeatureWithParams { .. } => {
            match selected_option(definition, stored) {
                None => FlagState::Unset,
                Some(index) => match definition.feature_state_for_option(index) {
                    FeatureState::Default => FlagState::Unset,
                    FeatureState::Disabled => FlagState::DisabledExplicitly,
                    FeatureState::Enabled if index == 1 => FlagState::Enabled,
                    FeatureState::Enabled => FlagState::ChosenVariant(index),
                },
            }
        },
    }
}

/// First non-default option present in `stored`.
fn selected_option(definition: &FlagDefinition, stored: &BTreeSet<String>) -> Option<usize> {
    (1..definition.num_options()).find(|&i| stored.contains(&definition.option_name(i)))
}

fn kind_mismatch(definition: &FlagDefinition, operation: &str) {
    error!(
        flag = %definition.internal_name,
        kind = definition.kind.as_str(),
        operation,
        "Operation does not apply to this flag kind"
    );
    if cfg!(debug_assertions) {
        panic!(
            "{operation} does not apply to '{}' ({})",
            definition.internal_name,
            definition.kind.as_str()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexil_domain::{Choice, SwitchSpec};
    use vexil_storage::MemoryFlagsStorage;

    fn engine() -> FlagsState {
        let registry = Registry::new(vec![
            FlagDefinition::new("x", Platform::all(), FlagKind::Single { switch: SwitchSpec::new("x") }),
            FlagDefinition::new("quiet", Platform::all(), FlagKind::SingleDisable {
                switch: SwitchSpec::new("no-quiet"),
            }),
            FlagDefinition::new("scroll", Platform::all(), FlagKind::Multi {
                choices: vec![
                    Choice { label: "Default".into(), switch: None },
                    Choice { label: "Smooth".into(), switch: Some(SwitchSpec::new("smooth")) },
                    Choice { label: "Fast".into(), switch: Some(SwitchSpec::with_value("scroll", "fast")) },
                ],
            }),
            FlagDefinition::new("text", Platform::all(), FlagKind::String { switch: "text".into() }),
        ]);
        match registry {
            Ok(registry) => FlagsState::new(Arc::new(registry), BuildInfo::default()),
            Err(e) => panic!("registry: {e}"),
        }
    }

    #[test]
    fn reselecting_the_same_option_is_not_a_change() {
        let mut state = engine();
        let mut storage = MemoryFlagsStorage::with_flags(["scroll@2"]);
        state.set_choice(&mut storage, "scroll", 2);
        assert!(!state.is_restart_needed());

        state.set_choice(&mut storage, "scroll", 1);
        assert!(state.is_restart_needed());
        assert_eq!(storage.flags(), BTreeSet::from(["scroll@1".to_owned()]));
    }

    #[test]
    fn disable_style_flags_store_the_off_selection() {
        let mut state = engine();
        let mut storage = MemoryFlagsStorage::new();
        state.set_entry_enabled(&mut storage, "quiet", false);
        assert_eq!(state.state_of(&storage, "quiet"), Some(FlagState::DisabledExplicitly));

        state.set_entry_enabled(&mut storage, "quiet", true);
        assert!(storage.flags().is_empty());
    }

    #[test]
    fn plain_names_select_first_option() {
        let mut state = engine();
        let mut storage = MemoryFlagsStorage::new();
        state.set_entry_enabled(&mut storage, "scroll", true);
        assert_eq!(state.state_of(&storage, "scroll"), Some(FlagState::ChosenVariant(1)));

        state.set_entry_enabled(&mut storage, "scroll", false);
        assert_eq!(state.state_of(&storage, "scroll"), Some(FlagState::Unset));
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut state = engine();
        let mut storage = MemoryFlagsStorage::new();
        state.set_entry_enabled(&mut storage, "missing", true);
        state.set_entry_enabled(&mut storage, "scroll@9", true);
        state.set_string(&mut storage, "missing", "v");
        assert!(storage.flags().is_empty());
        assert!(!state.is_restart_needed());
    }

    #[test]
    fn sanitizing_writes_back() {
        let state = engine();
        let mut storage = MemoryFlagsStorage::with_flags(["x", "gone", "scroll@7"]);
        let flags = state.sanitized_flags(&mut storage);
        assert_eq!(flags, BTreeSet::from(["x".to_owned()]));
        assert_eq!(storage.flags(), flags);
    }

    #[test]
    #[should_panic(expected = "set_string does not apply")]
    fn kind_mismatch_asserts_in_debug() {
        let mut state = engine();
        let mut storage = MemoryFlagsStorage::new();
        state.set_string(&mut storage, "x", "value");
    }

    #[test]
    fn string_values_only_restart_on_change() {
        let mut state = engine();
        let mut storage = MemoryFlagsStorage::new();
        state.set_string(&mut storage, "text", "");
        assert!(!state.is_restart_needed());
        state.set_string(&mut storage, "text", "hello");
        assert!(state.is_restart_needed());
        assert_eq!(storage.string_flag("text"), "hello");
    }
}
