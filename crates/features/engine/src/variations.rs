//! Hand-off of chosen variation parameters to the feature runtime.

use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Constant group every user-chosen variation is registered under.
pub const USER_FLAGS_TRIAL_GROUP: &str = "UserFlags";

/// The process-wide feature/field-trial runtime, as far as flags need it.
pub trait FeatureRuntime {
    /// Associates `params` with `trial`/`group`. Returns `false` when the
    /// trial already has an active group (for example from the command
    /// line), which takes precedence.
    fn associate_params(&mut self, trial: &str, group: &str, params: &BTreeMap<String, String>) -> bool;

    /// Activates `group` for `trial`. Returns `false` if that is impossible.
    fn create_trial(&mut self, trial: &str, group: &str) -> bool;

    /// Forces `feature` on, tied to the trial that carries its parameters.
    fn register_enable_override(&mut self, feature: &str, trial: &str);
}

/// Registers each trial that is not already active under
/// [`USER_FLAGS_TRIAL_GROUP`] and ties its features to it.
pub(crate) fn register_trials<R>(
    runtime: &mut R,
    features_by_trial: &BTreeMap<String, Vec<String>>,
    params_by_trial: &BTreeMap<String, BTreeMap<String, String>>,
) where
    R: FeatureRuntime + ?Sized,
{
    let empty = BTreeMap::new();
    for (trial, features) in features_by_trial {
        let params = params_by_trial.get(trial).unwrap_or(&empty);
        if !runtime.associate_params(trial, USER_FLAGS_TRIAL_GROUP, params) {
            debug!(trial, "Trial already active, keeping its group");
            continue;
        }
        if !runtime.create_trial(trial, USER_FLAGS_TRIAL_GROUP) {
            warn!(trial, group = USER_FLAGS_TRIAL_GROUP, "Could not create trial");
            continue;
        }
        for feature in features {
            runtime.register_enable_override(feature, trial);
        }
    }
}

/// An active trial group and its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialGroup {
    pub group: String,
    pub params: BTreeMap<String, String>,
}

/// In-memory feature runtime: enough for tests and the command line driver.
#[derive(Debug, Clone, Default)]
pub struct FieldTrials {
    associated: BTreeMap<String, TrialGroup>,
    active: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl FieldTrials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `trial` active in `group`, as a command-line forced trial would be.
    pub fn activate(&mut self, trial: impl Into<String>, group: impl Into<String>) {
        self.active.insert(trial.into(), group.into());
    }

    #[must_use]
    pub fn active_group(&self, trial: &str) -> Option<&str> {
        self.active.get(trial).map(String::as_str)
    }

    #[must_use]
    pub fn params(&self, trial: &str) -> Option<&BTreeMap<String, String>> {
        self.associated.get(trial).map(|g| &g.params)
    }

    /// Trial a feature override is tied to.
    #[must_use]
    pub fn override_trial(&self, feature: &str) -> Option<&str> {
        self.overrides.get(feature).map(String::as_str)
    }

    #[must_use]
    pub const fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }
}

impl FeatureRuntime for FieldTrials {
    fn associate_params(&mut self, trial: &str, group: &str, params: &BTreeMap<String, String>) -> bool {
        if self.active.contains_key(trial) || self.associated.contains_key(trial) {
            return false;
        }
        self.associated
            .insert(trial.to_owned(), TrialGroup { group: group.to_owned(), params: params.clone() });
        true
    }

    fn create_trial(&mut self, trial: &str, group: &str) -> bool {
        match self.active.get(trial) {
            Some(active) => active == group,
            None => {
                self.active.insert(trial.to_owned(), group.to_owned());
                true
            },
        }
    }

    fn register_enable_override(&mut self, feature: &str, trial: &str) {
        self.overrides.insert(feature.to_owned(), trial.to_owned());
    }
}
