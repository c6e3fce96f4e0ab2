//! The immutable table of flag definitions and the process-wide slot that
//! holds it.
//!
//! A [`Registry`] is built once at startup (from code or a JSON document),
//! validated, and shared by `Arc`. Tests swap the whole table with
//! [`set_for_testing`] instead of patching entries.

use crate::error::{RegistryError, RegistryErrorExt};
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use vexil_domain::{
    FlagDefinition, FlagKind, OPTION_SEPARATOR, Platform, SwitchSpec, VisibilityRule,
    split_option_name,
};

/// Prefix of the escape-hatch definitions that revive recently expired flags.
pub const UNEXPIRE_PREFIX: &str = "temporary-unexpire-flags-m";

/// Serialized form of a registry: definitions plus the visibility rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryDocument {
    pub flags: Vec<FlagDefinition>,
    pub rules: Vec<VisibilityRule>,
}

/// Immutable, validated table of definitions. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    definitions: Arc<[FlagDefinition]>,
    rules: Arc<[VisibilityRule]>,
    index: Arc<FxHashMap<String, usize>>,
}

impl Registry {
    /// Builds a registry without visibility rules.
    ///
    /// # Errors
    /// Returns [`RegistryError::Invalid`] if a definition is malformed or two
    /// definitions share an internal name.
    pub fn new(definitions: Vec<FlagDefinition>) -> Result<Self, RegistryError> {
        Self::with_rules(definitions, Vec::new())
    }

    /// # Errors
    /// Returns [`RegistryError::Invalid`] if a definition is malformed or two
    /// definitions share an internal name.
    pub fn with_rules(
        definitions: Vec<FlagDefinition>,
        rules: Vec<VisibilityRule>,
    ) -> Result<Self, RegistryError> {
        let mut index = FxHashMap::default();
        for (position, definition) in definitions.iter().enumerate() {
            validate(definition)?;
            if index.insert(definition.internal_name.clone(), position).is_some() {
                return Err(RegistryError::Invalid {
                    message: format!("duplicate internal name '{}'", definition.internal_name).into(),
                    context: None,
                });
            }
        }

        Ok(Self { definitions: definitions.into(), rules: rules.into(), index: Arc::new(index) })
    }

    /// # Errors
    /// * [`RegistryError::Parse`] if `json` is not a registry document.
    /// * [`RegistryError::Invalid`] if it fails validation.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument =
            serde_json::from_str(json).context("Parsing registry document")?;
        Self::from_document(document)
    }

    /// # Errors
    /// Returns [`RegistryError::Invalid`] if the document fails validation.
    pub fn from_document(document: RegistryDocument) -> Result<Self, RegistryError> {
        Self::with_rules(document.flags, document.rules)
    }

    /// # Errors
    /// * [`RegistryError::Io`] if the file cannot be read.
    /// * [`RegistryError::Parse`] / [`RegistryError::Invalid`] as for [`Registry::from_json`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .context(format!("Reading registry {}", path.display()))?;
        let registry = Self::from_json(&json).context(format!("{}", path.display()))?;
        info!(path = %path.display(), flags = registry.len(), "Flag registry loaded");
        Ok(registry)
    }

    #[must_use]
    pub fn to_document(&self) -> RegistryDocument {
        RegistryDocument { flags: self.definitions.to_vec(), rules: self.rules.to_vec() }
    }

    /// Adds the boolean escape hatches for `milestone` and `milestone - 1`.
    /// Enabling `temporary-unexpire-flags-mN` revives definitions that expired
    /// at milestone `N - 1`.
    ///
    /// # Errors
    /// Returns [`RegistryError::Invalid`] if the table already defines them.
    pub fn with_unexpire_entries(self, milestone: u32) -> Result<Self, RegistryError> {
        if milestone == 0 {
            return Ok(self);
        }
        let mut document = self.to_document();
        for m in [milestone.saturating_sub(1), milestone].into_iter().filter(|m| *m > 0) {
            let name = unexpire_flag_name(m);
            document.flags.push(
                FlagDefinition::new(&name, Platform::all(), FlagKind::Single {
                    switch: SwitchSpec::new(&name),
                })
                .label(format!("Temporarily unexpire M{} flags", m - 1)),
            );
        }
        debug!(milestone, "Unexpire entries added");
        Self::from_document(document)
    }

    #[must_use]
    pub fn definitions(&self) -> &[FlagDefinition] {
        &self.definitions
    }

    #[must_use]
    pub fn rules(&self) -> &[VisibilityRule] {
        &self.rules
    }

    #[must_use]
    pub fn find(&self, internal_name: &str) -> Option<&FlagDefinition> {
        self.index.get(internal_name).map(|&i| &self.definitions[i])
    }

    /// Definition owning a stored name, bare or `"name@i"`.
    #[must_use]
    pub fn find_stored(&self, stored: &str) -> Option<&FlagDefinition> {
        let (name, _) = split_option_name(stored);
        self.find(name).filter(|d| d.matches_name(stored))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[must_use]
pub fn unexpire_flag_name(milestone: u32) -> String {
    format!("{UNEXPIRE_PREFIX}{milestone}")
}

fn invalid(definition: &FlagDefinition, message: &str) -> RegistryError {
    RegistryError::Invalid {
        message: format!("'{}': {message}", definition.internal_name).into(),
        context: None,
    }
}

fn validate(definition: &FlagDefinition) -> Result<(), RegistryError> {
    if definition.internal_name.trim().is_empty() {
        return Err(invalid(definition, "internal name is empty"));
    }
    if definition.internal_name.contains(OPTION_SEPARATOR) {
        return Err(invalid(definition, "internal name contains the option separator"));
    }
    if definition.supported_platforms.is_empty() {
        return Err(invalid(definition, "no supported platforms"));
    }

    match &definition.kind {
        FlagKind::Single { switch } | FlagKind::SingleDisable { switch } => {
            non_empty(definition, &switch.name, "switch name is empty")
        },
        FlagKind::OriginList { switch } | FlagKind::String { switch } => {
            non_empty(definition, switch, "switch name is empty")
        },
        FlagKind::Multi { choices } => {
            if choices.len() < 2 {
                return Err(invalid(definition, "multi-choice needs a default and at least one choice"));
            }
            if choices[0].switch.is_some() {
                return Err(invalid(definition, "the default choice must not carry a switch"));
            }
            Ok(())
        },
        FlagKind::EnableDisable { enable, disable } => {
            non_empty(definition, &enable.name, "enable switch is empty")?;
            non_empty(definition, &disable.name, "disable switch is empty")
        },
        FlagKind::Feature { feature } => non_empty(definition, feature, "feature name is empty"),
        FlagKind::FeatureWithParams { feature, trial_name, variations } => {
            non_empty(definition, feature, "feature name is empty")?;
            non_empty(definition, trial_name, "trial name is empty")?;
            if variations.is_empty() {
                return Err(invalid(definition, "parameterized feature without variations"));
            }
            for variation in variations {
                let mut seen = FxHashSet::default();
                if variation.params.iter().any(|p| !seen.insert(p.name.as_str())) {
                    return Err(invalid(definition, "variation repeats a parameter name"));
                }
            }
            Ok(())
        },
    }
}

fn non_empty(definition: &FlagDefinition, value: &str, message: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() { Err(invalid(definition, message)) } else { Ok(()) }
}

// --- Process-wide slot ---

static SLOT: LazyLock<RwLock<Arc<Registry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Registry::default())));

/// The registry currently installed for the process.
#[must_use]
pub fn current() -> Arc<Registry> {
    Arc::clone(&SLOT.read())
}

/// Installs the production registry. Called once at startup.
pub fn install(registry: Registry) {
    *SLOT.write() = Arc::new(registry);
}

/// Swaps the process-wide registry for a test-provided one until the returned
/// guard is restored or dropped.
#[must_use = "Dropping the override restores the previous registry immediately."]
pub fn set_for_testing(registry: Registry) -> RegistryOverride {
    let previous = std::mem::replace(&mut *SLOT.write(), Arc::new(registry));
    RegistryOverride { previous: Some(previous) }
}

/// Paired restore operation for [`set_for_testing`].
#[derive(Debug)]
pub struct RegistryOverride {
    previous: Option<Arc<Registry>>,
}

impl RegistryOverride {
    /// Puts the previous registry back.
    pub fn restore(mut self) {
        self.put_back();
    }

    fn put_back(&mut self) {
        if let Some(previous) = self.previous.take() {
            *SLOT.write() = previous;
        }
    }
}

impl Drop for RegistryOverride {
    fn drop(&mut self) {
        self.put_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use vexil_domain::Choice;

    fn single(name: &str) -> FlagDefinition {
        FlagDefinition::new(name, Platform::all(), FlagKind::Single { switch: SwitchSpec::new(name) })
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Registry::new(vec![single("a"), single("a")]).unwrap_err();
        assert!(err.to_string().contains("duplicate internal name 'a'"));
    }

    #[test]
    fn rejects_separator_in_name() {
        assert!(Registry::new(vec![single("a@1")]).is_err());
    }

    #[test]
    fn rejects_default_choice_with_switch() {
        let def = FlagDefinition::new("m", Platform::all(), FlagKind::Multi {
            choices: vec![
                Choice { label: "Default".into(), switch: Some(SwitchSpec::new("m")) },
                Choice { label: "On".into(), switch: Some(SwitchSpec::new("m")) },
            ],
        });
        assert!(Registry::new(vec![def]).is_err());
    }

    #[test]
    fn find_stored_resolves_option_names() {
        let def = FlagDefinition::new("f", Platform::all(), FlagKind::Feature { feature: "F".into() });
        let registry = Registry::new(vec![def, single("x")]).unwrap();
        assert!(registry.find_stored("f@2").is_some());
        assert!(registry.find_stored("f@3").is_none());
        assert!(registry.find_stored("f").is_none());
        assert!(registry.find_stored("x").is_some());
        assert!(registry.find_stored("x@1").is_none());
    }

    #[test]
    fn unexpire_entries_cover_current_and_previous_milestone() {
        let registry = Registry::new(vec![single("x")]).unwrap().with_unexpire_entries(110).unwrap();
        assert!(registry.find("temporary-unexpire-flags-m110").is_some());
        assert!(registry.find("temporary-unexpire-flags-m109").is_some());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    #[serial]
    fn override_restores_previous_registry() {
        install(Registry::new(vec![single("prod")]).unwrap());

        let guard = set_for_testing(Registry::new(vec![single("test")]).unwrap());
        assert!(current().find("test").is_some());
        guard.restore();
        assert!(current().find("prod").is_some());

        {
            let _guard = set_for_testing(Registry::default());
            assert!(current().is_empty());
        }
        assert!(current().find("prod").is_some());
        install(Registry::default());
    }
}
