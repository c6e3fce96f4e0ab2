use crate::platform::Platform;
use serde::{Deserialize, Serialize};

/// Joins an internal name and an option index: `"smooth-scrolling@2"`.
pub const OPTION_SEPARATOR: char = '@';

/// A command-line switch with an optional value (`--name=value`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwitchSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

impl SwitchSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: String::new() }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// One option of a multi-choice definition. The default choice carries no switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch: Option<SwitchSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariationParam {
    pub name: String,
    pub value: String,
}

/// A named parameter bundle for a parameterized feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    #[serde(default)]
    pub params: Vec<VariationParam>,
    /// Forced variation id reported to the experiment backend when chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<String>,
}

/// What a feature option does to its runtime feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureState {
    Default,
    Enabled,
    Disabled,
}

/// Value kind of a definition together with the switch or feature it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlagKind {
    /// Boolean; selecting it emits the switch.
    Single { switch: SwitchSpec },
    /// Boolean that defaults to on; the stored selection means "turned off"
    /// and emits the switch.
    SingleDisable { switch: SwitchSpec },
    /// Stored origin list emitted as the switch value.
    OriginList { switch: String },
    /// Stored free text emitted as the switch value.
    String { switch: String },
    /// Exactly one of N choices; choice 0 is the default.
    Multi { choices: Vec<Choice> },
    /// Default / Enabled / Disabled, each non-default option with its own switch.
    EnableDisable { enable: SwitchSpec, disable: SwitchSpec },
    /// Default / Enabled / Disabled mapped onto a runtime feature.
    Feature { feature: String },
    /// Default, Enabled, one option per variation, then Disabled.
    FeatureWithParams {
        feature: String,
        trial_name: String,
        variations: Vec<Variation>,
    },
}

impl FlagKind {
    /// Short name used in listings and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::SingleDisable { .. } => "single_disable",
            Self::OriginList { .. } => "origin_list",
            Self::String { .. } => "string",
            Self::Multi { .. } => "multi",
            Self::EnableDisable { .. } => "enable_disable",
            Self::Feature { .. } => "feature",
            Self::FeatureWithParams { .. } => "feature_with_params",
        }
    }
}

/// Immutable description of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub internal_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub supported_platforms: Platform,
    pub kind: FlagKind,
    /// Last milestone in which the definition still has an effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_milestone: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FlagDefinition {
    pub fn new(internal_name: impl Into<String>, supported_platforms: Platform, kind: FlagKind) -> Self {
        Self {
            internal_name: internal_name.into(),
            label: String::new(),
            description: String::new(),
            supported_platforms,
            kind,
            expiry_milestone: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn expires_after(mut self, milestone: u32) -> Self {
        self.expiry_milestone = Some(milestone);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Number of selectable options, `0` for kinds stored under the bare name.
    #[must_use]
    pub fn num_options(&self) -> usize {
        match &self.kind {
            FlagKind::Single { .. }
            | FlagKind::SingleDisable { .. }
            | FlagKind::OriginList { .. }
            | FlagKind::String { .. } => 0,
            FlagKind::Multi { choices } => choices.len(),
            FlagKind::EnableDisable { .. } | FlagKind::Feature { .. } => 3,
            FlagKind::FeatureWithParams { variations, .. } => 3 + variations.len(),
        }
    }

    #[must_use]
    pub fn is_multi_option(&self) -> bool {
        self.num_options() > 0
    }

    #[must_use]
    pub fn option_name(&self, index: usize) -> String {
        format!("{}{OPTION_SEPARATOR}{index}", self.internal_name)
    }

    /// Index of `stored` if it names one of this definition's options.
    #[must_use]
    pub fn option_index(&self, stored: &str) -> Option<usize> {
        match split_option_name(stored) {
            (name, Some(index)) if name == self.internal_name && index < self.num_options() => {
                Some(index)
            },
            _ => None,
        }
    }

    /// Whether `stored` is a name this definition can legitimately persist.
    #[must_use]
    pub fn matches_name(&self, stored: &str) -> bool {
        if self.is_multi_option() {
            self.option_index(stored).is_some()
        } else {
            stored == self.internal_name
        }
    }

    #[must_use]
    pub fn option_label(&self, index: usize) -> String {
        let last = self.num_options().saturating_sub(1);
        match &self.kind {
            FlagKind::Multi { choices } => {
                choices.get(index).map(|c| c.label.clone()).unwrap_or_default()
            },
            FlagKind::FeatureWithParams { variations, .. } if index > 1 && index < last => {
                variations.get(index - 2).map(|v| format!("Enabled {}", v.name)).unwrap_or_default()
            },
            _ => match self.feature_state_for_option(index) {
                FeatureState::Default => "Default".to_owned(),
                FeatureState::Enabled => "Enabled".to_owned(),
                FeatureState::Disabled => "Disabled".to_owned(),
            },
        }
    }

    /// Feature state an option applies. Meaningful for every multi-option kind
    /// except [`FlagKind::Multi`], where every non-default choice is "enabled".
    #[must_use]
    pub fn feature_state_for_option(&self, index: usize) -> FeatureState {
        let count = self.num_options();
        if index == 0 || count == 0 {
            FeatureState::Default
        } else if index == count - 1 && !matches!(self.kind, FlagKind::Multi { .. }) {
            FeatureState::Disabled
        } else {
            FeatureState::Enabled
        }
    }

    /// The variation a parameterized option selects; `None` for the plain
    /// Default/Enabled/Disabled options.
    #[must_use]
    pub fn variation_for_option(&self, index: usize) -> Option<&Variation> {
        match &self.kind {
            FlagKind::FeatureWithParams { variations, .. } if index >= 2 => variations.get(index - 2),
            _ => None,
        }
    }

    /// Runtime feature driven by this definition, if any.
    #[must_use]
    pub fn feature_name(&self) -> Option<&str> {
        match &self.kind {
            FlagKind::Feature { feature } | FlagKind::FeatureWithParams { feature, .. } => {
                Some(feature)
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    #[must_use]
    pub const fn is_available_on(&self, platforms: Platform) -> bool {
        self.supported_platforms.intersects(platforms)
    }
}

/// Splits `"name@3"` into `("name", Some(3))`. Names without a valid numeric
/// suffix are returned whole.
#[must_use]
pub fn split_option_name(stored: &str) -> (&str, Option<usize>) {
    match stored.rsplit_once(OPTION_SEPARATOR) {
        Some((name, index)) if !name.is_empty() => match index.parse() {
            Ok(index) => (name, Some(index)),
            Err(_) => (stored, None),
        },
        _ => (stored, None),
    }
}
