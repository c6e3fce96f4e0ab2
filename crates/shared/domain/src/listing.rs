use crate::platform::Platform;
use serde::Serialize;

/// Computed state of one definition. Never stored as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "option", rename_all = "snake_case")]
pub enum FlagState {
    Unset,
    Enabled,
    DisabledExplicitly,
    ChosenVariant(usize),
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionRecord {
    /// Stored name of the option (`"name@i"`).
    pub internal_name: String,
    pub label: String,
    pub selected: bool,
}

/// Current value of a free-form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagValue {
    String(String),
    OriginList(String),
}

/// One row handed to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagRecord {
    pub internal_name: String,
    pub label: String,
    pub description: String,
    pub kind: &'static str,
    pub state: FlagState,
    /// No option of this definition is stored.
    pub is_default: bool,
    /// Checkbox semantics for boolean kinds (inverted for disable-style flags).
    pub enabled: bool,
    pub supported_platforms: Platform,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FlagValue>,
}

/// Result of an enumeration, partitioned by platform support.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagListing {
    pub supported: Vec<FlagRecord>,
    pub unsupported: Vec<FlagRecord>,
}

impl FlagListing {
    #[must_use]
    pub fn find(&self, internal_name: &str) -> Option<&FlagRecord> {
        self.supported
            .iter()
            .chain(self.unsupported.iter())
            .find(|record| record.internal_name == internal_name)
    }

    #[must_use]
    pub fn is_supported(&self, internal_name: &str) -> bool {
        self.supported.iter().any(|record| record.internal_name == internal_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.supported.len() + self.unsupported.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.supported.is_empty() && self.unsupported.is_empty()
    }
}
