use crate::build::Channel;
use serde::{Deserialize, Serialize};

/// What a visibility rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    /// A single definition, by internal name.
    Name(String),
    /// Every definition carrying the category tag.
    Tag(String),
}

/// Condition under which a targeted definition is hidden.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum SkipCondition {
    /// Hidden on the stable channel.
    PreStableOnly,
    /// Hidden on channels more stable than `channel`.
    MaxChannel { channel: Channel },
    /// Transports an administrator policy value; never user visible.
    PolicyCarrier,
    /// Hidden unless the build reports the companion capability.
    RequiresCapability { capability: String },
}

impl SkipCondition {
    /// Evaluation order: lower runs first.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::PreStableOnly | Self::MaxChannel { .. } => 1,
            Self::PolicyCarrier => 2,
            Self::RequiresCapability { .. } => 3,
        }
    }

    /// Whether the debug "show all" view overrides this condition.
    #[must_use]
    pub const fn bypassed_by_show_all(&self) -> bool {
        !matches!(self, Self::PolicyCarrier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub target: RuleTarget,
    pub condition: SkipCondition,
}

impl VisibilityRule {
    pub fn for_name(name: impl Into<String>, condition: SkipCondition) -> Self {
        Self { target: RuleTarget::Name(name.into()), condition }
    }

    pub fn for_tag(tag: impl Into<String>, condition: SkipCondition) -> Self {
        Self { target: RuleTarget::Tag(tag.into()), condition }
    }
}
