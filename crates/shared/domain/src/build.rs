use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Release channel, ordered from least to most stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Local or unbranded builds.
    Unknown,
    Canary,
    Dev,
    Beta,
    #[default]
    Stable,
}

impl Channel {
    #[must_use]
    pub const fn is_pre_stable(self) -> bool {
        !matches!(self, Self::Stable)
    }
}

/// Who is looking at (or writing) the flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagAccess {
    /// The device owner on a multi-user system; may toggle owner-only flags.
    Owner,
    #[default]
    NonOwner,
}

/// Facts about the running build that visibility and expiry depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInfo {
    /// Major version of the running build. `0` means unknown: nothing expires.
    pub milestone: u32,
    pub channel: Channel,
    pub platform: Platform,
    /// Companion capabilities present at runtime (hardware, OS features).
    pub capabilities: BTreeSet<String>,
    /// Debug "show all" view: bypasses channel and capability gating.
    pub show_all: bool,
    /// Global kill switch: materialize nothing.
    pub ignore_experiments: bool,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            milestone: 0,
            channel: Channel::default(),
            platform: Platform::current(),
            capabilities: BTreeSet::new(),
            show_all: false,
            ignore_experiments: false,
        }
    }
}

impl BuildInfo {
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
