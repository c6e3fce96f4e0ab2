//! Visibility and expiry predicate.
//!
//! Evaluated on every call; nothing is cached, so a build change through
//! [`VisibilityFilter::set_build`] takes effect immediately.

use crate::registry::unexpire_flag_name;
use fxhash::FxHashMap;
use std::collections::BTreeSet;
use tracing::trace;
use vexil_domain::{BuildInfo, FlagDefinition, RuleTarget, SkipCondition, VisibilityRule};
use vexil_storage::FlagsStorage;

/// Why a definition is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Expired,
    Channel,
    PolicyCarrier,
    MissingCapability,
}

/// Pure predicate deciding whether a definition is hidden for the current build.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFilter {
    build: BuildInfo,
    by_name: FxHashMap<String, Vec<SkipCondition>>,
    by_tag: FxHashMap<String, Vec<SkipCondition>>,
}

impl VisibilityFilter {
    #[must_use]
    pub fn new(build: BuildInfo, rules: &[VisibilityRule]) -> Self {
        let mut by_name: FxHashMap<String, Vec<SkipCondition>> = FxHashMap::default();
        let mut by_tag: FxHashMap<String, Vec<SkipCondition>> = FxHashMap::default();
        for rule in rules {
            let slot = match &rule.target {
                RuleTarget::Name(name) => by_name.entry(name.clone()).or_default(),
                RuleTarget::Tag(tag) => by_tag.entry(tag.clone()).or_default(),
            };
            slot.push(rule.condition.clone());
        }
        Self { build, by_name, by_tag }
    }

    #[must_use]
    pub const fn build(&self) -> &BuildInfo {
        &self.build
    }

    pub fn set_build(&mut self, build: BuildInfo) {
        self.build = build;
    }

    /// Whether `definition` is hidden, reading unexpire overrides from `storage`.
    #[must_use]
    pub fn should_skip(&self, definition: &FlagDefinition, storage: &dyn FlagsStorage) -> bool {
        self.skip_reason(definition, &storage.flags()).is_some()
    }

    /// First matching reason in priority order: expiry, channel, policy
    /// carrier, capability.
    #[must_use]
    pub fn skip_reason(
        &self,
        definition: &FlagDefinition,
        stored: &BTreeSet<String>,
    ) -> Option<SkipReason> {
        if self.is_expired(definition, stored) {
            return Some(SkipReason::Expired);
        }

        let mut conditions = self.conditions_for(definition);
        conditions.sort_by_key(|c| c.priority());

        let reason = conditions
            .into_iter()
            .filter(|c| !(self.build.show_all && c.bypassed_by_show_all()))
            .find_map(|c| self.evaluate(c));

        if let Some(reason) = reason {
            trace!(flag = %definition.internal_name, ?reason, "Flag hidden");
        }
        reason
    }

    /// Explicit expiry, honouring the unexpire escape hatch for the current and
    /// previous milestone.
    #[must_use]
    pub fn is_expired(&self, definition: &FlagDefinition, stored: &BTreeSet<String>) -> bool {
        let Some(expiry) = definition.expiry_milestone else {
            return false;
        };
        let current = self.build.milestone;
        if current == 0 || expiry >= current {
            return false;
        }

        let revived_by = expiry + 1;
        let in_window = revived_by == current || revived_by + 1 == current;
        !(in_window && stored.contains(&unexpire_flag_name(revived_by)))
    }

    fn conditions_for<'a>(&'a self, definition: &FlagDefinition) -> Vec<&'a SkipCondition> {
        let named = self.by_name.get(&definition.internal_name).into_iter().flatten();
        let tagged = definition
            .tags
            .iter()
            .filter_map(|tag| self.by_tag.get(tag))
            .flatten();
        named.chain(tagged).collect()
    }

    fn evaluate(&self, condition: &SkipCondition) -> Option<SkipReason> {
        let hidden = match condition {
            SkipCondition::PreStableOnly => !self.build.channel.is_pre_stable(),
            SkipCondition::MaxChannel { channel } => self.build.channel > *channel,
            SkipCondition::PolicyCarrier => true,
            SkipCondition::RequiresCapability { capability } => {
                !self.build.has_capability(capability)
            },
        };
        hidden.then_some(match condition {
            SkipCondition::PreStableOnly | SkipCondition::MaxChannel { .. } => SkipReason::Channel,
            SkipCondition::PolicyCarrier => SkipReason::PolicyCarrier,
            SkipCondition::RequiresCapability { .. } => SkipReason::MissingCapability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexil_domain::{Channel, FlagKind, Platform, SwitchSpec};
    use vexil_storage::MemoryFlagsStorage;

    fn def(name: &str) -> FlagDefinition {
        FlagDefinition::new(name, Platform::all(), FlagKind::Single { switch: SwitchSpec::new(name) })
    }

    fn build(milestone: u32, channel: Channel) -> BuildInfo {
        BuildInfo { milestone, channel, ..BuildInfo::default() }
    }

    #[test]
    fn expired_definitions_are_skipped() {
        let filter = VisibilityFilter::new(build(110, Channel::Stable), &[]);
        let storage = MemoryFlagsStorage::new();
        assert!(filter.should_skip(&def("z").expires_after(100), &storage));
        assert!(!filter.should_skip(&def("z").expires_after(110), &storage));
        assert!(!filter.should_skip(&def("z"), &storage));
    }

    #[test]
    fn unknown_milestone_expires_nothing() {
        let filter = VisibilityFilter::new(build(0, Channel::Stable), &[]);
        assert!(!filter.should_skip(&def("z").expires_after(1), &MemoryFlagsStorage::new()));
    }

    #[test]
    fn unexpire_flag_revives_only_within_window() {
        let filter = VisibilityFilter::new(build(110, Channel::Stable), &[]);
        let revived = MemoryFlagsStorage::with_flags(["temporary-unexpire-flags-m110"]);
        assert!(!filter.should_skip(&def("z").expires_after(109), &revived));
        assert!(filter.should_skip(&def("z").expires_after(108), &revived));

        let previous = MemoryFlagsStorage::with_flags(["temporary-unexpire-flags-m109"]);
        assert!(!filter.should_skip(&def("z").expires_after(108), &previous));

        let stale = MemoryFlagsStorage::with_flags(["temporary-unexpire-flags-m100"]);
        assert!(filter.should_skip(&def("z").expires_after(99), &stale));
    }

    #[test]
    fn channel_rules_respect_show_all() {
        let rules = [
            VisibilityRule::for_name("canary-only", SkipCondition::MaxChannel { channel: Channel::Canary }),
            VisibilityRule::for_tag("prestable", SkipCondition::PreStableOnly),
        ];
        let mut filter = VisibilityFilter::new(build(100, Channel::Stable), &rules);
        let storage = MemoryFlagsStorage::new();

        assert!(filter.should_skip(&def("canary-only"), &storage));
        assert!(filter.should_skip(&def("t").tag("prestable"), &storage));

        filter.set_build(BuildInfo { show_all: true, ..build(100, Channel::Stable) });
        assert!(!filter.should_skip(&def("canary-only"), &storage));

        filter.set_build(build(100, Channel::Beta));
        assert!(filter.should_skip(&def("canary-only"), &storage));
        assert!(!filter.should_skip(&def("t").tag("prestable"), &storage));
    }

    #[test]
    fn policy_carriers_are_always_skipped() {
        let rules = [VisibilityRule::for_tag("policy", SkipCondition::PolicyCarrier)];
        let filter = VisibilityFilter::new(
            BuildInfo { show_all: true, ..build(100, Channel::Canary) },
            &rules,
        );
        let reason = filter.skip_reason(&def("p").tag("policy"), &BTreeSet::new());
        assert_eq!(reason, Some(SkipReason::PolicyCarrier));
    }

    #[test]
    fn capability_gating() {
        let rules = [VisibilityRule::for_name(
            "gpu",
            SkipCondition::RequiresCapability { capability: "webgpu".into() },
        )];
        let mut filter = VisibilityFilter::new(build(100, Channel::Stable), &rules);
        assert_eq!(
            filter.skip_reason(&def("gpu"), &BTreeSet::new()),
            Some(SkipReason::MissingCapability)
        );

        let mut with_gpu = build(100, Channel::Stable);
        with_gpu.capabilities.insert("webgpu".into());
        filter.set_build(with_gpu);
        assert_eq!(filter.skip_reason(&def("gpu"), &BTreeSet::new()), None);
    }

    #[test]
    fn expiry_outranks_other_reasons() {
        let rules = [VisibilityRule::for_name("z", SkipCondition::PolicyCarrier)];
        let filter = VisibilityFilter::new(build(110, Channel::Stable), &rules);
        assert_eq!(
            filter.skip_reason(&def("z").expires_after(100), &BTreeSet::new()),
            Some(SkipReason::Expired)
        );
    }
}
