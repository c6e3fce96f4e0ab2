//! # Domain Models
//!
//! Pure flag types with minimal dependencies (`serde`, `bitflags`).
//! Keep it lean: no I/O and no engine logic, just the definition table shapes,
//! build information, visibility rules, configuration, and the records handed
//! to a presentation layer.

pub mod build;
pub mod config;
pub mod definition;
pub mod listing;
pub mod platform;
pub mod rules;

pub use build::{BuildInfo, Channel, FlagAccess};
pub use definition::{
    Choice, FeatureState, FlagDefinition, FlagKind, OPTION_SEPARATOR, SwitchSpec, Variation,
    VariationParam, split_option_name,
};
pub use listing::{FlagListing, FlagRecord, FlagState, FlagValue, OptionRecord};
pub use platform::Platform;
pub use rules::{RuleTarget, SkipCondition, VisibilityRule};
