//! Flag state engine.
//!
//! # Core Features
//!
//! - **Registry**: an immutable, validated table of [`FlagDefinition`]s shared
//!   by `Arc`, optionally installed process-wide (see [`registry`]).
//! - **Visibility**: [`VisibilityFilter`] hides expired, channel gated, policy
//!   carrying and capability gated definitions from listings.
//! - **Bookkeeping**: [`FlagsState`] reads and writes selections through any
//!   [`vexil_storage::FlagsStorage`] and tracks whether a restart is needed.
//! - **Materialization**: the selection becomes switches and
//!   `--enable-features` / `--disable-features` entries on a [`CommandLine`].
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use vexil_domain::{BuildInfo, FlagDefinition, FlagKind, Platform, SwitchSpec};
//! use vexil_engine::{CommandLine, FlagsState, Registry};
//! use vexil_storage::MemoryFlagsStorage;
//!
//! let registry = Registry::new(vec![FlagDefinition::new(
//!     "x",
//!     Platform::all(),
//!     FlagKind::Single { switch: SwitchSpec::new("x") },
//! )])
//! .unwrap();
//!
//! let mut state = FlagsState::new(Arc::new(registry), BuildInfo::default());
//! let mut storage = MemoryFlagsStorage::new();
//! state.set_entry_enabled(&mut storage, "x", true);
//!
//! let resolved = state.materialize(&mut storage, &CommandLine::new("browser"));
//! assert_eq!(resolved.switch_strings(), ["--x"]);
//! assert!(state.is_restart_needed());
//! ```
//!
//! [`FlagDefinition`]: vexil_domain::FlagDefinition

pub mod command_line;
mod error;
pub mod filter;
pub mod materialize;
pub mod origin;
pub mod registry;
pub mod state;
pub mod variations;

pub use command_line::{CommandLine, SWITCH_PREFIX};
pub use error::{RegistryError, RegistryErrorExt};
pub use filter::{SkipReason, VisibilityFilter};
pub use materialize::{MaterializeContext, ResolvedSwitchSet, materialize};
pub use registry::{Registry, RegistryDocument, RegistryOverride};
pub use state::{FLAG_SWITCHES_BEGIN, FLAG_SWITCHES_END, FlagsState, SentinelsMode, SwitchesAndFeatures};
pub use variations::{FeatureRuntime, FieldTrials, USER_FLAGS_TRIAL_GROUP};
