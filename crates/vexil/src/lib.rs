//! Facade crate for the flag engine.
//! Re-exports the domain, kernel, engine and storage crates and composes them
//! into a [`Session`].
//! Keep this crate thin: it should compose other crates, not implement flag logic.
//!
//! ## Usage
//! - Load a [`domain::config::VexilConfig`] with [`kernel::config::load_config`].
//! - Build or load a [`engine::Registry`].
//! - `Session::open(config, registry, &probe).await` resolves storage for the
//!   current actor and builds the engine over it.

mod session;

pub use session::Session;
pub use vexil_domain as domain;
pub use vexil_engine as engine;
pub use vexil_kernel as kernel;
pub use vexil_storage as storage;
#[cfg(feature = "usage")]
pub use vexil_usage as usage;
