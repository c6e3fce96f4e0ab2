//! Kernel utilities shared across binaries.
//! Keep this crate lightweight; it re-exports the domain and owns configuration loading.
//!
//! ## Config loading
//! ```rust,no_run
//! use vexil_kernel::config::load_config;
//! use vexil_kernel::domain::config::VexilConfig;
//!
//! let cfg: VexilConfig = load_config(Some("vexil.toml")).unwrap_or_default();
//! assert!(cfg.command_line.sentinels);
//! ```
pub mod config;

pub use vexil_domain as domain;
