//! Durable storage for flag selections.
//!
//! # Core Features
//!
//! - **Contract**: [`FlagsStorage`] is synchronous and infallible towards its
//!   caller. Unreachable backends read as empty and drop writes, logging why.
//! - **Atomic Writes**: [`FileFlagsStorage`] uses the atomic swap pattern
//!   (unique temp write + `fsync` + `rename`), so a crash never leaves a
//!   half-written document.
//! - **Self-Healing**: orphaned temp files from crashed writers are removed when
//!   a file backend is opened.
//! - **Background Writes**: [`WriteQueue`] hands snapshots to a dedicated thread;
//!   durability is awaited only by [`WriteQueue::flush`] and when a queued
//!   [`FileFlagsStorage`] is dropped.
//! - **Backend Resolution**: [`resolve_backend`] picks the owner-wide or
//!   per-session store after an async [`OwnershipProbe`].
//!
//! # Examples
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use vexil_storage::{FileFlagsStorage, FlagsStorage};
//!
//! # let tmp = tempfile::tempdir().unwrap();
//! # let path = tmp.path().join("session.json");
//! let mut storage = FileFlagsStorage::open(&path);
//! storage.set_flags(BTreeSet::from(["smooth-scrolling".to_owned()]));
//! storage.commit_pending_writes();
//!
//! let reopened = FileFlagsStorage::open(&path);
//! assert!(reopened.flags().contains("smooth-scrolling"));
//! ```

mod error;
mod file;
mod maintenance;
mod memory;
mod queue;
mod resolve;
mod selection;
mod traits;

pub use error::{StorageError, StorageErrorExt};
pub use file::{FileFlagsStorage, load_selection, write_atomic};
pub use memory::MemoryFlagsStorage;
pub use queue::WriteQueue;
pub use resolve::{OwnershipProbe, ResolvedBackend, StaticProbe, resolve_backend};
pub use selection::FlagSelection;
pub use traits::FlagsStorage;
