use crate::file::FileFlagsStorage;
use crate::queue::WriteQueue;
use crate::traits::FlagsStorage;
use std::future::Future;
use std::path::PathBuf;
use tracing::{info, warn};
use vexil_domain::FlagAccess;
use vexil_domain::config::StorageSettings;

/// Asynchronous capability check deciding whose store applies.
pub trait OwnershipProbe {
    /// Whether the current actor owns the device.
    fn is_owner(&self) -> impl Future<Output = bool> + Send;
}

/// A probe with a fixed answer; single-user systems and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticProbe(pub bool);

impl OwnershipProbe for StaticProbe {
    async fn is_owner(&self) -> bool {
        self.0
    }
}

/// Backend selected for the current actor, ready for a synchronous engine.
#[derive(Debug)]
pub struct ResolvedBackend {
    pub storage: Box<dyn FlagsStorage + Send>,
    pub access: FlagAccess,
    /// Background writer behind `storage`, if enabled. Flush it at shutdown.
    pub queue: Option<WriteQueue>,
}

/// First phase of startup: probe ownership, then open the matching store.
///
/// The owner gets the system-wide store with [`FlagAccess::Owner`]; everyone
/// else gets the per-session store. Opening happens on the blocking pool and
/// degrades to an empty selection if that pool is unavailable.
pub async fn resolve_backend<P>(probe: &P, settings: &StorageSettings) -> ResolvedBackend
where
    P: OwnershipProbe,
{
    let owner = probe.is_owner().await;
    let (path, access) = if owner {
        (settings.owner_path.clone(), FlagAccess::Owner)
    } else {
        (settings.session_path.clone(), FlagAccess::NonOwner)
    };

    let mut storage = open_file(path.clone()).await;

    let mut queue = None;
    if settings.background_writes {
        match WriteQueue::spawn() {
            Ok(spawned) => {
                storage = storage.with_queue(spawned.clone());
                queue = Some(spawned);
            },
            Err(err) => warn!(error = %err, "Write queue unavailable, committing inline"),
        }
    }

    info!(path = %path.display(), ?access, background = queue.is_some(), "Flags storage backend resolved");
    ResolvedBackend { storage: Box::new(storage), access, queue }
}

async fn open_file(path: PathBuf) -> FileFlagsStorage {
    let fallback = path.clone();
    match tokio::task::spawn_blocking(move || FileFlagsStorage::open(path)).await {
        Ok(storage) => storage,
        Err(err) => {
            warn!(error = %err, "Opening flags storage off-thread failed, opening inline");
            FileFlagsStorage::open(fallback)
        },
    }
}
