//! JSON file backend with atomic writes.

use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance::{self, TMP_MARKER};
use crate::queue::WriteQueue;
use crate::selection::FlagSelection;
use crate::traits::FlagsStorage;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Selections persisted as a JSON document on disk.
///
/// Opening never fails: a missing file is an empty selection and a corrupt one
/// is logged and treated as empty. Commits either write inline or hand a
/// snapshot to a [`WriteQueue`]. Dropping the storage commits and, with a
/// queue, waits until the snapshot is on disk.
#[derive(Debug)]
pub struct FileFlagsStorage {
    path: PathBuf,
    selection: FlagSelection,
    dirty: bool,
    queue: Option<WriteQueue>,
}

impl FileFlagsStorage {
    /// Cold, synchronous read of `path`. Purges temp files left behind by
    /// crashed writers first.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        maintenance::purge_tmp(&path);

        let selection = match load_selection(&path) {
            Ok(selection) => selection,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Flags storage unreadable, starting empty");
                FlagSelection::default()
            },
        };

        debug!(path = %path.display(), flags = selection.flags.len(), "Flags storage opened");
        Self { path, selection, dirty: false, queue: None }
    }

    /// Routes commits through a background writer.
    #[must_use]
    pub fn with_queue(mut self, queue: WriteQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub const fn queue(&self) -> Option<&WriteQueue> {
        self.queue.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn selection(&self) -> &FlagSelection {
        &self.selection
    }

    fn persist(&self) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(&self.selection).context("Serializing flags")?;
        match &self.queue {
            Some(queue) => queue.enqueue(self.path.clone(), bytes),
            None => write_atomic(&self.path, &bytes),
        }
    }
}

impl FlagsStorage for FileFlagsStorage {
    fn flags(&self) -> BTreeSet<String> {
        self.selection.flags.clone()
    }

    fn set_flags(&mut self, flags: BTreeSet<String>) {
        self.dirty |= self.selection.replace_flags(flags);
    }

    fn string_flag(&self, internal_name: &str) -> String {
        self.selection.strings.get(internal_name).cloned().unwrap_or_default()
    }

    fn set_string_flag(&mut self, internal_name: &str, value: &str) {
        self.dirty |= self.selection.put_string(internal_name, value);
    }

    fn origin_list_flag(&self, internal_name: &str) -> String {
        self.selection.origin_lists.get(internal_name).cloned().unwrap_or_default()
    }

    fn set_origin_list_flag(&mut self, internal_name: &str, value: &str) {
        self.dirty |= self.selection.put_origin_list(internal_name, value);
    }

    fn value_names(&self) -> BTreeSet<String> {
        self.selection.value_names()
    }

    fn clear_value(&mut self, internal_name: &str) {
        self.dirty |= self.selection.clear_value(internal_name);
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn commit_pending_writes(&mut self) {
        if !self.dirty {
            return;
        }
        // Dropped writes stay dropped; the in-memory copy remains authoritative.
        self.dirty = false;
        if let Err(err) = self.persist() {
            warn!(path = %self.path.display(), error = %err, "Dropping flags write");
        }
    }
}

impl Drop for FileFlagsStorage {
    fn drop(&mut self) {
        self.commit_pending_writes();
        if let Some(queue) = &self.queue {
            queue.flush();
        }
    }
}

/// Reads a selection document. A missing file is an empty selection.
///
/// # Errors
/// * [`StorageError::Io`] if the file exists but cannot be read.
/// * [`StorageError::Json`] if its content is not a selection document.
pub fn load_selection(path: &Path) -> Result<FlagSelection, StorageError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FlagSelection::default());
        },
        Err(err) => {
            return Err(StorageError::Io {
                source: err,
                context: Some(format!("Read failed: {}", path.display()).into()),
            });
        },
    };
    serde_json::from_slice(&bytes).context(format!("Parsing {}", path.display()))
}

/// Writes `data` to `target` using the atomic swap pattern:
/// unique temp file, `fsync`, then `rename` over the target.
///
/// # Errors
/// Returns [`StorageError::Io`] if any step fails; the target is left untouched.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory {}", parent.display()))?;
    }

    let temp = unique_tmp_path(target);
    {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp)
            .context(format!("Temp creation failed: {}", temp.display()))?;
        file.write_all(data).context("Write failed")?;
        file.sync_all().context("Hardware sync failed")?;
    }

    if let Err(err) = fs::rename(&temp, target) {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            fs::remove_file(target)
                .context(format!("Failed to replace existing file: {}", target.display()))?;
            fs::rename(&temp, target).context(format!(
                "Atomic swap failed: {} -> {}",
                temp.display(),
                target.display()
            ))?;
        } else {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::Io {
                source: err,
                context: Some(
                    format!("Atomic swap failed: {} -> {}", temp.display(), target.display()).into(),
                ),
            });
        }
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        sync_dir(parent);
    }

    debug!(path = %target.display(), "Flags saved atomically");
    Ok(())
}

fn sync_dir(path: &Path) {
    match fs::File::open(path) {
        Ok(dir) => {
            if let Err(err) = dir.sync_all() {
                debug!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

fn unique_tmp_path(target: &Path) -> PathBuf {
    let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("flags");
    target.with_file_name(format!("{file_name}{TMP_MARKER}{}.{counter}", std::process::id()))
}
