use std::fs::{self, DirEntry};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Marker embedded in temp file names: `session.json.vexiltmp.<pid>.<n>`.
pub(crate) const TMP_MARKER: &str = ".vexiltmp.";

/// Age after which a temp file is considered abandoned by a crashed writer.
const STALE_AFTER: Duration = Duration::from_secs(300);

/// Removes orphaned temp files that belong to `target` from its directory.
/// Returns the number of files removed.
pub(crate) fn purge_tmp(target: &Path) -> usize {
    purge_tmp_older_than(target, STALE_AFTER)
}

pub(crate) fn purge_tmp_older_than(target: &Path, threshold: Duration) -> usize {
    let Some(dir) = target.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return purge_in(Path::new("."), target, threshold);
    };
    purge_in(dir, target, threshold)
}

fn purge_in(dir: &Path, target: &Path, threshold: Duration) -> usize {
    let Some(prefix) = target.file_name().and_then(|n| n.to_str()).map(|n| format!("{n}{TMP_MARKER}"))
    else {
        return 0;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let now = SystemTime::now();
    let mut removed = 0;
    let mut failed = 0;

    for entry in entries.flatten() {
        if !is_tmp(&entry, &prefix) || !is_stale(&entry, now, threshold) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove temp file");
                failed += 1;
            },
        }
    }

    if removed > 0 || failed > 0 {
        info!(removed, failed, dir = %dir.display(), "Cleaned up temporary files");
    }
    removed
}

fn is_tmp(entry: &DirEntry, prefix: &str) -> bool {
    entry.file_type().is_ok_and(|t| t.is_file())
        && entry.file_name().to_str().is_some_and(|name| name.starts_with(prefix))
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_only_matching_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("session.json");
        fs::write(dir.path().join("session.json.vexiltmp.1.0"), b"{").unwrap();
        fs::write(dir.path().join("owner.json.vexiltmp.1.0"), b"{").unwrap();
        fs::write(&target, b"{}").unwrap();

        assert_eq!(purge_tmp_older_than(&target, Duration::ZERO), 1);
        assert!(target.exists());
        assert!(dir.path().join("owner.json.vexiltmp.1.0").exists());
    }

    #[test]
    fn fresh_temp_files_survive_default_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("session.json");
        fs::write(dir.path().join("session.json.vexiltmp.1.0"), b"{").unwrap();

        assert_eq!(purge_tmp(&target), 0);
    }
}
