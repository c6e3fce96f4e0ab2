use crate::error::StorageError;
use crate::file::write_atomic;
use std::path::PathBuf;
use std::sync::mpsc as ack;
use std::thread;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Job {
    Write { path: PathBuf, bytes: Vec<u8> },
    Flush(ack::SyncSender<()>),
}

/// Fire-and-forget background writer.
///
/// Snapshots are queued on an unbounded channel and written in order by a
/// dedicated thread. Later snapshots for the same path simply overwrite
/// earlier ones. Cloning shares the same writer.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    tx: UnboundedSender<Job>,
}

impl WriteQueue {
    /// Spawns the writer thread.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if the thread cannot be spawned.
    pub fn spawn() -> Result<Self, StorageError> {
        let (tx, rx) = unbounded_channel();
        thread::Builder::new()
            .name("vexil-flags-writer".to_owned())
            .spawn(move || drain(rx))
            .map_err(|source| StorageError::Io {
                source,
                context: Some("Spawning flags writer".into()),
            })?;
        info!("Flags write queue started");
        Ok(Self { tx })
    }

    pub(crate) fn enqueue(&self, path: PathBuf, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.tx.send(Job::Write { path, bytes }).map_err(|_| StorageError::QueueClosed {
            message: "writer thread is gone".into(),
            context: None,
        })
    }

    /// Blocks until every snapshot queued before this call is on disk.
    ///
    /// Safe to call from inside an async runtime; it parks only the calling thread.
    pub fn flush(&self) {
        let (done_tx, done_rx) = ack::sync_channel(1);
        if self.tx.send(Job::Flush(done_tx)).is_err() {
            warn!("Flags writer is gone, nothing to flush");
            return;
        }
        if done_rx.recv().is_err() {
            warn!("Flags writer stopped before flushing");
        }
    }
}

fn drain(mut rx: UnboundedReceiver<Job>) {
    while let Some(job) = rx.blocking_recv() {
        match job {
            Job::Write { path, bytes } => {
                if let Err(err) = write_atomic(&path, &bytes) {
                    warn!(path = %path.display(), error = %err, "Background flags write dropped");
                }
            },
            Job::Flush(done) => {
                let _ = done.send(());
            },
        }
    }
    debug!("Flags write queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_waits_for_queued_writes() {
        let dir = tempfile::tempdir().unwrap();
        let queue = WriteQueue::spawn().unwrap();
        let target = dir.path().join("queued.json");

        queue.enqueue(target.clone(), b"1".to_vec()).unwrap();
        queue.enqueue(target.clone(), b"2".to_vec()).unwrap();
        queue.flush();

        assert_eq!(std::fs::read(&target).unwrap(), b"2");
    }
}
