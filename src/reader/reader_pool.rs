use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use parking_lot::Mutex;
use tracing::debug;
use crate::core::error::{IndexError, Result};
use crate::mvcc::snapshot::{Snapshot, SnapshotOrigin};
use crate::reader::snapshot_reader::DirectoryReader;
use crate::writer::index_writer::IndexWriter;

/// Where snapshots come from: the last commit of a directory, or an open
/// writer (near-real-time).
pub enum ReaderSource {
    Directory(Arc<DirectoryReader>),
    Writer(Arc<IndexWriter>),
}

impl ReaderSource {
    pub fn open(&self) -> Result<Snapshot> {
        match self {
            ReaderSource::Directory(reader) => reader.snapshot(),
            ReaderSource::Writer(writer) => writer.snapshot(),
        }
    }

    /// `None` when `current` still reflects the source's data.
    pub fn reopen_if_changed(&self, current: &Snapshot) -> Result<Option<Snapshot>> {
        match self {
            ReaderSource::Directory(reader) => reader.reopen_if_changed(current),
            ReaderSource::Writer(writer) => {
                if current.origin() == SnapshotOrigin::Writer(writer.version()) {
                    Ok(None)
                } else {
                    writer.snapshot().map(Some)
                }
            }
        }
    }

    pub fn is_writer(&self) -> bool {
        matches!(self, ReaderSource::Writer(_))
    }
}

/// One snapshot shared by the manager's cache slot and every lease on it.
///
/// The snapshot is dropped when the reference count reaches zero, or
/// unconditionally by `force_close`.
pub struct ReaderInstance {
    snapshot: Mutex<Option<Arc<Snapshot>>>,
    refs: AtomicUsize,
}

impl ReaderInstance {
    fn new(snapshot: Snapshot) -> Self {
        ReaderInstance {
            snapshot: Mutex::new(Some(Arc::new(snapshot))),
            // The cache slot's own hold.
            refs: AtomicUsize::new(1),
        }
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot.lock().is_none()
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.lock().clone()
    }

    /// Adds a reference unless the instance is already released.
    fn retain(&self) -> bool {
        let mut refs = self.refs.load(Ordering::SeqCst);
        loop {
            if refs == 0 {
                return false;
            }
            match self
                .refs
                .compare_exchange(refs, refs + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => refs = actual,
            }
        }
    }

    fn release(&self) {
        let previous = self
            .refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |refs| refs.checked_sub(1));
        if previous == Ok(1) {
            self.close_snapshot();
        }
    }

    fn force_close(&self) {
        self.refs.store(0, Ordering::SeqCst);
        self.close_snapshot();
    }

    fn close_snapshot(&self) {
        if let Some(snapshot) = self.snapshot.lock().take() {
            debug!(snapshot = snapshot.id(), "reader instance released");
        }
    }
}

/// One reference on a [`ReaderInstance`], released exactly once by `close`
/// or on drop.
pub struct ReaderLease {
    instance: Option<Arc<ReaderInstance>>,
}

impl ReaderLease {
    /// The leased snapshot; fails once the lease or its instance is closed.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.instance
            .as_ref()
            .and_then(|instance| instance.snapshot())
            .ok_or(IndexError::Closed("index reader"))
    }

    pub fn instance(&self) -> Option<&Arc<ReaderInstance>> {
        self.instance.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.instance.is_none()
    }

    pub fn close(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.release();
        }
    }
}

impl Drop for ReaderLease {
    fn drop(&mut self) {
        self.close();
    }
}

/// Caches one reader instance per source and hands out leases on it.
///
/// A new snapshot is only opened when the source reports changed data.
pub struct ReaderManager {
    source: ReaderSource,
    current: Mutex<Option<Arc<ReaderInstance>>>,
    closed: AtomicBool,
}

impl ReaderManager {
    pub fn new(source: ReaderSource) -> Self {
        ReaderManager {
            source,
            current: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &ReaderSource {
        &self.source
    }

    pub fn acquire(&self) -> Result<ReaderLease> {
        let mut current = self.current.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexError::Closed("reader manager"));
        }

        let cached = current
            .as_ref()
            .and_then(|instance| instance.snapshot().map(|snapshot| (Arc::clone(instance), snapshot)));

        let instance = match cached {
            Some((instance, snapshot)) => match self.source.reopen_if_changed(&snapshot)? {
                None => instance,
                Some(fresh) => install(&mut current, fresh),
            },
            None => install(&mut current, self.source.open()?),
        };

        if !instance.retain() {
            return Err(IndexError::Closed("index reader"));
        }
        Ok(ReaderLease {
            instance: Some(instance),
        })
    }

    /// Force-closes the cached instance, whatever leases are outstanding.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(instance) = self.current.lock().take() {
            instance.force_close();
        }
        debug!("reader manager closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ReaderManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn install(slot: &mut Option<Arc<ReaderInstance>>, snapshot: Snapshot) -> Arc<ReaderInstance> {
    let instance = Arc::new(ReaderInstance::new(snapshot));
    if let Some(previous) = slot.replace(Arc::clone(&instance)) {
        previous.release();
    }
    instance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PerFieldAnalyzer;
    use crate::core::config::WriterConfig;
    use crate::core::types::{FieldValue, Record};
    use crate::mvcc::snapshot::SnapshotTracker;
    use crate::storage::layout::StorageLayout;

    fn writer_manager(dir: &std::path::Path) -> (Arc<IndexWriter>, Arc<SnapshotTracker>, ReaderManager) {
        let tracker = SnapshotTracker::new();
        let writer = Arc::new(
            IndexWriter::open(
                StorageLayout::new(dir.to_path_buf()).unwrap(),
                Arc::new(PerFieldAnalyzer::default()),
                WriterConfig::default(),
                Arc::clone(&tracker),
            )
            .unwrap(),
        );
        let manager = ReaderManager::new(ReaderSource::Writer(Arc::clone(&writer)));
        (writer, tracker, manager)
    }

    fn record(id: &str) -> Record {
        Record::new().with("_id", FieldValue::Keyword(id.to_string()))
    }

    #[test]
    fn test_unchanged_source_reuses_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, tracker, manager) = writer_manager(dir.path());
        writer.add_documents(vec![record("a")]).unwrap();

        let first = manager.acquire().unwrap();
        let second = manager.acquire().unwrap();
        assert_eq!(first.snapshot().unwrap().id(), second.snapshot().unwrap().id());
        assert_eq!(tracker.created(), 1);

        writer.add_documents(vec![record("b")]).unwrap();
        let third = manager.acquire().unwrap();
        assert_ne!(first.snapshot().unwrap().id(), third.snapshot().unwrap().id());
        assert_eq!(third.snapshot().unwrap().num_docs(), 2);
    }

    #[test]
    fn test_stale_instance_released_after_last_lease() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, tracker, manager) = writer_manager(dir.path());

        let mut leases: Vec<ReaderLease> = (0..3).map(|_| manager.acquire().unwrap()).collect();
        let stale = Arc::clone(leases[0].instance().unwrap());
        assert_eq!(stale.ref_count(), 4);

        writer.add_documents(vec![record("a")]).unwrap();
        let fresh = manager.acquire().unwrap();
        assert_eq!(stale.ref_count(), 3);
        assert_eq!(tracker.live(), 2);

        leases[0].close();
        leases[0].close();
        leases[1].close();
        assert!(!stale.is_closed());
        assert_eq!(tracker.live(), 2);

        leases[2].close();
        assert!(stale.is_closed());
        assert_eq!(tracker.live(), 1);
        assert!(leases[2].snapshot().is_err());
        drop(fresh);
    }

    #[test]
    fn test_close_forces_release() {
        let dir = tempfile::tempdir().unwrap();
        let (_writer, tracker, manager) = writer_manager(dir.path());
        let lease = manager.acquire().unwrap();
        manager.close();

        assert_eq!(tracker.live(), 0);
        assert!(matches!(lease.snapshot(), Err(IndexError::Closed(_))));
        assert!(matches!(manager.acquire(), Err(IndexError::Closed(_))));
        drop(lease);
    }
}
