//! Open-reader tracking for bulk cleanup.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::Result;
use crate::feature::Feature;

use super::FeatureReader;

type ReaderSlot = Arc<Mutex<Option<Box<dyn FeatureReader>>>>;

/// Registry of the readers a collection has handed out and not yet seen
/// closed.
///
/// Collections wrap every reader they return in a [`TrackedReader`] and keep a
/// weak handle here, so [`close_all`](ReaderRegistry::close_all) can
/// force-close whatever the caller left open. Per-reader close failures are
/// logged and skipped so one broken reader cannot prevent closing the rest.
#[derive(Default)]
pub(crate) struct ReaderRegistry {
    open: Mutex<Vec<Weak<Mutex<Option<Box<dyn FeatureReader>>>>>>,
}

impl ReaderRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wrap a reader and start tracking it.
    pub(crate) fn track(&self, reader: Box<dyn FeatureReader>) -> TrackedReader {
        let slot: ReaderSlot = Arc::new(Mutex::new(Some(reader)));
        let mut open = lock(&self.open);
        open.retain(|weak| weak.strong_count() > 0);
        open.push(Arc::downgrade(&slot));
        TrackedReader { slot }
    }

    /// Number of tracked readers that are still reachable.
    pub(crate) fn open_count(&self) -> usize {
        lock(&self.open)
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Best-effort close of every outstanding reader.
    pub(crate) fn close_all(&self) {
        let handles = std::mem::take(&mut *lock(&self.open));
        for weak in handles {
            let Some(slot) = weak.upgrade() else {
                continue;
            };
            let taken = lock(&slot).take();
            if let Some(mut reader) = taken {
                if let Err(err) = reader.close() {
                    log::warn!("failed to close outstanding feature reader: {err}");
                }
            }
        }
    }
}

/// A reader handle whose underlying reader may be revoked by the owning
/// collection's purge.
///
/// After a close, from either side, `try_next` reports end of stream.
pub(crate) struct TrackedReader {
    slot: ReaderSlot,
}

impl FeatureReader for TrackedReader {
    fn try_next(&mut self) -> Result<Option<Feature>> {
        match lock(&self.slot).as_mut() {
            Some(reader) => reader.try_next(),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        match lock(&self.slot).take() {
            Some(mut reader) => reader.close(),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Readers hold no invariants that a panic mid-call could break.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
