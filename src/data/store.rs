//! Thread-safe storage for per-PV histories.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::history::{History, Sample};
use crate::source::Scalar;

/// Owns the [`History`] of every monitored PV.
///
/// Each history sits behind its own lock, so a subscription callback
/// appending to one PV never waits on a check cycle reading another. A
/// read observes a history either entirely before or entirely after a
/// concurrent append.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: RwLock<BTreeMap<String, Arc<Mutex<History>>>>,
    limit: Option<usize>,
}

impl HistoryStore {
    /// Create a store whose histories grow without bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose histories keep at most `limit` samples.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            limit,
        }
    }

    fn get_or_create(&self, name: &str) -> Arc<Mutex<History>> {
        // Fast path
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(name) {
                return entry.clone();
            }
        }

        // Slow path
        let limit = self.limit;
        let mut entries = self.entries.write();
        entries
            .entry(name.to_string())
            .or_insert_with(|| {
                let history = match limit {
                    Some(limit) => History::bounded(limit),
                    None => History::new(),
                };
                Arc::new(Mutex::new(history))
            })
            .clone()
    }

    /// Record the synchronous initial read of a PV.
    ///
    /// Called before the PV's subscription is opened, so the history
    /// exists before any callback can fire.
    pub fn bootstrap(&self, name: &str, value: Option<Scalar>) {
        self.get_or_create(name).lock().push(Sample::new(value));
    }

    /// Append a value pushed by a subscription callback.
    ///
    /// Only PVs with a bootstrapped history are recorded. Updates for any
    /// other PV, such as a callback landing after [`HistoryStore::clear`],
    /// are dropped.
    pub fn record(&self, name: &str, value: Option<Scalar>) {
        let Some(entry) = self.entries.read().get(name).cloned() else {
            debug!(pv = name, "dropping update for PV without a history");
            return;
        };
        entry.lock().push(Sample::new(value));
    }

    /// Run `f` against a PV's history while holding its lock.
    ///
    /// Returns `None` if the PV has no history.
    pub fn inspect<R>(&self, name: &str, f: impl FnOnce(&History) -> R) -> Option<R> {
        let entry = self.entries.read().get(name).cloned()?;
        let history = entry.lock();
        Some(f(&history))
    }

    /// Copy a PV's history.
    pub fn snapshot(&self, name: &str) -> Option<History> {
        self.inspect(name, History::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Names of every PV with a history, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every history.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
