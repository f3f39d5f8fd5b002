//! In-memory data source.
//!
//! Holds a PV catalog in memory and pushes updates to subscribers as
//! values are set. Useful for tests and as the backing store for replays.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use glob::Pattern;
use parking_lot::RwLock;
use tracing::warn;

use super::{Scalar, SourceClient, SubscriptionHandle, UpdateCallback};
use crate::error::SourceError;

/// A data source backed by an in-memory catalog.
///
/// Values set through [`MemorySource::set`] are delivered to every
/// subscriber of that PV on the caller's thread, which makes it easy to
/// simulate callbacks arriving from threads the engine does not own.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pvwatch::{MemorySource, Scalar, SourceClient};
///
/// let source = MemorySource::new();
/// source.set("BO-01:Current-Mon", Some(Scalar::Float(1.0)));
///
/// let handle = source
///     .subscribe("BO-01:Current-Mon", Arc::new(|name: &str, value: Option<Scalar>| {
///         println!("{} -> {:?}", name, value);
///     }))
///     .unwrap();
///
/// source.set("BO-01:Current-Mon", Some(Scalar::Float(1.1)));
/// source.unsubscribe(handle).unwrap();
/// ```
#[derive(Debug)]
pub struct MemorySource {
    connected: AtomicBool,
    values: RwLock<BTreeMap<String, Option<Scalar>>>,
    subscriptions: RwLock<BTreeMap<SubscriptionHandle, Subscription>>,
    next_handle: AtomicU64,
    description: String,
}

struct Subscription {
    pv: String,
    callback: UpdateCallback,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("pv", &self.pv).finish()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    /// Create a new, connected source with an empty catalog.
    pub fn new() -> Self {
        Self::with_description("memory")
    }

    /// Create a new source with a custom description.
    pub fn with_description(description: &str) -> Self {
        Self {
            connected: AtomicBool::new(true),
            values: RwLock::new(BTreeMap::new()),
            subscriptions: RwLock::new(BTreeMap::new()),
            next_handle: AtomicU64::new(1),
            description: description.to_string(),
        }
    }

    /// Set the connection flag reported by [`SourceClient::is_connected`].
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Add a PV to the catalog without notifying subscribers.
    pub fn insert(&self, name: &str, value: Option<Scalar>) {
        self.values.write().insert(name.to_string(), value);
    }

    /// Set a PV's value and push it to every subscriber of that PV.
    ///
    /// Unknown PVs are added to the catalog.
    pub fn set(&self, name: &str, value: Option<Scalar>) {
        self.values.write().insert(name.to_string(), value.clone());

        // Callbacks run outside the lock so they may call back into the source
        let callbacks: Vec<UpdateCallback> = self
            .subscriptions
            .read()
            .values()
            .filter(|s| s.pv == name)
            .map(|s| s.callback.clone())
            .collect();

        for callback in callbacks {
            callback(name, value.clone());
        }
    }

    /// Push an unavailable value for a PV.
    pub fn disconnect_pv(&self, name: &str) {
        self.set(name, None);
    }

    /// Remove a PV from the catalog. Reads return `None` afterwards.
    pub fn remove(&self, name: &str) {
        self.values.write().remove(name);
    }

    /// Number of open subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl SourceClient for MemorySource {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn list_all(&self, pattern: &str) -> Option<Vec<String>> {
        if !self.is_connected() {
            return None;
        }
        let pattern = match Pattern::new(pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(pattern, error = %e, "invalid PV name pattern");
                return Some(Vec::new());
            }
        };
        Some(
            self.values
                .read()
                .keys()
                .filter(|name| pattern.matches(name))
                .cloned()
                .collect(),
        )
    }

    fn read_value(&self, name: &str) -> Option<Scalar> {
        if !self.is_connected() {
            return None;
        }
        self.values.read().get(name).cloned().flatten()
    }

    fn subscribe(
        &self,
        name: &str,
        on_change: UpdateCallback,
    ) -> Result<SubscriptionHandle, SourceError> {
        if !self.is_connected() {
            return Err(SourceError::Disconnected);
        }
        if !self.values.read().contains_key(name) {
            return Err(SourceError::UnknownPv(name.to_string()));
        }

        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().insert(
            handle,
            Subscription {
                pv: name.to_string(),
                callback: on_change,
            },
        );
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SourceError> {
        self.subscriptions.write().remove(&handle);
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
