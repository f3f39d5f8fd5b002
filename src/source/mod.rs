//! Data source abstraction for PV enumeration, reads, and change subscriptions.
//!
//! This module provides a trait-based abstraction over the external
//! control-system library. The engine only ever talks to a [`SourceClient`];
//! concrete backends adapt whatever transport they have to this contract.

mod memory;
mod replay;
mod scalar;

pub use memory::MemorySource;
pub use replay::{Recording, RecordedEvent, ReplaySource};
pub use scalar::Scalar;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{MonitorError, SourceError};

/// Callback invoked whenever the source pushes a new value for a PV.
///
/// The source may call this from any thread, any number of times, with no
/// ordering guarantee relative to other PVs. `None` means the value could
/// not be read.
pub type UpdateCallback = Arc<dyn Fn(&str, Option<Scalar>) + Send + Sync>;

/// Opaque handle identifying one open subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

/// Trait for talking to a control-system data source.
///
/// # Example
///
/// ```
/// use pvwatch::{MemorySource, Scalar, SourceClient};
///
/// let source = MemorySource::new();
/// source.set("SI-01:Temp-Mon", Some(Scalar::Float(21.5)));
///
/// let names = source.list_all("*").unwrap_or_default();
/// assert_eq!(names, vec!["SI-01:Temp-Mon".to_string()]);
/// assert_eq!(source.read_value("SI-01:Temp-Mon"), Some(Scalar::Float(21.5)));
/// ```
pub trait SourceClient: Send + Sync + Debug {
    /// Whether the underlying connection is currently usable.
    fn is_connected(&self) -> bool;

    /// List every PV name matching a glob-style pattern.
    ///
    /// Returns `None` if the connection is unusable.
    fn list_all(&self, pattern: &str) -> Option<Vec<String>>;

    /// Read the current value of a PV.
    ///
    /// Synchronous. Any failure collapses to `None`; this never errors.
    fn read_value(&self, name: &str) -> Option<Scalar>;

    /// Register a callback for value changes of `name`.
    fn subscribe(
        &self,
        name: &str,
        on_change: UpdateCallback,
    ) -> Result<SubscriptionHandle, SourceError>;

    /// Stop delivering callbacks for a subscription.
    ///
    /// Idempotent: unknown or already-closed handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SourceError>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}

/// Wait for a source to report a connection.
///
/// Polls [`SourceClient::is_connected`] every `poll` until `timeout` has
/// elapsed. There is no retry beyond this single bounded wait.
pub fn connect(
    source: &dyn SourceClient,
    timeout: Duration,
    poll: Duration,
) -> Result<(), MonitorError> {
    let started = Instant::now();
    loop {
        if source.is_connected() {
            return Ok(());
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(MonitorError::NotConnected { timeout });
        }
        std::thread::sleep(poll.min(timeout - elapsed));
    }
}
