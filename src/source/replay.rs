//! Recording-based data source.
//!
//! Loads a JSON recording of PV values and replays its value changes
//! from a background thread, the way a live source would push them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MemorySource, Scalar, SourceClient, SubscriptionHandle, UpdateCallback};
use crate::error::{MonitorError, SourceError};

/// A recorded value change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Offset from the start of the replay, in milliseconds.
    pub at_ms: u64,
    pub pv: String,
    /// `null` records the PV becoming unavailable.
    #[serde(default)]
    pub value: Option<Scalar>,
}

/// A recording of a PV catalog and its value changes.
///
/// ```json
/// {
///   "pvs": { "SI-01:Temp-Mon": 21.5, "SI-02:Temp-Mon": null },
///   "events": [ { "at_ms": 500, "pv": "SI-01:Temp-Mon", "value": 21.7 } ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Initial value for every PV in the catalog.
    pub pvs: BTreeMap<String, Option<Scalar>>,
    #[serde(default)]
    pub events: Vec<RecordedEvent>,
}

impl Recording {
    /// Parse a recording from a JSON string.
    pub fn parse(content: &str) -> Result<Self, MonitorError> {
        serde_json::from_str(content).map_err(|e| MonitorError::Replay(e.to_string()))
    }

    /// Load a recording from a JSON file.
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// A data source that replays a [`Recording`].
///
/// The catalog is available as soon as the source is created; value
/// changes only start flowing once [`ReplaySource::start_replay`] is called.
#[derive(Debug)]
pub struct ReplaySource {
    inner: Arc<MemorySource>,
    events: Vec<RecordedEvent>,
    cancelled: Arc<AtomicBool>,
}

impl ReplaySource {
    /// Create a replay source from an in-memory recording.
    pub fn new(recording: Recording, description: &str) -> Self {
        let inner = MemorySource::with_description(&format!("replay: {}", description));
        for (name, value) in recording.pvs {
            inner.insert(&name, value);
        }

        let mut events = recording.events;
        events.sort_by_key(|e| e.at_ms);

        Self {
            inner: Arc::new(inner),
            events,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load a replay source from a JSON recording file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let recording = Recording::load(path)?;
        Ok(Self::new(recording, &path.display().to_string()))
    }

    /// Number of recorded value changes.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Start pushing recorded events from a background thread.
    ///
    /// Each event is delivered at its offset from the moment this is called.
    pub fn start_replay(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let events = self.events.clone();
        let cancelled = self.cancelled.clone();

        std::thread::spawn(move || {
            let started = Instant::now();
            for event in events {
                let due = Duration::from_millis(event.at_ms);
                while started.elapsed() < due {
                    if cancelled.load(Ordering::Relaxed) {
                        return;
                    }
                    let remaining = due.saturating_sub(started.elapsed());
                    std::thread::sleep(remaining.min(Duration::from_millis(50)));
                }
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                debug!(pv = %event.pv, "replaying value change");
                inner.set(&event.pv, event.value);
            }
        })
    }

    /// Stop a running replay. Events not yet delivered are dropped.
    pub fn stop_replay(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl SourceClient for ReplaySource {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn list_all(&self, pattern: &str) -> Option<Vec<String>> {
        self.inner.list_all(pattern)
    }

    fn read_value(&self, name: &str) -> Option<Scalar> {
        self.inner.read_value(name)
    }

    fn subscribe(
        &self,
        name: &str,
        on_change: UpdateCallback,
    ) -> Result<SubscriptionHandle, SourceError> {
        self.inner.subscribe(name, on_change)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SourceError> {
        self.inner.unsubscribe(handle)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    const RECORDING: &str = r#"{
        "pvs": { "SI-01:Temp-Mon": 21.5, "SI-02:Temp-Mon": null },
        "events": [
            { "at_ms": 20, "pv": "SI-01:Temp-Mon", "value": null },
            { "at_ms": 10, "pv": "SI-01:Temp-Mon", "value": 21.7 }
        ]
    }"#;

    #[test]
    fn parse_recording() {
        let recording = Recording::parse(RECORDING).unwrap();
        assert_eq!(recording.pvs.len(), 2);
        assert_eq!(recording.pvs["SI-02:Temp-Mon"], None);
        assert_eq!(recording.events.len(), 2);
    }

    #[test]
    fn parse_invalid_recording_fails() {
        let result = Recording::parse("{ not json");
        assert!(matches!(result, Err(MonitorError::Replay(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECORDING.as_bytes()).unwrap();

        let source = ReplaySource::load(file.path()).unwrap();
        assert_eq!(source.event_count(), 2);
        assert!(source.description().starts_with("replay: "));
        assert_eq!(source.read_value("SI-01:Temp-Mon"), Some(Scalar::Float(21.5)));
        assert_eq!(source.read_value("SI-02:Temp-Mon"), None);
    }

    #[test]
    fn replay_delivers_events_in_time_order() {
        let recording = Recording::parse(RECORDING).unwrap();
        let source = ReplaySource::new(recording, "test");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        source
            .subscribe(
                "SI-01:Temp-Mon",
                Arc::new(move |_: &str, value: Option<Scalar>| sink.lock().push(value)),
            )
            .unwrap();

        source.start_replay().join().unwrap();

        assert_eq!(*seen.lock(), vec![Some(Scalar::Float(21.7)), None]);
    }

    #[test]
    fn stop_replay_drops_pending_events() {
        let recording = Recording {
            pvs: BTreeMap::from([("A".to_string(), Some(Scalar::Int(0)))]),
            events: vec![RecordedEvent {
                at_ms: 5_000,
                pv: "A".to_string(),
                value: Some(Scalar::Int(1)),
            }],
        };
        let source = ReplaySource::new(recording, "test");

        let handle = source.start_replay();
        source.stop_replay();
        handle.join().unwrap();

        assert_eq!(source.read_value("A"), Some(Scalar::Int(0)));
    }
}
