//! Outbound reporting to the presentation layer.
//!
//! The engine pushes typed events through a [`ReportEmitter`]. Delivery is
//! fire-and-forget: implementations must never block the engine.

use std::fmt::Debug;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::data::CheckReport;

/// An event emitted by the monitoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Filtering progress, 0..=100.
    Progress(u8),
    /// Human-readable status line.
    Status(String),
    /// The PVs selected for monitoring.
    MonitoredList(Vec<String>),
    /// PVs classified as frozen in the latest check cycle.
    FrozenList(Vec<String>),
    /// PVs classified as disconnected in the latest check cycle.
    DisconnectedList(Vec<String>),
    /// Full result of a check cycle; closes the cycle's events.
    Report(CheckReport),
}

/// Sink for engine events.
///
/// Every method has a no-op default so consumers only implement what
/// they render.
pub trait ReportEmitter: Send + Sync + Debug {
    fn on_progress(&self, _percent: u8) {}

    fn on_status(&self, _text: &str) {}

    fn on_monitored_list(&self, _names: &[String]) {}

    fn on_frozen_list(&self, _names: &[String]) {}

    fn on_disconnected_list(&self, _names: &[String]) {}

    fn on_report(&self, _report: &CheckReport) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl ReportEmitter for NullEmitter {}

/// Forwards events into an unbounded channel.
///
/// # Example
///
/// ```
/// use pvwatch::{ChannelEmitter, MonitorEvent, ReportEmitter};
///
/// let (emitter, mut rx) = ChannelEmitter::create();
/// emitter.on_status("hello");
///
/// assert_eq!(rx.try_recv().unwrap(), MonitorEvent::Status("hello".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelEmitter {
    pub fn new(sender: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        Self { sender }
    }

    /// Create an emitter together with the receiving end of its channel.
    pub fn create() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: MonitorEvent) {
        // Best effort; a dropped receiver just means nobody is listening
        let _ = self.sender.send(event);
    }
}

impl ReportEmitter for ChannelEmitter {
    fn on_progress(&self, percent: u8) {
        self.send(MonitorEvent::Progress(percent));
    }

    fn on_status(&self, text: &str) {
        self.send(MonitorEvent::Status(text.to_string()));
    }

    fn on_monitored_list(&self, names: &[String]) {
        self.send(MonitorEvent::MonitoredList(names.to_vec()));
    }

    fn on_frozen_list(&self, names: &[String]) {
        self.send(MonitorEvent::FrozenList(names.to_vec()));
    }

    fn on_disconnected_list(&self, names: &[String]) {
        self.send(MonitorEvent::DisconnectedList(names.to_vec()));
    }

    fn on_report(&self, report: &CheckReport) {
        self.send(MonitorEvent::Report(report.clone()));
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

impl ReportEmitter for TracingEmitter {
    fn on_progress(&self, percent: u8) {
        tracing::debug!(percent, "progress");
    }

    fn on_status(&self, text: &str) {
        info!("{}", text);
    }

    fn on_monitored_list(&self, names: &[String]) {
        info!(count = names.len(), "monitoring PVs");
    }

    fn on_frozen_list(&self, names: &[String]) {
        if names.is_empty() {
            info!("no frozen PVs detected");
        } else {
            info!(count = names.len(), pvs = ?names, "frozen PVs");
        }
    }

    fn on_disconnected_list(&self, names: &[String]) {
        if names.is_empty() {
            info!("no disconnected PVs detected");
        } else {
            info!(count = names.len(), pvs = ?names, "disconnected PVs");
        }
    }

    fn on_report(&self, report: &CheckReport) {
        tracing::debug!(
            total = report.total_monitored,
            normal = report.normal_count(),
            undetermined = report.undetermined,
            "check report"
        );
    }
}
