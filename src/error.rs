//! Error types for the monitoring engine.

use std::time::Duration;

use thiserror::Error;

/// Fatal errors that abort a monitoring run.
///
/// Per-PV read failures are never represented here: they are absorbed
/// into an unavailable (`None`) sample and handled by classification.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The data source did not report a connection within the timeout.
    #[error("not connected to the data source after {timeout:?}")]
    NotConnected { timeout: Duration },

    /// PV listing returned nothing to monitor.
    #[error("no PVs found in the data source catalog")]
    EmptyCatalog,

    /// The run was stopped before it reached the running state.
    #[error("monitoring stopped")]
    Stopped,

    /// `start` was called on a monitor that is already running.
    #[error("monitor already started")]
    AlreadyStarted,

    /// The background task panicked or was cancelled.
    #[error("monitor task failed: {0}")]
    Task(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be loaded or deserialized.
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// A replay recording could not be parsed.
    #[error("failed to parse replay recording: {0}")]
    Replay(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while opening or closing a value subscription.
///
/// These are logged by the engine and never change how a PV is classified.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The PV is not known to the source.
    #[error("unknown PV: {0}")]
    UnknownPv(String),

    /// The source connection is not usable.
    #[error("source disconnected")]
    Disconnected,

    /// The subscription could not be established.
    #[error("subscription failed for {pv}: {reason}")]
    Subscribe { pv: String, reason: String },
}
