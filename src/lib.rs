//! # pvwatch
//!
//! A background engine for finding frozen and disconnected process
//! variables (PVs) in a control system.
//!
//! The engine samples a set of PVs from a push-based data source and
//! periodically decides which of them report an unchanging value (a stuck
//! sensor or broken feedback path) and which can no longer be read.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Monitor                             │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────┐ │
//! │  │  source  │──▶│  filter  │──▶│ HistoryStore │──▶│ Detector │ │
//! │  │ (input)  │   │          │   │  (callbacks) │   │ (per PV) │ │
//! │  └──────────┘   └──────────┘   └──────────────┘   └────┬─────┘ │
//! │                                                        │       │
//! │                                                        ▼       │
//! │                                               ┌──────────────┐ │
//! │                                               │ReportEmitter │ │
//! │                                               └──────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Data source abstraction ([`SourceClient`] trait) with
//!   in-memory and replay implementations
//! - **[`filter`]**: Ignore list and prefix/suffix selection of monitored PVs
//! - **[`data`]**: Per-PV histories, the [`FreezeDetector`], and [`CheckReport`]s
//! - **[`monitor`]**: The [`Monitor`] lifecycle and periodic check cycles
//! - **[`report`]**: The [`ReportEmitter`] boundary towards a GUI or log sink
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use pvwatch::{ChannelEmitter, MemorySource, Monitor, MonitorConfig, MonitorEvent, Scalar};
//!
//! # tokio_test::block_on(async {
//! let source = Arc::new(MemorySource::new());
//! source.insert("SI-01:Temp-Mon", Some(Scalar::Float(21.5)));
//!
//! let (emitter, mut events) = ChannelEmitter::create();
//! let config = MonitorConfig { settle_delay_ms: 0, ..Default::default() };
//! let monitor = Monitor::builder()
//!     .config(config)
//!     .source(source)
//!     .emitter(Arc::new(emitter))
//!     .build()
//!     .unwrap();
//!
//! let handle = monitor.start().unwrap();
//! while let Some(event) = events.recv().await {
//!     if let MonitorEvent::FrozenList(frozen) = event {
//!         assert_eq!(frozen, vec!["SI-01:Temp-Mon".to_string()]);
//!         break;
//!     }
//! }
//! handle.stop();
//! handle.join().await.unwrap();
//! # });
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod monitor;
pub mod report;
pub mod source;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use data::{CheckReport, Classification, FreezeDetector, History, HistoryStore, Sample};
pub use error::{MonitorError, SourceError};
pub use filter::{FilterSpec, PvFilter};
pub use monitor::{Monitor, MonitorBuilder, MonitorHandle, MonitorState};
pub use report::{ChannelEmitter, MonitorEvent, NullEmitter, ReportEmitter, TracingEmitter};
pub use source::{
    MemorySource, Recording, RecordedEvent, ReplaySource, Scalar, SourceClient,
    SubscriptionHandle, UpdateCallback,
};
