//! Value history and classification.
//!
//! ## Submodules
//!
//! - [`history`]: Per-PV sample history ([`History`], [`Sample`])
//! - [`store`]: Thread-safe [`HistoryStore`] fed by subscription callbacks
//! - [`detector`]: [`FreezeDetector`] and its [`Classification`] outcomes
//! - [`report`]: [`CheckReport`] aggregating one check cycle
//!
//! ## Data Flow
//!
//! ```text
//! bootstrap read / subscription callback
//!        │
//!        ▼
//! HistoryStore::record()
//!        │
//!        ▼
//! FreezeDetector::classify()  (per PV, once per check cycle)
//!        │
//!        ▼
//! CheckReport (frozen / disconnected / counts)
//! ```

pub mod detector;
pub mod history;
pub mod report;
pub mod store;

pub use detector::{Classification, FreezeDetector};
pub use history::{History, Sample};
pub use report::CheckReport;
pub use store::HistoryStore;
