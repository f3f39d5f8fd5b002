//! The monitoring engine.
//!
//! A [`Monitor`] connects to a [`SourceClient`], selects the PVs to watch,
//! captures their value histories, and periodically classifies them.
//!
//! ```text
//! Idle ─▶ Connecting ─▶ Listing ─▶ Subscribing ─▶ Running ─▶ Stopped
//!   │          │            │            │                      ▲
//!   └──────────┴────────────┴────────────┴──── error / stop ────┘
//! ```
//!
//! Setup (connect, list, bootstrap reads) is synchronous and runs on the
//! blocking pool. A stop request is honoured between setup steps but never
//! interrupts a call already in progress. Once running, check cycles only
//! read captured history and never touch the source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::data::{CheckReport, Classification, FreezeDetector, HistoryStore};
use crate::error::MonitorError;
use crate::filter::PvFilter;
use crate::report::{NullEmitter, ReportEmitter};
use crate::source::{self, Scalar, SourceClient, SubscriptionHandle, UpdateCallback};

/// Lifecycle state of a monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MonitorState {
    Idle,
    Connecting,
    Listing,
    Subscribing,
    Running,
    Stopped,
}

/// A PV selected for monitoring.
#[derive(Debug, Clone)]
struct RegisteredPv {
    name: String,
    /// `None` if the subscription could not be opened.
    handle: Option<SubscriptionHandle>,
}

struct Inner {
    config: MonitorConfig,
    check_interval: Duration,
    source: Arc<dyn SourceClient>,
    emitter: Arc<dyn ReportEmitter>,
    filter: PvFilter,
    detector: FreezeDetector,
    store: Arc<HistoryStore>,
    registry: RwLock<Vec<RegisteredPv>>,
    started: AtomicBool,
}

/// Background engine that detects frozen and disconnected PVs.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pvwatch::{MemorySource, Monitor, MonitorConfig, Scalar, TracingEmitter};
///
/// #[tokio::main]
/// async fn main() -> Result<(), pvwatch::MonitorError> {
///     let source = Arc::new(MemorySource::new());
///     source.insert("SI-01:Temp-Mon", Some(Scalar::Float(21.5)));
///
///     let monitor = Monitor::builder()
///         .config(MonitorConfig::default())
///         .source(source)
///         .emitter(Arc::new(TracingEmitter))
///         .build()?;
///
///     let handle = monitor.start()?;
///     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
///     handle.stop();
///     handle.join().await
/// }
/// ```
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    /// Create a builder for configuring the monitor.
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Interval between check cycles.
    pub fn check_interval(&self) -> Duration {
        self.inner.check_interval
    }

    /// The store holding every monitored PV's history.
    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.inner.store
    }

    /// Names of the PVs currently monitored, in catalog order.
    pub fn monitored(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .iter()
            .map(|pv| pv.name.clone())
            .collect()
    }

    /// Classify a single PV from its captured history.
    pub fn classify(&self, name: &str) -> Classification {
        let detector = &self.inner.detector;
        self.inner
            .store
            .inspect(name, |history| detector.classify(name, Some(history)))
            .unwrap_or(Classification::Undetermined)
    }

    /// Classify every monitored PV without emitting anything.
    pub fn check(&self) -> CheckReport {
        let names = self.monitored();
        let mut report = CheckReport::new(names.len());
        for name in &names {
            report.record(name, self.classify(name));
        }
        report
    }

    /// Run one check cycle and emit its results.
    pub fn check_once(&self) -> CheckReport {
        let report = self.check();
        debug!(
            total = report.total_monitored,
            frozen = report.frozen_count(),
            disconnected = report.disconnected_count(),
            "check cycle complete"
        );

        let emitter = &self.inner.emitter;
        emitter.on_frozen_list(&report.frozen);
        emitter.on_disconnected_list(&report.disconnected);
        for line in report.summary() {
            emitter.on_status(&line);
        }
        emitter.on_status("Analysis finished.");
        emitter.on_report(&report);

        report
    }

    /// Start monitoring in a background task.
    ///
    /// Must be called from within a tokio runtime. A monitor can only be
    /// started once.
    pub fn start(&self) -> Result<MonitorHandle, MonitorError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(MonitorState::Idle);

        let monitor = self.clone();
        let task = tokio::spawn(async move { monitor.run(stop_rx, state_tx).await });

        Ok(MonitorHandle {
            stop_tx,
            state_rx,
            task,
        })
    }

    async fn run(
        self,
        mut stop_rx: watch::Receiver<bool>,
        state_tx: watch::Sender<MonitorState>,
    ) -> Result<(), MonitorError> {
        let setup = {
            let monitor = self.clone();
            let stop = stop_rx.clone();
            let state = state_tx.clone();
            tokio::task::spawn_blocking(move || monitor.setup(&stop, &state)).await
        };

        let result = match setup {
            Ok(Ok(())) => self.run_checks(&mut stop_rx, &state_tx).await,
            Ok(Err(e)) => Err(e),
            Err(e) => Err(MonitorError::Task(e.to_string())),
        };

        self.teardown();
        state_tx.send_replace(MonitorState::Stopped);

        match result {
            Ok(()) | Err(MonitorError::Stopped) => {
                info!("monitoring stopped");
                self.inner.emitter.on_status("Monitoring stopped.");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "monitoring aborted");
                Err(e)
            }
        }
    }

    /// Connect, list, filter, and subscribe.
    fn setup(
        &self,
        stop: &watch::Receiver<bool>,
        state: &watch::Sender<MonitorState>,
    ) -> Result<(), MonitorError> {
        let inner = &self.inner;
        let source = inner.source.as_ref();

        state.send_replace(MonitorState::Connecting);
        if let Err(e) = source::connect(
            source,
            inner.config.connect_timeout(),
            inner.config.connect_poll(),
        ) {
            inner.emitter.on_status("Could not connect to the data source.");
            return Err(e);
        }
        info!(source = source.description(), "connected");
        inner
            .emitter
            .on_status(&format!("Connected to {}.", source.description()));
        ensure_running(stop)?;

        state.send_replace(MonitorState::Listing);
        let catalog = source
            .list_all(&inner.config.list_pattern)
            .unwrap_or_default();
        if catalog.is_empty() {
            inner.emitter.on_status("No PVs found.");
            return Err(MonitorError::EmptyCatalog);
        }

        let selected = inner
            .filter
            .apply(&catalog, |percent| inner.emitter.on_progress(percent));
        info!(
            catalog = catalog.len(),
            selected = selected.len(),
            "catalog filtered"
        );
        if selected.is_empty() {
            warn!("no PVs passed the filter");
        }
        inner.emitter.on_monitored_list(&selected);
        inner.emitter.on_status("Listing and filtering complete.");
        ensure_running(stop)?;

        state.send_replace(MonitorState::Subscribing);
        for name in selected {
            ensure_running(stop)?;
            self.start_pv_monitor(name);
        }
        info!(count = inner.registry.read().len(), "subscriptions opened");

        Ok(())
    }

    /// Bootstrap a PV's history, then subscribe to its changes.
    fn start_pv_monitor(&self, name: String) {
        let inner = &self.inner;

        // The bootstrap sample must exist before any callback can fire
        let initial = inner.source.read_value(&name);
        inner.store.bootstrap(&name, initial);

        let store = inner.store.clone();
        let key = name.clone();
        let callback: UpdateCallback =
            Arc::new(move |_: &str, value: Option<Scalar>| store.record(&key, value));

        let handle = match inner.source.subscribe(&name, callback) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(pv = %name, error = %e, "failed to subscribe");
                None
            }
        };

        inner.registry.write().push(RegisteredPv { name, handle });
    }

    async fn run_checks(
        &self,
        stop_rx: &mut watch::Receiver<bool>,
        state: &watch::Sender<MonitorState>,
    ) -> Result<(), MonitorError> {
        let settle = self.inner.config.settle_delay();
        if !settle.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(settle) => {}
                _ = stop_requested(stop_rx) => return Ok(()),
            }
        }

        state.send_replace(MonitorState::Running);
        self.inner.emitter.on_status("Starting monitoring...");
        info!(interval = ?self.inner.check_interval, "check cycles started");

        // The first tick completes immediately
        let mut timer = tokio::time::interval(self.inner.check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.check_once();
                    if first {
                        first = false;
                        self.inner.emitter.on_progress(100);
                        self.inner.emitter.on_status("Processing complete.");
                    }
                }
                _ = stop_requested(stop_rx) => break,
            }
        }

        Ok(())
    }

    /// Close every subscription and drop all monitored state.
    fn teardown(&self) {
        let registered = std::mem::take(&mut *self.inner.registry.write());
        for pv in registered {
            if let Some(handle) = pv.handle {
                if let Err(e) = self.inner.source.unsubscribe(handle) {
                    warn!(pv = %pv.name, error = %e, "failed to unsubscribe");
                }
            }
        }
        self.inner.store.clear();
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("source", &self.inner.source.description())
            .field("check_interval", &self.inner.check_interval)
            .field("monitored", &self.inner.registry.read().len())
            .finish()
    }
}

fn ensure_running(stop: &watch::Receiver<bool>) -> Result<(), MonitorError> {
    // A dropped handle counts as a stop request
    if *stop.borrow() || stop.has_changed().is_err() {
        return Err(MonitorError::Stopped);
    }
    Ok(())
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Builder for configuring a [`Monitor`].
#[derive(Default)]
pub struct MonitorBuilder {
    config: MonitorConfig,
    source: Option<Arc<dyn SourceClient>>,
    emitter: Option<Arc<dyn ReportEmitter>>,
    check_interval: Option<Duration>,
}

impl MonitorBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the data source. Required.
    pub fn source(mut self, source: Arc<dyn SourceClient>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the report sink. Defaults to discarding events.
    pub fn emitter(mut self, emitter: Arc<dyn ReportEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Override the configured check interval with a finer-grained one.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Validate the configuration and build the monitor.
    pub fn build(self) -> Result<Monitor, MonitorError> {
        self.config.validate()?;

        let source = self
            .source
            .ok_or_else(|| MonitorError::InvalidConfig("no data source configured".to_string()))?;

        let check_interval = self
            .check_interval
            .unwrap_or_else(|| self.config.check_interval());
        if check_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "check interval must be greater than zero".to_string(),
            ));
        }

        let inner = Inner {
            filter: self.config.pv_filter(),
            detector: self.config.freeze_detector(),
            store: Arc::new(HistoryStore::with_limit(self.config.history_limit)),
            check_interval,
            source,
            emitter: self.emitter.unwrap_or_else(|| Arc::new(NullEmitter)),
            registry: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            config: self.config,
        };

        Ok(Monitor {
            inner: Arc::new(inner),
        })
    }
}

/// Handle for controlling a running [`Monitor`].
///
/// Drop this handle to stop monitoring, or call [`MonitorHandle::stop`].
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<MonitorState>,
    task: JoinHandle<Result<(), MonitorError>>,
}

impl MonitorHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<MonitorState> {
        self.state_rx.clone()
    }

    /// Request a stop.
    ///
    /// Future check cycles are cancelled; a setup call already in progress
    /// runs to completion first.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait until the run reaches the stopped state.
    pub async fn stopped(&self) {
        let mut rx = self.state_rx.clone();
        let _ = rx.wait_for(|s| *s == MonitorState::Stopped).await;
    }

    /// Wait for the background task to finish.
    ///
    /// Returns the fatal error that aborted the run, if any.
    pub async fn join(self) -> Result<(), MonitorError> {
        let MonitorHandle { stop_tx, task, .. } = self;
        let result = task.await;
        drop(stop_tx);
        result.map_err(|e| MonitorError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("state", &self.state())
            .finish()
    }
}
