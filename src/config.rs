//! Engine configuration.
//!
//! Configuration is layered with the `config` crate: built-in defaults,
//! then an optional file (TOML, JSON, or YAML by extension), then
//! environment variables prefixed with `PVWATCH_`.
//!
//! ```toml
//! filter_prefix = "SI-01"
//! filter_suffix = "Temp-Mon"
//! check_interval_secs = 10
//! frozen_window_minutes = 5
//! set_point_suffixes = ["-SP", "-Setpoint", "-SP:RBV"]
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::data::detector::{DEFAULT_FREEZE_WINDOW, DEFAULT_SET_POINT_SUFFIXES};
use crate::data::FreezeDetector;
use crate::error::MonitorError;
use crate::filter::{FilterSpec, PvFilter};

/// PVs that are never monitored unless overridden.
pub const DEFAULT_IGNORE_LIST: [&str; 3] = [
    "RAD:Thermo3:TotalDoseRate:Dose",
    "RAD:Thermo6:TotalDoseRate:Dose",
    "RAD:Thermo12:TotalDoseRate:Dose",
];

/// Settings accepted by the monitoring engine at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Monitored PVs must start with this, if set.
    pub filter_prefix: Option<String>,
    /// Monitored PVs must end with this, if set.
    pub filter_suffix: Option<String>,
    /// Seconds between check cycles. Must be > 0.
    pub check_interval_secs: u64,
    /// Observation window for downstream viewers. Must be > 0.
    /// Not used by classification.
    pub frozen_window_minutes: u64,
    /// Accepted for compatibility; never applied.
    pub initial_check_delay_secs: u64,
    pub connect_timeout_ms: u64,
    pub connect_poll_ms: u64,
    /// Pause between opening subscriptions and the first check.
    pub settle_delay_ms: u64,
    /// Pattern passed to the catalog listing.
    pub list_pattern: String,
    pub ignore_list: Vec<String>,
    pub set_point_suffixes: Vec<String>,
    /// Samples compared at each edge of a history. Must be > 0.
    pub freeze_window: usize,
    /// Maximum samples kept per PV; `None` keeps everything.
    pub history_limit: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            filter_prefix: None,
            filter_suffix: None,
            check_interval_secs: 10,
            frozen_window_minutes: 2,
            initial_check_delay_secs: 10 * 60,
            connect_timeout_ms: 1000,
            connect_poll_ms: 100,
            settle_delay_ms: 2000,
            list_pattern: "*".to_string(),
            ignore_list: DEFAULT_IGNORE_LIST.iter().map(|s| s.to_string()).collect(),
            set_point_suffixes: DEFAULT_SET_POINT_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            freeze_window: DEFAULT_FREEZE_WINDOW,
            history_limit: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(Environment::with_prefix("PVWATCH").try_parsing(true))
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check that intervals and windows are in range.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.check_interval_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "check_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.frozen_window_minutes == 0 {
            return Err(MonitorError::InvalidConfig(
                "frozen_window_minutes must be greater than zero".to_string(),
            ));
        }
        if self.freeze_window == 0 {
            return Err(MonitorError::InvalidConfig(
                "freeze_window must be greater than zero".to_string(),
            ));
        }
        if let Err(e) = glob::Pattern::new(&self.list_pattern) {
            return Err(MonitorError::InvalidConfig(format!(
                "list_pattern is not a valid glob: {}",
                e
            )));
        }
        if self.history_limit == Some(0) {
            return Err(MonitorError::InvalidConfig(
                "history_limit must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Time range downstream consumers use to look back at frozen PVs.
    pub fn frozen_window(&self) -> Duration {
        Duration::from_secs(self.frozen_window_minutes * 60)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_poll(&self) -> Duration {
        Duration::from_millis(self.connect_poll_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(self.filter_prefix.clone(), self.filter_suffix.clone())
    }

    pub fn pv_filter(&self) -> PvFilter {
        PvFilter::new(self.ignore_list.iter().cloned(), self.filter_spec())
    }

    pub fn freeze_detector(&self) -> FreezeDetector {
        FreezeDetector::new(self.set_point_suffixes.iter().cloned(), self.freeze_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(extension: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval(), Duration::from_secs(10));
        assert_eq!(config.frozen_window(), Duration::from_secs(120));
        assert_eq!(config.ignore_list.len(), 3);
        assert_eq!(config.freeze_window, 15);
        assert!(config.history_limit.is_none());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = MonitorConfig {
            check_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = MonitorConfig {
            frozen_window_minutes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn zero_history_limit_is_rejected() {
        let config = MonitorConfig {
            history_limit: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_toml_file_over_defaults() {
        let file = write_config(
            ".toml",
            r#"
            filter_prefix = "SI-01"
            filter_suffix = "Temp-Mon"
            check_interval_secs = 5
            ignore_list = ["X"]
            "#,
        );

        let config = MonitorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.filter_prefix.as_deref(), Some("SI-01"));
        assert_eq!(config.filter_suffix.as_deref(), Some("Temp-Mon"));
        assert_eq!(config.check_interval_secs, 5);
        assert_eq!(config.ignore_list, vec!["X".to_string()]);
        assert_eq!(config.frozen_window_minutes, 2);
    }

    #[test]
    fn load_json_file() {
        let file = write_config(".json", r#"{ "history_limit": 500, "freeze_window": 10 }"#);

        let config = MonitorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.history_limit, Some(500));
        assert_eq!(config.freeze_window, 10);
    }

    #[test]
    fn load_invalid_values_fails_validation() {
        let file = write_config(".toml", "check_interval_secs = 0\n");
        let result = MonitorConfig::load(Some(file.path()));
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn invalid_list_pattern_fails_validation() {
        let config = MonitorConfig {
            list_pattern: "SI-[01".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn load_missing_file_fails() {
        let result = MonitorConfig::load(Some(Path::new("/nonexistent/pvwatch.toml")));
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn filter_and_detector_follow_config() {
        let config = MonitorConfig {
            filter_prefix: Some("SI".to_string()),
            set_point_suffixes: vec!["-Cmd".to_string()],
            ..Default::default()
        };

        let filter = config.pv_filter();
        assert!(filter.accepts("SI-01:Temp-Mon"));
        assert!(!filter.accepts("BO-01:Temp-Mon"));
        assert!(!filter.accepts("RAD:Thermo3:TotalDoseRate:Dose"));

        let detector = config.freeze_detector();
        assert!(detector.is_set_point("SI-01:Current-Cmd"));
        assert!(!detector.is_set_point("SI-01:Current-SP"));
    }
}
