//! Frozen/disconnected classification.
//!
//! A PV is classified from its history alone. The latest value decides
//! connectivity; the earliest and latest windows of samples decide whether
//! it is frozen.

use serde::Serialize;

use super::history::History;

/// Default number of samples compared at each edge of a history.
pub const DEFAULT_FREEZE_WINDOW: usize = 15;

/// Default name suffixes that mark a PV as a set point.
pub const DEFAULT_SET_POINT_SUFFIXES: [&str; 3] = ["-SP", "-Setpoint", "-SP:RBV"];

/// Outcome of classifying one PV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Classification {
    /// No samples yet; counted neither as frozen nor as disconnected.
    Undetermined,
    Normal,
    Frozen,
    Disconnected,
}

impl Classification {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Classification::Undetermined => "----",
            Classification::Normal => "OK",
            Classification::Frozen => "FRZN",
            Classification::Disconnected => "DISC",
        }
    }
}

/// Classifies PV histories as frozen, disconnected, or normal.
///
/// # Example
///
/// ```
/// use pvwatch::{Classification, FreezeDetector, History, Scalar};
///
/// let detector = FreezeDetector::default();
/// let history = History::from_values((0..5).map(|_| Some(Scalar::Int(1))));
///
/// assert_eq!(detector.classify("SI-01:Temp-Mon", Some(&history)), Classification::Frozen);
/// ```
#[derive(Debug, Clone)]
pub struct FreezeDetector {
    set_point_suffixes: Vec<String>,
    window: usize,
}

impl Default for FreezeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SET_POINT_SUFFIXES, DEFAULT_FREEZE_WINDOW)
    }
}

impl FreezeDetector {
    pub fn new<I, S>(set_point_suffixes: I, window: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set_point_suffixes: set_point_suffixes.into_iter().map(Into::into).collect(),
            window: window.max(1),
        }
    }

    /// Number of samples compared at each edge.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Whether the name ends with one of the set-point suffixes.
    pub fn is_set_point(&self, name: &str) -> bool {
        self.set_point_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Classify a PV from its history.
    ///
    /// Disconnection takes precedence: a PV whose latest value is
    /// unavailable is never reported as frozen. Connected set points are
    /// always frozen.
    pub fn classify(&self, name: &str, history: Option<&History>) -> Classification {
        let Some(history) = history.filter(|h| !h.is_empty()) else {
            return Classification::Undetermined;
        };

        if !history.is_connected() {
            return Classification::Disconnected;
        }

        if self.is_set_point(name) || self.edges_frozen(history) {
            Classification::Frozen
        } else {
            Classification::Normal
        }
    }

    /// Whether both edge windows are internally constant and equal to each other.
    ///
    /// Values are compared exactly; an unavailable sample only equals
    /// another unavailable sample.
    fn edges_frozen(&self, history: &History) -> bool {
        let len = history.len();
        let k = self.window.min(len);

        let (Some(first_head), Some(last_head)) =
            (history.values().next(), history.values().nth(len - k))
        else {
            return false;
        };

        let all_first_equal = history.values().take(k).all(|v| v == first_head);
        let all_last_equal = history.values().skip(len - k).all(|v| v == last_head);
        let edges_equal = first_head == last_head;

        all_first_equal && all_last_equal && edges_equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Scalar;

    fn ints(values: &[i64]) -> History {
        History::from_values(values.iter().map(|&v| Some(Scalar::Int(v))))
    }

    #[test]
    fn constant_short_history_is_frozen() {
        let detector = FreezeDetector::default();
        let history = ints(&[1, 1, 1, 1, 1]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Frozen);
    }

    #[test]
    fn alternating_history_is_normal() {
        let detector = FreezeDetector::default();
        let history = ints(&[1, 2, 1, 2, 1]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Normal);
    }

    #[test]
    fn change_inside_last_window_is_normal() {
        let detector = FreezeDetector::default();
        let mut values = vec![5; 15];
        values.push(7);
        let history = ints(&values);

        assert_eq!(history.len(), 16);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Normal);
    }

    #[test]
    fn noisy_middle_is_ignored_when_edges_match() {
        let detector = FreezeDetector::default();
        let mut values = vec![3; 15];
        values.extend([9, 8, 7, 6]);
        values.extend(vec![3; 15]);
        let history = ints(&values);

        assert_eq!(detector.classify("PV", Some(&history)), Classification::Frozen);
    }

    #[test]
    fn constant_edges_with_different_values_are_normal() {
        let detector = FreezeDetector::default();
        let mut values = vec![3; 15];
        values.extend(vec![4; 15]);
        let history = ints(&values);

        assert_eq!(detector.classify("PV", Some(&history)), Classification::Normal);
    }

    #[test]
    fn single_sample_is_frozen() {
        let detector = FreezeDetector::default();
        let history = ints(&[42]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Frozen);
    }

    #[test]
    fn missing_or_empty_history_is_undetermined() {
        let detector = FreezeDetector::default();
        assert_eq!(detector.classify("PV", None), Classification::Undetermined);
        assert_eq!(
            detector.classify("PV", Some(&History::new())),
            Classification::Undetermined
        );
        assert_eq!(
            detector.classify("PV-SP", Some(&History::new())),
            Classification::Undetermined
        );
    }

    #[test]
    fn unavailable_last_value_is_disconnected_even_if_constant_before() {
        let detector = FreezeDetector::default();
        let mut values: Vec<Option<Scalar>> = vec![Some(Scalar::Int(1)); 20];
        values.push(None);
        let history = History::from_values(values);

        assert_eq!(detector.classify("PV", Some(&history)), Classification::Disconnected);
        assert_eq!(detector.classify("PV-SP", Some(&history)), Classification::Disconnected);
    }

    #[test]
    fn all_unavailable_is_disconnected() {
        let detector = FreezeDetector::default();
        let history = History::from_values([None, None]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Disconnected);
    }

    #[test]
    fn reconnected_pv_is_classified_normally() {
        let detector = FreezeDetector::default();
        let history = History::from_values([None, Some(Scalar::Int(1)), Some(Scalar::Int(2))]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Normal);
    }

    #[test]
    fn unavailable_sample_in_window_breaks_freeze() {
        let detector = FreezeDetector::default();
        let history = History::from_values([Some(Scalar::Int(1)), None, Some(Scalar::Int(1))]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Normal);
    }

    #[test]
    fn set_points_are_always_frozen_when_connected() {
        let detector = FreezeDetector::default();
        let moving = ints(&[1, 2, 3, 4, 5]);

        for name in ["LA-01:Volt-SP", "LA-01:Volt-Setpoint", "LA-01:Volt-SP:RBV"] {
            assert!(detector.is_set_point(name));
            assert_eq!(detector.classify(name, Some(&moving)), Classification::Frozen);
        }
        assert!(!detector.is_set_point("LA-01:Volt-Mon"));
    }

    #[test]
    fn custom_set_point_suffixes() {
        let detector = FreezeDetector::new(["-Cmd"], DEFAULT_FREEZE_WINDOW);
        assert!(detector.is_set_point("PS-01:Current-Cmd"));
        assert!(!detector.is_set_point("PS-01:Current-SP"));
    }

    #[test]
    fn custom_window_size() {
        let detector = FreezeDetector::new(DEFAULT_SET_POINT_SUFFIXES, 2);
        let history = ints(&[1, 1, 5, 1, 1]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Frozen);
    }

    #[test]
    fn exact_float_comparison() {
        let detector = FreezeDetector::default();
        let history = History::from_values([
            Some(Scalar::Float(1.0)),
            Some(Scalar::Float(1.0 + f64::EPSILON)),
        ]);
        assert_eq!(detector.classify("PV", Some(&history)), Classification::Normal);
    }

    #[test]
    fn classification_is_idempotent() {
        let detector = FreezeDetector::default();
        let history = ints(&[2, 2, 3, 2]);
        let first = detector.classify("PV", Some(&history));
        let second = detector.classify("PV", Some(&history));
        assert_eq!(first, second);
    }
}
