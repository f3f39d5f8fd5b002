//! Per-PV value history.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::Serialize;

use crate::source::Scalar;

/// One observed value of a PV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// `None` means the value could not be read at this instant.
    pub value: Option<Scalar>,
    pub timestamp: SystemTime,
}

impl Sample {
    pub fn new(value: Option<Scalar>) -> Self {
        Self {
            value,
            timestamp: SystemTime::now(),
        }
    }
}

/// Ordered record of the samples observed for one PV.
///
/// Samples are kept in arrival order. Values and timestamps live in the
/// same [`Sample`], so their counts can never diverge. By default the
/// history grows without bound; with a limit the oldest samples are
/// evicted first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    samples: VecDeque<Sample>,
    limit: Option<usize>,
}

impl History {
    /// Create an empty, unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history that keeps at most `limit` samples.
    pub fn bounded(limit: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            limit: Some(limit.max(1)),
        }
    }

    /// Build an unbounded history from a list of values, timestamped now.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<Scalar>>,
    {
        let mut history = Self::new();
        for value in values {
            history.push(Sample::new(value));
        }
        history
    }

    /// Append a sample, evicting the oldest if over the limit.
    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        if let Some(limit) = self.limit {
            while self.samples.len() > limit {
                self.samples.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over values in arrival order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &Option<Scalar>> + ExactSizeIterator {
        self.samples.iter().map(|s| &s.value)
    }

    /// Iterate over timestamps in arrival order.
    pub fn timestamps(&self) -> impl DoubleEndedIterator<Item = &SystemTime> + ExactSizeIterator {
        self.samples.iter().map(|s| &s.timestamp)
    }

    /// The most recent value, if any sample exists.
    pub fn last_value(&self) -> Option<&Option<Scalar>> {
        self.samples.back().map(|s| &s.value)
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Whether the latest sample carries a value.
    pub fn is_connected(&self) -> bool {
        matches!(self.last_value(), Some(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_arrival_order() {
        let history = History::from_values([Some(Scalar::Int(1)), None, Some(Scalar::Int(3))]);

        let values: Vec<_> = history.values().cloned().collect();
        assert_eq!(values, vec![Some(Scalar::Int(1)), None, Some(Scalar::Int(3))]);
        assert_eq!(history.timestamps().len(), 3);
    }

    #[test]
    fn connected_follows_last_value() {
        let mut history = History::from_values([None, Some(Scalar::Int(1))]);
        assert!(history.is_connected());

        history.push(Sample::new(None));
        assert!(!history.is_connected());
        assert_eq!(history.last_value(), Some(&None));
    }

    #[test]
    fn empty_history_is_not_connected() {
        let history = History::new();
        assert!(!history.is_connected());
        assert!(history.last_value().is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn bounded_history_evicts_oldest() {
        let mut history = History::bounded(3);
        for i in 0..5 {
            history.push(Sample::new(Some(Scalar::Int(i))));
        }

        let values: Vec<_> = history.values().cloned().collect();
        assert_eq!(
            values,
            vec![Some(Scalar::Int(2)), Some(Scalar::Int(3)), Some(Scalar::Int(4))]
        );
        assert_eq!(history.timestamps().len(), 3);
    }

    #[test]
    fn unbounded_history_grows() {
        let mut history = History::new();
        for i in 0..1000 {
            history.push(Sample::new(Some(Scalar::Int(i))));
        }
        assert_eq!(history.len(), 1000);
    }
}
