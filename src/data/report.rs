//! Aggregate results of a check cycle.

use std::time::SystemTime;

use serde::Serialize;

use super::detector::Classification;

/// Result of classifying every monitored PV once.
///
/// `frozen` and `disconnected` are disjoint; every other monitored PV is
/// either normal or has no history yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub total_monitored: usize,
    pub frozen: Vec<String>,
    pub disconnected: Vec<String>,
    /// PVs without any sample yet.
    pub undetermined: usize,
    pub checked_at: SystemTime,
}

impl Default for CheckReport {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CheckReport {
    pub fn new(total_monitored: usize) -> Self {
        Self {
            total_monitored,
            frozen: Vec::new(),
            disconnected: Vec::new(),
            undetermined: 0,
            checked_at: SystemTime::now(),
        }
    }

    /// Add one PV's classification to the report.
    pub fn record(&mut self, name: &str, classification: Classification) {
        match classification {
            Classification::Frozen => self.frozen.push(name.to_string()),
            Classification::Disconnected => self.disconnected.push(name.to_string()),
            Classification::Undetermined => self.undetermined += 1,
            Classification::Normal => {}
        }
    }

    pub fn frozen_count(&self) -> usize {
        self.frozen.len()
    }

    pub fn disconnected_count(&self) -> usize {
        self.disconnected.len()
    }

    /// Monitored PVs that are neither frozen nor disconnected.
    pub fn normal_count(&self) -> usize {
        self.total_monitored
            .saturating_sub(self.frozen.len())
            .saturating_sub(self.disconnected.len())
            .saturating_sub(self.undetermined)
    }

    /// Status lines describing the report, in emission order.
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("PVs analysed = {}", self.total_monitored),
            format!("Frozen PVs = {}", self.frozen_count()),
            format!("Disconnected PVs = {}", self.disconnected_count()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sorts_into_sets() {
        let mut report = CheckReport::new(5);
        report.record("a", Classification::Frozen);
        report.record("b", Classification::Disconnected);
        report.record("c", Classification::Normal);
        report.record("d", Classification::Undetermined);
        report.record("e", Classification::Normal);

        assert_eq!(report.frozen, vec!["a".to_string()]);
        assert_eq!(report.disconnected, vec!["b".to_string()]);
        assert_eq!(report.undetermined, 1);
        assert_eq!(report.normal_count(), 2);
    }

    #[test]
    fn summary_lines() {
        let mut report = CheckReport::new(3);
        report.record("a", Classification::Frozen);

        assert_eq!(
            report.summary(),
            vec![
                "PVs analysed = 3".to_string(),
                "Frozen PVs = 1".to_string(),
                "Disconnected PVs = 0".to_string(),
            ]
        );
    }

    #[test]
    fn serializes_to_json() {
        let mut report = CheckReport::new(1);
        report.record("SI-01:Temp-Mon", Classification::Frozen);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_monitored"], 1);
        assert_eq!(json["frozen"][0], "SI-01:Temp-Mon");
    }
}
