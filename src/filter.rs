//! PV name filtering.
//!
//! Reduces the raw catalog to the monitored set using an ignore list and
//! optional prefix/suffix filters.

use std::collections::BTreeSet;

/// Positional filters applied to every candidate PV name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Names must start with this, if set.
    pub prefix: Option<String>,
    /// Names must end with this, if set.
    pub suffix: Option<String>,
}

impl FilterSpec {
    /// Build a spec, treating empty strings as "no filter".
    pub fn new(prefix: Option<String>, suffix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
            suffix: suffix.filter(|s| !s.is_empty()),
        }
    }
}

/// Filter that selects which PVs get monitored.
///
/// # Example
///
/// ```
/// use pvwatch::{FilterSpec, PvFilter};
///
/// let filter = PvFilter::new(
///     ["A"],
///     FilterSpec::new(Some("SI-01".into()), Some("Temp-Mon".into())),
/// );
/// let names = ["SI-01:Temp-Mon", "A", "SI-02:Temp-Mon", "SI-01:Other"]
///     .map(String::from);
///
/// assert_eq!(filter.apply(&names, |_| {}), vec!["SI-01:Temp-Mon".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PvFilter {
    ignore: BTreeSet<String>,
    spec: FilterSpec,
}

impl PvFilter {
    pub fn new<I, S>(ignore: I, spec: FilterSpec) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore: ignore.into_iter().map(Into::into).collect(),
            spec,
        }
    }

    /// Whether a single name passes the filter.
    pub fn accepts(&self, name: &str) -> bool {
        if self.ignore.contains(name) {
            return false;
        }
        if let Some(prefix) = &self.spec.prefix {
            if !name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.spec.suffix {
            if !name.ends_with(suffix.as_str()) {
                return false;
            }
        }
        true
    }

    /// Filter a catalog in a single left-to-right pass.
    ///
    /// `on_progress` is called after every candidate, kept or skipped, with
    /// a non-decreasing percentage that reaches 100 only on the last one.
    pub fn apply<F>(&self, names: &[String], mut on_progress: F) -> Vec<String>
    where
        F: FnMut(u8),
    {
        let total = names.len();
        let mut kept = Vec::new();

        for (i, name) in names.iter().enumerate() {
            if self.accepts(name) {
                kept.push(name.clone());
            }
            on_progress(progress_percent(i + 1, total));
        }

        kept
    }
}

/// `round(done / total * 100)`, held at 99 until the final candidate.
fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    let rounded = (done * 200 + total) / (total * 2);
    rounded.min(99) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ignore_prefix_and_suffix_combined() {
        let filter = PvFilter::new(
            ["A"],
            FilterSpec::new(Some("SI-01".into()), Some("Temp-Mon".into())),
        );
        let input = names(&["SI-01:Temp-Mon", "A", "SI-02:Temp-Mon", "SI-01:Other"]);

        assert_eq!(filter.apply(&input, |_| {}), names(&["SI-01:Temp-Mon"]));
    }

    #[test]
    fn no_filters_keeps_everything_except_ignored() {
        let filter = PvFilter::new(["B"], FilterSpec::default());
        let input = names(&["A", "B", "C"]);

        assert_eq!(filter.apply(&input, |_| {}), names(&["A", "C"]));
    }

    #[test]
    fn empty_strings_disable_filters() {
        let spec = FilterSpec::new(Some(String::new()), Some(String::new()));
        assert_eq!(spec, FilterSpec::default());
    }

    #[test]
    fn ignore_list_wins_over_matching_filters() {
        let filter = PvFilter::new(
            ["SI-01:Temp-Mon"],
            FilterSpec::new(Some("SI-01".into()), None),
        );
        assert!(!filter.accepts("SI-01:Temp-Mon"));
        assert!(filter.accepts("SI-01:Flow-Mon"));
    }

    #[test]
    fn preserves_input_order() {
        let filter = PvFilter::new(Vec::<String>::new(), FilterSpec::new(None, Some("-Mon".into())));
        let input = names(&["Z-Mon", "A-Mon", "M-SP", "B-Mon"]);

        assert_eq!(filter.apply(&input, |_| {}), names(&["Z-Mon", "A-Mon", "B-Mon"]));
    }

    #[test]
    fn progress_reported_for_every_candidate() {
        let filter = PvFilter::new(Vec::<String>::new(), FilterSpec::new(Some("X".into()), None));
        let input = names(&["A", "B", "C", "D"]);

        let mut progress = Vec::new();
        let kept = filter.apply(&input, |p| progress.push(p));

        assert!(kept.is_empty());
        assert_eq!(progress, vec![25, 50, 75, 100]);
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        let filter = PvFilter::default();
        for total in [1usize, 3, 7, 199, 201, 1000] {
            let input: Vec<String> = (0..total).map(|i| format!("PV{}", i)).collect();
            let mut progress = Vec::new();
            filter.apply(&input, |p| progress.push(p));

            assert_eq!(progress.len(), total);
            assert!(progress.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(*progress.last().unwrap(), 100);
            assert!(progress[..total - 1].iter().all(|&p| p < 100));
        }
    }

    #[test]
    fn progress_rounds_to_nearest() {
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(1, 8), 13);
    }

    #[test]
    fn empty_catalog_yields_nothing() {
        let filter = PvFilter::default();
        let mut calls = 0;
        assert!(filter.apply(&[], |_| calls += 1).is_empty());
        assert_eq!(calls, 0);
    }
}
