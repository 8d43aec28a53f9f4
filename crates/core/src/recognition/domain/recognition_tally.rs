use std::collections::BTreeMap;

use crate::recognition::domain::decision_policy::UNKNOWN_LABEL;

/// Per-run count of confident recognitions by identity.
///
/// Counts only grow. Owned by a single pipeline; nothing is persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecognitionTally {
    counts: BTreeMap<String, u64>,
}

impl RecognitionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments `label`'s count. Returns `false` (and records nothing)
    /// for the unknown label.
    pub fn record(&mut self, label: &str) -> bool {
        if label == UNKNOWN_LABEL {
            return false;
        }
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
        true
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.clone()
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `"Alice=3, Bob=1"`, sorted by identity.
    pub fn summary(&self) -> String {
        if self.counts.is_empty() {
            return "none".to_string();
        }
        self.counts
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
