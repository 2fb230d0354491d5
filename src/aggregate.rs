//! Append-only collection of findings with running counters.

use tracing::trace;

use crate::config::IgnoreConfig;
use crate::model::{Finding, ScanStats};

/// Collects findings from every rule of a scan.
///
/// Counters are updated on each push and always equal
/// [`ScanStats::recompute`] over the stored findings. Nothing is
/// deduplicated: two rules reporting the same issue both show up.
#[derive(Debug, Default)]
pub struct Findings {
    items: Vec<Finding>,
    stats: ScanStats,
    ignore: IgnoreConfig,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that silently drops findings matching the ignore list.
    pub fn with_ignore(ignore: IgnoreConfig) -> Self {
        Self {
            ignore,
            ..Self::default()
        }
    }

    /// Appends a finding. Returns `false` when the ignore list dropped it.
    pub fn push(&mut self, finding: Finding) -> bool {
        if self.is_ignored(&finding) {
            trace!(kind = %finding.kind, "Ignoring finding");
            return false;
        }

        self.stats.record(&finding);
        self.items.push(finding);
        true
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    fn is_ignored(&self, finding: &Finding) -> bool {
        if self.ignore.should_ignore_kind(finding.kind) {
            return true;
        }
        finding
            .package()
            .is_some_and(|package| self.ignore.should_ignore_package(package))
    }

    pub fn set_total_packages(&mut self, total: usize) {
        self.stats.total_packages = total;
    }

    pub fn as_slice(&self) -> &[Finding] {
        &self.items
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Finding>, ScanStats) {
        (self.items, self.stats)
    }
}
