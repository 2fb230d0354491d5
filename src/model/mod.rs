//! Core data types for scan targets, findings and reports.
//!
//! - [`ScanTarget`] - A path plus the kind of thing it points at
//! - [`Finding`] - One detected indicator of compromise
//! - [`ScanStats`] - Counters folded from the findings of a scan
//! - [`ScanReport`] - Complete result of one scan
//!
//! # Example
//!
//! ```
//! use chainscan::model::{Finding, FindingKind, ScanStats, Severity};
//!
//! let findings = vec![Finding::new(
//!     Severity::Warning,
//!     FindingKind::Typosquatting,
//!     "Possible typosquatting",
//! )];
//! let stats = ScanStats::recompute(&findings);
//!
//! assert_eq!(stats.warning_findings, 1);
//! ```

mod finding;
mod package;

pub use finding::*;
pub use package::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// What a scan target path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// Project root with `package.json` and optionally `node_modules`.
    PackageTree,
    /// Single package directory, validated against a metadata baseline.
    Package,
    /// Single package directory carrying a `signing` block.
    SignedPackage,
    /// Git repository root with an optional `.gitmodules`.
    Repository,
    /// Directory holding a `Dockerfile`.
    ContainerBuild,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::PackageTree => "package-tree",
            TargetKind::Package => "package",
            TargetKind::SignedPackage => "signed-package",
            TargetKind::Repository => "repository",
            TargetKind::ContainerBuild => "container-build",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TargetKind::PackageTree => "Package Scanner",
            TargetKind::Package => "Metadata Validator",
            TargetKind::SignedPackage => "Signature Validator",
            TargetKind::Repository => "Submodule Validator",
            TargetKind::ContainerBuild => "Image Scanner",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
}

impl ScanTarget {
    pub fn new(path: impl Into<PathBuf>, kind: TargetKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Counters for a scan. Everything except `total_packages` is a fold over
/// the finding list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_packages: usize,
    pub suspicious_packages: usize,
    pub critical_findings: usize,
    pub warning_findings: usize,
    pub info_findings: usize,
    pub error_findings: usize,
    #[serde(skip)]
    seen_packages: BTreeSet<String>,
}

impl ScanStats {
    /// Folds one finding into the counters.
    pub fn record(&mut self, finding: &Finding) {
        match finding.severity {
            Severity::Critical => self.critical_findings += 1,
            Severity::Warning => self.warning_findings += 1,
            Severity::Info => self.info_findings += 1,
            Severity::Error => self.error_findings += 1,
        }

        if let Some(package) = finding.package() {
            if self.seen_packages.insert(package.to_string()) {
                self.suspicious_packages += 1;
            }
        }
    }

    /// Recomputes the counters from scratch. `total_packages` is left at zero
    /// since it is not derived from findings.
    pub fn recompute(findings: &[Finding]) -> Self {
        let mut stats = Self::default();
        for finding in findings {
            stats.record(finding);
        }
        stats
    }

    pub fn total_findings(&self) -> usize {
        self.critical_findings + self.warning_findings + self.info_findings + self.error_findings
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical_findings,
            Severity::Warning => self.warning_findings,
            Severity::Info => self.info_findings,
            Severity::Error => self.error_findings,
        }
    }
}

/// Process outcome derived from a finding list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitStatus {
    /// No findings at all.
    Clean,
    /// Only warnings or informational findings.
    Advisory,
    /// At least one critical or error finding.
    Failure,
}

impl ExitStatus {
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.iter().any(|f| f.severity.is_blocking()) {
            ExitStatus::Failure
        } else if findings.is_empty() {
            ExitStatus::Clean
        } else {
            ExitStatus::Advisory
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Clean | ExitStatus::Advisory => 0,
            ExitStatus::Failure => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: ScanTarget,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: ScanStats,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Findings ordered by urgency, insertion order kept within a severity.
    pub fn sorted_findings(&self) -> Vec<&Finding> {
        let mut sorted: Vec<&Finding> = self.findings.iter().collect();
        sorted.sort_by_key(|f| f.severity.rank());
        sorted
    }

    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_findings(&self.findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, package: Option<&str>) -> Finding {
        let finding = Finding::new(severity, FindingKind::MaliciousPattern, "test");
        match package {
            Some(p) => finding.with_detail("package", p),
            None => finding,
        }
    }

    #[test]
    fn test_stats_count_distinct_packages() {
        let findings = vec![
            finding(Severity::Warning, Some("a")),
            finding(Severity::Info, Some("a")),
            finding(Severity::Critical, Some("b")),
            finding(Severity::Error, None),
        ];
        let stats = ScanStats::recompute(&findings);

        assert_eq!(stats.suspicious_packages, 2);
        assert_eq!(stats.critical_findings, 1);
        assert_eq!(stats.warning_findings, 1);
        assert_eq!(stats.info_findings, 1);
        assert_eq!(stats.error_findings, 1);
        assert_eq!(stats.total_findings(), 4);
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(ExitStatus::from_findings(&[]), ExitStatus::Clean);
        assert_eq!(ExitStatus::Clean.code(), 0);

        let advisory = vec![finding(Severity::Warning, None), finding(Severity::Info, None)];
        assert_eq!(ExitStatus::from_findings(&advisory), ExitStatus::Advisory);
        assert_eq!(ExitStatus::Advisory.code(), 0);

        let failing = vec![finding(Severity::Warning, None), finding(Severity::Critical, None)];
        assert_eq!(ExitStatus::from_findings(&failing), ExitStatus::Failure);
        assert_eq!(ExitStatus::Failure.code(), 1);

        let errored = vec![finding(Severity::Error, None)];
        assert_eq!(ExitStatus::from_findings(&errored), ExitStatus::Failure);
    }

    #[test]
    fn test_sorted_findings_is_stable() {
        let report = ScanReport {
            target: ScanTarget::new(".", TargetKind::PackageTree),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            stats: ScanStats::default(),
            findings: vec![
                finding(Severity::Info, Some("first-info")),
                finding(Severity::Critical, Some("crit")),
                finding(Severity::Info, Some("second-info")),
                finding(Severity::Warning, Some("warn")),
            ],
        };

        let order: Vec<_> = report
            .sorted_findings()
            .iter()
            .map(|f| f.package().unwrap_or_default().to_string())
            .collect();
        assert_eq!(order, vec!["crit", "warn", "first-info", "second-info"]);
    }
}
