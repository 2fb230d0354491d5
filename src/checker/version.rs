use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::model::{Finding, FindingKind, Severity};

/// Major component of a version string.
///
/// Tries semver first, then falls back to the leading digits of the first
/// dot-separated component so that loose strings like `v999` or `1000.x`
/// still yield a number.
pub fn major_version(version: &str) -> Option<u64> {
    let trimmed = version.trim().trim_start_matches(['v', '=']);

    if let Ok(parsed) = semver::Version::parse(trimmed) {
        return Some(parsed.major);
    }

    let first = trimmed.split('.').next()?;
    let digits: String = first.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Flags installed packages whose major version is implausibly high.
///
/// Scoped packages that are also declared dependencies are left to the
/// dependency confusion rule, which reports them with their declared range.
/// Undeclared scoped packages pulled in transitively are flagged here.
pub struct SuspiciousVersionRule;

impl Rule for SuspiciousVersionRule {
    fn id(&self) -> &'static str {
        "suspicious-version"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let threshold = ctx.config.versions.major_threshold;
        let declared = |name: &str| ctx.inputs.dependencies.iter().any(|d| d.name == name);

        let findings = ctx
            .inputs
            .installed
            .iter()
            .filter(|pkg| !(pkg.is_scoped() && declared(&pkg.name)))
            .filter_map(|pkg| {
                let version = pkg.version()?;
                let major = major_version(version)?;
                (major > threshold).then(|| {
                    Finding::new(
                        Severity::Critical,
                        FindingKind::SuspiciousVersion,
                        format!(
                            "Package \"{}\" has suspicious version: {}",
                            pkg.name, version
                        ),
                    )
                    .with_detail("package", pkg.name.as_str())
                    .with_detail("version", version)
                })
            })
            .collect();

        Ok(findings)
    }
}
