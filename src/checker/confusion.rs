use std::collections::BTreeSet;

use super::{major_version, Rule, ScanContext};
use crate::error::ScanError;
use crate::loader::REGISTRY_CONFIG_FILE;
use crate::model::{Finding, FindingKind, Severity};

/// Looks for signs that a scoped (presumably private) dependency was resolved
/// from a public registry instead.
///
/// Two signals: an installed scoped package with an implausible major
/// version, and scoped dependencies without any registry configuration that
/// pins their scope.
pub struct DependencyConfusionRule;

impl Rule for DependencyConfusionRule {
    fn id(&self) -> &'static str {
        "dependency-confusion"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let threshold = ctx.config.versions.major_threshold;
        let scoped: Vec<_> = ctx
            .inputs
            .dependencies
            .iter()
            .filter(|d| d.is_scoped())
            .collect();

        let mut findings = Vec::new();

        for dep in &scoped {
            let Some(version) = dep.installed_version.as_deref() else {
                continue;
            };
            let Some(major) = major_version(version) else {
                continue;
            };

            if major > threshold {
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        FindingKind::DependencyConfusion,
                        format!(
                            "Scoped package \"{}\" may be victim of dependency confusion (version: {})",
                            dep.name, version
                        ),
                    )
                    .with_detail("package", dep.name.as_str())
                    .with_detail("version", version)
                    .with_detail("declared", dep.declared.as_str()),
                );
            }
        }

        if scoped.is_empty() {
            return Ok(findings);
        }

        match &ctx.inputs.registry {
            None => {
                findings.push(
                    Finding::new(
                        Severity::Warning,
                        FindingKind::MissingRegistryConfig,
                        format!(
                            "No {} found but scoped packages detected. Consider configuring registry scopes.",
                            REGISTRY_CONFIG_FILE
                        ),
                    )
                    .with_detail("scoped_packages", scoped.len()),
                );
            }
            Some(registry) => {
                let scopes: BTreeSet<&str> = scoped.iter().filter_map(|d| d.scope()).collect();
                for scope in scopes {
                    if registry.mapped_scopes.contains(scope) {
                        continue;
                    }
                    findings.push(
                        Finding::new(
                            Severity::Info,
                            FindingKind::UnmappedRegistryScope,
                            format!(
                                "Scope \"{}\" has no registry mapping in {}",
                                scope,
                                registry.path.display()
                            ),
                        )
                        .with_detail("scope", scope),
                    );
                }
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::test_support::run;
    use crate::checker::ScanInputs;
    use crate::config::Config;
    use crate::loader::RegistryConfig;
    use crate::model::{Dependency, DependencyOrigin};
    use std::path::{Path, PathBuf};

    fn scoped(name: &str, installed: Option<&str>) -> Dependency {
        Dependency::new(name, "^1.0.0", DependencyOrigin::Direct)
            .with_installed(installed.map(String::from))
    }

    #[test]
    fn test_high_version_scoped_is_critical() {
        let inputs = ScanInputs {
            dependencies: vec![scoped("@scope/pkg", Some("999.999.999"))],
            ..Default::default()
        };
        let findings = run(&DependencyConfusionRule, Path::new("."), &Config::default(), &inputs);

        let critical: Vec<_> = findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].kind, FindingKind::DependencyConfusion);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::MissingRegistryConfig));
    }

    #[test]
    fn test_mapped_scope_is_quiet() {
        let mut mapped_scopes = std::collections::BTreeSet::new();
        mapped_scopes.insert("@techcorp".to_string());
        let inputs = ScanInputs {
            dependencies: vec![scoped("@techcorp/auth-lib", Some("1.2.0"))],
            registry: Some(RegistryConfig {
                path: PathBuf::from(".npmrc"),
                mapped_scopes,
            }),
            ..Default::default()
        };
        let findings = run(&DependencyConfusionRule, Path::new("."), &Config::default(), &inputs);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_unmapped_scope_is_info() {
        let inputs = ScanInputs {
            dependencies: vec![scoped("@techcorp/auth-lib", None)],
            registry: Some(RegistryConfig {
                path: PathBuf::from(".npmrc"),
                mapped_scopes: Default::default(),
            }),
            ..Default::default()
        };
        let findings = run(&DependencyConfusionRule, Path::new("."), &Config::default(), &inputs);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::UnmappedRegistryScope);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_no_scoped_dependencies() {
        let inputs = ScanInputs {
            dependencies: vec![Dependency::new("express", "^4.0.0", DependencyOrigin::Direct)],
            ..Default::default()
        };
        let findings = run(&DependencyConfusionRule, Path::new("."), &Config::default(), &inputs);
        assert!(findings.is_empty());
    }
}
