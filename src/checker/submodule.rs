use std::path::Path;

use tracing::debug;

use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::loader::read_optional_lossy;
use crate::model::{Finding, FindingKind, Severity, SubmoduleRecord};

const ALLOWED_SCHEMES: &[&str] = &["http://", "https://", "git@"];
const SCRIPT_FILES: &[&str] = &["postinstall.sh", "postinstall.js"];

fn submodule_finding(
    severity: Severity,
    kind: FindingKind,
    submodule: &SubmoduleRecord,
    message: String,
) -> Finding {
    Finding::new(severity, kind, message)
        .with_detail("submodule", submodule.name.as_str())
        .with_detail("url", submodule.url.as_str())
}

/// Parent components or an absolute path would leave the repository on join.
fn escapes_root(relative: &str) -> bool {
    let path = Path::new(relative);
    path.is_absolute()
        || path.has_root()
        || relative.split(['/', '\\']).any(|part| part == "..")
}

/// Validates the URLs declared in `.gitmodules`.
pub struct SubmoduleUrlRule;

impl Rule for SubmoduleUrlRule {
    fn id(&self) -> &'static str {
        "submodule-urls"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let denylist = &ctx.config.submodules.denylist;
        let mut findings = Vec::new();

        for sub in &ctx.inputs.submodules {
            let url = sub.url.as_str();

            if url.starts_with("./") || url.starts_with("../") {
                findings.push(submodule_finding(
                    Severity::Warning,
                    FindingKind::LocalSubmoduleUrl,
                    sub,
                    format!("Submodule \"{}\" uses local/relative URL: {}", sub.name, url),
                ));
            }

            if !ALLOWED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
                findings.push(submodule_finding(
                    Severity::Warning,
                    FindingKind::SuspiciousSubmoduleUrl,
                    sub,
                    format!(
                        "Submodule \"{}\" has suspicious URL format: {}",
                        sub.name, url
                    ),
                ));
            }

            let lowered = url.to_lowercase();
            let keywords: Vec<&str> = denylist
                .iter()
                .map(String::as_str)
                .filter(|keyword| lowered.contains(&keyword.to_lowercase()))
                .collect();

            if !keywords.is_empty() {
                findings.push(
                    submodule_finding(
                        Severity::Critical,
                        FindingKind::MaliciousSubmoduleUrl,
                        sub,
                        format!(
                            "Submodule \"{}\" has suspicious URL containing malicious keywords: {}",
                            sub.name, url
                        ),
                    )
                    .with_detail("keywords", keywords),
                );
            }
        }

        Ok(findings)
    }
}

/// Inspects checked-out submodules for install scripts that phone home.
pub struct SubmoduleContentRule;

impl Rule for SubmoduleContentRule {
    fn id(&self) -> &'static str {
        "submodule-content"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let indicators = &ctx.config.submodules.script_indicators;
        let mut findings = Vec::new();

        for sub in &ctx.inputs.submodules {
            let relative = sub.path.as_deref().unwrap_or(&sub.name);
            if escapes_root(relative) {
                debug!("Not following submodule path outside the repository: {}", relative);
                continue;
            }

            let dir = ctx.root.join(relative);
            if !dir.is_dir() {
                debug!("Submodule {} not checked out at {}", sub.name, dir.display());
                continue;
            }

            let Some(script) = SCRIPT_FILES.iter().map(|f| dir.join(f)).find(|p| p.is_file()) else {
                continue;
            };
            let script_name = script
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            findings.push(
                Finding::new(
                    Severity::Warning,
                    FindingKind::PostinstallInSubmodule,
                    format!("Submodule \"{}\" contains postinstall script", sub.name),
                )
                .with_detail("submodule", sub.name.as_str())
                .with_detail("path", relative)
                .with_detail("script", script_name.as_str()),
            );

            let content = match read_optional_lossy(&script) {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping submodule script: {}", e);
                    continue;
                }
            };

            let hits: Vec<&str> = indicators
                .iter()
                .map(String::as_str)
                .filter(|indicator| content.contains(indicator))
                .collect();

            if !hits.is_empty() {
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        FindingKind::MaliciousSubmoduleScript,
                        format!(
                            "Submodule \"{}\" contains script with network exfiltration",
                            sub.name
                        ),
                    )
                    .with_detail("submodule", sub.name.as_str())
                    .with_detail("script", script_name.as_str())
                    .with_detail("indicators", hits),
                );
            }
        }

        Ok(findings)
    }
}
