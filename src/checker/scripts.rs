use serde_json::json;

use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::model::{Finding, FindingKind, Severity};

/// Command fragments that make a manifest script worth a look.
struct ScriptPattern {
    kind: FindingKind,
    label: &'static str,
    needles: &'static [&'static str],
}

const SCRIPT_PATTERNS: &[ScriptPattern] = &[
    ScriptPattern {
        kind: FindingKind::SuspiciousScript,
        label: "network operations",
        needles: &["curl", "wget"],
    },
    ScriptPattern {
        kind: FindingKind::DestructiveScript,
        label: "destructive operations",
        needles: &["rm -rf", "del /f"],
    },
];

/// Flags root manifest scripts that fetch from the network or delete
/// recursively.
pub struct ScriptRule;

impl Rule for ScriptRule {
    fn id(&self) -> &'static str {
        "manifest-scripts"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let Some(manifest) = &ctx.inputs.manifest else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();

        for (name, command) in &manifest.scripts {
            for pattern in SCRIPT_PATTERNS {
                let Some(needle) = pattern.needles.iter().find(|n| command.contains(**n)) else {
                    continue;
                };

                findings.push(
                    Finding::new(
                        Severity::Warning,
                        pattern.kind,
                        format!(
                            "Script \"{}\" contains {}: {}",
                            name, pattern.label, command
                        ),
                    )
                    .with_detail("script", name.as_str())
                    .with_detail("command", command.as_str())
                    .with_detail("matched", *needle),
                );
            }
        }

        Ok(findings)
    }
}

/// Notes installed packages that run code at install time.
pub struct InstallScriptRule;

impl Rule for InstallScriptRule {
    fn id(&self) -> &'static str {
        "install-scripts"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let findings = ctx
            .inputs
            .installed
            .iter()
            .filter_map(|pkg| {
                let manifest = pkg.manifest.as_ref()?;
                if !manifest.has_install_scripts() {
                    return None;
                }

                let scripts: serde_json::Map<String, serde_json::Value> = ["install", "postinstall"]
                    .into_iter()
                    .filter_map(|hook| Some((hook.to_string(), json!(manifest.script(hook)?))))
                    .collect();

                Some(
                    Finding::new(
                        Severity::Info,
                        FindingKind::InstallScript,
                        format!("Package \"{}\" has install scripts", pkg.name),
                    )
                    .with_detail("package", pkg.name.as_str())
                    .with_detail("scripts", serde_json::Value::Object(scripts)),
                )
            })
            .collect();

        Ok(findings)
    }
}
