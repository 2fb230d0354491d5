//! SARIF (Static Analysis Results Interchange Format) output for code scanning integration.
//!
//! When used with `--format sarif`, the output can be uploaded to GitHub Code Scanning
//! to show supply-chain findings as annotations on pull requests.

use std::collections::BTreeMap;

use crate::model::{Finding, FindingKind, ScanReport, Severity};
use anyhow::Result;
use serde::Serialize;

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

/// SARIF v2.1.0 schema root
#[derive(Serialize)]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: &'static str,
    name: &'static str,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_configuration: SarifRuleConfiguration,
}

#[derive(Serialize)]
struct SarifRuleConfiguration {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: &'static str,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<SarifRegion>,
}

#[derive(Serialize)]
struct SarifArtifactLocation {
    uri: String,
}

#[derive(Serialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: u64,
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// Best artifact for a finding: an explicit file, then a path, then the
/// package name, then the scan target itself.
fn location_uri(finding: &Finding, target: &str) -> String {
    ["file", "path", "package", "submodule"]
        .iter()
        .find_map(|key| finding.details.get(*key).and_then(|v| v.as_str()))
        .unwrap_or(target)
        .to_string()
}

fn build_report(report: &ScanReport) -> SarifReport {
    let target = report.target.path.display().to_string();

    // One rule per finding kind, at the most urgent level seen for it
    let mut kinds: BTreeMap<FindingKind, Severity> = BTreeMap::new();
    for finding in &report.findings {
        kinds
            .entry(finding.kind)
            .and_modify(|s| {
                if finding.severity.rank() < s.rank() {
                    *s = finding.severity;
                }
            })
            .or_insert(finding.severity);
    }

    let rules = kinds
        .into_iter()
        .map(|(kind, severity)| SarifRule {
            id: kind.as_str(),
            name: kind.title(),
            short_description: SarifMessage {
                text: kind.title().to_string(),
            },
            default_configuration: SarifRuleConfiguration {
                level: severity_to_sarif_level(severity),
            },
        })
        .collect();

    let results = report
        .sorted_findings()
        .into_iter()
        .map(|finding| SarifResult {
            rule_id: finding.kind.as_str(),
            level: severity_to_sarif_level(finding.severity),
            message: SarifMessage {
                text: finding.message.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation {
                        uri: location_uri(finding, &target),
                    },
                    region: finding
                        .details
                        .get("line")
                        .and_then(|v| v.as_u64())
                        .map(|start_line| SarifRegion { start_line }),
                },
            }],
        })
        .collect();

    SarifReport {
        schema: SARIF_SCHEMA,
        version: "2.1.0",
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "chainscan",
                    version: env!("CARGO_PKG_VERSION"),
                    rules,
                },
            },
            results,
        }],
    }
}

/// Generate and print SARIF output
pub fn print_sarif(report: &ScanReport) -> Result<()> {
    println!("{}", generate_sarif_string(report)?);
    Ok(())
}

/// Generate SARIF as a string (for file output)
pub fn generate_sarif_string(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&build_report(report))?)
}
