use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::loader::BUILD_SPEC_FILE;
use crate::model::{Finding, FindingKind, Severity};

struct BuildPattern {
    pattern: &'static str,
    kind: FindingKind,
    severity: Severity,
    label: &'static str,
}

const BUILD_PATTERNS: &[BuildPattern] = &[
    BuildPattern {
        pattern: r"(?i)curl .*http",
        kind: FindingKind::BuildNetworkFetch,
        severity: Severity::Warning,
        label: "network fetch in Dockerfile",
    },
    BuildPattern {
        pattern: r"(?i)wget .*http",
        kind: FindingKind::BuildNetworkFetch,
        severity: Severity::Warning,
        label: "network fetch in Dockerfile",
    },
    BuildPattern {
        pattern: r"(?i)host\.docker\.internal",
        kind: FindingKind::BuildHostReference,
        severity: Severity::Warning,
        label: "references host.docker.internal",
    },
];

static COMPILED_BUILD_PATTERNS: Lazy<Vec<(&'static BuildPattern, Regex)>> = Lazy::new(|| {
    BUILD_PATTERNS
        .iter()
        .filter_map(|p| match Regex::new(p.pattern) {
            Ok(re) => Some((p, re)),
            Err(e) => {
                warn!("Invalid build spec pattern {:?}: {}", p.pattern, e);
                None
            }
        })
        .collect()
});

/// Statically inspects a `Dockerfile` line by line.
pub struct BuildSpecRule;

impl Rule for BuildSpecRule {
    fn id(&self) -> &'static str {
        "build-spec"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let Some(spec) = ctx.inputs.build_spec.as_deref() else {
            return Ok(Vec::new());
        };

        let entrypoints = &ctx.config.container.known_malicious_entrypoints;
        let mut findings = Vec::new();

        for (index, line) in spec.lines().enumerate() {
            let line_number = index + 1;
            let instruction = line.trim();
            if instruction.is_empty() || instruction.starts_with('#') {
                continue;
            }

            // One finding per kind per line, even when curl and wget both appear.
            let mut reported = Vec::new();
            for (pattern, re) in COMPILED_BUILD_PATTERNS.iter() {
                if reported.contains(&pattern.kind) || !re.is_match(instruction) {
                    continue;
                }
                reported.push(pattern.kind);
                findings.push(
                    Finding::new(
                        pattern.severity,
                        pattern.kind,
                        format!("{} (line {})", pattern.label, line_number),
                    )
                    .with_detail("file", BUILD_SPEC_FILE)
                    .with_detail("line", line_number)
                    .with_detail("instruction", instruction),
                );
            }

            let lowered = instruction.to_lowercase();
            for entrypoint in entrypoints {
                if lowered.contains(&entrypoint.to_lowercase()) {
                    findings.push(
                        Finding::new(
                            Severity::Critical,
                            FindingKind::KnownMaliciousEntrypoint,
                            format!("known malicious entrypoint {} (line {})", entrypoint, line_number),
                        )
                        .with_detail("file", BUILD_SPEC_FILE)
                        .with_detail("line", line_number)
                        .with_detail("entrypoint", entrypoint.as_str()),
                    );
                }
            }
        }

        Ok(findings)
    }
}
