use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::model::{Finding, FindingKind, Severity};

/// Compares a package's repository, author and tarball integrity against the
/// configured baseline. A field is only compared when both the baseline and
/// the manifest carry it.
pub struct MetadataRule;

impl Rule for MetadataRule {
    fn id(&self) -> &'static str {
        "metadata"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let Some(manifest) = &ctx.inputs.manifest else {
            return Ok(Vec::new());
        };
        let baseline = &ctx.config.metadata;

        let observed = [
            (
                "repository",
                baseline.repository.as_deref(),
                manifest.repository.as_ref().map(|r| r.url().to_string()),
            ),
            (
                "author",
                baseline.author.as_deref(),
                manifest.author.as_ref().map(|a| a.display()),
            ),
            (
                "integrity",
                baseline.integrity.as_deref(),
                manifest.dist.as_ref().and_then(|d| d.integrity.clone()),
            ),
        ];

        let package = manifest.name.as_deref().unwrap_or("(unnamed)");

        let findings = observed
            .into_iter()
            .filter_map(|(field, expected, actual)| {
                let expected = expected?;
                let actual = actual?;
                if expected == actual {
                    return None;
                }

                let message = if field == "integrity" {
                    "tarball integrity mismatch".to_string()
                } else {
                    format!("{} mismatch: expected {} got {}", field, expected, actual)
                };

                Some(
                    Finding::new(Severity::Warning, FindingKind::MetadataMismatch, message)
                        .with_detail("package", package)
                        .with_detail("field", field)
                        .with_detail("expected", expected)
                        .with_detail("actual", actual),
                )
            })
            .collect();

        Ok(findings)
    }
}
