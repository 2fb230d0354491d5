use super::{distance, Rule, ScanContext};
use crate::error::ScanError;
use crate::model::{Finding, FindingKind, Severity};

/// Flags declared dependencies whose names sit within a small edit distance
/// of a popular package without being that package.
pub struct TyposquatRule;

impl Rule for TyposquatRule {
    fn id(&self) -> &'static str {
        "typosquat"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let threshold = ctx.config.typosquat.threshold;
        let mut findings = Vec::new();

        for dep in &ctx.inputs.dependencies {
            let name = dep.name.to_lowercase();

            for popular in &ctx.config.typosquat.popular_packages {
                if name == *popular {
                    continue;
                }

                let d = distance(&name, popular);
                if d > 0 && d <= threshold {
                    findings.push(
                        Finding::new(
                            Severity::Warning,
                            FindingKind::Typosquatting,
                            format!(
                                "Possible typosquatting: \"{}\" is similar to popular package \"{}\"",
                                dep.name, popular
                            ),
                        )
                        .with_detail("package", dep.name.as_str())
                        .with_detail("similar", popular.as_str())
                        .with_detail("distance", d),
                    );
                }
            }
        }

        Ok(findings)
    }
}
