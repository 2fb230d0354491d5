use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{Rule, ScanContext};
use crate::error::ScanError;
use crate::loader::read_optional_lossy;
use crate::model::{Finding, FindingKind, InstalledPackage, Severity};

/// One entry of the code pattern table.
#[derive(Debug, Clone, Copy)]
pub struct CodePattern {
    pub pattern: &'static str,
    pub label: &'static str,
    pub severity: Severity,
}

/// Risky constructs looked for in package entry files.
pub const CODE_PATTERNS: &[CodePattern] = &[
    CodePattern {
        pattern: r"eval\s*\(",
        label: "eval() usage",
        severity: Severity::Warning,
    },
    CodePattern {
        pattern: r"Function\s*\(",
        label: "Function constructor",
        severity: Severity::Warning,
    },
    CodePattern {
        pattern: r"child_process",
        label: "child_process access",
        severity: Severity::Info,
    },
    CodePattern {
        pattern: r"\bexec\b",
        label: "exec() usage",
        severity: Severity::Warning,
    },
    CodePattern {
        pattern: r"(?i)base64",
        label: "Base64 encoding",
        severity: Severity::Info,
    },
];

static COMPILED_PATTERNS: Lazy<Vec<(CodePattern, Regex)>> = Lazy::new(|| {
    CODE_PATTERNS
        .iter()
        .filter_map(|p| match Regex::new(p.pattern) {
            Ok(re) => Some((*p, re)),
            Err(e) => {
                warn!("Invalid code pattern {:?}: {}", p.pattern, e);
                None
            }
        })
        .collect()
});

/// The file a package loads first: its `main` entry when that resolves to a
/// file inside the package, otherwise `index.js`.
fn entry_file(pkg: &InstalledPackage) -> PathBuf {
    let main = pkg
        .manifest
        .as_ref()
        .and_then(|m| m.main.as_deref())
        .map(|m| m.trim_start_matches("./"))
        .filter(|m| !m.is_empty() && !m.contains("..") && !is_rooted(m));

    if let Some(main) = main {
        let candidates = [
            pkg.path.join(main),
            pkg.path.join(format!("{}.js", main)),
            pkg.path.join(main).join("index.js"),
        ];
        if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
            return found;
        }
    }

    pkg.path.join("index.js")
}

/// Absolute or root-relative paths would replace the package directory on join.
fn is_rooted(path: &str) -> bool {
    let path = Path::new(path);
    path.is_absolute() || path.has_root()
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Counts risky code patterns in the entry file of installed packages.
///
/// Only the first `patterns.max_packages` installed packages are read so a
/// large tree costs a bounded amount of I/O. A pattern is reported when it
/// matches more than `patterns.match_threshold` times in one file.
pub struct MaliciousPatternRule;

impl Rule for MaliciousPatternRule {
    fn id(&self) -> &'static str {
        "malicious-patterns"
    }

    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError> {
        let settings = &ctx.config.patterns;
        let mut findings = Vec::new();
        let mut scanned = 0usize;

        for pkg in ctx.inputs.installed.iter().take(settings.max_packages) {
            let file = entry_file(pkg);

            let content = match read_optional_lossy(&file) {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping {}: {}", pkg.name, e);
                    continue;
                }
            };
            scanned += 1;

            for (pattern, re) in COMPILED_PATTERNS.iter() {
                let count = re.find_iter(&content).count();
                if count <= settings.match_threshold {
                    continue;
                }

                findings.push(
                    Finding::new(
                        pattern.severity,
                        FindingKind::MaliciousPattern,
                        format!(
                            "Package \"{}\" contains multiple instances of {} ({} times)",
                            pkg.name, pattern.label, count
                        ),
                    )
                    .with_detail("package", pkg.name.as_str())
                    .with_detail("pattern", pattern.label)
                    .with_detail("count", count)
                    .with_detail("file", display_relative(ctx.root, &file)),
                );
            }
        }

        debug!(
            "Scanned {} package files for malicious patterns (cap {})",
            scanned, settings.max_packages
        );

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

    fn package(root: &Path, name: &str, manifest_json: &str, files: &[(&str, &str)]) -> InstalledPackage {
        let dir = root.join("node_modules").join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        InstalledPackage {
            name: name.to_string(),
            path: dir,
            manifest: Some(manifest(manifest_json)),
        }
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(COMPILED_PATTERNS.len(), CODE_PATTERNS.len());
    }

    #[test]
    fn test_more_than_threshold_matches_reported() {
        let root = TempDir::new().unwrap();
        let code = "eval(a); eval(b); eval (c); eval(d);\nrequire('child_process');";
        let inputs = ScanInputs {
            installed: vec![package(root.path(), "shady", "{}", &[("index.js", code)])],
            ..Default::default()
        };
        let findings = run(&MaliciousPatternRule, root.path(), &Config::default(), &inputs);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].details["count"], serde_json::json!(4));
        assert_eq!(findings[0].details["pattern"], serde_json::json!("eval() usage"));
    }

    #[test]
    fn test_exactly_threshold_not_reported() {
        let root = TempDir::new().unwrap();
        let code = "eval(a); eval(b); eval(c);";
        let inputs = ScanInputs {
            installed: vec![package(root.path(), "borderline", "{}", &[("index.js", code)])],
            ..Default::default()
        };
        let findings = run(&MaliciousPatternRule, root.path(), &Config::default(), &inputs);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_base64_is_case_insensitive_info() {
        let root = TempDir::new().unwrap();
        let code = "Base64 BASE64 base64 bAsE64";
        let inputs = ScanInputs {
            installed: vec![package(root.path(), "encoder", "{}", &[("index.js", code)])],
            ..Default::default()
        };
        let findings = run(&MaliciousPatternRule, root.path(), &Config::default(), &inputs);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_main_entry_is_followed() {
        let root = TempDir::new().unwrap();
        let code = "exec exec exec exec";
        let inputs = ScanInputs {
            installed: vec![package(
                root.path(),
                "runner",
                r#"{"main":"./lib/run"}"#,
                &[("lib/run.js", code)],
            )],
            ..Default::default()
        };
        let findings = run(&MaliciousPatternRule, root.path(), &Config::default(), &inputs);

        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].details["file"],
            serde_json::json!(Path::new("node_modules/runner/lib/run.js").display().to_string())
        );
    }

    #[test]
    fn test_scan_is_bounded() {
        let root = TempDir::new().unwrap();
        let code = "eval(1) eval(2) eval(3) eval(4)";
        let installed = (0..5)
            .map(|i| package(root.path(), &format!("pkg{}", i), "{}", &[("index.js", code)]))
            .collect();
        let inputs = ScanInputs {
            installed,
            ..Default::default()
        };

        let mut config = Config::default();
        config.patterns.max_packages = 2;

        let findings = run(&MaliciousPatternRule, root.path(), &config, &inputs);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_invalid_utf8_does_not_hide_matches() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("node_modules/sneaky");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.js"), b"eval(a);eval(b);eval(c);eval(d);// \xff").unwrap();

        let inputs = ScanInputs {
            installed: vec![InstalledPackage {
                name: "sneaky".to_string(),
                path: dir,
                manifest: Some(manifest("{}")),
            }],
            ..Default::default()
        };
        let findings = run(&MaliciousPatternRule, root.path(), &Config::default(), &inputs);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].details["count"], serde_json::json!(4));
    }

    #[test]
    fn test_absolute_main_is_not_followed() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("payload.js");
        fs::write(&target, "eval(1) eval(2) eval(3) eval(4)").unwrap();

        let main = serde_json::json!({ "main": target.display().to_string() }).to_string();
        let inputs = ScanInputs {
            installed: vec![package(root.path(), "escaper", &main, &[])],
            ..Default::default()
        };
        let findings = run(&MaliciousPatternRule, root.path(), &Config::default(), &inputs);
        assert!(findings.is_empty());
    }
}
