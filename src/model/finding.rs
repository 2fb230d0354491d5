use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How urgent a finding is.
///
/// Urgency order is `Critical`, `Warning`, `Info`, `Error`. `Error` marks a
/// gap in scan coverage (missing or unreadable input) rather than a detected
/// risk, so it sorts last in reports even though it fails the CI gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
        }
    }

    /// Sort key, lower is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
            Severity::Error => 3,
        }
    }

    /// Whether a finding of this severity should fail a CI gate.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    // Scan coverage
    TargetNotFound,
    ManifestNotFound,
    MalformedManifest,
    UnreadableFile,

    // Package tree
    SuspiciousScript,
    DestructiveScript,
    SuspiciousVersion,
    InstallScript,
    Typosquatting,
    DependencyConfusion,
    MissingRegistryConfig,
    UnmappedRegistryScope,
    MaliciousPattern,

    // Signing
    NoSignature,
    InvalidSignature,
    FingerprintMismatch,
    PostinstallInSigned,
    MaliciousBehavior,

    // Submodules
    LocalSubmoduleUrl,
    SuspiciousSubmoduleUrl,
    MaliciousSubmoduleUrl,
    PostinstallInSubmodule,
    MaliciousSubmoduleScript,

    // Metadata
    MetadataMismatch,

    // Container build specs
    BuildNetworkFetch,
    BuildHostReference,
    KnownMaliciousEntrypoint,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::TargetNotFound => "TARGET_NOT_FOUND",
            FindingKind::ManifestNotFound => "MANIFEST_NOT_FOUND",
            FindingKind::MalformedManifest => "MALFORMED_MANIFEST",
            FindingKind::UnreadableFile => "UNREADABLE_FILE",
            FindingKind::SuspiciousScript => "SUSPICIOUS_SCRIPT",
            FindingKind::DestructiveScript => "DESTRUCTIVE_SCRIPT",
            FindingKind::SuspiciousVersion => "SUSPICIOUS_VERSION",
            FindingKind::InstallScript => "INSTALL_SCRIPT",
            FindingKind::Typosquatting => "TYPOSQUATTING",
            FindingKind::DependencyConfusion => "DEPENDENCY_CONFUSION",
            FindingKind::MissingRegistryConfig => "MISSING_REGISTRY_CONFIG",
            FindingKind::UnmappedRegistryScope => "UNMAPPED_REGISTRY_SCOPE",
            FindingKind::MaliciousPattern => "MALICIOUS_PATTERN",
            FindingKind::NoSignature => "NO_SIGNATURE",
            FindingKind::InvalidSignature => "INVALID_SIGNATURE",
            FindingKind::FingerprintMismatch => "FINGERPRINT_MISMATCH",
            FindingKind::PostinstallInSigned => "POSTINSTALL_IN_SIGNED",
            FindingKind::MaliciousBehavior => "MALICIOUS_BEHAVIOR",
            FindingKind::LocalSubmoduleUrl => "LOCAL_SUBMODULE_URL",
            FindingKind::SuspiciousSubmoduleUrl => "SUSPICIOUS_SUBMODULE_URL",
            FindingKind::MaliciousSubmoduleUrl => "MALICIOUS_SUBMODULE_URL",
            FindingKind::PostinstallInSubmodule => "POSTINSTALL_IN_SUBMODULE",
            FindingKind::MaliciousSubmoduleScript => "MALICIOUS_SUBMODULE_SCRIPT",
            FindingKind::MetadataMismatch => "METADATA_MISMATCH",
            FindingKind::BuildNetworkFetch => "BUILD_NETWORK_FETCH",
            FindingKind::BuildHostReference => "BUILD_HOST_REFERENCE",
            FindingKind::KnownMaliciousEntrypoint => "KNOWN_MALICIOUS_ENTRYPOINT",
        }
    }

    /// Short human description, used as the SARIF rule name.
    pub fn title(&self) -> &'static str {
        match self {
            FindingKind::TargetNotFound => "Scan target not found",
            FindingKind::ManifestNotFound => "Manifest not found",
            FindingKind::MalformedManifest => "Malformed manifest",
            FindingKind::UnreadableFile => "Unreadable file",
            FindingKind::SuspiciousScript => "Script performs network operations",
            FindingKind::DestructiveScript => "Script performs destructive operations",
            FindingKind::SuspiciousVersion => "Suspiciously high package version",
            FindingKind::InstallScript => "Package runs install-time scripts",
            FindingKind::Typosquatting => "Possible typosquatted dependency",
            FindingKind::DependencyConfusion => "Possible dependency confusion",
            FindingKind::MissingRegistryConfig => "Scoped packages without registry configuration",
            FindingKind::UnmappedRegistryScope => "Scope not mapped to a registry",
            FindingKind::MaliciousPattern => "Risky code pattern density",
            FindingKind::NoSignature => "Package is not signed",
            FindingKind::InvalidSignature => "Incomplete signature information",
            FindingKind::FingerprintMismatch => "Signing key fingerprint mismatch",
            FindingKind::PostinstallInSigned => "Signed package declares postinstall",
            FindingKind::MaliciousBehavior => "Signed package exfiltrates data",
            FindingKind::LocalSubmoduleUrl => "Submodule uses a local URL",
            FindingKind::SuspiciousSubmoduleUrl => "Submodule URL has unexpected scheme",
            FindingKind::MaliciousSubmoduleUrl => "Submodule URL contains denylisted keyword",
            FindingKind::PostinstallInSubmodule => "Submodule ships a postinstall script",
            FindingKind::MaliciousSubmoduleScript => "Submodule script performs network exfiltration",
            FindingKind::MetadataMismatch => "Package metadata differs from baseline",
            FindingKind::BuildNetworkFetch => "Build spec fetches from the network",
            FindingKind::BuildHostReference => "Build spec references the container host",
            FindingKind::KnownMaliciousEntrypoint => "Build spec uses a known malicious entrypoint",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of detected risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(severity: Severity, kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            details: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// The package this finding is about, if any.
    pub fn package(&self) -> Option<&str> {
        self.details.get("package").and_then(|v| v.as_str())
    }

    /// Details rendered as `key=value` pairs in key order.
    pub fn flattened_details(&self) -> String {
        self.details
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}={}", key, s),
                other => format!("{}={}", key, other),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
