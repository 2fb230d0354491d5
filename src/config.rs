//! Configuration file handling.
//!
//! Every heuristic threshold and reference list the rules use lives here, so
//! detection policy can be tuned without touching rule code.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/chainscan/config.toml`
//! - macOS: `~/Library/Application Support/chainscan/config.toml`
//! - Windows: `%APPDATA%\chainscan\config.toml`
//!
//! A different file can be passed with `--config`.
//!
//! # Example Configuration
//!
//! ```toml
//! default_format = "table"
//!
//! [typosquat]
//! threshold = 2
//! popular_packages = ["express", "react", "lodash"]
//!
//! [patterns]
//! match_threshold = 3
//! max_packages = 20
//!
//! [signing]
//! trusted_fingerprint = "ABCD 1234 EFGH 5678 90AB CDEF 1234 5678 90AB CDEF"
//!
//! [ignore]
//! packages = ["@types/*"]
//! kinds = ["INSTALL_SCRIPT"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::FindingKind;

/// Application configuration.
///
/// ```
/// use chainscan::Config;
///
/// let config = Config::default();
/// assert_eq!(config.typosquat.threshold, 2);
/// assert_eq!(config.patterns.max_packages, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "sarif"
    /// Default: "table"
    pub default_format: String,

    pub typosquat: TyposquatConfig,
    pub versions: VersionConfig,
    pub patterns: PatternConfig,
    pub signing: SigningConfig,
    pub submodules: SubmoduleConfig,
    pub metadata: MetadataBaseline,
    pub container: ContainerConfig,

    /// Ignore list configuration for suppressing known false positives.
    pub ignore: IgnoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TyposquatConfig {
    /// Maximum edit distance that still counts as a lookalike.
    pub threshold: usize,
    /// Reference names that dependencies are compared against.
    pub popular_packages: Vec<String>,
}

impl Default for TyposquatConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            popular_packages: [
                "express",
                "react",
                "vue",
                "angular",
                "lodash",
                "axios",
                "moment",
                "jquery",
                "webpack",
                "babel",
                "typescript",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    /// Installed major versions above this are treated as anomalous.
    pub major_threshold: u64,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            major_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// A pattern must match more than this many times in one file.
    pub match_threshold: usize,
    /// Upper bound on installed packages whose entry file is scanned.
    pub max_packages: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            match_threshold: 3,
            max_packages: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub trusted_fingerprint: String,
    /// Substrings in `postinstall.js` that indicate exfiltration.
    pub behavior_indicators: Vec<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            trusted_fingerprint: "ABCD 1234 EFGH 5678 90AB CDEF 1234 5678 90AB CDEF".to_string(),
            behavior_indicators: vec!["exfiltrate".to_string(), "collect".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmoduleConfig {
    /// URL substrings that mark a submodule as malicious.
    pub denylist: Vec<String>,
    /// Substrings in submodule install scripts that indicate exfiltration.
    pub script_indicators: Vec<String>,
}

impl Default for SubmoduleConfig {
    fn default() -> Self {
        Self {
            denylist: vec![
                "malicious".to_string(),
                "evil".to_string(),
                "hack".to_string(),
            ],
            script_indicators: vec![
                "curl".to_string(),
                "wget".to_string(),
                "/collect".to_string(),
            ],
        }
    }
}

/// Expected metadata for single-package validation. Unset fields are not
/// compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataBaseline {
    pub repository: Option<String>,
    pub author: Option<String>,
    pub integrity: Option<String>,
}

impl Default for MetadataBaseline {
    fn default() -> Self {
        Self {
            repository: Some("https://github.com/example/clean-utils.git".to_string()),
            author: Some("Clean Maintainers <maintainers@example.com>".to_string()),
            integrity: Some("SIMULATED-INTEGRITY-1".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub known_malicious_entrypoints: Vec<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            known_malicious_entrypoints: vec!["malicious-start.js".to_string()],
        }
    }
}

/// Configuration for ignoring specific packages or finding kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names whose findings are dropped.
    ///
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,

    /// Finding kinds that are never reported.
    pub kinds: Vec<FindingKind>,
}

impl IgnoreConfig {
    /// Check if findings about a package should be dropped.
    pub fn should_ignore_package(&self, package: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, package)
            } else {
                pattern == package
            }
        })
    }

    pub fn should_ignore_kind(&self, kind: FindingKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_format: "table".to_string(),
            typosquat: TyposquatConfig::default(),
            versions: VersionConfig::default(),
            patterns: PatternConfig::default(),
            signing: SigningConfig::default(),
            submodules: SubmoduleConfig::default(),
            metadata: MetadataBaseline::default(),
            container: ContainerConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the default config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chainscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("lodash", "lodash"));
        assert!(!glob_match("lodash", "underscore"));
    }

    #[test]
    fn test_glob_match_prefix_and_suffix() {
        assert!(glob_match("lodash*", "lodash.debounce"));
        assert!(glob_match("*-cli", "typescript-cli"));
        assert!(!glob_match("*-cli", "typescript"));
    }

    #[test]
    fn test_glob_match_scoped() {
        assert!(glob_match("@techcorp/*", "@techcorp/auth-lib"));
        assert!(!glob_match("@techcorp/*", "@babel/core"));
    }

    #[test]
    fn test_ignore_config() {
        let config = IgnoreConfig {
            packages: vec!["lodash".to_string(), "@types/*".to_string()],
            kinds: vec![FindingKind::InstallScript],
        };

        assert!(config.should_ignore_package("lodash"));
        assert!(config.should_ignore_package("@types/node"));
        assert!(!config.should_ignore_package("@babel/core"));
        assert!(config.should_ignore_kind(FindingKind::InstallScript));
        assert!(!config.should_ignore_kind(FindingKind::Typosquatting));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [typosquat]
            threshold = 1

            [ignore]
            kinds = ["MISSING_REGISTRY_CONFIG"]
            "#,
        )
        .unwrap();

        assert_eq!(config.typosquat.threshold, 1);
        assert_eq!(config.typosquat.popular_packages.len(), 11);
        assert_eq!(config.patterns.match_threshold, 3);
        assert_eq!(config.versions.major_threshold, 100);
        assert!(config
            .ignore
            .should_ignore_kind(FindingKind::MissingRegistryConfig));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = Config::generate_default_config();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(
            parsed.signing.trusted_fingerprint,
            Config::default().signing.trusted_fingerprint
        );
    }
}
