//! Reading scan inputs from disk.
//!
//! Missing files are an ordinary outcome here: [`read_optional`] returns
//! `Ok(None)` for them, and callers decide whether absence is fatal.
//! Malformed content surfaces as a [`ScanError`] which the orchestrator turns
//! into an `ERROR` finding.

mod gitmodules;

pub use gitmodules::parse_gitmodules;

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::model::{InstalledPackage, Manifest, SubmoduleRecord};

pub const MANIFEST_FILE: &str = "package.json";
pub const INSTALLED_DIR: &str = "node_modules";
pub const REGISTRY_CONFIG_FILE: &str = ".npmrc";
pub const SUBMODULES_FILE: &str = ".gitmodules";
pub const BUILD_SPEC_FILE: &str = "Dockerfile";

/// Reads a UTF-8 file, treating a missing file as `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>, ScanError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ScanError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads a file for content scanning, treating a missing file as `None`.
///
/// Invalid UTF-8 is replaced rather than rejected so a stray byte cannot hide
/// the rest of the file from pattern matching.
pub fn read_optional_lossy(path: &Path) -> Result<Option<String>, ScanError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ScanError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads a file that must exist, reporting absence as `ManifestNotFound`.
pub fn read_required(path: &Path) -> Result<String, ScanError> {
    read_optional(path)?.ok_or_else(|| ScanError::ManifestNotFound(path.to_path_buf()))
}

pub fn parse_manifest(path: &Path, content: &str) -> Result<Manifest, ScanError> {
    serde_json::from_str(content).map_err(|source| ScanError::MalformedManifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads `dir/package.json`.
pub fn load_manifest(dir: &Path) -> Result<Manifest, ScanError> {
    let path = dir.join(MANIFEST_FILE);
    let content = read_required(&path)?;
    parse_manifest(&path, &content)
}

/// Loads a manifest that may legitimately be absent or broken, such as one
/// inside `node_modules`. Problems are logged and yield `None`.
pub fn load_manifest_lenient(dir: &Path) -> Option<Manifest> {
    match load_manifest(dir) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            debug!("Skipping package manifest: {}", e);
            None
        }
    }
}

/// Lists packages installed under `root/node_modules`, expanding `@scope`
/// directories. Sorted by name so repeated scans see the same order.
pub fn list_installed(root: &Path) -> Vec<InstalledPackage> {
    let installed_dir = root.join(INSTALLED_DIR);
    if !installed_dir.is_dir() {
        debug!("No {} under {}", INSTALLED_DIR, root.display());
        return Vec::new();
    }

    let walker = WalkDir::new(&installed_dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.')
        });

    let mut packages = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let Some(name) = installed_name(&installed_dir, entry.path()) else {
            continue;
        };

        let path = entry.path().to_path_buf();
        packages.push(InstalledPackage {
            name,
            manifest: load_manifest_lenient(&path),
            path,
        });
    }

    packages
}

/// Maps a directory under `node_modules` to a package name, or `None` for
/// scope directories and nested paths that are not packages.
fn installed_name(installed_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(installed_dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    match parts.as_slice() {
        [single] if !single.starts_with('@') => Some(single.clone()),
        [scope, name] if scope.starts_with('@') => Some(format!("{}/{}", scope, name)),
        _ => None,
    }
}

/// Registry configuration found at the scan root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    pub path: PathBuf,
    /// Scopes with an explicit `@scope:registry=` mapping.
    pub mapped_scopes: BTreeSet<String>,
}

pub fn load_registry_config(root: &Path) -> Result<Option<RegistryConfig>, ScanError> {
    let path = root.join(REGISTRY_CONFIG_FILE);
    let Some(content) = read_optional(&path)? else {
        return Ok(None);
    };

    let mapped_scopes = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let (key, _) = line.split_once('=')?;
            let scope = key.trim().strip_suffix(":registry")?;
            scope.starts_with('@').then(|| scope.to_string())
        })
        .collect();

    Ok(Some(RegistryConfig {
        path,
        mapped_scopes,
    }))
}

pub fn load_submodules(root: &Path) -> Result<Vec<SubmoduleRecord>, ScanError> {
    let path = root.join(SUBMODULES_FILE);
    Ok(read_optional(&path)?
        .map(|content| parse_gitmodules(&content))
        .unwrap_or_default())
}
