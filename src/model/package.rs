use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-field tolerant deserializers for `package.json`.
///
/// Real manifests carry numbers where strings are expected, partial
/// `repository` objects and the like. A badly typed field degrades to its
/// default instead of failing the whole manifest.
mod lenient {
    use serde::de::{DeserializeOwned, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;
    use std::collections::BTreeMap;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Strings as-is, numbers rendered (`"version": 1` reads as `"1"`).
    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Keeps the string-valued entries of an object.
    pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(s) => Some((key, s)),
                    _ => None,
                })
                .collect(),
            _ => BTreeMap::new(),
        })
    }
}

/// Where a dependency was declared in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyOrigin {
    Direct,
    Dev,
    Optional,
}

impl DependencyOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyOrigin::Direct => "direct",
            DependencyOrigin::Dev => "dev",
            DependencyOrigin::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub declared: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    pub origin: DependencyOrigin,
}

impl Dependency {
    pub fn new(name: impl Into<String>, declared: impl Into<String>, origin: DependencyOrigin) -> Self {
        Self {
            name: name.into(),
            declared: declared.into(),
            installed_version: None,
            origin,
        }
    }

    pub fn with_installed(mut self, version: Option<String>) -> Self {
        self.installed_version = version;
        self
    }

    pub fn is_scoped(&self) -> bool {
        self.name.starts_with('@')
    }

    /// The `@scope` part of a scoped name.
    pub fn scope(&self) -> Option<&str> {
        if !self.is_scoped() {
            return None;
        }
        self.name.split('/').next()
    }
}

/// Signing block embedded in a manifest. Never verified cryptographically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub signature_date: Option<String>,
}

impl SignatureRecord {
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.key_id) && present(&self.key_fingerprint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryField {
    String(String),
    Object { url: String },
}

impl RepositoryField {
    pub fn url(&self) -> &str {
        match self {
            RepositoryField::String(s) => s,
            RepositoryField::Object { url } => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorField {
    String(String),
    Object {
        name: Option<String>,
        email: Option<String>,
    },
}

impl AuthorField {
    /// Renders the author in the `Name <email>` person format.
    pub fn display(&self) -> String {
        match self {
            AuthorField::String(s) => s.clone(),
            AuthorField::Object { name, email } => match (name, email) {
                (Some(name), Some(email)) => format!("{} <{}>", name, email),
                (Some(name), None) => name.clone(),
                (None, Some(email)) => format!("<{}>", email),
                (None, None) => String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistInfo {
    #[serde(default, deserialize_with = "lenient::string")]
    pub integrity: Option<String>,
}

/// The parts of a `package.json` the scanner looks at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub main: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub scripts: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub signing: Option<SignatureRecord>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub repository: Option<RepositoryField>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub author: Option<AuthorField>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub dist: Option<DistInfo>,
}

impl Manifest {
    /// Merged dependency set: direct, then dev, then optional. A later
    /// declaration of the same name replaces an earlier one.
    pub fn all_dependencies(&self) -> Vec<Dependency> {
        let mut merged: BTreeMap<&str, Dependency> = BTreeMap::new();

        let sections = [
            (&self.dependencies, DependencyOrigin::Direct),
            (&self.dev_dependencies, DependencyOrigin::Dev),
            (&self.optional_dependencies, DependencyOrigin::Optional),
        ];

        for (section, origin) in sections {
            for (name, range) in section {
                merged.insert(name, Dependency::new(name.as_str(), range.as_str(), origin));
            }
        }

        merged.into_values().collect()
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }

    pub fn has_install_scripts(&self) -> bool {
        self.scripts.contains_key("install") || self.scripts.contains_key("postinstall")
    }
}

/// A package found under `node_modules`.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub name: String,
    pub path: PathBuf,
    /// `None` when the package has no readable manifest or it is not a JSON
    /// object.
    pub manifest: Option<Manifest>,
}

impl InstalledPackage {
    pub fn version(&self) -> Option<&str> {
        self.manifest.as_ref()?.version.as_deref()
    }

    pub fn is_scoped(&self) -> bool {
        self.name.starts_with('@')
    }
}

/// One `[submodule "..."]` section of a `.gitmodules` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_dependencies_merges_sections() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "dependencies": { "express": "^4.18.0", "shared": "1.0.0" },
                "devDependencies": { "jest": "^29.0.0", "shared": "2.0.0" },
                "optionalDependencies": { "fsevents": "^2.3.0" }
            }"#,
        )
        .unwrap();

        let deps = manifest.all_dependencies();
        assert_eq!(deps.len(), 4);

        let shared = deps.iter().find(|d| d.name == "shared").unwrap();
        assert_eq!(shared.declared, "2.0.0");
        assert_eq!(shared.origin, DependencyOrigin::Dev);

        let fsevents = deps.iter().find(|d| d.name == "fsevents").unwrap();
        assert_eq!(fsevents.origin, DependencyOrigin::Optional);
    }

    #[test]
    fn test_scope() {
        let dep = Dependency::new("@techcorp/auth-lib", "^1.0.0", DependencyOrigin::Direct);
        assert!(dep.is_scoped());
        assert_eq!(dep.scope(), Some("@techcorp"));

        let dep = Dependency::new("lodash", "^4.0.0", DependencyOrigin::Direct);
        assert_eq!(dep.scope(), None);
    }

    #[test]
    fn test_signature_record_completeness() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "signing": { "keyId": "ABC123", "signedBy": "dev@example.com" } }"#,
        )
        .unwrap();
        let signing = manifest.signing.unwrap();
        assert!(!signing.is_complete());
        assert_eq!(signing.signed_by.as_deref(), Some("dev@example.com"));
    }

    #[test]
    fn test_repository_and_author_shapes() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "repository": { "type": "git", "url": "https://github.com/example/clean-utils.git" },
                "author": { "name": "Clean Maintainers", "email": "maintainers@example.com" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            manifest.repository.unwrap().url(),
            "https://github.com/example/clean-utils.git"
        );
        assert_eq!(
            manifest.author.unwrap().display(),
            "Clean Maintainers <maintainers@example.com>"
        );

        let manifest: Manifest =
            serde_json::from_str(r#"{ "repository": "github:example/x", "author": "Jane" }"#)
                .unwrap();
        assert_eq!(manifest.repository.unwrap().url(), "github:example/x");
        assert_eq!(manifest.author.unwrap().display(), "Jane");
    }

    #[test]
    fn test_wrongly_typed_fields_degrade_per_field() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "name": "left-pad",
                "version": 1,
                "main": ["index.js"],
                "scripts": { "postinstall": "node x.js", "test": false },
                "dependencies": "not-a-map",
                "repository": { "type": "git", "directory": "pkg" },
                "author": 42,
                "signing": { "keyId": 7, "keyFingerprint": null },
                "dist": { "integrity": {} }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name.as_deref(), Some("left-pad"));
        assert_eq!(manifest.version.as_deref(), Some("1"));
        assert_eq!(manifest.main, None);
        assert_eq!(manifest.script("postinstall"), Some("node x.js"));
        assert_eq!(manifest.scripts.len(), 1);
        assert!(manifest.dependencies.is_empty());
        assert_eq!(manifest.repository, None);
        assert_eq!(manifest.author, None);

        let signing = manifest.signing.unwrap();
        assert_eq!(signing.key_id.as_deref(), Some("7"));
        assert_eq!(signing.key_fingerprint, None);
        assert_eq!(manifest.dist.unwrap().integrity, None);
    }

    #[test]
    fn test_non_object_manifest_still_fails() {
        assert!(serde_json::from_str::<Manifest>(r#""left-pad""#).is_err());
        assert!(serde_json::from_str::<Manifest>("null").is_err());
    }
}
