//! Typed errors raised while loading scan inputs.
//!
//! None of these ever escape a scan: the orchestrator turns each one into an
//! `ERROR` finding via [`ScanError::to_finding`].

use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;

use crate::model::{Finding, FindingKind, Severity};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan target does not exist: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("No {} found at {}", file_name(.0), .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Failed to parse {}: {source}", .path.display())]
    MalformedManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "manifest".to_string())
}

impl ScanError {
    pub fn kind(&self) -> FindingKind {
        match self {
            ScanError::TargetNotFound(_) => FindingKind::TargetNotFound,
            ScanError::ManifestNotFound(_) => FindingKind::ManifestNotFound,
            ScanError::MalformedManifest { .. } => FindingKind::MalformedManifest,
            ScanError::Io { .. } => FindingKind::UnreadableFile,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            ScanError::TargetNotFound(path) | ScanError::ManifestNotFound(path) => path,
            ScanError::MalformedManifest { path, .. } | ScanError::Io { path, .. } => path,
        }
    }

    /// Converts the error into an `ERROR` finding so it shows up in the report.
    pub fn to_finding(&self) -> Finding {
        Finding::new(Severity::Error, self.kind(), self.to_string())
            .with_detail("path", json!(self.path().display().to_string()))
    }
}
