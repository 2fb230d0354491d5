//! Heuristic detection rules.
//!
//! Each rule inspects the inputs loaded for a scan and returns zero or more
//! findings. Rules never depend on one another; the orchestrator picks the
//! set that applies to a [`TargetKind`] with [`rules_for`] and concatenates
//! their output.
//!
//! | Rule | Target kinds |
//! |------|--------------|
//! | [`ScriptRule`] | package tree, package |
//! | [`SuspiciousVersionRule`] | package tree |
//! | [`InstallScriptRule`] | package tree |
//! | [`TyposquatRule`] | package tree |
//! | [`DependencyConfusionRule`] | package tree |
//! | [`MaliciousPatternRule`] | package tree |
//! | [`MetadataRule`] | package |
//! | [`SignatureRule`] | signed package |
//! | [`SubmoduleUrlRule`] | repository |
//! | [`SubmoduleContentRule`] | repository |
//! | [`BuildSpecRule`] | container build |

mod build_spec;
mod confusion;
mod distance;
mod metadata;
mod patterns;
mod scripts;
mod signature;
mod submodule;
mod typosquat;
mod version;

pub use build_spec::BuildSpecRule;
pub use confusion::DependencyConfusionRule;
pub use distance::distance;
pub use metadata::MetadataRule;
pub use patterns::{CodePattern, MaliciousPatternRule, CODE_PATTERNS};
pub use scripts::{InstallScriptRule, ScriptRule};
pub use signature::{normalize_fingerprint, SignatureRule};
pub use submodule::{SubmoduleContentRule, SubmoduleUrlRule};
pub use typosquat::TyposquatRule;
pub use version::{major_version, SuspiciousVersionRule};

use std::path::Path;

use crate::config::Config;
use crate::error::ScanError;
use crate::loader::RegistryConfig;
use crate::model::{Dependency, Finding, InstalledPackage, Manifest, SubmoduleRecord, TargetKind};

/// Everything loaded from disk before rules run. Fields a target kind does
/// not use stay empty.
#[derive(Debug, Clone, Default)]
pub struct ScanInputs {
    pub manifest: Option<Manifest>,
    /// Merged declared dependencies, with installed versions filled in.
    pub dependencies: Vec<Dependency>,
    pub installed: Vec<InstalledPackage>,
    pub registry: Option<RegistryConfig>,
    pub submodules: Vec<SubmoduleRecord>,
    pub build_spec: Option<String>,
}

/// Read-only view handed to every rule.
pub struct ScanContext<'a> {
    pub root: &'a Path,
    pub config: &'a Config,
    pub inputs: &'a ScanInputs,
}

/// A single detection heuristic.
pub trait Rule: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &'static str;

    /// Runs the heuristic. An `Err` is reported as an `ERROR` finding and
    /// does not stop other rules.
    fn check(&self, ctx: &ScanContext<'_>) -> Result<Vec<Finding>, ScanError>;
}

/// Returns the rules that apply to a target kind, in execution order.
///
/// ```
/// use chainscan::checker::rules_for;
/// use chainscan::model::TargetKind;
///
/// assert_eq!(rules_for(TargetKind::PackageTree).len(), 6);
/// assert_eq!(rules_for(TargetKind::SignedPackage).len(), 1);
/// ```
pub fn rules_for(kind: TargetKind) -> Vec<Box<dyn Rule>> {
    match kind {
        TargetKind::PackageTree => vec![
            Box::new(ScriptRule),
            Box::new(SuspiciousVersionRule),
            Box::new(InstallScriptRule),
            Box::new(TyposquatRule),
            Box::new(DependencyConfusionRule),
            Box::new(MaliciousPatternRule),
        ],
        TargetKind::Package => vec![Box::new(ScriptRule), Box::new(MetadataRule)],
        TargetKind::SignedPackage => vec![Box::new(SignatureRule)],
        TargetKind::Repository => vec![Box::new(SubmoduleUrlRule), Box::new(SubmoduleContentRule)],
        TargetKind::ContainerBuild => vec![Box::new(BuildSpecRule)],
    }
}
