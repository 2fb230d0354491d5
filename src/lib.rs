pub mod aggregate;
pub mod checker;
pub mod collector;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod output;
pub mod scan;

pub use aggregate::Findings;
pub use config::Config;
pub use error::ScanError;
pub use model::{ExitStatus, Finding, FindingKind, ScanReport, ScanTarget, Severity, TargetKind};
pub use scan::run_scan;
