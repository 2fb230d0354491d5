//! Report rendering: terminal table, JSON and SARIF.

mod cli;
mod json;
mod sarif;

pub use cli::{print_cli_table, render_table};
pub use json::{generate_json_string, print_json};
pub use sarif::{generate_sarif_string, print_sarif};

use crate::model::ScanReport;
use anyhow::Result;

/// Output format for scan reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
    /// SARIF format for code scanning upload
    Sarif,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "sarif" => Ok(OutputFormat::Sarif),
            _ => Err(format!(
                "Unknown format: {}. Use 'table', 'json', or 'sarif'",
                s
            )),
        }
    }
}

pub fn print_result(report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(report),
        OutputFormat::Json => print_json(report),
        OutputFormat::Sarif => print_sarif(report),
    }
}

/// Format a report to a string for file output
pub fn format_result_to_string(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => generate_json_string(report),
        OutputFormat::Sarif => generate_sarif_string(report),
        // Table output written to a file falls back to JSON
        OutputFormat::Table => generate_json_string(report),
    }
}
