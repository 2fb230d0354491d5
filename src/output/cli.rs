use crate::model::{ScanReport, Severity};
use anyhow::Result;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Details")]
    details: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    println!("{}", render_table(report));
    Ok(())
}

/// Renders the summary header followed by one row per finding, most urgent first.
pub fn render_table(report: &ScanReport) -> String {
    let mut out = String::new();
    let stats = &report.stats;

    let _ = writeln!(out);
    let _ = writeln!(out, "{}: {}", report.target.kind, report.target.path.display());
    let _ = writeln!(
        out,
        "Scan completed at: {}",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "  Packages scanned: {}", stats.total_packages);
    let _ = writeln!(out, "  Suspicious packages: {}", stats.suspicious_packages);
    let _ = writeln!(
        out,
        "  Findings: {} critical, {} warning, {} info, {} error",
        stats.critical_findings, stats.warning_findings, stats.info_findings, stats.error_findings
    );
    let _ = writeln!(out);

    if report.findings.is_empty() {
        let _ = writeln!(out, "No security issues found");
        return out;
    }

    let rows: Vec<FindingRow> = report
        .sorted_findings()
        .into_iter()
        .map(|f| FindingRow {
            severity: format_severity(&f.severity),
            kind: f.kind.to_string(),
            message: truncate(&f.message, 80),
            details: truncate(&f.flattened_details(), 60),
        })
        .collect();

    let _ = writeln!(out, "Found {} findings:", report.findings.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", Table::new(rows).with(Style::rounded()));

    out
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        Severity::Warning => "\x1b[33mWARNING\x1b[0m".to_string(),
        Severity::Info => "\x1b[36mINFO\x1b[0m".to_string(),
        Severity::Error => "\x1b[91mERROR\x1b[0m".to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
