//! Terminal presentation of audit reports and raw JSON export.

use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use wcag_audit::{AuditReport, Impact};

/// File name used when exporting without an explicit path.
pub const DEFAULT_EXPORT_FILE: &str = "accessibility_audit_report.json";

/// Violations listed in the summary.
pub const TOP_VIOLATIONS: usize = 10;

/// Affected nodes listed per violation.
pub const NODES_PER_VIOLATION: usize = 3;

fn impact_label(impact: Option<Impact>) -> &'static str {
    match impact {
        Some(Impact::Critical) => "critical",
        Some(Impact::Serious) => "serious",
        Some(Impact::Moderate) => "moderate",
        Some(Impact::Minor) => "minor",
        None => "unknown",
    }
}

fn noun(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn plural(n: usize, word: &str) -> String {
    format!("{n} {}", noun(n, word))
}

/// "... and 2 more nodes"
fn remainder(n: usize, word: &str) -> String {
    format!("... and {n} more {}", noun(n, word))
}

/// Human-readable summary: category counts, then the first violations with
/// a few of their nodes each.
pub fn render(report: &AuditReport) -> String {
    let counts = report.counts();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Accessibility audit: {}",
        report.target.as_deref().unwrap_or("supplied markup")
    );
    let _ = writeln!(
        out,
        "  violations: {} ({})  passes: {}  incomplete: {}  inapplicable: {}",
        counts.violations,
        plural(counts.violation_nodes, "node"),
        counts.passes,
        counts.incomplete,
        counts.inapplicable
    );

    if report.results.violations.is_empty() {
        let _ = writeln!(out, "\nNo violations found.");
        return out;
    }

    let _ = writeln!(out, "\nTop violations:");
    for (i, v) in report.results.violations.iter().take(TOP_VIOLATIONS).enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. [{}] {}: {} ({})",
            i + 1,
            impact_label(v.impact),
            v.id,
            v.help,
            plural(v.nodes.len(), "node")
        );
        if !v.help_url.is_empty() {
            let _ = writeln!(out, "     {}", v.help_url);
        }
        for node in v.nodes.iter().take(NODES_PER_VIOLATION) {
            let _ = writeln!(out, "     - {}  {}", node.target.join(", "), node.html);
        }
        if v.nodes.len() > NODES_PER_VIOLATION {
            let _ = writeln!(
                out,
                "     {}",
                remainder(v.nodes.len() - NODES_PER_VIOLATION, "node")
            );
        }
    }
    if report.results.violations.len() > TOP_VIOLATIONS {
        let _ = writeln!(
            out,
            "  {}",
            remainder(report.results.violations.len() - TOP_VIOLATIONS, "violation")
        );
    }
    out
}

/// Write the raw report as pretty-printed JSON.
pub fn export(report: &AuditReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "report exported");
    Ok(())
}
