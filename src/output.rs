//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.
//!
//! ```text
//! Compiled 3 posts
//! 001 Shipping a Side Project → dist/blog/doc-1/index.html
//! 002 On Notation → dist/blog/doc-2/index.html
//! 003 Reading List → dist/blog/doc-3/index.html
//!
//! Skipped 1 post
//! doc-4: workspace error: status 502
//! ```

use crate::compile::CompileReport;
use crate::gate::SweepReport;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

pub fn format_compile_report(report: &CompileReport) -> Vec<String> {
    let mut lines = Vec::new();

    let noun = if report.compiled.len() == 1 { "post" } else { "posts" };
    lines.push(format!("Compiled {} {noun}", report.compiled.len()));
    for (i, doc) in report.compiled.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}",
            format_index(i + 1),
            doc.title,
            doc.artifact.display()
        ));
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        let noun = if report.skipped.len() == 1 { "post" } else { "posts" };
        lines.push(format!("Skipped {} {noun}", report.skipped.len()));
        for (id, reason) in &report.skipped {
            lines.push(format!("{id}: {reason}"));
        }
    }

    lines
}

pub fn format_sweep_report(report: &SweepReport) -> Vec<String> {
    if report.clean {
        return vec!["Output tree is clean".to_string()];
    }
    let mut lines = vec![format!(
        "Removed {} artifact(s) containing credential patterns:",
        report.removed.len()
    )];
    for path in &report.removed {
        lines.push(format!("    {}", path.display()));
    }
    lines
}

pub fn print_compile_report(report: &CompileReport) {
    for line in format_compile_report(report) {
        println!("{line}");
    }
}

pub fn print_sweep_report(report: &SweepReport) {
    for line in format_sweep_report(report) {
        println!("{line}");
    }
}
