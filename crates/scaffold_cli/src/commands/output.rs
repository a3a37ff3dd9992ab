//! Report formatting and exit code mapping.

use anyhow::Result;
use serde::Serialize;

use scaffold_engine::{ValidationIssue, ValidationReport};

use super::OutputFormat;
use crate::ExitCodes;

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Exit code for a finished check or fix.
pub fn report_exit_code(report: &ValidationReport) -> u8 {
    if report.error_count() > 0 {
        ExitCodes::VALIDATION_ERRORS
    } else if report.warning_count() > 0 {
        ExitCodes::WARNINGS
    } else {
        ExitCodes::SUCCESS
    }
}

/// Print a report and return the exit code it maps to.
pub fn print_report(report: &ValidationReport, format: OutputFormat) -> Result<u8> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Text => print_report_text(report),
    }
    Ok(report_exit_code(report))
}

fn print_report_text(report: &ValidationReport) {
    println!(
        "📋 {} ({})",
        report.project_name,
        report.project_path.display()
    );
    println!(
        "   {} template(s), {} folder(s), {} file(s), {} rule(s) checked in {}ms",
        report.stats.templates_checked,
        report.stats.folders_checked,
        report.stats.files_checked,
        report.stats.rules_checked,
        report.stats.duration_ms
    );

    if !report.fixed.is_empty() {
        println!();
        println!("🔧 Fixed:");
        for record in &report.fixed {
            println!("   - {}", record.message);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("❌ Errors:");
        for issue in &report.errors {
            print_issue(issue);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("⚠️  Warnings:");
        for issue in &report.warnings {
            print_issue(issue);
        }
    }

    if !report.suggestions.is_empty() {
        println!();
        for suggestion in &report.suggestions {
            println!("💡 {}", suggestion);
        }
    }

    println!();
    if report.valid && report.warnings.is_empty() {
        println!("✅ Project matches its templates");
    } else if report.valid {
        println!("✅ No errors, {} warning(s)", report.warning_count());
    } else {
        println!(
            "❌ {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
    }
}

fn print_issue(issue: &ValidationIssue) {
    let fixable = if issue.is_auto_fixable() {
        " [auto-fix]"
    } else {
        ""
    };
    println!("   - {}{}", issue.message, fixable);
    if let (Some(expected), Some(actual)) = (&issue.expected, &issue.actual) {
        println!("     expected {}, found {}", expected, actual);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaffold_engine::IssueKind;
    use std::path::Path;

    #[test]
    fn test_report_exit_code() {
        let mut report = ValidationReport::new(Path::new("/p"), "p");
        assert_eq!(report_exit_code(&report), ExitCodes::SUCCESS);

        report.push(ValidationIssue::warning(IssueKind::UnexpectedFile, "app/x", "extra"));
        assert_eq!(report_exit_code(&report), ExitCodes::WARNINGS);

        report.push(ValidationIssue::error(IssueKind::MissingFolder, "app/src", "missing"));
        assert_eq!(report_exit_code(&report), ExitCodes::VALIDATION_ERRORS);
    }
}
