//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - RunSummary (domain) is rendered for people, for programs, or as a bare rule list
//! - The plain format is the list a user pastes back into their filter rules
//! - Domain logic remains pure while supporting multiple presentation needs

use crate::domain::{CheckOutcome, CheckerError, CheckerResult, RunSummary};
use std::io::Write;

/// Supported output formats for run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary with the unblocked list
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// Unblocked rules only, one per line
    Plain,
}

impl OutputFormat {
    /// Parse format from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "plain"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to list invalid rules in the human format
    pub show_invalid: bool,
    /// Whether the JSON format includes per-line records
    pub include_records: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { use_colors: true, show_invalid: true, include_records: true }
    }
}

/// Main report formatter that dispatches to specific formatters
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format a run summary in the specified format
    pub fn format_report(&self, summary: &RunSummary, format: OutputFormat) -> CheckerResult<String> {
        match format {
            OutputFormat::Human => Ok(self.format_human(summary)),
            OutputFormat::Json => self.format_json(summary),
            OutputFormat::Plain => Ok(self.format_plain(summary)),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        summary: &RunSummary,
        format: OutputFormat,
        mut writer: W,
    ) -> CheckerResult<()> {
        let formatted = self.format_report(summary, format)?;
        writer
            .write_all(formatted.as_bytes())
            .map_err(|e| CheckerError::report(format!("Failed to write report: {e}")))?;
        Ok(())
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.options.use_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// Format summary in human-readable format
    fn format_human(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        if summary.has_unblocked() {
            output.push_str(&format!(
                "{}\n\n",
                self.paint(
                    &format!("{} not blocked by parental control", plural(summary.unblocked.len(), "domain")),
                    "33"
                )
            ));
            for rule in &summary.unblocked {
                output.push_str(&format!("  {rule}\n"));
            }
            output.push('\n');
        } else {
            output.push_str(&format!(
                "{}\n\n",
                self.paint("All checked domains are blocked by parental control", "32")
            ));
        }

        if self.options.show_invalid && summary.invalid > 0 {
            output.push_str(&format!("{}\n", self.paint("Invalid domains:", "2")));
            for record in summary.records_with(CheckOutcome::InvalidDomain) {
                output.push_str(&format!("  {}:{}\n", record.line_number, record.rule));
            }
            output.push('\n');
        }

        output.push_str(&self.format_summary(summary));
        output
    }

    /// Format summary in JSON format
    fn format_json(&self, summary: &RunSummary) -> CheckerResult<String> {
        let mut json = serde_json::json!({
            "unblocked": summary.unblocked,
            "summary": {
                "total_lines": summary.total_lines,
                "processed": summary.processed,
                "blocked": summary.blocked,
                "unblocked": summary.unblocked.len(),
                "invalid": summary.invalid,
                "skipped_allowlist": summary.skipped_allowlist,
                "skipped_comment": summary.skipped_comment,
                "execution_time_ms": summary.execution_time_ms,
                "started_at": summary.started_at.to_rfc3339()
            },
            "probe": summary.probe,
            "input_digest": summary.input_digest
        });

        if self.options.include_records {
            json["records"] = serde_json::to_value(&summary.records)
                .map_err(|e| CheckerError::report(format!("JSON serialization failed: {e}")))?;
        }

        serde_json::to_string_pretty(&json)
            .map_err(|e| CheckerError::report(format!("JSON serialization failed: {e}")))
    }

    /// Unblocked rules, newline-joined with a trailing newline when non-empty
    fn format_plain(&self, summary: &RunSummary) -> String {
        let mut output = summary.unblocked_text();
        if !output.is_empty() {
            output.push('\n');
        }
        output
    }

    /// Format the summary line
    fn format_summary(&self, summary: &RunSummary) -> String {
        let execution_time = (summary.execution_time_ms as f64) / 1000.0;
        let mut parts = vec![format!("processed {}/{}", summary.processed, summary.total_lines)];

        if summary.blocked > 0 {
            parts.push(self.paint(&format!("{} blocked", summary.blocked), "32"));
        }
        if summary.has_unblocked() {
            parts.push(self.paint(&format!("{} unblocked", summary.unblocked.len()), "33"));
        }
        if summary.skipped_allowlist > 0 {
            parts.push(format!("{} allowlist skipped", summary.skipped_allowlist));
        }
        if summary.invalid > 0 {
            parts.push(self.paint(&format!("{} invalid", summary.invalid), "31"));
        }

        let label = if self.options.use_colors { "\x1b[1mSummary:\x1b[0m" } else { "Summary:" };
        format!("{} {} ({:.1}s)\n", label, parts.join(", "), execution_time)
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

fn plural(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" })
}
