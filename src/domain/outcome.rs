//! Core domain models for rule lines, check outcomes and run summaries
//!
//! Architecture: Rich Domain Models - Rule lines know how to normalize themselves
//! - RuleLine carries the original text so reports never lose the user's rule syntax
//! - RunSummary acts as an aggregate root that keeps its counters consistent
//! - CheckerError is the single error taxonomy shared by every layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a parsed rule line participates in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// A block rule whose domain is submitted to the page
    Block,
    /// An `@@` rule, counted and never submitted
    Allowlist,
}

/// A single non-blank, non-comment line from a rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLine {
    /// Trimmed original text of the line
    pub text: String,
    /// Line number (1-indexed) in the input
    pub line_number: usize,
    /// Block or allowlist
    pub kind: RuleKind,
}

impl RuleLine {
    /// Create a rule line, deriving its kind from the text
    pub fn new(text: impl Into<String>, line_number: usize) -> Self {
        let text = text.into();
        let kind = if text.starts_with("@@") { RuleKind::Allowlist } else { RuleKind::Block };
        Self { text, line_number, kind }
    }

    pub fn is_allowlist(&self) -> bool {
        self.kind == RuleKind::Allowlist
    }

    /// Domain to submit to the page, `None` for allowlist rules.
    ///
    /// The returned string may be empty (`||^`); callers classify that as invalid.
    pub fn domain(&self) -> Option<&str> {
        match self.kind {
            RuleKind::Block => Some(crate::rules::normalize_domain(&self.text)),
            RuleKind::Allowlist => None,
        }
    }
}

/// Classification of a single rule line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The page reported a parental control block
    Blocked,
    /// No block signal was observed
    Unblocked,
    /// The page rejected the domain, or normalization left nothing to submit
    InvalidDomain,
    /// `!` or `#` comment line
    SkippedComment,
    /// `@@` allowlist rule
    SkippedAllowlist,
}

impl CheckOutcome {
    /// Whether the rule was handed to the page (or would have been, for empty domains)
    pub fn is_processed(self) -> bool {
        matches!(self, Self::Blocked | Self::Unblocked | Self::InvalidDomain)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Unblocked => "unblocked",
            Self::InvalidDomain => "invalid_domain",
            Self::SkippedComment => "skipped_comment",
            Self::SkippedAllowlist => "skipped_allowlist",
        }
    }
}

/// Per-line result kept for detailed reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub line_number: usize,
    /// Original rule text
    pub rule: String,
    /// Normalized domain, absent for allowlist rules
    pub domain: Option<String>,
    pub outcome: CheckOutcome,
    /// Rule text the page echoed back for a block, if it showed one
    pub echoed_rule: Option<String>,
}

/// Aggregate result of checking one rule list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Non-blank lines in the input, comments included
    pub total_lines: usize,
    /// Rules classified blocked, unblocked or invalid
    pub processed: usize,
    pub blocked: usize,
    pub invalid: usize,
    pub skipped_allowlist: usize,
    pub skipped_comment: usize,
    /// Original text of every unblocked rule, in input order
    pub unblocked: Vec<String>,
    /// One record per processed or allowlisted rule
    pub records: Vec<CheckRecord>,
    /// SHA-256 of the input text
    pub input_digest: Option<String>,
    /// Name of the probe that answered the checks
    pub probe: Option<String>,
    pub started_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl RunSummary {
    /// Create an empty summary stamped with the current time
    pub fn new() -> Self {
        Self {
            total_lines: 0,
            processed: 0,
            blocked: 0,
            invalid: 0,
            skipped_allowlist: 0,
            skipped_comment: 0,
            unblocked: Vec::new(),
            records: Vec::new(),
            input_digest: None,
            probe: None,
            started_at: Utc::now(),
            execution_time_ms: 0,
        }
    }

    /// Record the outcome for one rule line
    pub fn record(&mut self, line: &RuleLine, outcome: CheckOutcome, echoed_rule: Option<String>) {
        self.total_lines += 1;
        if outcome.is_processed() {
            self.processed += 1;
        }

        match outcome {
            CheckOutcome::Blocked => self.blocked += 1,
            CheckOutcome::InvalidDomain => self.invalid += 1,
            CheckOutcome::Unblocked => self.unblocked.push(line.text.clone()),
            CheckOutcome::SkippedAllowlist => self.skipped_allowlist += 1,
            CheckOutcome::SkippedComment => self.skipped_comment += 1,
        }

        self.records.push(CheckRecord {
            line_number: line.line_number,
            rule: line.text.clone(),
            domain: line.domain().map(str::to_string),
            outcome,
            echoed_rule,
        });
    }

    /// Account for comment lines dropped by the parser
    pub fn add_comment_lines(&mut self, count: usize) {
        self.total_lines += count;
        self.skipped_comment += count;
    }

    pub fn has_unblocked(&self) -> bool {
        !self.unblocked.is_empty()
    }

    /// Unblocked rules joined with newlines, ready to paste into a filter list
    pub fn unblocked_text(&self) -> String {
        self.unblocked.join("\n")
    }

    /// Whether the counters reconcile with each other
    pub fn is_consistent(&self) -> bool {
        self.processed + self.skipped_allowlist + self.skipped_comment == self.total_lines
            && self.processed == self.blocked + self.invalid + self.unblocked.len()
    }

    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.execution_time_ms = duration_ms;
    }

    pub fn set_input_digest(&mut self, digest: impl Into<String>) {
        self.input_digest = Some(digest.into());
    }

    pub fn set_probe(&mut self, name: impl Into<String>) {
        self.probe = Some(name.into());
    }

    /// Records with the given outcome
    pub fn records_with(&self, outcome: CheckOutcome) -> impl Iterator<Item = &CheckRecord> {
        self.records.iter().filter(move |r| r.outcome == outcome)
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types that can occur while checking a rule list
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// IO failure outside of reading the rule list
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The rule list could not be read; the run never starts
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A control the run depends on never showed up on the page
    #[error("{element} ('{selector}') not found on the page")]
    MissingUiElement { element: String, selector: String },

    /// The browser is not on the expected dashboard page
    #[error("Unexpected page '{url}': does not match '{pattern}'")]
    UnexpectedPage { url: String, pattern: String },

    /// WebDriver transport or protocol failure
    #[error("WebDriver error: {message}")]
    WebDriver { message: String },

    /// Report rendering or writing failed
    #[error("Report error: {message}")]
    Report { message: String },
}

impl CheckerError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a file read error for the given path
    pub fn file_read(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileRead { path: path.into(), source }
    }

    /// Create a missing element error
    pub fn missing_element(element: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::MissingUiElement { element: element.into(), selector: selector.into() }
    }

    /// Create a WebDriver error
    pub fn webdriver(message: impl Into<String>) -> Self {
        Self::WebDriver { message: message.into() }
    }

    /// Create a report error
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report { message: message.into() }
    }
}

/// Result type for checker operations
pub type CheckerResult<T> = Result<T, CheckerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_line_kind() {
        let block = RuleLine::new("||bad.com^", 3);
        assert_eq!(block.kind, RuleKind::Block);
        assert_eq!(block.domain(), Some("bad.com"));
        assert_eq!(block.line_number, 3);

        let allow = RuleLine::new("@@good.com^", 1);
        assert!(allow.is_allowlist());
        assert_eq!(allow.domain(), None);
    }

    #[test]
    fn test_summary_counters() {
        let mut summary = RunSummary::new();
        summary.add_comment_lines(1);
        summary.record(&RuleLine::new("@@good.com^", 2), CheckOutcome::SkippedAllowlist, None);
        summary.record(&RuleLine::new("||bad.com^", 3), CheckOutcome::Blocked, Some("bad.com".into()));
        summary.record(&RuleLine::new("ok.com", 4), CheckOutcome::Unblocked, None);
        summary.record(&RuleLine::new("||^", 5), CheckOutcome::InvalidDomain, None);

        assert_eq!(summary.total_lines, 5);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.blocked, 1);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.skipped_allowlist, 1);
        assert_eq!(summary.skipped_comment, 1);
        assert_eq!(summary.unblocked, vec!["ok.com".to_string()]);
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_unblocked_keeps_original_text() {
        let mut summary = RunSummary::new();
        summary.record(&RuleLine::new("||a.com^", 1), CheckOutcome::Unblocked, None);
        summary.record(&RuleLine::new("b.com", 2), CheckOutcome::Unblocked, None);

        assert_eq!(summary.unblocked_text(), "||a.com^\nb.com");
        assert_eq!(summary.records[0].domain.as_deref(), Some("a.com"));
    }

    #[test]
    fn test_outcome_processed() {
        assert!(CheckOutcome::Blocked.is_processed());
        assert!(CheckOutcome::InvalidDomain.is_processed());
        assert!(!CheckOutcome::SkippedAllowlist.is_processed());
        assert!(!CheckOutcome::SkippedComment.is_processed());
    }

    #[test]
    fn test_error_messages() {
        let err = CheckerError::missing_element("Domain input", "input[type=text]");
        assert_eq!(err.to_string(), "Domain input ('input[type=text]') not found on the page");

        let err = CheckerError::file_read(
            "rules.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("rules.txt"));
    }
}
