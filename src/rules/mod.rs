//! Rule list parsing and domain normalization
//!
//! Architectural Principle: Service Layer - turns raw filter-list text into rule lines
//! - Blank and comment lines are dropped here and only counted
//! - Allowlist rules survive parsing so the run can report them
//! - Normalization strips the `||domain^` wrapping used by AdGuard-style rules

pub mod blocklist;

use crate::domain::{CheckerError, CheckerResult, RuleLine};
use sha2::{Digest, Sha256};
use std::path::Path;

pub use blocklist::{BlocklistIndex, FilterListHeader, FilterRun, TargetDiff};

/// Rule lines extracted from one input text
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    /// Block and allowlist rules in input order
    pub lines: Vec<RuleLine>,
    /// Number of `!`/`#` comment lines that were dropped
    pub comment_lines: usize,
    /// SHA-256 of the raw input text
    pub digest: String,
}

impl ParsedRules {
    /// Non-blank lines seen in the input, comments included
    pub fn total_lines(&self) -> usize {
        self.lines.len() + self.comment_lines
    }

    /// Block and allowlist rules, the lines a run walks through
    pub fn rule_count(&self) -> usize {
        self.lines.len()
    }

    /// Rules that will be submitted to the page
    pub fn block_rules(&self) -> impl Iterator<Item = &RuleLine> {
        self.lines.iter().filter(|l| !l.is_allowlist())
    }

    pub fn allowlist_count(&self) -> usize {
        self.lines.iter().filter(|l| l.is_allowlist()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Whether a trimmed line is a `!` or `#` comment
pub fn is_comment(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('#')
}

/// Parse raw rule-list text into rule lines
pub fn parse_rules(text: &str) -> ParsedRules {
    let mut parsed = ParsedRules { digest: digest_hex(text), ..Default::default() };

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if is_comment(line) {
            parsed.comment_lines += 1;
            continue;
        }
        parsed.lines.push(RuleLine::new(line, index + 1));
    }

    tracing::debug!(
        "Parsed {} rules ({} allowlist, {} comments)",
        parsed.lines.len(),
        parsed.allowlist_count(),
        parsed.comment_lines
    );

    parsed
}

/// Read and parse a rule list from disk
pub async fn load_rules<P: AsRef<Path>>(path: P) -> CheckerResult<ParsedRules> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CheckerError::file_read(path.display().to_string(), e))?;

    Ok(parse_rules(&text))
}

/// Strip a leading `||` and everything from the first `^`.
///
/// `||example.com^$important` becomes `example.com`; a bare domain is returned as is.
pub fn normalize_domain(rule: &str) -> &str {
    let rule = rule.strip_prefix("||").unwrap_or(rule);
    match rule.find('^') {
        Some(caret) => &rule[..caret],
        None => rule,
    }
}

fn digest_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
