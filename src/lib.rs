//! DNS Block Checker - finds filter-list domains a DNS dashboard's parental control misses
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic (parsing, normalization, bookkeeping) separated from page access
//! - The dashboard is reached only through the `PageProbe` port
//! - Callers own a `DomainBlockChecker` and render its `RunSummary`; no global state

pub mod checker;
pub mod config;
pub mod domain;
pub mod probe;
pub mod report;
pub mod rules;

// Re-export main types for convenient access
pub use domain::{
    CheckOutcome, CheckRecord, CheckerError, CheckerResult, RuleKind, RuleLine, RunSummary,
};

pub use config::{CheckerConfig, ConfigBuilder, TimingConfig};

pub use checker::{BlockClassifier, CheckOptions, RateLimiter};

pub use probe::{PageProbe, ProbeSignal, WebDriverProbe};

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use rules::{normalize_domain, parse_rules, BlocklistIndex, FilterRun, ParsedRules};

use std::path::{Path, PathBuf};

/// Main checker providing high-level run operations
pub struct DomainBlockChecker {
    config: CheckerConfig,
    classifier: BlockClassifier,
    report_formatter: ReportFormatter,
}

impl DomainBlockChecker {
    /// Create a checker with the given configuration
    pub fn new_with_config(config: CheckerConfig) -> CheckerResult<Self> {
        config.validate()?;
        let classifier = BlockClassifier::new(CheckOptions::from_config(&config));

        Ok(Self { config, classifier, report_formatter: ReportFormatter::default() })
    }

    /// Create a checker with default configuration
    pub fn new() -> CheckerResult<Self> {
        Self::new_with_config(CheckerConfig::default())
    }

    /// Create a checker loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> CheckerResult<Self> {
        let config = CheckerConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Override the run options derived from the configuration
    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.classifier = BlockClassifier::new(options);
        self
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Connect a WebDriver probe using this checker's configuration
    pub async fn connect_webdriver(&self, allow_any_page: bool) -> CheckerResult<WebDriverProbe> {
        Ok(WebDriverProbe::connect(&self.config).await?.allow_any_page(allow_any_page))
    }

    /// Check already-parsed rules
    pub async fn check_rules<P: PageProbe + ?Sized>(
        &self,
        probe: &mut P,
        rules: &ParsedRules,
    ) -> CheckerResult<RunSummary> {
        self.classifier.run(probe, rules).await
    }

    /// Check raw rule-list text
    pub async fn check_text<P: PageProbe + ?Sized>(
        &self,
        probe: &mut P,
        text: &str,
    ) -> CheckerResult<RunSummary> {
        self.check_rules(probe, &parse_rules(text)).await
    }

    /// Read a rule file and check it; an unreadable file fails before the page is touched
    pub async fn check_file<P: PageProbe + ?Sized, F: AsRef<Path>>(
        &self,
        probe: &mut P,
        path: F,
    ) -> CheckerResult<RunSummary> {
        let rules = rules::load_rules(path).await?;
        self.check_rules(probe, &rules).await
    }

    /// Format a run summary for output
    pub fn format_report(&self, summary: &RunSummary, format: OutputFormat) -> CheckerResult<String> {
        self.report_formatter.format_report(summary, format)
    }

    /// De-duplicate target lists against the blocklists in `blocklists_dir`
    pub fn filter_lists(
        &self,
        targets: &[PathBuf],
        blocklists_dir: &Path,
        output_dir: &Path,
    ) -> CheckerResult<FilterRun> {
        let index = BlocklistIndex::load_dir(blocklists_dir);
        rules::blocklist::filter_targets(&index, targets, output_dir, &self.config.filter_list)
    }
}

/// Convenience function to create a checker with default settings
pub fn create_checker() -> CheckerResult<DomainBlockChecker> {
    DomainBlockChecker::new()
}

/// Convenience function to check a rule file through the configured WebDriver session
pub async fn check_file_with_webdriver<P: AsRef<Path>>(
    config: CheckerConfig,
    path: P,
) -> CheckerResult<RunSummary> {
    let checker = DomainBlockChecker::new_with_config(config)?;
    let rules = rules::load_rules(path).await?;
    let mut probe = checker.connect_webdriver(false).await?;
    checker.check_rules(&mut probe, &rules).await
}
