//! Block classification and run orchestration
//!
//! CDD Principle: Domain Services - the checker turns page signals into outcomes
//! - Rules are checked strictly one at a time against a borrowed probe
//! - Absence of a block signal counts as unblocked; a block phrase always counts as blocked
//! - A fixed pause after every submitted domain keeps the dashboard from being hammered

use crate::config::CheckerConfig;
use crate::domain::{CheckOutcome, CheckerResult, RuleLine, RunSummary};
use crate::probe::{PageProbe, ProbeSignal};
use crate::rules::ParsedRules;
use std::time::{Duration, Instant};

/// Options for a single run
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// How long to wait for the page's answer to each domain
    pub result_timeout: Duration,
    /// Pause after each submitted domain
    pub request_delay: Duration,
    /// Stop after this many block rules (allowlist rules are still counted)
    pub max_rules: Option<usize>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self::from_config(&CheckerConfig::default())
    }
}

impl CheckOptions {
    /// Take timeouts and delays from the configuration
    pub fn from_config(config: &CheckerConfig) -> Self {
        Self {
            result_timeout: config.timing.result_timeout(),
            request_delay: config.timing.request_delay(),
            max_rules: None,
        }
    }
}

/// How an echoed rule relates to the domain that was checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleConfirmation {
    /// The page echoed the same domain (case-insensitive)
    Confirmed,
    /// The page echoed a different rule
    Mismatch(String),
    /// The page showed no rule text
    Unavailable,
}

/// Compare the rule the page echoed with the normalized domain
pub fn confirm_echoed_rule(echoed: Option<&str>, domain: &str) -> RuleConfirmation {
    match echoed.map(str::trim) {
        Some(rule) if rule.to_lowercase() == domain.to_lowercase() => RuleConfirmation::Confirmed,
        Some(rule) => RuleConfirmation::Mismatch(rule.to_string()),
        None => RuleConfirmation::Unavailable,
    }
}

/// Fixed, non-adaptive pause between page requests
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the configured delay
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Result of classifying one rule line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: CheckOutcome,
    pub echoed_rule: Option<String>,
    /// Whether the page was contacted for this rule
    pub queried: bool,
}

impl Classification {
    fn local(outcome: CheckOutcome) -> Self {
        Self { outcome, echoed_rule: None, queried: false }
    }
}

/// Classifies rule lines against a page probe
#[derive(Debug, Clone)]
pub struct BlockClassifier {
    options: CheckOptions,
}

impl BlockClassifier {
    pub fn new(options: CheckOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Classify a single rule line
    pub async fn classify<P: PageProbe + ?Sized>(
        &self,
        probe: &mut P,
        line: &RuleLine,
    ) -> CheckerResult<Classification> {
        let Some(domain) = line.domain() else {
            return Ok(Classification::local(CheckOutcome::SkippedAllowlist));
        };
        if domain.is_empty() {
            tracing::warn!(
                "Line {}: '{}' normalizes to an empty domain",
                line.line_number,
                line.text
            );
            return Ok(Classification::local(CheckOutcome::InvalidDomain));
        }

        probe.submit(domain).await?;
        let signal = probe.await_result(self.options.result_timeout).await?;

        let classification = match signal {
            ProbeSignal::Invalid => Classification {
                outcome: CheckOutcome::InvalidDomain,
                echoed_rule: None,
                queried: true,
            },
            ProbeSignal::Blocked { echoed_rule } => {
                match confirm_echoed_rule(echoed_rule.as_deref(), domain) {
                    RuleConfirmation::Confirmed => {}
                    RuleConfirmation::Mismatch(rule) => tracing::warn!(
                        "'{}' (as '{}'): block phrase found but the page showed rule '{}'; assuming blocked",
                        line.text,
                        domain,
                        rule
                    ),
                    RuleConfirmation::Unavailable => tracing::warn!(
                        "'{}' (as '{}'): block phrase found without a rule; assuming blocked",
                        line.text,
                        domain
                    ),
                }
                Classification { outcome: CheckOutcome::Blocked, echoed_rule, queried: true }
            }
            ProbeSignal::NoSignal => Classification {
                outcome: CheckOutcome::Unblocked,
                echoed_rule: None,
                queried: true,
            },
        };

        Ok(classification)
    }

    /// Check every rule in order and build the run summary.
    ///
    /// Fatal probe errors abort the run; nothing is kept from a failed run. The probe is
    /// finished on every path, so a session the probe owns is released even after a failure.
    pub async fn run<P: PageProbe + ?Sized>(
        &self,
        probe: &mut P,
        rules: &ParsedRules,
    ) -> CheckerResult<RunSummary> {
        let start_time = Instant::now();

        let mut summary = RunSummary::new();
        summary.set_input_digest(rules.digest.clone());
        summary.set_probe(probe.name());
        summary.add_comment_lines(rules.comment_lines);

        let checked = self.check_lines(probe, rules, &mut summary).await;
        let finished = probe.finish().await;
        checked?;
        finished?;

        summary.set_execution_time(start_time.elapsed().as_millis() as u64);

        debug_assert!(summary.is_consistent());
        Ok(summary)
    }

    async fn check_lines<P: PageProbe + ?Sized>(
        &self,
        probe: &mut P,
        rules: &ParsedRules,
        summary: &mut RunSummary,
    ) -> CheckerResult<()> {
        let limiter = RateLimiter::new(self.options.request_delay);
        let total = rules.rule_count();

        if rules.block_rules().next().is_some() {
            probe.prepare().await?;
        }

        let mut checked = 0usize;
        for (position, line) in rules.lines.iter().enumerate() {
            let progress = position + 1;

            if !line.is_allowlist() {
                if let Some(max) = self.options.max_rules {
                    if checked >= max {
                        tracing::info!("Reached the limit of {} rules; stopping", max);
                        break;
                    }
                }
                checked += 1;
            }

            let classification = self.classify(probe, line).await?;
            match classification.outcome {
                CheckOutcome::SkippedAllowlist => {
                    tracing::debug!("[{}/{}] Skipping allowlist rule {}", progress, total, line.text)
                }
                outcome => tracing::info!(
                    "[{}/{}] {} -> {}",
                    progress,
                    total,
                    line.text,
                    outcome.as_str()
                ),
            }
            summary.record(line, classification.outcome, classification.echoed_rule);

            if classification.queried {
                limiter.pause().await;
            }
        }

        Ok(())
    }
}
