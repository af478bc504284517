//! Access to the dashboard page that answers block checks
//!
//! CDD Principle: Ports and Adapters - the checker only sees the `PageProbe` port
//! - WebDriverProbe adapts a live browser session through the WebDriver protocol
//! - Tests plug in a scripted probe with no browser at all
//! - Probes report raw page signals; classification stays in the checker

pub mod webdriver;

use crate::domain::CheckerResult;
use async_trait::async_trait;
use std::time::Duration;

pub use webdriver::{WebDriverClient, WebDriverProbe};

/// Terminal state observed on the page after submitting a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeSignal {
    /// The page showed its invalid-domain message
    Invalid,
    /// The result region contained the parental control phrase
    Blocked {
        /// Rule text shown next to the block, when the page rendered one
        echoed_rule: Option<String>,
    },
    /// Neither state appeared within the timeout, or the result carried no block phrase
    NoSignal,
}

/// A page that can check one domain at a time
#[async_trait]
pub trait PageProbe: Send {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Locate the controls a run depends on.
    ///
    /// Fails with `MissingUiElement` when the input or button never appears.
    async fn prepare(&mut self) -> CheckerResult<()>;

    /// Type `domain` into the page and trigger its check
    async fn submit(&mut self, domain: &str) -> CheckerResult<()>;

    /// Wait up to `timeout` for the page to answer the last submission
    async fn await_result(&mut self, timeout: Duration) -> CheckerResult<ProbeSignal>;

    /// Release whatever the probe holds; called once at the end of a run
    async fn finish(&mut self) -> CheckerResult<()> {
        Ok(())
    }
}
