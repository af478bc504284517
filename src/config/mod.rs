//! Configuration loading and management for the DNS block checker
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - The dashboard's opaque CSS selectors and UI texts live here, never in the checker
//! - Default configuration reproduces the AdGuard DNS user-rules page
//! - Timings are stored in milliseconds and handed out as `Duration`

use crate::domain::{CheckerError, CheckerResult};
use crate::rules::FilterListHeader;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Config file names looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] =
    ["dns_block_checker.yaml", "dns_block_checker.yml", ".dns_block_checker.yaml"];

const DEFAULT_URL_PATTERN: &str =
    r"https://adguard-dns\.io/.*?/dashboard/settings/[a-zA-Z0-9_-]+/userrules";

lazy_static! {
    static ref DEFAULT_URL_REGEX: Regex =
        Regex::new(DEFAULT_URL_PATTERN).expect("default page pattern is a valid regex");
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Configuration format version
    pub version: String,
    /// Which page the checks run against
    #[serde(default)]
    pub page: PageConfig,
    /// CSS selectors for the page's controls
    #[serde(default)]
    pub selectors: SelectorConfig,
    /// UI texts the classifier looks for
    #[serde(default)]
    pub phrases: PhraseConfig,
    /// Polling windows and fixed delays
    #[serde(default)]
    pub timing: TimingConfig,
    /// WebDriver endpoint
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    /// Header for lists written by `filter`
    #[serde(default)]
    pub filter_list: FilterListHeader,
}

/// Target page location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Page to open when a new browser session is created
    pub url: Option<String>,
    /// Regex the current page URL must match before a run starts
    pub url_pattern: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self { url: None, url_pattern: DEFAULT_URL_PATTERN.to_string() }
    }
}

/// CSS selectors of the dashboard's check form
#[derive(Debug, Clone, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct SelectorConfig {
    pub input: String,
    pub button: String,
    pub clear_input: String,
    pub result_container: String,
    pub rule_text: String,
    pub invalid_domain_error: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            input: r#"input.ZixsuQXZJbcbNAB5pGrm[type="text"]"#.to_string(),
            button: "form.pHXXeK1ebvpFENlxacJk button.BHHS_ZtwlIEvcY4SXWEM".to_string(),
            clear_input: r#"input.ZixsuQXZJbcbNAB5pGrm[type="text"] ~ svg.YFOtJ7Q4XDdUBrxG9aES.C6IPBjpy6XBOT2Q_PxVA"#.to_string(),
            result_container: "div.Nric9fWIgpVPG57wp_cn".to_string(),
            rule_text: "span.RjcpuPjutGXsMYQHCmXl".to_string(),
            invalid_domain_error: "div.OT87bMPy2pwKNdqcaq_f".to_string(),
        }
    }
}

/// Texts rendered by the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct PhraseConfig {
    /// Substring of the result region that means a parental control block
    pub blocked: String,
    /// Exact text of the invalid-domain message
    pub invalid_domain: String,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            blocked: "ペアレンタルコントロール（アダルト系サイトをブロックする）".to_string(),
            invalid_domain: "ドメイン名が無効です".to_string(),
        }
    }
}

/// Polling windows and delays, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct TimingConfig {
    /// How long to wait for the input and button before giving up
    pub element_timeout_ms: u64,
    /// Interval between DOM polls
    pub poll_interval_ms: u64,
    /// Pause after clicking the clear control
    pub clear_delay_ms: u64,
    /// Pause after resetting a stale invalid-domain state
    pub reset_delay_ms: u64,
    /// Pause after typing the domain
    pub input_settle_ms: u64,
    /// Window for spotting the invalid-domain message
    pub invalid_check_ms: u64,
    /// Pause after clicking the check button
    pub after_submit_ms: u64,
    /// Window for the result region to appear
    pub result_timeout_ms: u64,
    /// Pause between domains
    pub request_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            element_timeout_ms: 5000,
            poll_interval_ms: 100,
            clear_delay_ms: 150,
            reset_delay_ms: 50,
            input_settle_ms: 300,
            invalid_check_ms: 500,
            after_submit_ms: 1800,
            result_timeout_ms: 1000,
            request_delay_ms: 600,
        }
    }
}

impl TimingConfig {
    /// Every delay set to zero and polls kept short, for scripted probes
    pub fn immediate() -> Self {
        Self {
            element_timeout_ms: 0,
            poll_interval_ms: 1,
            clear_delay_ms: 0,
            reset_delay_ms: 0,
            input_settle_ms: 0,
            invalid_check_ms: 0,
            after_submit_ms: 0,
            result_timeout_ms: 0,
            request_delay_ms: 0,
        }
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn input_settle(&self) -> Duration {
        Duration::from_millis(self.input_settle_ms)
    }

    pub fn invalid_check(&self) -> Duration {
        Duration::from_millis(self.invalid_check_ms)
    }

    pub fn after_submit(&self) -> Duration {
        Duration::from_millis(self.after_submit_ms)
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// WebDriver endpoint and session handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// Base URL of the driver, e.g. chromedriver
    pub url: String,
    /// Attach to this existing session instead of creating one
    pub session_id: Option<String>,
    /// Capabilities sent when creating a session
    pub capabilities: Option<serde_json::Value>,
    /// Delete the session when the run ends (only for sessions we created)
    pub close_session: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            session_id: None,
            capabilities: None,
            close_session: true,
        }
    }
}

impl CheckerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> CheckerResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            CheckerError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            CheckerError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> CheckerResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| CheckerError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the first default config file present in the working directory
    pub fn discover() -> CheckerResult<Option<Self>> {
        for name in DEFAULT_CONFIG_FILES {
            if Path::new(name).exists() {
                return Self::load_from_file(name).map(Some);
            }
        }
        Ok(None)
    }

    /// Default configuration for the AdGuard DNS dashboard
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            page: PageConfig::default(),
            selectors: SelectorConfig::default(),
            phrases: PhraseConfig::default(),
            timing: TimingConfig::default(),
            webdriver: WebDriverConfig::default(),
            filter_list: FilterListHeader::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CheckerResult<()> {
        if self.version != "1.0" {
            return Err(CheckerError::config(format!(
                "Unsupported configuration version '{}'",
                self.version
            )));
        }

        let selectors = [
            ("input", &self.selectors.input),
            ("button", &self.selectors.button),
            ("clear_input", &self.selectors.clear_input),
            ("result_container", &self.selectors.result_container),
            ("rule_text", &self.selectors.rule_text),
            ("invalid_domain_error", &self.selectors.invalid_domain_error),
        ];
        for (name, selector) in selectors {
            if selector.trim().is_empty() {
                return Err(CheckerError::config(format!("Selector '{name}' is empty")));
            }
        }

        if self.phrases.blocked.trim().is_empty() {
            return Err(CheckerError::config("Blocked phrase is empty"));
        }
        if self.phrases.invalid_domain.trim().is_empty() {
            return Err(CheckerError::config("Invalid-domain phrase is empty"));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(CheckerError::config("timing.poll_interval_ms must be greater than 0"));
        }

        self.page_regex()?;

        if !self.webdriver.url.starts_with("http://") && !self.webdriver.url.starts_with("https://") {
            return Err(CheckerError::config(format!(
                "WebDriver URL '{}' must be http(s)",
                self.webdriver.url
            )));
        }

        Ok(())
    }

    /// Compiled page URL pattern
    pub fn page_regex(&self) -> CheckerResult<Regex> {
        if self.page.url_pattern == DEFAULT_URL_PATTERN {
            return Ok(DEFAULT_URL_REGEX.clone());
        }
        Regex::new(&self.page.url_pattern).map_err(|e| {
            CheckerError::config(format!("Invalid page pattern '{}': {e}", self.page.url_pattern))
        })
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> CheckerResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| CheckerError::config(format!("Failed to serialize config: {e}")))
    }

    /// Fingerprint of everything that influences classification
    pub fn fingerprint(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.version.hash(&mut hasher);
        self.page.url_pattern.hash(&mut hasher);
        self.selectors.hash(&mut hasher);
        self.phrases.hash(&mut hasher);
        self.timing.hash(&mut hasher);

        format!("{:x}", hasher.finish())
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Configuration builder for command-line overrides
pub struct ConfigBuilder {
    config: CheckerConfig,
}

impl ConfigBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self { config: CheckerConfig::default() }
    }

    /// Start from an existing configuration
    pub fn from_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.config.webdriver.url = url.into();
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.config.webdriver.session_id = Some(session_id.into());
        self
    }

    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.config.page.url = Some(url.into());
        self
    }

    pub fn request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.timing.request_delay_ms = delay_ms;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> CheckerResult<CheckerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
