//! WebDriver-backed page probe
//!
//! Drives the dashboard's check form in a real browser through the W3C WebDriver
//! HTTP protocol. The browser is expected to be logged in to the dashboard already,
//! either by attaching to an existing session or through the capabilities used to
//! start a new one (for example a Chrome `user-data-dir`).

use crate::config::{CheckerConfig, PhraseConfig, SelectorConfig, TimingConfig, WebDriverConfig};
use crate::domain::{CheckerError, CheckerResult};
use crate::probe::{PageProbe, ProbeSignal};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Key under which WebDriver returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque WebDriver element reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error object returned by the driver for a failed command
#[derive(Debug, Clone, PartialEq, Eq)]
struct DriverFailure {
    error: String,
    message: String,
}

impl DriverFailure {
    /// The element is not (or no longer) in the document
    fn is_absent(&self) -> bool {
        matches!(self.error.as_str(), "no such element" | "stale element reference")
    }
}

/// Minimal WebDriver client bound to one session
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    base_url: String,
    session_id: String,
    owns_session: bool,
}

impl WebDriverClient {
    /// Attach to a session that already exists
    pub fn attach(base_url: impl Into<String>, session_id: impl Into<String>) -> CheckerResult<Self> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            owns_session: false,
        })
    }

    /// Attach to the configured session, or create a new one
    pub async fn connect(config: &WebDriverConfig) -> CheckerResult<Self> {
        if let Some(session_id) = &config.session_id {
            tracing::debug!("Attaching to WebDriver session {}", session_id);
            return Self::attach(&config.url, session_id);
        }

        let http = build_http_client()?;
        let base_url = config.url.trim_end_matches('/').to_string();
        let response = http
            .post(format!("{base_url}/session"))
            .json(&new_session_body(config.capabilities.as_ref()))
            .send()
            .await
            .map_err(|e| CheckerError::webdriver(format!("Failed to reach {base_url}: {e}")))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| CheckerError::webdriver(format!("Invalid new session response: {e}")))?;

        if let Some(failure) = driver_failure(&body) {
            return Err(CheckerError::webdriver(format!(
                "Failed to create session: {}: {}",
                failure.error, failure.message
            )));
        }
        let session_id = session_id_from(&body)
            .ok_or_else(|| CheckerError::webdriver("New session response carried no sessionId"))?;

        tracing::info!("Created WebDriver session {}", session_id);
        Ok(Self { http, base_url, session_id, owns_session: true })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether this client created its session
    pub fn owns_session(&self) -> bool {
        self.owns_session
    }

    /// Issue a command, separating driver-reported failures from transport errors
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> CheckerResult<Result<Value, DriverFailure>> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CheckerError::webdriver(format!("{method} {path} failed: {e}")))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| CheckerError::webdriver(format!("{method} {path}: invalid response: {e}")))?;

        if let Some(failure) = driver_failure(&payload) {
            return Ok(Err(failure));
        }
        Ok(Ok(payload.get("value").cloned().unwrap_or(Value::Null)))
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> CheckerResult<Value> {
        self.send(method, path, body).await?.map_err(|failure| {
            CheckerError::webdriver(format!("{path}: {}: {}", failure.error, failure.message))
        })
    }

    pub async fn navigate(&self, url: &str) -> CheckerResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> CheckerResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Find the first element matching a CSS selector
    pub async fn find(&self, selector: &str) -> CheckerResult<Option<ElementId>> {
        self.find_at("/element", selector).await
    }

    /// Find the first descendant of `parent` matching a CSS selector
    pub async fn find_within(
        &self,
        parent: &ElementId,
        selector: &str,
    ) -> CheckerResult<Option<ElementId>> {
        self.find_at(&format!("/element/{}/element", parent.as_str()), selector).await
    }

    async fn find_at(&self, path: &str, selector: &str) -> CheckerResult<Option<ElementId>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.send(Method::POST, path, Some(body)).await? {
            Ok(value) => Ok(element_id_from(&value)),
            Err(failure) if failure.is_absent() => Ok(None),
            Err(failure) => Err(CheckerError::webdriver(format!(
                "Finding '{selector}': {}: {}",
                failure.error, failure.message
            ))),
        }
    }

    /// Whether the element is rendered; a detached element counts as hidden
    pub async fn is_displayed(&self, element: &ElementId) -> CheckerResult<bool> {
        let path = format!("/element/{}/displayed", element.as_str());
        match self.send(Method::GET, &path, None).await? {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(failure) if failure.is_absent() => Ok(false),
            Err(failure) => {
                Err(CheckerError::webdriver(format!("{path}: {}: {}", failure.error, failure.message)))
            }
        }
    }

    /// Rendered text of the element
    pub async fn text(&self, element: &ElementId) -> CheckerResult<String> {
        let path = format!("/element/{}/text", element.as_str());
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn click(&self, element: &ElementId) -> CheckerResult<()> {
        let path = format!("/element/{}/click", element.as_str());
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn clear(&self, element: &ElementId) -> CheckerResult<()> {
        let path = format!("/element/{}/clear", element.as_str());
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    /// Type text into the element; the page sees ordinary input events
    pub async fn send_keys(&self, element: &ElementId, text: &str) -> CheckerResult<()> {
        let path = format!("/element/{}/value", element.as_str());
        self.command(Method::POST, &path, Some(json!({ "text": text }))).await?;
        Ok(())
    }

    /// Delete the session
    pub async fn close(&self) -> CheckerResult<()> {
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

/// Probe that operates the dashboard's check form through WebDriver
pub struct WebDriverProbe {
    client: WebDriverClient,
    selectors: SelectorConfig,
    phrases: PhraseConfig,
    timing: TimingConfig,
    page_url: Option<String>,
    page_pattern: Regex,
    allow_any_page: bool,
    close_session: bool,
    input: Option<ElementId>,
    button: Option<ElementId>,
    rejected_before_submit: bool,
}

impl WebDriverProbe {
    /// Wrap an existing client
    pub fn new(client: WebDriverClient, config: &CheckerConfig) -> CheckerResult<Self> {
        Ok(Self {
            client,
            selectors: config.selectors.clone(),
            phrases: config.phrases.clone(),
            timing: config.timing.clone(),
            page_url: config.page.url.clone(),
            page_pattern: config.page_regex()?,
            allow_any_page: false,
            close_session: config.webdriver.close_session,
            input: None,
            button: None,
            rejected_before_submit: false,
        })
    }

    /// Connect to the configured driver
    pub async fn connect(config: &CheckerConfig) -> CheckerResult<Self> {
        let client = WebDriverClient::connect(&config.webdriver).await?;
        Self::new(client, config)
    }

    /// Run even when the browser is not on the dashboard page
    pub fn allow_any_page(mut self, allow: bool) -> Self {
        self.allow_any_page = allow;
        self
    }

    /// Make sure the browser shows the expected page
    async fn check_page(&self) -> CheckerResult<()> {
        if let Some(url) = &self.page_url {
            let current = self.client.current_url().await?;
            if &current != url {
                tracing::info!("Navigating to {}", url);
                self.client.navigate(url).await?;
            }
        }

        let current = self.client.current_url().await?;
        if self.page_pattern.is_match(&current) {
            return Ok(());
        }

        if self.allow_any_page {
            tracing::warn!(
                "Current page {} does not look like the dashboard user rules page; continuing",
                current
            );
            Ok(())
        } else {
            Err(CheckerError::UnexpectedPage {
                url: current,
                pattern: self.page_pattern.as_str().to_string(),
            })
        }
    }

    /// Poll until a displayed element matches `selector` or `timeout` elapses
    async fn wait_for(&self, selector: &str, timeout: Duration) -> CheckerResult<Option<ElementId>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.client.find(selector).await? {
                if self.client.is_displayed(&element).await? {
                    return Ok(Some(element));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(self.timing.poll_interval()).await;
        }
    }

    /// Whether the invalid-domain message shows up within the check window
    async fn invalid_message_shown(&self) -> CheckerResult<bool> {
        let Some(element) =
            self.wait_for(&self.selectors.invalid_domain_error, self.timing.invalid_check()).await?
        else {
            return Ok(false);
        };
        let text = self.client.text(&element).await?;
        Ok(text.trim() == self.phrases.invalid_domain)
    }

    fn controls(&self) -> CheckerResult<(ElementId, ElementId)> {
        match (&self.input, &self.button) {
            (Some(input), Some(button)) => Ok((input.clone(), button.clone())),
            (None, _) => Err(CheckerError::missing_element("Domain input field", &self.selectors.input)),
            (_, None) => Err(CheckerError::missing_element("Check button", &self.selectors.button)),
        }
    }
}

#[async_trait]
impl PageProbe for WebDriverProbe {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn prepare(&mut self) -> CheckerResult<()> {
        self.check_page().await?;

        let timeout = self.timing.element_timeout();
        let input = self.wait_for(&self.selectors.input, timeout).await?.ok_or_else(|| {
            CheckerError::missing_element("Domain input field", &self.selectors.input)
        })?;
        let button = self
            .wait_for(&self.selectors.button, timeout)
            .await?
            .ok_or_else(|| CheckerError::missing_element("Check button", &self.selectors.button))?;

        self.input = Some(input);
        self.button = Some(button);
        Ok(())
    }

    async fn submit(&mut self, domain: &str) -> CheckerResult<()> {
        let (input, button) = self.controls()?;
        self.rejected_before_submit = false;

        if let Some(clear) = self.client.find(&self.selectors.clear_input).await? {
            if self.client.is_displayed(&clear).await? {
                self.client.click(&clear).await?;
                sleep(self.timing.clear_delay()).await;
            }
        }

        // A message left over from the previous domain would be mistaken for this one
        if let Some(stale) = self.client.find(&self.selectors.invalid_domain_error).await? {
            if self.client.is_displayed(&stale).await? {
                self.client.clear(&input).await?;
                self.client.send_keys(&input, "_").await?;
                sleep(self.timing.reset_delay()).await;
            }
        }

        self.client.clear(&input).await?;
        self.client.send_keys(&input, domain).await?;
        sleep(self.timing.input_settle()).await;

        if self.invalid_message_shown().await? {
            tracing::debug!("'{}' rejected by the form before submission", domain);
            self.rejected_before_submit = true;
            return Ok(());
        }

        self.client.click(&button).await?;
        sleep(self.timing.after_submit()).await;
        Ok(())
    }

    async fn await_result(&mut self, timeout: Duration) -> CheckerResult<ProbeSignal> {
        if std::mem::take(&mut self.rejected_before_submit) || self.invalid_message_shown().await? {
            return Ok(ProbeSignal::Invalid);
        }

        let Some(container) = self.wait_for(&self.selectors.result_container, timeout).await? else {
            tracing::debug!(
                "Result container ('{}') did not appear",
                self.selectors.result_container
            );
            return Ok(ProbeSignal::NoSignal);
        };

        let text = self.client.text(&container).await?;
        if !text.contains(&self.phrases.blocked) {
            return Ok(ProbeSignal::NoSignal);
        }

        let echoed_rule = match self.client.find_within(&container, &self.selectors.rule_text).await? {
            Some(rule) => Some(self.client.text(&rule).await?.trim().to_string()),
            None => None,
        };
        Ok(ProbeSignal::Blocked { echoed_rule })
    }

    async fn finish(&mut self) -> CheckerResult<()> {
        if self.client.owns_session() && self.close_session {
            tracing::debug!("Closing WebDriver session {}", self.client.session_id());
            self.client.close().await?;
        }
        Ok(())
    }
}

fn build_http_client() -> CheckerResult<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| CheckerError::webdriver(format!("Failed to build HTTP client: {e}")))
}

/// Request body for `POST /session`
fn new_session_body(capabilities: Option<&Value>) -> Value {
    let always_match = capabilities.cloned().unwrap_or_else(|| json!({ "browserName": "chrome" }));
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

fn session_id_from(body: &Value) -> Option<String> {
    body.get("value")
        .and_then(|v| v.get("sessionId"))
        .or_else(|| body.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn element_id_from(value: &Value) -> Option<ElementId> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(|id| ElementId(id.to_string()))
}

fn driver_failure(payload: &Value) -> Option<DriverFailure> {
    let value = payload.get("value")?;
    let error = value.get("error")?.as_str()?;
    Some(DriverFailure {
        error: error.to_string(),
        message: value.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_parsing() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_id_from(&value), Some(ElementId("abc-123".to_string())));
        assert_eq!(element_id_from(&json!({ "ELEMENT": "legacy" })), None);
    }

    #[test]
    fn test_driver_failure_parsing() {
        let payload = json!({
            "value": { "error": "no such element", "message": "Unable to locate", "stacktrace": "" }
        });
        let failure = driver_failure(&payload).unwrap();
        assert!(failure.is_absent());
        assert_eq!(failure.message, "Unable to locate");

        let failure = driver_failure(&json!({ "value": { "error": "invalid session id" } })).unwrap();
        assert!(!failure.is_absent());

        assert!(driver_failure(&json!({ "value": "https://adguard-dns.io/" })).is_none());
        assert!(driver_failure(&json!({ "value": null })).is_none());
    }

    #[test]
    fn test_new_session_body() {
        let body = new_session_body(None);
        assert_eq!(body["capabilities"]["alwaysMatch"]["browserName"], "chrome");

        let custom = json!({ "browserName": "firefox" });
        let body = new_session_body(Some(&custom));
        assert_eq!(body["capabilities"]["alwaysMatch"]["browserName"], "firefox");
    }

    #[test]
    fn test_session_id_parsing() {
        let w3c = json!({ "value": { "sessionId": "s-1", "capabilities": {} } });
        assert_eq!(session_id_from(&w3c).as_deref(), Some("s-1"));

        let legacy = json!({ "sessionId": "s-2", "status": 0 });
        assert_eq!(session_id_from(&legacy).as_deref(), Some("s-2"));
    }

    #[test]
    fn test_attach_trims_base_url() {
        let client = WebDriverClient::attach("http://localhost:9515/", "abc").unwrap();
        assert_eq!(client.base_url, "http://localhost:9515");
        assert_eq!(client.session_id(), "abc");
        assert!(!client.owns_session());
    }

    #[test]
    fn test_probe_requires_prepare() {
        let client = WebDriverClient::attach("http://localhost:9515", "abc").unwrap();
        let mut probe = WebDriverProbe::new(client, &CheckerConfig::default()).unwrap();

        let err = tokio_test::block_on(probe.submit("example.com")).unwrap_err();
        assert!(matches!(err, CheckerError::MissingUiElement { .. }));
    }

    /// In-process WebDriver server answering from a scripted page
    mod fake_driver {
        use super::ELEMENT_KEY;
        use axum::extract::State;
        use axum::http::{Method, StatusCode, Uri};
        use axum::{Json, Router};
        use serde_json::{json, Value};
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        pub type SharedPage = Arc<Mutex<FakePage>>;

        #[derive(Debug, Clone)]
        pub struct FakeElement {
            pub id: String,
            pub displayed: bool,
            pub text: String,
        }

        #[derive(Debug, Default)]
        pub struct FakePage {
            pub url: String,
            /// Top-level elements by CSS selector
            pub elements: HashMap<String, FakeElement>,
            /// Descendants keyed by (parent id, selector)
            pub children: HashMap<(String, String), FakeElement>,
            /// Elements that appear once the given element id is clicked
            pub reveal_on_click: HashMap<String, Vec<(String, FakeElement)>>,
            pub clicked: Vec<String>,
            pub typed: Vec<String>,
            pub navigated: Vec<String>,
            pub sessions_created: usize,
            pub deleted: bool,
        }

        fn element(id: &str, text: &str) -> FakeElement {
            FakeElement { id: id.to_string(), displayed: true, text: text.to_string() }
        }

        impl FakePage {
            pub fn on(url: &str) -> Self {
                Self { url: url.to_string(), ..Default::default() }
            }

            pub fn with(mut self, selector: &str, id: &str, text: &str) -> Self {
                self.elements.insert(selector.to_string(), element(id, text));
                self
            }

            pub fn with_child(mut self, parent: &str, selector: &str, id: &str, text: &str) -> Self {
                self.children.insert((parent.to_string(), selector.to_string()), element(id, text));
                self
            }

            pub fn revealing(mut self, clicked: &str, selector: &str, id: &str, text: &str) -> Self {
                self.reveal_on_click
                    .entry(clicked.to_string())
                    .or_default()
                    .push((selector.to_string(), element(id, text)));
                self
            }

            fn by_id(&self, id: &str) -> Option<&FakeElement> {
                self.elements.values().chain(self.children.values()).find(|e| e.id == id)
            }

            fn click(&mut self, id: &str) {
                self.clicked.push(id.to_string());
                if let Some(revealed) = self.reveal_on_click.remove(id) {
                    self.elements.extend(revealed);
                }
            }
        }

        type Reply = (StatusCode, Json<Value>);

        fn ok(value: Value) -> Reply {
            (StatusCode::OK, Json(json!({ "value": value })))
        }

        fn failure(error: &str, message: &str) -> Reply {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "value": { "error": error, "message": message, "stacktrace": "" } })),
            )
        }

        fn found(element: Option<FakeElement>) -> Reply {
            match element {
                Some(element) => ok(json!({ ELEMENT_KEY: element.id })),
                None => failure("no such element", "Unable to locate element"),
            }
        }

        fn dispatch(page: &mut FakePage, method: &Method, path: &str, body: &Value) -> Reply {
            let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
            let selector = body["value"].as_str().unwrap_or_default().to_string();

            match (method.as_str(), segments.as_slice()) {
                ("POST", ["session"]) => {
                    page.sessions_created += 1;
                    ok(json!({ "sessionId": "created-session", "capabilities": {} }))
                }
                ("DELETE", ["session", _]) => {
                    page.deleted = true;
                    ok(Value::Null)
                }
                ("GET", ["session", _, "url"]) => ok(json!(page.url)),
                ("POST", ["session", _, "url"]) => {
                    let url = body["url"].as_str().unwrap_or_default().to_string();
                    page.navigated.push(url.clone());
                    page.url = url;
                    ok(Value::Null)
                }
                ("POST", ["session", _, "element"]) => found(page.elements.get(&selector).cloned()),
                ("POST", ["session", _, "element", parent, "element"]) => {
                    found(page.children.get(&(parent.to_string(), selector)).cloned())
                }
                ("GET", ["session", _, "element", id, "displayed"]) => match page.by_id(id) {
                    Some(element) => ok(json!(element.displayed)),
                    None => failure("stale element reference", "Element is detached"),
                },
                ("GET", ["session", _, "element", id, "text"]) => match page.by_id(id) {
                    Some(element) => ok(json!(element.text)),
                    None => failure("stale element reference", "Element is detached"),
                },
                ("POST", ["session", _, "element", id, "click"]) => {
                    page.click(id);
                    ok(Value::Null)
                }
                ("POST", ["session", _, "element", _, "clear"]) => ok(Value::Null),
                ("POST", ["session", _, "element", _, "value"]) => {
                    page.typed.push(body["text"].as_str().unwrap_or_default().to_string());
                    ok(Value::Null)
                }
                _ => failure("unknown command", path),
            }
        }

        async fn respond(
            State(page): State<SharedPage>,
            method: Method,
            uri: Uri,
            body: String,
        ) -> Reply {
            let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let mut guard = page.lock().unwrap();
            dispatch(&mut guard, &method, uri.path(), &body)
        }

        /// Serve `page` on a free local port and return the driver URL
        pub async fn serve(page: FakePage) -> (String, SharedPage) {
            let shared = Arc::new(Mutex::new(page));
            let app = Router::new().fallback(respond).with_state(shared.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (base_url, shared)
        }
    }

    use crate::config::ConfigBuilder;
    use fake_driver::{FakePage, SharedPage};

    const DASHBOARD: &str = "https://adguard-dns.io/ja/dashboard/settings/abc_123/userrules";

    fn fast_config() -> CheckerConfig {
        ConfigBuilder::new().timing(TimingConfig::immediate()).build().unwrap()
    }

    /// Dashboard page with the domain input and check button in place
    fn dashboard() -> FakePage {
        let selectors = SelectorConfig::default();
        FakePage::on(DASHBOARD).with(&selectors.input, "input", "").with(&selectors.button, "button", "")
    }

    async fn attached_probe(page: FakePage, config: &CheckerConfig) -> (WebDriverProbe, SharedPage) {
        let (base_url, shared) = fake_driver::serve(page).await;
        let client = WebDriverClient::attach(base_url, "existing-session").unwrap();
        (WebDriverProbe::new(client, config).unwrap(), shared)
    }

    #[tokio::test]
    async fn test_blocked_result_reads_echoed_rule() {
        let selectors = SelectorConfig::default();
        let phrases = PhraseConfig::default();
        let page = dashboard()
            .revealing("button", &selectors.result_container, "result", &format!("bad.com {}", phrases.blocked))
            .with_child("result", &selectors.rule_text, "rule", "  Bad.com ");
        let (mut probe, page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("bad.com").await.unwrap();
        let signal = probe.await_result(Duration::ZERO).await.unwrap();

        assert_eq!(signal, ProbeSignal::Blocked { echoed_rule: Some("Bad.com".to_string()) });
        let page = page.lock().unwrap();
        assert_eq!(page.typed, vec!["bad.com".to_string()]);
        assert_eq!(page.clicked, vec!["button".to_string()]);
    }

    #[tokio::test]
    async fn test_blocked_without_rule_element() {
        let selectors = SelectorConfig::default();
        let phrases = PhraseConfig::default();
        let page = dashboard().revealing("button", &selectors.result_container, "result", &phrases.blocked);
        let (mut probe, _page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("bad.com").await.unwrap();

        let signal = probe.await_result(Duration::ZERO).await.unwrap();
        assert_eq!(signal, ProbeSignal::Blocked { echoed_rule: None });
    }

    #[tokio::test]
    async fn test_result_without_block_phrase_is_no_signal() {
        let selectors = SelectorConfig::default();
        let page = dashboard().revealing("button", &selectors.result_container, "result", "No rules match");
        let (mut probe, _page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("ok.com").await.unwrap();

        assert_eq!(probe.await_result(Duration::ZERO).await.unwrap(), ProbeSignal::NoSignal);
    }

    #[tokio::test]
    async fn test_missing_result_region_times_out() {
        let (mut probe, _page) = attached_probe(dashboard(), &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("quiet.com").await.unwrap();

        let signal = probe.await_result(Duration::from_millis(20)).await.unwrap();
        assert_eq!(signal, ProbeSignal::NoSignal);
    }

    #[tokio::test]
    async fn test_invalid_message_before_submit() {
        let selectors = SelectorConfig::default();
        let phrases = PhraseConfig::default();
        let page = dashboard().with(&selectors.invalid_domain_error, "error", &phrases.invalid_domain);
        let (mut probe, page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("bad domain").await.unwrap();

        assert_eq!(probe.await_result(Duration::ZERO).await.unwrap(), ProbeSignal::Invalid);
        let page = page.lock().unwrap();
        // The stale message is cleared with "_" and the check button is never pressed
        assert_eq!(page.typed, vec!["_".to_string(), "bad domain".to_string()]);
        assert!(page.clicked.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_message_after_submit() {
        let selectors = SelectorConfig::default();
        let phrases = PhraseConfig::default();
        let page = dashboard().revealing(
            "button",
            &selectors.invalid_domain_error,
            "error",
            &format!("  {}\n", phrases.invalid_domain),
        );
        let (mut probe, page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("x..y").await.unwrap();

        assert_eq!(probe.await_result(Duration::ZERO).await.unwrap(), ProbeSignal::Invalid);
        assert_eq!(page.lock().unwrap().clicked, vec!["button".to_string()]);
    }

    #[tokio::test]
    async fn test_other_error_text_is_not_invalid() {
        let selectors = SelectorConfig::default();
        let page = dashboard().with(&selectors.invalid_domain_error, "error", "Something went wrong");
        let (mut probe, page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("ok.com").await.unwrap();

        assert_eq!(probe.await_result(Duration::ZERO).await.unwrap(), ProbeSignal::NoSignal);
        assert_eq!(page.lock().unwrap().clicked, vec!["button".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_control_clicked_when_visible() {
        let selectors = SelectorConfig::default();
        let page = dashboard().with(&selectors.clear_input, "clear", "");
        let (mut probe, page) = attached_probe(page, &fast_config()).await;

        probe.prepare().await.unwrap();
        probe.submit("a.com").await.unwrap();

        assert_eq!(page.lock().unwrap().clicked, vec!["clear".to_string(), "button".to_string()]);
    }

    #[tokio::test]
    async fn test_unexpected_page_rejected() {
        let selectors = SelectorConfig::default();
        let page = FakePage::on("https://example.com/")
            .with(&selectors.input, "input", "")
            .with(&selectors.button, "button", "");
        let (mut probe, _page) = attached_probe(page, &fast_config()).await;

        let err = probe.prepare().await.unwrap_err();
        match err {
            CheckerError::UnexpectedPage { url, .. } => assert_eq!(url, "https://example.com/"),
            other => panic!("expected UnexpectedPage, got {other:?}"),
        }

        let mut probe = probe.allow_any_page(true);
        probe.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn test_navigates_to_configured_page() {
        let selectors = SelectorConfig::default();
        let page = FakePage::on("about:blank")
            .with(&selectors.input, "input", "")
            .with(&selectors.button, "button", "");
        let config = ConfigBuilder::new()
            .timing(TimingConfig::immediate())
            .page_url(DASHBOARD)
            .build()
            .unwrap();
        let (mut probe, page) = attached_probe(page, &config).await;

        probe.prepare().await.unwrap();

        let page = page.lock().unwrap();
        assert_eq!(page.navigated, vec![DASHBOARD.to_string()]);
        assert_eq!(page.url, DASHBOARD);
    }

    #[tokio::test]
    async fn test_missing_input_reported() {
        let selectors = SelectorConfig::default();
        let page = FakePage::on(DASHBOARD).with(&selectors.button, "button", "");
        let (mut probe, _page) = attached_probe(page, &fast_config()).await;

        match probe.prepare().await.unwrap_err() {
            CheckerError::MissingUiElement { element, selector } => {
                assert_eq!(element, "Domain input field");
                assert_eq!(selector, selectors.input);
            }
            other => panic!("expected MissingUiElement, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_created_session_closed_on_finish() {
        let (base_url, page) = fake_driver::serve(dashboard()).await;
        let config = ConfigBuilder::new()
            .timing(TimingConfig::immediate())
            .webdriver_url(base_url)
            .build()
            .unwrap();

        let mut probe = WebDriverProbe::connect(&config).await.unwrap();
        assert!(probe.client.owns_session());
        assert_eq!(probe.client.session_id(), "created-session");

        probe.finish().await.unwrap();
        let page = page.lock().unwrap();
        assert_eq!(page.sessions_created, 1);
        assert!(page.deleted);
    }

    #[tokio::test]
    async fn test_attached_session_left_open() {
        let (mut probe, page) = attached_probe(dashboard(), &fast_config()).await;

        probe.finish().await.unwrap();
        assert!(!page.lock().unwrap().deleted);
    }
}
