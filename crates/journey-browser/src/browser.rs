//! Browser lifecycle and the Chrome DevTools Protocol page implementation

use crate::page::{
    ClickOutcome, ElementInfo, ElementQuery, ElementTarget, FormField, FrameRef, NetworkSink,
    Page, PageHandle, ScrollMetrics,
};
use crate::script;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use journey_core::{
    JourneyError, NetworkKind, RawNetworkEvent, Result, Timeouts, UiInventoryItem, Viewport,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    pub viewport: Viewport,
    /// User agent string
    pub user_agent: Option<String>,
    pub timeouts: Timeouts,
    /// HTTP basic-auth credentials for the target site
    pub credentials: Option<HttpCredentials>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            timeouts: Timeouts::default(),
            credentials: None,
        }
    }
}

/// Username/password pair answered to HTTP auth challenges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

/// Active browser session; dropping it shuts Chrome down
pub struct BrowserSession {
    browser: Browser,
    page: Arc<ChromePage>,
}

impl BrowserSession {
    /// Launch browser with custom configuration
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless, config.viewport.width, config.viewport.height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| JourneyError::Browser(format!("Failed to launch browser: {}", e)))?;

        // Hide the automation flag and let `target=_blank` clicks open tabs
        launch_options
            .args
            .push(OsStr::new("--disable-blink-features=AutomationControlled"));
        launch_options.args.push(OsStr::new("--disable-popup-blocking"));

        let user_agent_arg: Option<String> =
            config.user_agent.as_ref().map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| JourneyError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| JourneyError::Browser(format!("Failed to create tab: {}", e)))?;

        let page = Arc::new(ChromePage::new(browser.clone(), tab, &config)?);
        page.set_viewport(config.viewport).await?;

        info!("Browser launched successfully");
        Ok(Self { browser, page })
    }

    /// The first tab, as a shareable page handle
    pub fn page(&self) -> PageHandle {
        self.page.clone()
    }

    /// Close the browser session
    pub async fn close(self) -> Result<()> {
        info!("Closing browser session");
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let tabs = self.browser.get_tabs().lock().map(|t| t.len()).unwrap_or(0);
        debug!("BrowserSession dropped with {} tab(s); browser process will be killed", tabs);
    }
}

/// One Chrome tab behind the [`Page`] seam
pub struct ChromePage {
    browser: Browser,
    tab: Arc<Tab>,
    timeouts: Timeouts,
    credentials: Option<HttpCredentials>,
    /// Re-attached to tabs opened from this one
    sink: Mutex<Option<NetworkSink>>,
}

impl ChromePage {
    fn new(browser: Browser, tab: Arc<Tab>, config: &BrowserConfig) -> Result<Self> {
        tab.set_default_timeout(config.timeouts.navigation().max(Duration::from_secs(1)));
        if let Some(creds) = &config.credentials {
            tab.authenticate(Some(creds.username.clone()), Some(creds.password.clone()))
                .map_err(|e| JourneyError::Browser(format!("Failed to set credentials: {}", e)))?;
        }
        Ok(Self {
            browser,
            tab,
            timeouts: config.timeouts,
            credentials: config.credentials.clone(),
            sink: Mutex::new(None),
        })
    }

    /// Execute JavaScript in the page context
    pub async fn evaluate_script(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| JourneyError::Browser(format!("JavaScript evaluation failed: {}", e)))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    /// Call an injected helper and decode its JSON result
    async fn call<T: DeserializeOwned>(&self, function: &str, args: &[Value]) -> Result<T> {
        let raw = self.evaluate_script(&script::call(function, args)).await?;
        let text = raw.as_str().unwrap_or("null");
        Ok(serde_json::from_str(text)?)
    }

    fn target_json(target: &ElementTarget) -> Value {
        json!({
            "root": target.frame.root_index(),
            "query": target.query,
            "nth": target.nth,
        })
    }

    fn tab_snapshot(&self) -> Vec<Arc<Tab>> {
        self.browser
            .get_tabs()
            .lock()
            .map(|tabs| tabs.clone())
            .unwrap_or_default()
    }

    /// Detect a tab that appeared after `before` was taken
    async fn adopt_new_tab(&self, before: &[Arc<Tab>]) -> Result<Option<PageHandle>> {
        let found = crate::page::poll_until(self.timeouts.settle() * 4, self.timeouts.poll(), || {
            let now = self.tab_snapshot();
            async move { now.iter().any(|t| !before.iter().any(|b| Arc::ptr_eq(b, t))) }
        })
        .await;
        if !found {
            return Ok(None);
        }
        let Some(tab) = self
            .tab_snapshot()
            .into_iter()
            .find(|t| !before.iter().any(|b| Arc::ptr_eq(b, t)))
        else {
            return Ok(None);
        };

        info!("Click opened a new tab; switching active page");
        let config = BrowserConfig {
            timeouts: self.timeouts,
            credentials: self.credentials.clone(),
            ..BrowserConfig::default()
        };
        let page = ChromePage::new(self.browser.clone(), tab, &config)?;
        let sink = self.sink.lock().ok().and_then(|s| s.clone());
        if let Some(sink) = sink {
            page.observe_network(sink)?;
        }
        if let Err(e) = page.tab.wait_until_navigated() {
            debug!("New tab did not finish navigating: {}", e);
        }
        Ok(Some(Arc::new(page)))
    }
}

/// Outer window size that yields `target` as the inner viewport
///
/// `outer` and `inner` are the current window bounds and inner size; their
/// difference is the browser frame (zero when headless).
fn window_size(target: Viewport, outer: (f64, f64), inner: Viewport) -> (f64, f64) {
    let frame_width = (outer.0 - f64::from(inner.width)).max(0.0);
    let frame_height = (outer.1 - f64::from(inner.height)).max(0.0);
    (
        f64::from(target.width) + frame_width,
        f64::from(target.height) + frame_height,
    )
}

fn header_value(params: &Value, key: &str) -> Option<Value> {
    params.get(key).and_then(|v| v.get("headers")).cloned()
}

#[async_trait]
impl Page for ChromePage {
    async fn url(&self) -> Result<String> {
        let result = self.evaluate_script("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    async fn title(&self) -> Result<String> {
        let result = self.evaluate_script("document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    async fn content(&self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| JourneyError::Browser(format!("Failed to read content: {}", e)))
    }

    async fn frame_count(&self) -> Result<usize> {
        self.call("frameCount", &[]).await
    }

    async fn count(&self, frame: FrameRef, query: &ElementQuery) -> Result<usize> {
        self.call("count", &[json!(frame.root_index()), serde_json::to_value(query)?])
            .await
    }

    async fn inspect(&self, target: &ElementTarget) -> Result<Option<ElementInfo>> {
        self.call("inspect", &[Self::target_json(target)]).await
    }

    async fn click(&self, target: &ElementTarget) -> Result<ClickOutcome> {
        debug!("Clicking {}", target.query);
        let before = self.tab_snapshot();
        let _: bool = self.call("click", &[Self::target_json(target)]).await?;
        tokio::time::sleep(self.timeouts.settle()).await;
        let new_page = self.adopt_new_tab(&before).await?;
        Ok(ClickOutcome { new_page })
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<()> {
        let _: bool = self
            .call("fill", &[Self::target_json(target), json!(value)])
            .await?;
        Ok(())
    }

    async fn check(&self, target: &ElementTarget) -> Result<()> {
        let checked: bool = self.call("check", &[Self::target_json(target)]).await?;
        if checked {
            Ok(())
        } else {
            Err(JourneyError::Browser(format!("checkbox did not toggle: {}", target.query)))
        }
    }

    async fn select_option(&self, target: &ElementTarget, value: &str) -> Result<()> {
        let _: bool = self
            .call("select", &[Self::target_json(target), json!(value)])
            .await?;
        Ok(())
    }

    async fn press_enter(&self, target: &ElementTarget) -> Result<()> {
        let _: bool = self.call("pressEnter", &[Self::target_json(target)]).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, target: &ElementTarget) -> Result<()> {
        let _: bool = self
            .call("scrollIntoView", &[Self::target_json(target)])
            .await?;
        Ok(())
    }

    async fn scroll_metrics(&self, target: &ElementTarget) -> Result<Option<ScrollMetrics>> {
        self.call("scrollMetrics", &[Self::target_json(target)]).await
    }

    async fn scroll_by(&self, dy: f64) -> Result<()> {
        let _: f64 = self.call("scrollBy", &[json!(dy)]).await?;
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport> {
        self.call("viewport", &[]).await
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        // Window bounds include the browser frame; `viewport()` reports the inner size
        let outer = self.tab.get_bounds().map(|b| (b.width as f64, b.height as f64));
        let (width, height) = match (outer, self.viewport().await) {
            (Ok(outer), Ok(inner)) => window_size(viewport, outer, inner),
            (Err(e), _) => {
                debug!("Could not read window bounds: {}", e);
                window_size(viewport, (0.0, 0.0), Viewport { width: 0, height: 0 })
            }
            (_, Err(e)) => {
                debug!("Could not read inner viewport: {}", e);
                window_size(viewport, (0.0, 0.0), Viewport { width: 0, height: 0 })
            }
        };
        self.tab
            .set_bounds(Bounds::Normal {
                left: None,
                top: None,
                width: Some(width),
                height: Some(height),
            })
            .map_err(|e| JourneyError::Browser(format!("Failed to resize window: {}", e)))?;
        tokio::time::sleep(self.timeouts.settle()).await;
        Ok(())
    }

    async fn interactive_elements(&self) -> Result<Vec<UiInventoryItem>> {
        self.call("inventory", &[]).await
    }

    async fn form_fields(&self) -> Result<Vec<FormField>> {
        self.call("formFields", &[]).await
    }

    async fn ui_alerts(&self) -> Result<Vec<String>> {
        self.call("alerts", &[]).await
    }

    async fn ready_state_complete(&self) -> Result<bool> {
        self.call("readyState", &[]).await
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, full_page)
            .map_err(|e| JourneyError::Browser(format!("CDP capture failed: {}", e)))
    }

    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .map_err(|e| JourneyError::Browser(format!("Failed to navigate: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| JourneyError::Timeout(format!("Navigation timeout: {}", e)))?;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.tab
            .reload(false, None)
            .map_err(|e| JourneyError::Browser(format!("Reload failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| JourneyError::Timeout(format!("Reload timeout: {}", e)))?;
        Ok(())
    }

    fn observe_network(&self, sink: NetworkSink) -> Result<()> {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = Some(sink.clone());
        }

        let on_response = sink.clone();
        self.tab
            .register_response_handling(
                "journey-capture",
                Box::new(move |params, fetch_body| {
                    let params = serde_json::to_value(&params).unwrap_or(Value::Null);
                    let response = params.get("response").cloned().unwrap_or(Value::Null);
                    let url = response.get("url").and_then(Value::as_str).unwrap_or("");
                    let resource_type = params.get("type").and_then(Value::as_str).map(String::from);
                    // Bodies are only worth fetching for API traffic
                    let wants_body = matches!(resource_type.as_deref(), Some("XHR") | Some("Fetch"));
                    let event = RawNetworkEvent {
                        kind: NetworkKind::Response,
                        url: url.to_string(),
                        method: None,
                        resource_type,
                        status: response
                            .get("status")
                            .and_then(Value::as_f64)
                            .map(|s| s as u16),
                        headers: header_value(&params, "response"),
                        body: if wants_body {
                            fetch_body().ok().map(|b| b.body)
                        } else {
                            None
                        },
                    };
                    on_response(event);
                }),
            )
            .map_err(|e| JourneyError::Capture(format!("Failed to hook responses: {}", e)))?;

        let on_request = sink;
        self.tab
            .add_event_listener(Arc::new(move |event: &Event| {
                if let Event::NetworkRequestWillBeSent(e) = event {
                    let params = serde_json::to_value(&e.params).unwrap_or(Value::Null);
                    let request = params.get("request").cloned().unwrap_or(Value::Null);
                    on_request(RawNetworkEvent {
                        kind: NetworkKind::Request,
                        url: request.get("url").and_then(Value::as_str).unwrap_or("").to_string(),
                        method: request.get("method").and_then(Value::as_str).map(String::from),
                        resource_type: params.get("type").and_then(Value::as_str).map(String::from),
                        status: None,
                        headers: header_value(&params, "request"),
                        body: request.get("postData").and_then(Value::as_str).map(String::from),
                    });
                }
            }))
            .map_err(|e| JourneyError::Capture(format!("Failed to hook requests: {}", e)))?;

        info!("Network capture attached");
        Ok(())
    }
}
