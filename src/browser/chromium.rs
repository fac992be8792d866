//! Chromium backend over the DevTools protocol.
//!
//! Either launches a local Chromium or attaches to a running one through
//! its remote debugging endpoint. The CDP handler stream is drained on a
//! background task for the lifetime of the browser.

use super::{BrowserSession, ElementHandle, SessionError};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use rand::{rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
];

/// Launch options for the Chromium backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromiumOptions {
    /// Show the browser window instead of running headless.
    pub headful: bool,
    /// Explicit Chrome/Chromium executable; auto-detected when unset.
    pub executable: Option<PathBuf>,
    /// Remote DevTools endpoint such as `http://localhost:9222`.
    pub remote_url: Option<String>,
    /// Fixed user agent; one is picked at random when unset.
    pub user_agent: Option<String>,
}

/// One tab of a Chromium browser.
pub struct ChromiumSession {
    browser: Arc<Mutex<Browser>>,
    page: Page,
    user_agent: String,
    handler: Option<JoinHandle<()>>,
}

fn pick_user_agent(options: &ChromiumOptions) -> String {
    options.user_agent.clone().unwrap_or_else(|| {
        USER_AGENTS
            .choose(&mut rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string()
    })
}

fn session_error(e: CdpError) -> SessionError {
    let msg = e.to_string();
    if msg.contains("No target with given id") || msg.contains("Target closed") {
        SessionError::WindowClosed
    } else {
        SessionError::Backend(msg)
    }
}

impl ChromiumSession {
    /// Start (or attach to) a browser and open a blank tab.
    ///
    /// # Arguments
    ///
    /// * `options` - Headful flag, executable, remote endpoint and user agent.
    ///   With `remote_url` set nothing is launched; the DevTools endpoint's
    ///   websocket URL is looked up and attached to.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The remote endpoint does not report a `webSocketDebuggerUrl`
    /// - Chromium cannot be launched or connected to
    /// - The first tab cannot be opened or given its user agent
    #[instrument(level = "info", skip_all, fields(headful = options.headful, remote = options.remote_url.is_some()))]
    pub async fn start(options: &ChromiumOptions) -> Result<Self, Box<dyn Error>> {
        let (browser, mut handler) = match options.remote_url.as_deref() {
            Some(remote) => {
                let ws_url = resolve_ws_url(remote).await?;
                info!(%ws_url, "Attaching to remote browser");
                Browser::connect(ws_url).await?
            }
            None => {
                let mut builder = BrowserConfig::builder();
                if options.headful {
                    builder = builder.with_head();
                }
                if let Some(ref exe) = options.executable {
                    builder = builder.chrome_executable(exe);
                }
                let config = builder
                    .arg("--disable-blink-features=AutomationControlled")
                    .arg("--disable-dev-shm-usage")
                    .arg("--no-first-run")
                    .arg("--no-default-browser-check")
                    .arg("--no-sandbox")
                    .arg("--disable-gpu")
                    .build()
                    .map_err(|e| format!("invalid browser config: {e}"))?;
                info!("Launching browser");
                Browser::launch(config).await?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let user_agent = pick_user_agent(options);
        debug!(%user_agent, "Selected user agent");
        let page = browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
            .await?;

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page,
            user_agent,
            handler: Some(handler),
        })
    }

    /// Close the browser and stop the handler task.
    #[instrument(level = "info", skip_all)]
    pub async fn shutdown(mut self) -> Result<(), Box<dyn Error>> {
        let _ = self.page.clone().close().await;
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Browser did not close cleanly");
            }
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        info!("Browser shut down");
        Ok(())
    }
}

/// Resolve the websocket debugger URL from a DevTools HTTP endpoint.
async fn resolve_ws_url(remote: &str) -> Result<String, Box<dyn Error>> {
    let is_ws = remote.starts_with("ws://") || remote.starts_with("wss://");
    if is_ws && remote.contains("/devtools/") {
        return Ok(remote.to_string());
    }
    let http_url = remote
        .replacen("ws://", "http://", 1)
        .replacen("wss://", "https://", 1);
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));
    let version: serde_json::Value = reqwest::get(&version_url).await?.json().await?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| format!("no webSocketDebuggerUrl at {version_url}").into())
}

/// Apply the session user agent to a fresh tab and load `url` into it.
async fn prepare_tab(page: &Page, user_agent: &str, url: &str) -> Result<(), SessionError> {
    page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
        .await
        .map_err(session_error)?;
    page.goto(url).await.map_err(|e| SessionError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

impl BrowserSession for ChromiumSession {
    type Element = ChromiumElement;

    #[instrument(level = "info", skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>, SessionError> {
        self.page.url().await.map_err(session_error)
    }

    async fn find_all(&self, pattern: &str) -> Result<Vec<ChromiumElement>, SessionError> {
        let elements = self.page.find_elements(pattern).await.map_err(session_error)?;
        Ok(elements.into_iter().map(ChromiumElement).collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn open_tab(&self, url: &str) -> Result<Self, SessionError> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await.map_err(session_error)?
        };
        if let Err(e) = prepare_tab(&page, &self.user_agent, url).await {
            if let Err(close_err) = page.close().await {
                warn!(error = %close_err, "Could not close failed tab");
            }
            return Err(e);
        }
        Ok(Self {
            browser: Arc::clone(&self.browser),
            page,
            user_agent: self.user_agent.clone(),
            handler: None,
        })
    }

    async fn close(self) -> Result<(), SessionError> {
        self.page.clone().close().await.map_err(session_error)
    }
}

pub struct ChromiumElement(Element);

impl ElementHandle for ChromiumElement {
    async fn find_child(&self, pattern: &str) -> Result<Option<Self>, SessionError> {
        let mut found = self.0.find_elements(pattern).await.map_err(session_error)?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ChromiumElement(found.remove(0))))
        }
    }

    async fn text(&self) -> Result<String, SessionError> {
        let text = self.0.inner_text().await.map_err(session_error)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, SessionError> {
        self.0.attribute(name).await.map_err(session_error)
    }

    /// Click through JavaScript so overlays and off-screen buttons still fire.
    async fn click(&self) -> Result<(), SessionError> {
        self.0
            .call_js_fn("function() { this.click(); }", false)
            .await
            .map_err(session_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_devtools_ws_url_is_used_as_is() {
        let ws = "ws://127.0.0.1:9222/devtools/browser/4c1f";
        assert_eq!(resolve_ws_url(ws).await.unwrap(), ws);
    }

    #[test]
    fn test_fixed_user_agent_wins() {
        let options = ChromiumOptions {
            user_agent: Some("sweep-bot/1.0".to_string()),
            ..Default::default()
        };
        assert_eq!(pick_user_agent(&options), "sweep-bot/1.0");
        assert!(USER_AGENTS.contains(&pick_user_agent(&ChromiumOptions::default()).as_str()));
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium"]
    async fn test_failed_tab_open_closes_the_tab() {
        let session = ChromiumSession::start(&ChromiumOptions::default()).await.unwrap();
        let open_before = session.browser.lock().await.pages().await.unwrap().len();

        let err = session.open_tab("not a url").await.err().unwrap();
        assert!(matches!(err, SessionError::Navigation { .. }));

        let open_after = session.browser.lock().await.pages().await.unwrap().len();
        assert_eq!(open_after, open_before);
        session.shutdown().await.unwrap();
    }
}
