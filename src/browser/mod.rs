//! Browser capability used by the sweep loop.
//!
//! The loop never talks to a browser crate directly. It depends on two small
//! traits:
//!
//! - [`BrowserSession`]: one tab that can navigate, query the DOM and open
//!   further tabs
//! - [`ElementHandle`]: one element returned by a query
//!
//! Patterns are CSS selectors in every backend.
//!
//! # Backends
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | Chromium | [`chromium`] | CDP via `chromiumoxide`, launched or attached remotely |
//! | Snapshot | [`snapshot`] | Saved HTML served through `scraper`; no browser needed |

use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

pub mod chromium;
pub mod snapshot;

/// Failures reported by a browser backend.
#[derive(Debug)]
pub enum SessionError {
    /// Nothing matched `pattern` before the wait budget ran out.
    Timeout { pattern: String, waited: Duration },
    /// The pattern is not a valid selector.
    InvalidPattern(String),
    /// A page could not be loaded.
    Navigation { url: String, reason: String },
    /// The tab or window went away under us.
    WindowClosed,
    /// Anything else the backend reports.
    Backend(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Timeout { pattern, waited } => {
                write!(f, "no element matched `{pattern}` within {waited:?}")
            }
            SessionError::InvalidPattern(p) => write!(f, "invalid selector: {p}"),
            SessionError::Navigation { url, reason } => {
                write!(f, "failed to load {url}: {reason}")
            }
            SessionError::WindowClosed => write!(f, "browser window closed unexpectedly"),
            SessionError::Backend(msg) => write!(f, "browser backend error: {msg}"),
        }
    }
}

impl Error for SessionError {}

/// A single browser tab.
#[allow(async_fn_in_trait)]
pub trait BrowserSession: Sized {
    type Element: ElementHandle;

    /// Load `url` into this tab.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// URL the tab ended up on, after any redirects. `None` if unknown.
    async fn current_url(&self) -> Result<Option<String>, SessionError>;

    /// All elements matching `pattern`, in document order.
    async fn find_all(&self, pattern: &str) -> Result<Vec<Self::Element>, SessionError>;

    /// Open `url` in a new tab of the same browser.
    async fn open_tab(&self, url: &str) -> Result<Self, SessionError>;

    /// Close this tab.
    async fn close(self) -> Result<(), SessionError>;
}

/// An element inside a [`BrowserSession`].
#[allow(async_fn_in_trait)]
pub trait ElementHandle: Sized {
    /// First descendant matching `pattern`, if any.
    async fn find_child(&self, pattern: &str) -> Result<Option<Self>, SessionError>;

    /// Rendered text with whitespace trimmed.
    async fn text(&self) -> Result<String, SessionError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, SessionError>;

    async fn click(&self) -> Result<(), SessionError>;
}

/// Poll `session` until at least one element matches `pattern`.
///
/// Polls every `poll` until `timeout` elapses.
///
/// # Returns
///
/// The non-empty list of matching elements.
///
/// # Errors
///
/// - [`SessionError::Timeout`] if nothing matched in time
/// - Any query error from the backend, returned immediately
#[instrument(level = "debug", skip(session, pattern), fields(%pattern))]
pub async fn wait_for_elements<S: BrowserSession>(
    session: &S,
    pattern: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<Vec<S::Element>, SessionError> {
    let started = Instant::now();
    loop {
        let found = session.find_all(pattern).await?;
        if !found.is_empty() {
            debug!(count = found.len(), waited_ms = started.elapsed().as_millis() as u64, "Elements present");
            return Ok(found);
        }
        if started.elapsed() >= timeout {
            return Err(SessionError::Timeout {
                pattern: pattern.to_string(),
                waited: timeout,
            });
        }
        sleep(poll).await;
    }
}

/// Read the `href` of every element, in order. Missing attributes become `None`.
pub async fn hrefs_of<E: ElementHandle>(elements: &[E]) -> Result<Vec<Option<String>>, SessionError> {
    let mut hrefs = Vec::with_capacity(elements.len());
    for element in elements {
        hrefs.push(element.attribute("href").await?);
    }
    Ok(hrefs)
}

#[cfg(test)]
mod tests {
    use super::snapshot::SnapshotSession;
    use super::*;

    #[tokio::test]
    async fn test_wait_for_elements_returns_matches() {
        let session = SnapshotSession::new(vec![
            r#"<ul id="news-view"><li><a href="/a">A</a></li></ul>"#.to_string(),
        ]);
        let found = wait_for_elements(
            &session,
            "ul#news-view li a",
            Duration::from_millis(50),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_elements_times_out() {
        let session = SnapshotSession::new(vec!["<p>nothing here</p>".to_string()]);
        let err = wait_for_elements(
            &session,
            "ul#news-view li a",
            Duration::from_millis(30),
            Duration::from_millis(5),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, SessionError::Timeout { .. }));
        assert!(err.to_string().contains("ul#news-view li a"));
    }

    #[tokio::test]
    async fn test_hrefs_of_keeps_order_and_gaps() {
        let session = SnapshotSession::new(vec![
            r#"<a href="/one">1</a><a>2</a><a href="/three">3</a>"#.to_string(),
        ]);
        let links = session.find_all("a").await.unwrap();
        let hrefs = hrefs_of(&links).await.unwrap();
        assert_eq!(
            hrefs,
            vec![Some("/one".to_string()), None, Some("/three".to_string())]
        );
    }
}
