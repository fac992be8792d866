//! Offline backend that serves saved HTML through the browser traits.
//!
//! A snapshot session holds an ordered list of listing-page snapshots. Queries
//! run against the current snapshot; clicking any element advances to the
//! next one, which is how a "load more" control behaves from the loop's point
//! of view. Clicking on the last snapshot changes nothing.
//!
//! Article pages opened with [`BrowserSession::open_tab`] are looked up by
//! href in a separate map.

use super::{BrowserSession, ElementHandle, SessionError};
use scraper::{ElementRef, Html, Selector};
use std::cell::Cell;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::fs;
use tracing::{debug, info, instrument};

pub struct SnapshotSession {
    pages: Rc<Vec<String>>,
    cursor: Rc<Cell<usize>>,
    articles: Rc<HashMap<String, String>>,
    location: Option<String>,
}

impl SnapshotSession {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages: Rc::new(pages),
            cursor: Rc::new(Cell::new(0)),
            articles: Rc::new(HashMap::new()),
            location: None,
        }
    }

    /// Attach article pages, keyed by absolute href.
    pub fn with_articles(mut self, articles: HashMap<String, String>) -> Self {
        self.articles = Rc::new(articles);
        self
    }

    /// Read listing snapshots from disk, in the given order.
    #[instrument(level = "info", skip_all, fields(count = paths.len()))]
    pub async fn from_files(paths: &[PathBuf]) -> Result<Self, Box<dyn Error>> {
        let mut pages = Vec::with_capacity(paths.len());
        for path in paths {
            let html = fs::read_to_string(path).await?;
            debug!(path = %path.display(), bytes = html.len(), "Loaded snapshot");
            pages.push(html);
        }
        info!(pages = pages.len(), "Snapshot session ready");
        Ok(Self::new(pages))
    }

    /// Read article snapshots from disk and attach them by href.
    #[instrument(level = "info", skip_all, fields(count = pairs.len()))]
    pub async fn load_articles(self, pairs: &[(String, PathBuf)]) -> Result<Self, Box<dyn Error>> {
        let mut articles = HashMap::with_capacity(pairs.len());
        for (href, path) in pairs {
            let html = fs::read_to_string(path).await?;
            debug!(%href, path = %path.display(), "Loaded article snapshot");
            articles.insert(href.clone(), html);
        }
        Ok(self.with_articles(articles))
    }

    fn current(&self) -> &str {
        self.pages
            .get(self.cursor.get())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn parse_selector(pattern: &str) -> Result<Selector, SessionError> {
    Selector::parse(pattern).map_err(|e| SessionError::InvalidPattern(format!("{pattern}: {e}")))
}

impl BrowserSession for SnapshotSession {
    type Element = SnapshotElement;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if self.pages.is_empty() {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "no snapshots loaded".to_string(),
            });
        }
        debug!(%url, "Snapshot navigation rewinds to the first page");
        self.cursor.set(0);
        self.location = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>, SessionError> {
        Ok(self.location.clone())
    }

    async fn find_all(&self, pattern: &str) -> Result<Vec<SnapshotElement>, SessionError> {
        let selector = parse_selector(pattern)?;
        let document = Html::parse_document(self.current());
        Ok(document
            .select(&selector)
            .map(|element| SnapshotElement {
                html: element.html(),
                cursor: Rc::clone(&self.cursor),
                last_page: self.pages.len().saturating_sub(1),
            })
            .collect())
    }

    async fn open_tab(&self, url: &str) -> Result<Self, SessionError> {
        let html = self.articles.get(url).ok_or_else(|| SessionError::Navigation {
            url: url.to_string(),
            reason: "no snapshot for this href".to_string(),
        })?;
        Ok(Self {
            pages: Rc::new(vec![html.clone()]),
            cursor: Rc::new(Cell::new(0)),
            articles: Rc::clone(&self.articles),
            location: Some(url.to_string()),
        })
    }

    async fn close(self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// An element detached from its document, kept as outer HTML.
#[derive(Debug, Clone)]
pub struct SnapshotElement {
    html: String,
    cursor: Rc<Cell<usize>>,
    last_page: usize,
}

impl SnapshotElement {
    /// Re-parse the element and hand its root to `f`.
    fn with_root<T>(&self, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
        let fragment = Html::parse_fragment(&self.html);
        let root = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)?;
        Some(f(root))
    }
}

impl ElementHandle for SnapshotElement {
    async fn find_child(&self, pattern: &str) -> Result<Option<Self>, SessionError> {
        let selector = parse_selector(pattern)?;
        let found = self.with_root(|root| {
            root.select(&selector)
                .find(|el| el.id() != root.id())
                .map(|el| el.html())
        });
        Ok(found.flatten().map(|html| SnapshotElement {
            html,
            cursor: Rc::clone(&self.cursor),
            last_page: self.last_page,
        }))
    }

    async fn text(&self) -> Result<String, SessionError> {
        let text = self
            .with_root(|root| root.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .with_root(|root| root.value().attr(name).map(str::to_string))
            .flatten())
    }

    async fn click(&self) -> Result<(), SessionError> {
        let next = (self.cursor.get() + 1).min(self.last_page);
        self.cursor.set(next);
        Ok(())
    }
}
