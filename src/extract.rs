//! Article field extraction for one link element.
//!
//! Two modes, picked by [`ExtractionMode`]:
//!
//! - **Listing**: title, snippet and time are descendants of the link itself.
//! - **Article page**: the href is opened in a new tab and title, time,
//!   paragraphs and category are read from the article. The tab is always
//!   closed before returning.
//!
//! Every failure here is per-article. The caller logs it, counts it and moves
//! on to the next link.

use crate::browser::{BrowserSession, ElementHandle, SessionError};
use crate::config::{ExtractionMode, ScraperConfig};
use crate::cutoff::{CutoffError, CutoffPolicy};
use crate::filter::clean_text;
use crate::models::{ArticleRecord, ExtractedArticle};
use std::error::Error;
use std::fmt;
use tracing::{debug, instrument, warn};

const UNKNOWN_CATEGORY: &str = "Unknown";

/// Why a single article was skipped.
#[derive(Debug)]
pub enum ExtractError {
    /// A required field's element was absent.
    MissingElement { field: &'static str },
    /// The time text did not match any configured format.
    Parse(CutoffError),
    /// The browser failed while reading this article.
    Session(SessionError),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::MissingElement { field } => write!(f, "missing element for {field}"),
            ExtractError::Parse(e) => write!(f, "unparseable time: {e}"),
            ExtractError::Session(e) => write!(f, "session error: {e}"),
        }
    }
}

impl Error for ExtractError {}

impl From<SessionError> for ExtractError {
    fn from(e: SessionError) -> Self {
        ExtractError::Session(e)
    }
}

impl From<CutoffError> for ExtractError {
    fn from(e: CutoffError) -> Self {
        ExtractError::Parse(e)
    }
}

/// Text of the first descendant of `element` matching `pattern`.
async fn child_text<E: ElementHandle>(
    element: &E,
    pattern: &str,
    field: &'static str,
) -> Result<String, ExtractError> {
    match element.find_child(pattern).await? {
        Some(child) => Ok(child.text().await?),
        None => Err(ExtractError::MissingElement { field }),
    }
}

/// Text of the first element on the page matching `pattern`.
async fn page_text<S: BrowserSession>(
    session: &S,
    pattern: &str,
    field: &'static str,
) -> Result<String, ExtractError> {
    match session.find_all(pattern).await?.first() {
        Some(element) => Ok(element.text().await?),
        None => Err(ExtractError::MissingElement { field }),
    }
}

/// Extract one article for `href`, already resolved and known to be unprocessed.
#[instrument(level = "debug", skip(session, link, config, policy))]
pub async fn extract_article<S: BrowserSession>(
    session: &S,
    link: &S::Element,
    href: &str,
    config: &ScraperConfig,
    policy: &CutoffPolicy,
) -> Result<ExtractedArticle, ExtractError> {
    let mut record = match config.mode {
        ExtractionMode::Listing => from_listing(link, href, config).await?,
        ExtractionMode::ArticlePage => from_article_page(session, href, config).await?,
    };
    let published = policy.parse_published(&record.time)?;
    if config.clean_content {
        record.content = clean_text(&record.content);
    }
    debug!(%published, title = %record.title, "Extracted article");
    Ok(ExtractedArticle { record, published })
}

async fn from_listing<E: ElementHandle>(
    link: &E,
    href: &str,
    config: &ScraperConfig,
) -> Result<ArticleRecord, ExtractError> {
    let selectors = &config.selectors;
    let title = child_text(link, &selectors.title, "title").await?;
    let content = child_text(link, &selectors.content, "content").await?;
    let time = child_text(link, &selectors.time, "time").await?;
    Ok(ArticleRecord {
        title,
        href: href.to_string(),
        category: None,
        content,
        time,
    })
}

async fn from_article_page<S: BrowserSession>(
    session: &S,
    href: &str,
    config: &ScraperConfig,
) -> Result<ArticleRecord, ExtractError> {
    let tab = session.open_tab(href).await?;
    let result = read_article_page(&tab, href, config).await;
    if let Err(e) = tab.close().await {
        warn!(%href, error = %e, "Failed to close article tab");
    }
    result
}

async fn read_article_page<S: BrowserSession>(
    tab: &S,
    href: &str,
    config: &ScraperConfig,
) -> Result<ArticleRecord, ExtractError> {
    let selectors = &config.selectors;
    let title = page_text(tab, &selectors.article_title, "title").await?;
    let time = page_text(tab, &selectors.article_time, "time").await?;

    let mut paragraphs = Vec::new();
    for paragraph in tab.find_all(&selectors.article_paragraphs).await? {
        let text = paragraph.text().await?.replace('\n', " ");
        if !text.trim().is_empty() {
            paragraphs.push(text);
        }
    }

    let category = match tab.find_all(&selectors.article_category).await?.first() {
        Some(meta) => meta.attribute("content").await?,
        None => None,
    }
    .filter(|c| !c.trim().is_empty())
    .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

    Ok(ArticleRecord {
        title,
        href: href.to_string(),
        category: Some(category),
        content: paragraphs.join("\n"),
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::snapshot::SnapshotSession;
    use crate::config::Profile;
    use std::collections::HashMap;

    fn listing_config() -> ScraperConfig {
        ScraperConfig::for_profile(Profile::Sakshi)
    }

    fn card(title: Option<&str>, time: Option<&str>) -> String {
        let title = title.map(|t| format!("<h2>{t}</h2>")).unwrap_or_default();
        let time = time.map(|t| format!("<time>{t}</time>")).unwrap_or_default();
        format!(
            r#"<ul id="news-view"><li><a href="/story">{title}<div><div>Snippet 🎉 text</div></div>{time}</a></li></ul>"#
        )
    }

    async fn extract_first(
        html: String,
        config: &ScraperConfig,
    ) -> Result<ExtractedArticle, ExtractError> {
        let session = SnapshotSession::new(vec![html]);
        let links = session.find_all(&config.selectors.links).await.unwrap();
        let policy = config.cutoff_policy().unwrap();
        extract_article(&session, &links[0], "https://example.com/story", config, &policy).await
    }

    #[tokio::test]
    async fn test_listing_extraction() {
        let config = listing_config();
        let article = extract_first(card(Some("Headline"), Some("Mon, Jan 15 2024 10:30 AM")), &config)
            .await
            .unwrap();
        assert_eq!(article.record.title, "Headline");
        assert_eq!(article.record.content, "Snippet 🎉 text");
        assert_eq!(article.record.time, "Mon, Jan 15 2024 10:30 AM");
        assert_eq!(article.record.category, None);
        assert_eq!(article.published.to_string(), "2024-01-15 10:30:00");
    }

    #[tokio::test]
    async fn test_missing_time_is_missing_element() {
        let err = extract_first(card(Some("Headline"), None), &listing_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingElement { field: "time" }));
    }

    #[tokio::test]
    async fn test_missing_title_is_missing_element() {
        let err = extract_first(card(None, Some("Mon, Jan 15 2024 10:30 AM")), &listing_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingElement { field: "title" }));
    }

    #[tokio::test]
    async fn test_malformed_time_is_parse_error() {
        let err = extract_first(card(Some("Headline"), Some("N/A")), &listing_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
        assert!(err.to_string().contains("N/A"));
    }

    #[tokio::test]
    async fn test_clean_content_applies_filter() {
        let mut config = listing_config();
        config.clean_content = true;
        let article = extract_first(card(Some("Headline"), Some("Mon, Jan 15 2024 10:30 AM")), &config)
            .await
            .unwrap();
        assert_eq!(article.record.content, "");
        assert_eq!(article.record.title, "Headline");
    }

    fn article_page(category: Option<&str>) -> String {
        let meta = category
            .map(|c| format!(r#"<meta property="article:section" content="{c}">"#))
            .unwrap_or_default();
        format!(
            r#"<html><head>{meta}</head><body>
            <h1>పూర్తి వార్త</h1>
            <time>Published: Tuesday, January 16, 2024, 10:15 [IST]</time>
            <p>మొదటి
            పేరా</p><p>   </p><p>రెండవ పేరా</p>
            </body></html>"#
        )
    }

    fn article_session(category: Option<&str>) -> SnapshotSession {
        let mut articles = HashMap::new();
        articles.insert(
            "https://telugu.oneindia.com/news/india/story".to_string(),
            article_page(category),
        );
        SnapshotSession::new(vec![
            r#"<div class="oi-article-title"><a href="/news/india/story">Listing title</a></div>"#
                .to_string(),
        ])
        .with_articles(articles)
    }

    async fn extract_from_article(session: &SnapshotSession, href: &str) -> Result<ExtractedArticle, ExtractError> {
        let config = ScraperConfig::for_profile(Profile::Oneindia);
        let policy = config.cutoff_policy().unwrap();
        let links = session.find_all(&config.selectors.links).await.unwrap();
        extract_article(session, &links[0], href, &config, &policy).await
    }

    #[tokio::test]
    async fn test_article_page_extraction() {
        let session = article_session(Some("India"));
        let article = extract_from_article(&session, "https://telugu.oneindia.com/news/india/story")
            .await
            .unwrap();
        assert_eq!(article.record.title, "పూర్తి వార్త");
        assert_eq!(article.record.category.as_deref(), Some("India"));
        assert_eq!(article.record.content, "మొదటి పేరా\nరెండవ పేరా");
        assert_eq!(article.published.to_string(), "2024-01-16 10:15:00");
    }

    #[tokio::test]
    async fn test_article_page_default_category() {
        let session = article_session(None);
        let article = extract_from_article(&session, "https://telugu.oneindia.com/news/india/story")
            .await
            .unwrap();
        assert_eq!(article.record.category.as_deref(), Some(UNKNOWN_CATEGORY));
    }

    #[tokio::test]
    async fn test_article_page_unreachable_is_session_error() {
        let session = article_session(Some("India"));
        let err = extract_from_article(&session, "https://telugu.oneindia.com/news/india/gone")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Session(SessionError::Navigation { .. })));
    }
}
