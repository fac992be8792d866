//! Data models for collected articles and run results.
//!
//! - [`ArticleRecord`]: one line of the output log
//! - [`SweepSummary`] / [`SweepOutcome`]: what a run did and why it stopped

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One article, as written to the output log.
///
/// Records are created once per unprocessed href and never rewritten. Field
/// order in the serialized object is `title, href, category, content, time`;
/// `category` only appears for article-page extraction.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Headline as displayed on the page.
    pub title: String,
    /// Absolute article URL. Doubles as the dedup key.
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Body snippet (listing mode) or paragraphs joined by newlines (article-page mode).
    pub content: String,
    /// Time text exactly as scraped.
    pub time: String,
}

/// An extracted record together with its parsed timestamp.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub record: ArticleRecord,
    pub published: NaiveDateTime,
}

/// Why a sweep stopped.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SweepOutcome {
    /// An article at or before the cutoff was found.
    CutoffReached { href: String, published: NaiveDateTime },
    /// No pagination control on the page.
    #[default]
    PaginationExhausted,
    /// The control was clicked but no new links appeared in time.
    ContentStalled,
    /// The control was found but clicking it failed.
    PagerFailed(String),
}

impl fmt::Display for SweepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepOutcome::CutoffReached { href, published } => {
                write!(f, "cutoff reached at {published} ({href})")
            }
            SweepOutcome::PaginationExhausted => write!(f, "no more pages"),
            SweepOutcome::ContentStalled => write!(f, "no new content after paging"),
            SweepOutcome::PagerFailed(e) => write!(f, "pager failed: {e}"),
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepSummary {
    /// Listing pages swept, including the first.
    pub pages: usize,
    /// Records appended to the log.
    pub emitted: usize,
    /// Articles dropped because of missing fields, bad time text or session errors.
    pub skipped: usize,
    pub outcome: SweepOutcome,
}
