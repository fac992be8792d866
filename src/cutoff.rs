//! Cutoff policy: when to stop collecting.
//!
//! Time text scraped from a page is normalized, parsed with the configured
//! `chrono` formats, and compared against a fixed cutoff. An article whose
//! timestamp is at or before the cutoff ends the run.
//!
//! A date-only cutoff such as `December 31, 2023` means midnight at the start
//! of that day, so an article published later on the 31st is still collected.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt;

static LEADING_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(published|updated|posted)\s*(on)?\s*:?\s*").unwrap());
static TRAILING_ZONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]\s*$").unwrap());

#[derive(Debug, PartialEq)]
pub enum CutoffError {
    /// No configured format matched the text.
    Unparseable { text: String, formats: Vec<String> },
}

impl fmt::Display for CutoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoffError::Unparseable { text, formats } => {
                write!(f, "time text {text:?} matches none of {formats:?}")
            }
        }
    }
}

impl Error for CutoffError {}

/// Strip page furniture around a timestamp and collapse whitespace.
pub fn normalize_time_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let without_label = LEADING_LABEL.replace(&collapsed, "");
    TRAILING_ZONE.replace(&without_label, "").trim().to_string()
}

/// Parse `text` with the first matching format, as a datetime or else as a date at midnight.
pub fn parse_with_formats(text: &str, formats: &[String]) -> Result<NaiveDateTime, CutoffError> {
    let normalized = normalize_time_text(text);
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(dt);
        }
        if let Some(dt) = NaiveDate::parse_from_str(&normalized, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(dt);
        }
    }
    Err(CutoffError::Unparseable {
        text: text.to_string(),
        formats: formats.to_vec(),
    })
}

#[derive(Debug, Clone)]
pub struct CutoffPolicy {
    cutoff: NaiveDateTime,
    formats: Vec<String>,
}

impl CutoffPolicy {
    /// `formats` are tried in order when parsing article time text.
    pub fn new(cutoff: NaiveDateTime, formats: Vec<String>) -> Self {
        Self { cutoff, formats }
    }

    /// Build from the configured cutoff text and its format.
    pub fn from_text(
        cutoff: &str,
        cutoff_format: &str,
        formats: Vec<String>,
    ) -> Result<Self, CutoffError> {
        let cutoff = parse_with_formats(cutoff, &[cutoff_format.to_string()])?;
        Ok(Self::new(cutoff, formats))
    }

    pub fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    pub fn parse_published(&self, text: &str) -> Result<NaiveDateTime, CutoffError> {
        parse_with_formats(text, &self.formats)
    }

    /// True once `published` is at or before the cutoff.
    pub fn is_reached(&self, published: NaiveDateTime) -> bool {
        published <= self.cutoff
    }
}
