//! Run configuration.
//!
//! Everything the sweep needs is carried in one [`ScraperConfig`] value that
//! is built at startup and passed down. It comes from three layers, each
//! overriding the previous:
//!
//! 1. a built-in [`Profile`] (selectors, formats and paths for one site)
//! 2. an optional YAML file; omitted keys keep the profile's values
//! 3. command-line flags
//!
//! # YAML example
//!
//! ```yaml
//! profile: sakshi
//! cutoff: "December 31, 2023"
//! output_path: out/article.json
//! page_timeout_ms: 45000
//! selectors:
//!   pager: "a.next-page"
//! ```

use crate::browser::chromium::ChromiumOptions;
use crate::cli::Cli;
use crate::cutoff::{CutoffError, CutoffPolicy};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

/// Built-in site layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Listing cards carry title, snippet and time inline.
    #[default]
    Sakshi,
    /// Each listing link is opened in its own tab for the full article.
    Oneindia,
}

/// Where article fields come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Read fields from descendants of the link element.
    Listing,
    /// Open the href in a new tab and read the article page.
    ArticlePage,
}

/// CSS selectors for the listing page and, in article-page mode, the article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub links: String,
    /// Relative to a link element.
    pub title: String,
    /// Relative to a link element.
    pub content: String,
    /// Relative to a link element.
    pub time: String,
    pub pager: String,
    pub article_title: String,
    pub article_time: String,
    pub article_paragraphs: String,
    /// Element whose `content` attribute holds the category.
    pub article_category: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            links: "ul#news-view li a".to_string(),
            title: "h2".to_string(),
            content: "div:first-of-type > div:first-of-type".to_string(),
            time: "time".to_string(),
            pager: "a.oi-city-next button.btn".to_string(),
            article_title: "h1".to_string(),
            article_time: "time".to_string(),
            article_paragraphs: "p".to_string(),
            article_category: r#"meta[property="article:section"]"#.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub profile: Profile,
    pub start_url: String,
    /// Cutoff as text, parsed with `cutoff_format`.
    pub cutoff: String,
    pub cutoff_format: String,
    /// `chrono` formats tried in order on article time text.
    pub time_formats: Vec<String>,
    pub mode: ExtractionMode,
    pub selectors: Selectors,
    pub output_path: PathBuf,
    pub dedup_path: PathBuf,
    /// Budget for the first page load and its link elements.
    pub page_timeout_ms: u64,
    /// Budget for new links to appear after clicking the pager.
    pub settle_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Run article bodies through [`crate::filter::clean_text`].
    pub clean_content: bool,
    pub browser: ChromiumOptions,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

impl ScraperConfig {
    pub fn for_profile(profile: Profile) -> Self {
        let base = Self {
            profile,
            start_url: "https://www.sakshi.com/news/family".to_string(),
            cutoff: "December 31, 2023".to_string(),
            cutoff_format: "%B %d, %Y".to_string(),
            time_formats: vec!["%a, %b %d %Y %I:%M %p".to_string()],
            mode: ExtractionMode::Listing,
            selectors: Selectors::default(),
            output_path: PathBuf::from("tt/article.json"),
            dedup_path: PathBuf::from("tt/processed_links_sakshi.json"),
            page_timeout_ms: 30_000,
            settle_timeout_ms: 10_000,
            poll_interval_ms: 500,
            clean_content: false,
            browser: ChromiumOptions::default(),
        };
        match profile {
            Profile::Sakshi => base,
            Profile::Oneindia => Self {
                start_url: "https://telugu.oneindia.com/news/india/".to_string(),
                time_formats: vec![
                    "%A, %B %d, %Y, %H:%M".to_string(),
                    "%B %d, %Y, %H:%M".to_string(),
                    "%B %d, %Y".to_string(),
                ],
                mode: ExtractionMode::ArticlePage,
                selectors: Selectors {
                    links: ".oi-article-title a".to_string(),
                    ..Selectors::default()
                },
                output_path: PathBuf::from("articles.json"),
                dedup_path: PathBuf::from("processed_links.json"),
                page_timeout_ms: 15_000,
                settle_timeout_ms: 3_000,
                ..base
            },
        }
    }

    pub fn cutoff_policy(&self) -> Result<CutoffPolicy, CutoffError> {
        CutoffPolicy::from_text(&self.cutoff, &self.cutoff_format, self.time_formats.clone())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Apply command-line overrides on top of this configuration.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(ref url) = cli.start_url {
            self.start_url = url.clone();
        }
        if let Some(ref cutoff) = cli.cutoff {
            self.cutoff = cutoff.clone();
        }
        if let Some(ref output) = cli.output {
            self.output_path = output.clone();
        }
        if let Some(ref store) = cli.dedup_store {
            self.dedup_path = store.clone();
        }
        if cli.clean_content {
            self.clean_content = true;
        }
        if let Some(ref remote) = cli.remote_url {
            self.browser.remote_url = Some(remote.clone());
        }
        if cli.headful {
            self.browser.headful = true;
        }
        self
    }
}

/// Layer a partial YAML document over the defaults of the profile it names.
fn merge_yaml(raw: &str, fallback: Profile) -> Result<ScraperConfig, Box<dyn Error>> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
    let profile = match value.get("profile") {
        Some(p) => serde_yaml::from_value::<Profile>(p.clone())?,
        None => fallback,
    };
    let mut merged = serde_yaml::to_value(ScraperConfig::for_profile(profile))?;
    overlay(&mut merged, value);
    Ok(serde_yaml::from_value(merged)?)
}

fn overlay(base: &mut serde_yaml::Value, patch: serde_yaml::Value) {
    match (base, patch) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Resolve the final configuration from CLI flags and an optional YAML file.
#[instrument(level = "info", skip_all)]
pub async fn load_config(cli: &Cli) -> Result<ScraperConfig, Box<dyn Error>> {
    let config = match cli.config.as_deref() {
        Some(path) => load_yaml(path, cli.profile).await?,
        None => ScraperConfig::for_profile(cli.profile),
    };
    let config = config.apply_cli(cli);
    info!(
        profile = ?config.profile,
        start_url = %config.start_url,
        cutoff = %config.cutoff,
        output = %config.output_path.display(),
        dedup_store = %config.dedup_path.display(),
        "Configuration resolved"
    );
    Ok(config)
}

async fn load_yaml(path: &Path, fallback: Profile) -> Result<ScraperConfig, Box<dyn Error>> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
    merge_yaml(&raw, fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_profiles_differ_where_sites_differ() {
        let sakshi = ScraperConfig::for_profile(Profile::Sakshi);
        let oneindia = ScraperConfig::for_profile(Profile::Oneindia);
        assert_eq!(sakshi.mode, ExtractionMode::Listing);
        assert_eq!(oneindia.mode, ExtractionMode::ArticlePage);
        assert_eq!(oneindia.selectors.links, ".oi-article-title a");
        assert_eq!(sakshi.selectors.pager, oneindia.selectors.pager);
        assert_eq!(sakshi.cutoff, oneindia.cutoff);
    }

    #[test]
    fn test_default_cutoff_parses() {
        let policy = ScraperConfig::default().cutoff_policy().unwrap();
        assert_eq!(policy.cutoff().to_string(), "2023-12-31 00:00:00");
    }

    #[test]
    fn test_yaml_overlay_keeps_profile_defaults() {
        let raw = r#"
profile: oneindia
cutoff: "June 1, 2024"
page_timeout_ms: 1234
selectors:
  pager: "a.next"
"#;
        let config = merge_yaml(raw, Profile::Sakshi).unwrap();
        assert_eq!(config.profile, Profile::Oneindia);
        assert_eq!(config.cutoff, "June 1, 2024");
        assert_eq!(config.page_timeout_ms, 1234);
        assert_eq!(config.selectors.pager, "a.next");
        assert_eq!(config.selectors.links, ".oi-article-title a");
        assert_eq!(config.mode, ExtractionMode::ArticlePage);
    }

    #[test]
    fn test_yaml_without_profile_uses_fallback() {
        let config = merge_yaml("clean_content: true\n", Profile::Sakshi).unwrap();
        assert_eq!(config.profile, Profile::Sakshi);
        assert!(config.clean_content);
        assert_eq!(config.selectors.links, "ul#news-view li a");
    }

    #[test]
    fn test_yaml_rejects_unknown_profile() {
        assert!(merge_yaml("profile: nowhere\n", Profile::Sakshi).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "listing_sweep",
            "--profile",
            "oneindia",
            "--cutoff",
            "January 1, 2024",
            "--output",
            "/tmp/out.json",
            "--clean-content",
            "--headful",
        ]);
        let config = ScraperConfig::for_profile(cli.profile).apply_cli(&cli);
        assert_eq!(config.cutoff, "January 1, 2024");
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.dedup_path, PathBuf::from("processed_links.json"));
        assert!(config.clean_content);
        assert!(config.browser.headful);
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.yaml");
        fs::write(&path, "start_url: https://example.com/list\n")
            .await
            .unwrap();
        let cli = Cli::parse_from([
            "listing_sweep",
            "--config",
            path.to_str().unwrap(),
            "--dedup-store",
            "/tmp/seen.json",
        ]);
        let config = load_config(&cli).await.unwrap();
        assert_eq!(config.start_url, "https://example.com/list");
        assert_eq!(config.dedup_path, PathBuf::from("/tmp/seen.json"));
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        let cli = Cli::parse_from(["listing_sweep", "--config", "/nonexistent/sweep.yaml"]);
        let err = load_config(&cli).await.unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }
}
