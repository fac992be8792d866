//! Command-line interface definitions.
//!
//! Every flag is optional. Without flags the sweep runs the default profile
//! with its built-in URL, cutoff and file paths.

use crate::config::Profile;
use clap::Parser;
use std::path::PathBuf;

/// Paginate a news listing in a browser and log articles newer than a cutoff.
///
/// # Examples
///
/// ```sh
/// # Default profile, headless Chromium
/// listing_sweep
///
/// # Article-page profile with a different cutoff
/// listing_sweep --profile oneindia --cutoff "June 30, 2024"
///
/// # Attach to a running Chrome started with --remote-debugging-port=9222
/// listing_sweep --remote-url http://localhost:9222
///
/// # Replay saved listing pages without a browser
/// listing_sweep --snapshot page1.html --snapshot page2.html
///
/// # Replay in article-page mode, one saved page per article
/// listing_sweep -p oneindia --snapshot list.html \
///     --article-snapshot https://example.com/a=a.html
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML configuration file layered over the profile defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Built-in site profile
    #[arg(short, long, value_enum, default_value_t = Profile::Sakshi)]
    pub profile: Profile,

    /// Listing page to start from
    #[arg(long)]
    pub start_url: Option<String>,

    /// Stop at the first article published at or before this date
    #[arg(long)]
    pub cutoff: Option<String>,

    /// Output log (newline-delimited JSON, appended)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Processed-links store (JSON array, rewritten after each page)
    #[arg(short, long)]
    pub dedup_store: Option<PathBuf>,

    /// Strip URLs, hashtags, emoji and Latin words from article bodies
    #[arg(long)]
    pub clean_content: bool,

    /// Remote DevTools endpoint to attach to instead of launching Chromium
    #[arg(long, env = "CHROME_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Saved listing pages to replay instead of driving a browser
    #[arg(long)]
    pub snapshot: Vec<PathBuf>,

    /// Saved article page served when a tab opens HREF, given as HREF=PATH
    #[arg(long, value_parser = parse_article_snapshot)]
    pub article_snapshot: Vec<(String, PathBuf)>,
}

fn parse_article_snapshot(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.rsplit_once('=') {
        Some((href, path)) if !href.is_empty() && !path.is_empty() => {
            Ok((href.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected HREF=PATH, got `{raw}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["listing_sweep"]);
        assert_eq!(cli.profile, Profile::Sakshi);
        assert!(cli.config.is_none());
        assert!(cli.snapshot.is_empty());
        assert!(!cli.clean_content);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "listing_sweep",
            "-p",
            "oneindia",
            "-o",
            "/tmp/articles.json",
            "-d",
            "/tmp/seen.json",
        ]);
        assert_eq!(cli.profile, Profile::Oneindia);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/articles.json")));
        assert_eq!(cli.dedup_store, Some(PathBuf::from("/tmp/seen.json")));
    }

    #[test]
    fn test_cli_repeated_snapshots() {
        let cli = Cli::parse_from([
            "listing_sweep",
            "--snapshot",
            "one.html",
            "--snapshot",
            "two.html",
        ]);
        assert_eq!(
            cli.snapshot,
            vec![PathBuf::from("one.html"), PathBuf::from("two.html")]
        );
    }

    #[test]
    fn test_cli_article_snapshot_pairs() {
        let cli = Cli::parse_from([
            "listing_sweep",
            "--article-snapshot",
            "https://example.com/a?x=1=a.html",
        ]);
        assert_eq!(
            cli.article_snapshot,
            vec![("https://example.com/a?x=1".to_string(), PathBuf::from("a.html"))]
        );
        assert!(Cli::try_parse_from(["listing_sweep", "--article-snapshot", "no-separator"]).is_err());
    }
}
