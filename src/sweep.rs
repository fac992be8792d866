//! The pagination sweep.
//!
//! One linear loop over one browser tab:
//!
//! 1. load the dedup store
//! 2. load the listing page and wait for link elements (fatal on timeout)
//! 3. for every link not yet processed: extract, check the cutoff, append
//! 4. persist the dedup store
//! 5. page forward, or stop when there is nothing more to load
//!
//! Per-article problems are logged and skipped. Only the initial page load,
//! a malformed dedup store and file I/O failures end the run with an error.

use crate::browser::{BrowserSession, ElementHandle, SessionError, wait_for_elements};
use crate::config::ScraperConfig;
use crate::cutoff::CutoffPolicy;
use crate::extract::{ExtractError, extract_article};
use crate::models::{SweepOutcome, SweepSummary};
use crate::pager::{PageTurn, turn_page};
use crate::store::{ArticleLog, DedupStore};
use crate::utils::{ensure_parent_dir, resolve_href, truncate_for_log};
use std::collections::HashSet;
use std::error::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Run a full sweep over `session` as described by `config`.
#[instrument(level = "info", skip_all, fields(start_url = %config.start_url))]
pub async fn run<S: BrowserSession>(
    session: &mut S,
    config: &ScraperConfig,
) -> Result<SweepSummary, Box<dyn Error>> {
    let policy = config.cutoff_policy()?;
    let configured_base = Url::parse(&config.start_url)?;
    info!(cutoff = %policy.cutoff(), "Cutoff policy ready");

    ensure_parent_dir(&config.dedup_path).await?;
    ensure_parent_dir(&config.output_path).await?;
    let mut store = DedupStore::load(&config.dedup_path).await?;
    let log = ArticleLog::new(&config.output_path);
    info!(known = store.len(), output = %log.path().display(), "Resuming from dedup store");

    info!("Opening listing page");
    match timeout(config.page_timeout(), session.navigate(&config.start_url)).await {
        Ok(result) => result?,
        Err(_) => {
            error!(timeout = ?config.page_timeout(), "Listing page did not load in time");
            return Err(Box::new(SessionError::Navigation {
                url: config.start_url.clone(),
                reason: format!("timed out after {:?}", config.page_timeout()),
            }));
        }
    }

    let mut links = wait_for_elements(
        &*session,
        &config.selectors.links,
        config.page_timeout(),
        config.poll_interval(),
    )
    .await
    .inspect_err(|e| error!(error = %e, "Listing links never appeared"))?;

    let mut failed = HashSet::new();
    let mut summary = SweepSummary::default();
    loop {
        summary.pages += 1;
        info!(page = summary.pages, links = links.len(), "Sweeping listing page");

        let base = landing_base(&*session, &configured_base).await;
        let mut sweep = PageSweep {
            config,
            policy: &policy,
            base: &base,
            log: &log,
            store: &mut store,
            failed: &mut failed,
            summary: &mut summary,
        };
        let emitted_before = sweep.summary.emitted;
        let before = match sweep.run(&*session, &links).await? {
            PageEnd::Swept(hrefs) => hrefs,
            PageEnd::Stop(outcome) => {
                store.persist().await?;
                info!(%outcome, emitted = summary.emitted, "Stopping extraction");
                summary.outcome = outcome;
                return Ok(summary);
            }
        };

        store.persist().await?;
        if summary.emitted == emitted_before {
            info!(page = summary.pages, "No new articles found on this page");
        }

        let turn = turn_page(
            &*session,
            &config.selectors.pager,
            &config.selectors.links,
            &before,
            config.settle_timeout(),
            config.poll_interval(),
        )
        .await;

        summary.outcome = match turn {
            Ok(PageTurn::Advanced(next)) => {
                links = next;
                continue;
            }
            Ok(PageTurn::Exhausted) => SweepOutcome::PaginationExhausted,
            Ok(PageTurn::Stalled) => {
                warn!(settle = ?config.settle_timeout(), "No new articles appeared after paging");
                SweepOutcome::ContentStalled
            }
            Err(e) => {
                warn!(error = %e, "Pagination control failed");
                SweepOutcome::PagerFailed(e.to_string())
            }
        };
        info!(outcome = %summary.outcome, pages = summary.pages, emitted = summary.emitted, "Sweep finished");
        return Ok(summary);
    }
}

/// Base URL for relative hrefs: where the tab actually is, if it reports an
/// http(s) location, else the configured start URL.
async fn landing_base<S: BrowserSession>(session: &S, configured: &Url) -> Url {
    match session.current_url().await {
        Ok(Some(current)) => match Url::parse(&current) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if url.as_str() != configured.as_str() {
                    debug!(landed = %url, "Resolving links against the landing URL");
                }
                url
            }
            _ => configured.clone(),
        },
        Ok(None) => configured.clone(),
        Err(e) => {
            warn!(error = %e, "Could not read the current URL; using start URL");
            configured.clone()
        }
    }
}

/// How a page sweep ended.
enum PageEnd {
    /// Every link was visited. Holds the raw hrefs in page order.
    Swept(Vec<Option<String>>),
    /// The cutoff was reached.
    Stop(SweepOutcome),
}

/// Mutable state shared by one pass over the links of a listing page.
struct PageSweep<'a> {
    config: &'a ScraperConfig,
    policy: &'a CutoffPolicy,
    base: &'a Url,
    log: &'a ArticleLog,
    store: &'a mut DedupStore,
    /// Hrefs that failed extraction during this run. Not persisted.
    failed: &'a mut HashSet<String>,
    summary: &'a mut SweepSummary,
}

impl PageSweep<'_> {
    async fn run<S: BrowserSession>(
        &mut self,
        session: &S,
        links: &[S::Element],
    ) -> Result<PageEnd, Box<dyn Error>> {
        let mut raw_hrefs = Vec::with_capacity(links.len());
        for link in links {
            let raw = match link.attribute("href").await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "Could not read link href; skipping");
                    self.summary.skipped += 1;
                    raw_hrefs.push(None);
                    continue;
                }
            };
            raw_hrefs.push(raw.clone());

            let Some(raw) = raw else {
                warn!("Link element has no href; skipping");
                self.summary.skipped += 1;
                continue;
            };
            let Some(href) = resolve_href(self.base, &raw) else {
                warn!(raw = %raw, "Unusable href; skipping link");
                self.summary.skipped += 1;
                continue;
            };

            if self.store.contains(&href) || self.failed.contains(&href) {
                continue;
            }

            let article = match extract_article(session, link, &href, self.config, self.policy).await {
                Ok(article) => article,
                Err(e) => {
                    match &e {
                        ExtractError::MissingElement { .. } => {
                            warn!(%href, error = %e, "Element missing; skipping article")
                        }
                        ExtractError::Parse(_) => {
                            warn!(%href, error = %e, "Time text not understood; skipping article")
                        }
                        ExtractError::Session(_) => {
                            error!(%href, error = %e, "Browser error while reading article; skipping")
                        }
                    }
                    self.failed.insert(href);
                    self.summary.skipped += 1;
                    continue;
                }
            };

            if self.policy.is_reached(article.published) {
                info!(%href, published = %article.published, "Reached cutoff date");
                return Ok(PageEnd::Stop(SweepOutcome::CutoffReached {
                    href,
                    published: article.published,
                }));
            }

            self.log.append(&article.record).await?;
            self.store.insert(href);
            self.summary.emitted += 1;
            info!(title = %truncate_for_log(&article.record.title, 80), "Processed");
            debug!(content = %truncate_for_log(&article.record.content, 120), "Article content");
        }
        Ok(PageEnd::Swept(raw_hrefs))
    }
}
