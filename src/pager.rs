//! Pagination control handling.
//!
//! After a page sweep the loop asks the pager to reveal more articles. The
//! pager clicks the "load more" control and then polls until the set of link
//! hrefs on the page differs from what was there before the click.

use crate::browser::{BrowserSession, ElementHandle, SessionError, hrefs_of};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

/// Result of one attempt to page forward.
pub enum PageTurn<E> {
    /// New content appeared; these are the link elements now on the page.
    Advanced(Vec<E>),
    /// No pagination control on the page.
    Exhausted,
    /// The control was clicked but the links did not change in time.
    Stalled,
}

/// Click the pagination control and wait for the listing to change.
///
/// `before` is the href list of the links swept so far. A click failure is
/// returned as an error; the caller decides whether that ends the run.
///
/// # Arguments
///
/// * `pager_pattern` - Selector for the "load more" control; the first match is clicked
/// * `links_pattern` - Selector for article links, re-queried while waiting
/// * `before` - Raw hrefs in page order as they were before the click
/// * `settle` - How long to wait for the listing to change
/// * `poll` - Delay between re-queries
///
/// # Returns
///
/// [`PageTurn::Advanced`] with the new link elements, [`PageTurn::Exhausted`]
/// when there is no control, or [`PageTurn::Stalled`] when nothing changed.
///
/// # Errors
///
/// Returns the [`SessionError`] from a failed query or click.
#[instrument(level = "info", skip(session, before), fields(known_links = before.len()))]
pub async fn turn_page<S: BrowserSession>(
    session: &S,
    pager_pattern: &str,
    links_pattern: &str,
    before: &[Option<String>],
    settle: Duration,
    poll: Duration,
) -> Result<PageTurn<S::Element>, SessionError> {
    let Some(control) = session.find_all(pager_pattern).await?.into_iter().next() else {
        info!("No pagination control found");
        return Ok(PageTurn::Exhausted);
    };

    control.click().await?;
    info!("Pagination control clicked; waiting for more articles");

    let started = Instant::now();
    loop {
        let links = session.find_all(links_pattern).await?;
        let now = hrefs_of(&links).await?;
        if !links.is_empty() && now.as_slice() != before {
            debug!(
                count = links.len(),
                waited_ms = started.elapsed().as_millis() as u64,
                "Listing changed"
            );
            return Ok(PageTurn::Advanced(links));
        }
        if started.elapsed() >= settle {
            return Ok(PageTurn::Stalled);
        }
        sleep(poll).await;
    }
}
