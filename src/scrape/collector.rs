// src/scrape/collector.rs
use crate::browser::{BrowserOptions, Page, PageFetcher};
use crate::config::Config;
use crate::errors::FetchError;
use crate::models::{DiscoveredReference, ResolvedJob};
use crate::session::{JobTicket, Session};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const RESULTS_FEED_SELECTOR: &str = r#"div[role="feed"]"#;
const LISTING_ANCHOR_SELECTOR: &str = "a.hfpxzc";
const SCROLL_STEP_PIXELS: i64 = 3000;
const SCROLL_SETTLE: Duration = Duration::from_millis(300);
// Only the tail of the feed can contain anchors a scroll step revealed.
const ANCHORS_PER_SCROLL: usize = 30;

/// Walks the query space (categories × locations), incrementally revealing
/// map search results and appending deduplicated references to the session.
pub struct LinkCollector {
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<Config>,
}

impl LinkCollector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: Arc<Config>) -> Self {
        Self { fetcher, config }
    }

    /// Run the whole stage on one browser handle. Per-query failures are
    /// swallowed (zero references contributed); only failing to obtain the
    /// handle fails the stage.
    pub async fn collect(
        &self,
        session: &Session,
        ticket: &JobTicket,
        job: &ResolvedJob,
    ) -> Result<usize, FetchError> {
        let options = BrowserOptions::new(
            job.headless,
            job.proxy.clone(),
            self.config.browser.pick_user_agent(),
        );
        let page = self.fetcher.open(&options).await?;
        let collected = self.collect_with_page(page.as_ref(), session, ticket, job).await;
        page.close().await;
        Ok(collected)
    }

    async fn collect_with_page(
        &self,
        page: &dyn Page,
        session: &Session,
        ticket: &JobTicket,
        job: &ResolvedJob,
    ) -> usize {
        let queries = build_queries(&job.search_phrase, &job.categories, &job.locations);
        let total = queries.len();
        let feed_wait = Duration::from_secs(self.config.scraping.feed_wait_secs);
        let mut collected = 0;

        info!(queries = total, "🕷️ Collecting listing links");

        for (index, (query, location_code)) in queries.iter().enumerate() {
            if ticket.cancel.is_cancelled() {
                info!("Link collection cancelled");
                break;
            }

            match self
                .run_query(page, session, ticket, job, query, location_code, feed_wait)
                .await
            {
                Ok(count) => collected = count,
                Err(e) => {
                    warn!(query = query.as_str(), error = %e, "Query failed, skipping");
                }
            }

            session.publish_link_progress(
                ticket.epoch,
                format!("Query {}/{}: found {} links", index + 1, total, collected),
                (index + 1) as f64 / total as f64,
            );
        }

        collected
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_query(
        &self,
        page: &dyn Page,
        session: &Session,
        ticket: &JobTicket,
        job: &ResolvedJob,
        query: &str,
        location_code: &str,
        feed_wait: Duration,
    ) -> Result<usize, FetchError> {
        page.goto(&search_url(query)).await?;
        page.wait_for(RESULTS_FEED_SELECTOR, feed_wait).await?;

        let mut count = 0;
        for _ in 0..job.max_scrolls {
            if ticket.cancel.is_cancelled() {
                break;
            }

            page.scroll_by(Some(RESULTS_FEED_SELECTOR), SCROLL_STEP_PIXELS)
                .await?;
            tokio::time::sleep(SCROLL_SETTLE).await;

            let html = page.html().await?;
            for href in extract_listing_hrefs(&html) {
                let reference = DiscoveredReference {
                    url: href,
                    query: query.to_string(),
                    location_code: location_code.to_string(),
                };
                if session.add_reference(ticket.epoch, reference) {
                    debug!(query, "New listing reference");
                }
            }
            count = session.snapshot().links_found;
        }

        Ok(count)
    }
}

/// The query space: Cartesian product of categories × locations in document
/// order, each combined with the general phrase.
pub fn build_queries(
    phrase: &str,
    categories: &[String],
    locations: &[String],
) -> Vec<(String, String)> {
    let mut queries = Vec::with_capacity(categories.len() * locations.len());
    for category in categories {
        for location in locations {
            let query = format!("{phrase} {category} {location}").trim().to_string();
            queries.push((query, location.clone()));
        }
    }
    queries
}

fn search_url(query: &str) -> String {
    let base = Url::parse("https://www.google.com/maps/search/").unwrap();
    match base.join(query) {
        Ok(url) => url.to_string(),
        Err(_) => format!("https://www.google.com/maps/search/{query}"),
    }
}

/// Listing anchors from the tail of the results feed.
fn extract_listing_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(LISTING_ANCHOR_SELECTOR).unwrap();

    let anchors: Vec<String> = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("/maps/place/"))
        .map(String::from)
        .collect();

    let start = anchors.len().saturating_sub(ANCHORS_PER_SCROLL);
    anchors[start..].to_vec()
}
