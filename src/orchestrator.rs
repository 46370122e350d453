// src/orchestrator.rs
use crate::address::{AddressParser, UsAddressParser};
use crate::browser::PageFetcher;
use crate::config::Config;
use crate::contacts::{ContactResolver, SignalExtractor};
use crate::errors::{FetchError, StartJobError};
use crate::models::{BusinessRecord, JobConfig, ResolvedJob};
use crate::scrape::pool::run_detail_pool;
use crate::scrape::{DetailScraper, FacebookScraper, LinkCollector, WebsiteScraper};
use crate::session::{JobTicket, Phase, Session, SessionRegistry, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Owns job lifecycles: accepts or rejects `start_job`, runs the pipeline
/// on a dedicated background task, and serves status/cancel/results without
/// ever blocking a caller behind a fetch.
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    collector: Arc<LinkCollector>,
    detail: Arc<DetailScraper>,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        fetcher: Arc<dyn PageFetcher>,
        config: Arc<Config>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        let extractor = Arc::new(SignalExtractor::new(config.email_filter.clone()));
        let resolver = ContactResolver::new(config.email_filter.generic_domains.clone());
        let website = WebsiteScraper::new(http, extractor.clone());
        let facebook = FacebookScraper::new(extractor.clone());
        let address_parser: Arc<dyn AddressParser> = Arc::new(UsAddressParser::new());

        let detail = Arc::new(DetailScraper::new(
            fetcher.clone(),
            website,
            facebook,
            extractor,
            resolver,
            address_parser,
            config.browser.clone(),
        ));
        let collector = Arc::new(LinkCollector::new(fetcher, config.clone()));

        Self {
            registry,
            collector,
            detail,
            config,
        }
    }

    /// Accept a new job for `session_id` and return immediately; the
    /// pipeline runs on its own task. Rejections are synchronous.
    pub fn start_job(&self, session_id: &str, job: JobConfig) -> Result<(), StartJobError> {
        let resolved = Arc::new(job.resolve(&self.config.scraping));
        let (session, ticket) = self.registry.try_activate(session_id)?;
        info!(
            session = session_id,
            categories = resolved.categories.len(),
            locations = resolved.locations.len(),
            "🚀 Job accepted"
        );

        let collector = self.collector.clone();
        let detail = self.detail.clone();
        tokio::spawn(async move {
            // The inner task catches both Err returns and panics, so any
            // unhandled fault degrades to a Failed status instead of a
            // stuck session.
            let pipeline = tokio::spawn(run_pipeline(
                collector,
                detail,
                session.clone(),
                ticket.clone(),
                resolved,
            ));
            let (phase, message) = match pipeline.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(session = session.id.as_str(), error = %e, "Job failed");
                    (Phase::Failed, format!("Error: {e}. Ready for next job."))
                }
                Err(e) => {
                    warn!(session = session.id.as_str(), error = %e, "Job task died");
                    (Phase::Failed, format!("Error: {e}. Ready for next job."))
                }
            };
            session.finish(ticket.epoch, phase, message);
        });

        Ok(())
    }

    pub fn cancel(&self, session_id: &str) {
        info!(session = session_id, "Cancellation requested");
        self.registry.get_or_create(session_id).cancel();
    }

    pub fn status(&self, session_id: &str) -> StatusSnapshot {
        self.registry.get_or_create(session_id).snapshot()
    }

    pub fn results(&self, session_id: &str) -> Vec<BusinessRecord> {
        self.registry.get_or_create(session_id).results()
    }
}

async fn run_pipeline(
    collector: Arc<LinkCollector>,
    detail: Arc<DetailScraper>,
    session: Arc<Session>,
    ticket: JobTicket,
    job: Arc<ResolvedJob>,
) -> Result<(Phase, String), FetchError> {
    let collected = collector.collect(session.as_ref(), &ticket, &job).await?;

    if ticket.cancel.is_cancelled() {
        return Ok((Phase::Idle, "Stopped. Ready for next job.".to_string()));
    }
    if collected == 0 {
        return Ok((Phase::Idle, "Ready for next job.".to_string()));
    }
    let references = match session.freeze_references(ticket.epoch) {
        Some(references) => references,
        None => return Ok((Phase::Idle, "Ready for next job.".to_string())),
    };

    let width = job.max_workers;
    let scraper = detail.clone();
    let job_for_units = job.clone();
    run_detail_pool(session.clone(), &ticket, references, width, move |reference| {
        let scraper = scraper.clone();
        let job = job_for_units.clone();
        async move { scraper.scrape(&reference, &job).await }
    })
    .await;

    if ticket.cancel.is_cancelled() {
        return Ok((Phase::Complete, "Stopped. Ready for next job.".to_string()));
    }
    Ok((Phase::Complete, "Complete! Ready for next job.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserOptions, Page};
    use crate::models::RecordStatus;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SEARCH_PAGE: &str = r#"
        <div role="feed">
          <a class="hfpxzc" href="https://www.google.com/maps/place/Joe"></a>
          <a class="hfpxzc" href="https://www.google.com/maps/place/Ann"></a>
        </div>"#;

    fn detail_page(name: &str) -> String {
        format!(
            r#"<html><body>
                 <h1 class="DUwDvf">{name}</h1>
                 <button data-item-id="address">1 Main St, Springfield, IL 62704, USA</button>
                 <button data-item-id="phone:tel">+1 (555) 123-4567</button>
               </body></html>"#
        )
    }

    struct MockPage {
        current: Mutex<String>,
        pages: Arc<HashMap<String, String>>,
    }

    #[async_trait]
    impl Page for MockPage {
        async fn goto(&self, url: &str) -> Result<(), FetchError> {
            *self.current.lock().unwrap() = url.to_string();
            Ok(())
        }

        async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<(), FetchError> {
            Ok(())
        }

        async fn html(&self) -> Result<String, FetchError> {
            let current = self.current.lock().unwrap().clone();
            Ok(self.pages.get(&current).cloned().unwrap_or_default())
        }

        async fn scroll_by(&self, _selector: Option<&str>, _pixels: i64) -> Result<(), FetchError> {
            Ok(())
        }

        async fn click_each(&self, _selector: &str, _limit: usize) -> Result<usize, FetchError> {
            Ok(0)
        }

        async fn links(&self) -> Result<Vec<(String, String)>, FetchError> {
            Ok(Vec::new())
        }

        async fn close(self: Box<Self>) {}
    }

    struct MockFetcher {
        pages: Arc<HashMap<String, String>>,
    }

    #[async_trait]
    impl crate::browser::PageFetcher for MockFetcher {
        async fn open(&self, _options: &BrowserOptions) -> Result<Box<dyn Page>, FetchError> {
            Ok(Box::new(MockPage {
                current: Mutex::new(String::new()),
                pages: self.pages.clone(),
            }))
        }
    }

    fn orchestrator() -> Orchestrator {
        let mut pages = HashMap::new();
        pages.insert(
            "https://www.google.com/maps/search/plumber%2010001".to_string(),
            SEARCH_PAGE.to_string(),
        );
        pages.insert(
            "https://www.google.com/maps/place/Joe".to_string(),
            detail_page("Joe's Plumbing"),
        );
        pages.insert(
            "https://www.google.com/maps/place/Ann".to_string(),
            detail_page("Ann's Plumbing"),
        );

        let config = Arc::new(Config::default());
        Orchestrator::new(
            Arc::new(SessionRegistry::new(config.scraping.max_concurrent_sessions)),
            Arc::new(MockFetcher {
                pages: Arc::new(pages),
            }),
            config,
        )
    }

    fn job() -> JobConfig {
        JobConfig {
            search_phrase: String::new(),
            categories: vec!["plumber".to_string()],
            locations: vec!["10001".to_string()],
            max_scrolls: Some(1),
            ..Default::default()
        }
    }

    async fn wait_until_idle(orchestrator: &Orchestrator, session_id: &str) {
        for _ in 0..200 {
            if !orchestrator.status(session_id).active {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job never finished");
    }

    #[tokio::test(start_paused = true)]
    async fn full_pipeline_produces_one_record_per_discovered_reference() {
        let orchestrator = orchestrator();
        orchestrator.start_job("s1", job()).unwrap();
        wait_until_idle(&orchestrator, "s1").await;

        let snapshot = orchestrator.status("s1");
        assert_eq!(snapshot.phase, Phase::Complete);
        assert_eq!(snapshot.links_found, 2);
        assert_eq!(snapshot.scraped_count, 2);
        assert!(snapshot.scraped_count <= snapshot.total_to_scrape);

        let mut names: Vec<String> = orchestrator
            .results("s1")
            .into_iter()
            .map(|record| {
                assert_eq!(record.status, RecordStatus::Scraped);
                assert_eq!(record.city, "Springfield");
                assert_eq!(record.state, "IL");
                record.name
            })
            .collect();
        names.sort();
        assert_eq!(names, vec!["Ann's Plumbing", "Joe's Plumbing"]);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_is_rejected_while_the_first_job_runs() {
        let orchestrator = orchestrator();
        orchestrator.start_job("s1", job()).unwrap();

        let err = orchestrator.start_job("s1", job()).unwrap_err();
        assert_eq!(err, StartJobError::JobAlreadyActive);

        wait_until_idle(&orchestrator, "s1").await;
        // The session is reusable once the first job is done.
        orchestrator.start_job("s1", job()).unwrap();
        wait_until_idle(&orchestrator, "s1").await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_job_still_reaches_an_inactive_state() {
        let orchestrator = orchestrator();
        orchestrator.start_job("s1", job()).unwrap();
        orchestrator.cancel("s1");
        wait_until_idle(&orchestrator, "s1").await;

        let snapshot = orchestrator.status("s1");
        assert!(!snapshot.active);
        assert!(snapshot.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn a_job_with_no_discovered_links_returns_to_idle() {
        let config = Arc::new(Config::default());
        let orchestrator = Orchestrator::new(
            Arc::new(SessionRegistry::new(4)),
            Arc::new(MockFetcher {
                pages: Arc::new(HashMap::new()),
            }),
            config,
        );
        orchestrator.start_job("s1", job()).unwrap();
        wait_until_idle(&orchestrator, "s1").await;

        let snapshot = orchestrator.status("s1");
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.links_found, 0);
        assert!(orchestrator.results("s1").is_empty());
    }
}
