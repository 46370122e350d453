// src/scrape/pool.rs
use crate::models::{BusinessRecord, DiscoveredReference};
use crate::session::{JobTicket, Session};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::info;

/// Fan the frozen reference list out to `scrape`, at most `width` units in
/// flight. Completions are consumed in arrival order so progress moves as
/// soon as each unit finishes; the result set itself is unordered.
///
/// Cancellation is cooperative: workers that have not started yet return
/// without fetching once the token is set, and the driver stops consuming
/// at its next check point while already-dispatched units run to their
/// natural end as detached tasks.
pub async fn run_detail_pool<F, Fut>(
    session: Arc<Session>,
    ticket: &JobTicket,
    references: Vec<DiscoveredReference>,
    width: usize,
    scrape: F,
) where
    F: Fn(DiscoveredReference) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BusinessRecord> + Send + 'static,
{
    let total = references.len();
    info!(total, width, "Scraping business details");

    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let scrape = Arc::new(scrape);
    let (tx, mut rx) = mpsc::unbounded_channel();

    for reference in references {
        let semaphore = semaphore.clone();
        let scrape = scrape.clone();
        let cancel = ticket.cancel.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if cancel.is_cancelled() {
                return;
            }
            let record = (*scrape)(reference).await;
            let _ = tx.send(record);
        });
    }
    drop(tx);

    let mut completed = 0usize;
    while let Some(record) = rx.recv().await {
        completed += 1;
        session.push_record(ticket.epoch, record);
        if ticket.cancel.is_cancelled() {
            info!(completed, total, "Detail scraping cancelled");
            break;
        }
    }

    info!(completed, total, "🏁 Detail scraping finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordStatus;
    use crate::session::SessionRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn references(count: usize) -> Vec<DiscoveredReference> {
        (0..count)
            .map(|i| DiscoveredReference {
                url: format!("https://maps/place/{i}"),
                query: "q".to_string(),
                location_code: "z".to_string(),
            })
            .collect()
    }

    fn activated_session(refs: &[DiscoveredReference]) -> (Arc<Session>, JobTicket) {
        let registry = SessionRegistry::new(4);
        let (session, ticket) = registry.try_activate("pool-test").unwrap();
        for reference in refs {
            session.add_reference(ticket.epoch, reference.clone());
        }
        session.freeze_references(ticket.epoch).unwrap();
        (session, ticket)
    }

    #[tokio::test]
    async fn pool_never_exceeds_its_width() {
        let refs = references(8);
        let (session, ticket) = activated_session(&refs);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));
        let in_flight_clone = in_flight.clone();
        let high_water_clone = high_water.clone();

        run_detail_pool(session.clone(), &ticket, refs, 2, move |reference| {
            let in_flight = in_flight_clone.clone();
            let high_water = high_water_clone.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                BusinessRecord::failed(&reference, "stub")
            }
        })
        .await;

        assert!(high_water.load(Ordering::SeqCst) <= 2);
        assert_eq!(session.results().len(), 8);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.scraped_count, 8);
        assert!((snapshot.detail_progress - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failed_units_still_produce_records() {
        let refs = references(3);
        let (session, ticket) = activated_session(&refs);

        run_detail_pool(session.clone(), &ticket, refs, 10, move |reference| async move {
            BusinessRecord::failed(&reference, "navigation timed out")
        })
        .await;

        let results = session.results();
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| matches!(r.status, RecordStatus::Error(_))));
    }

    #[tokio::test]
    async fn cancellation_stops_new_submissions_but_keeps_finished_records() {
        let refs = references(5);
        let (session, ticket) = activated_session(&refs);
        let cancel = ticket.cancel.clone();

        // Width 1 serializes the workers; the first unit cancels the job,
        // so every later worker skips without fetching.
        run_detail_pool(session.clone(), &ticket, refs, 1, move |reference| {
            let cancel = cancel.clone();
            async move {
                cancel.cancel();
                BusinessRecord::failed(&reference, "stub")
            }
        })
        .await;

        assert_eq!(session.results().len(), 1);
        let snapshot = session.snapshot();
        assert!(snapshot.scraped_count <= snapshot.total_to_scrape);
    }
}
