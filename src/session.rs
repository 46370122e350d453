// src/session.rs
use crate::errors::StartJobError;
use crate::models::{BusinessRecord, DiscoveredReference};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle phase of a session's current (or most recent) job. Terminal
/// phases stay visible in status snapshots; a session with its active
/// marker clear is back at the idle point of the state machine and can
/// accept the next job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    CollectingLinks,
    ScrapingDetails,
    Complete,
    Failed,
}

/// Cooperative cancellation flag, checked at stage-defined points. Nothing
/// is interrupted mid-flight; worst-case latency is one in-flight fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Permission to run one job: the epoch stamps every status update so a
/// superseded job unwinding in the background cannot touch newer state.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub epoch: u64,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub session_id: String,
    pub phase: Phase,
    pub active: bool,
    pub cancelled: bool,
    pub status_message: String,
    pub links_found: usize,
    pub links_expected: usize,
    pub scraped_count: usize,
    pub total_to_scrape: usize,
    pub link_progress: f64,
    pub detail_progress: f64,
}

#[derive(Debug)]
struct SessionState {
    epoch: u64,
    active: bool,
    cancel: CancelToken,
    phase: Phase,
    status_message: String,
    links_found: usize,
    links_expected: usize,
    scraped_count: usize,
    total_to_scrape: usize,
    link_progress: f64,
    detail_progress: f64,
    references: Vec<DiscoveredReference>,
    results: Vec<BusinessRecord>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            epoch: 0,
            active: false,
            cancel: CancelToken::default(),
            phase: Phase::Idle,
            status_message: "Ready!".to_string(),
            links_found: 0,
            links_expected: 0,
            scraped_count: 0,
            total_to_scrape: 0,
            link_progress: 0.0,
            detail_progress: 0.0,
            references: Vec::new(),
            results: Vec::new(),
        }
    }
}

/// One scraping job's state. Created on first reference by an identifier,
/// reset in place per job, never destroyed. All mutation goes through the
/// session's own lock; the lock is only ever held for field access, never
/// across a fetch.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Accept a new job if none is active: bump the epoch, reset counters
    /// and collections, clear cancellation.
    pub fn try_begin(&self) -> Result<JobTicket, StartJobError> {
        let mut state = self.state.lock().unwrap();
        if state.active {
            return Err(StartJobError::JobAlreadyActive);
        }

        let epoch = state.epoch + 1;
        *state = SessionState {
            epoch,
            active: true,
            phase: Phase::CollectingLinks,
            status_message: "Collecting links...".to_string(),
            ..SessionState::default()
        };
        Ok(JobTicket {
            epoch,
            cancel: state.cancel.clone(),
        })
    }

    /// Set the cooperative cancellation flag and clear the active marker
    /// immediately, so a new job can be accepted while the old pipeline
    /// unwinds to its next check point.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        if state.phase == Phase::Idle && !state.active {
            return;
        }
        state.cancel.cancel();
        state.active = false;
        state.status_message = "Stopping...".to_string();
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock().unwrap();
        StatusSnapshot {
            session_id: self.id.clone(),
            phase: state.phase,
            active: state.active,
            cancelled: state.cancel.is_cancelled(),
            status_message: state.status_message.clone(),
            links_found: state.links_found,
            links_expected: state.links_expected,
            scraped_count: state.scraped_count,
            total_to_scrape: state.total_to_scrape,
            link_progress: state.link_progress,
            detail_progress: state.detail_progress,
        }
    }

    pub fn results(&self) -> Vec<BusinessRecord> {
        self.state.lock().unwrap().results.clone()
    }

    /// Append a discovered reference unless its exact triple is already
    /// present. Returns whether it was new.
    pub fn add_reference(&self, epoch: u64, reference: DiscoveredReference) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.epoch != epoch || state.references.contains(&reference) {
            return false;
        }
        state.references.push(reference);
        state.links_found = state.references.len();
        // The query space gives no a-priori bound, so the expected total
        // tracks the found count until the list is frozen.
        state.links_expected = state.links_found;
        true
    }

    pub fn publish_link_progress(&self, epoch: u64, message: String, progress: f64) {
        let mut state = self.state.lock().unwrap();
        if state.epoch != epoch {
            return;
        }
        state.status_message = message;
        state.link_progress = progress;
    }

    /// Freeze the discovered list and enter the detail stage. Returns the
    /// frozen references, or `None` if this job was superseded.
    pub fn freeze_references(&self, epoch: u64) -> Option<Vec<DiscoveredReference>> {
        let mut state = self.state.lock().unwrap();
        if state.epoch != epoch {
            return None;
        }
        state.phase = Phase::ScrapingDetails;
        state.total_to_scrape = state.references.len();
        state.scraped_count = 0;
        state.status_message = format!("Scraping {} businesses...", state.references.len());
        Some(state.references.clone())
    }

    /// Record one completed unit (success or degraded) and publish detail
    /// progress.
    pub fn push_record(&self, epoch: u64, record: BusinessRecord) {
        let mut state = self.state.lock().unwrap();
        if state.epoch != epoch {
            return;
        }
        state.results.push(record);
        state.scraped_count = state.results.len().min(state.total_to_scrape);
        if state.total_to_scrape > 0 {
            state.detail_progress = state.scraped_count as f64 / state.total_to_scrape as f64;
        }
        state.status_message = format!(
            "Scraped {}/{}",
            state.scraped_count, state.total_to_scrape
        );
    }

    /// Terminal transition: record the outcome, drop the active marker.
    pub fn finish(&self, epoch: u64, phase: Phase, message: String) {
        let mut state = self.state.lock().unwrap();
        if state.epoch != epoch {
            return;
        }
        state.phase = phase;
        state.active = false;
        state.status_message = message;
    }
}

/// Process-wide keyed session store with its own lock. Owns the global
/// active-job ceiling.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    max_active: usize,
}

impl SessionRegistry {
    pub fn new(max_active: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_active,
        }
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new(id)))
            .clone()
    }

    /// Ceiling check and job activation under the registry lock, so two
    /// concurrent starts cannot both squeeze under the limit.
    pub fn try_activate(
        &self,
        id: &str,
    ) -> Result<(Arc<Session>, JobTicket), StartJobError> {
        let mut sessions = self.sessions.lock().unwrap();
        let active = sessions.values().filter(|s| s.is_active()).count();

        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new(id)))
            .clone();

        if active >= self.max_active {
            return Err(StartJobError::ConcurrencyLimitExceeded {
                limit: self.max_active,
            });
        }

        let ticket = session.try_begin()?;
        Ok((session, ticket))
    }
}
