// src/models.rs
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One business candidate discovered during link collection. Deduplicated
/// by exact triple equality within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredReference {
    pub url: String,
    pub query: String,
    pub location_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SocialPlatform {
    Facebook,
    Instagram,
    Twitter,
    LinkedIn,
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocialPlatform::Facebook => "Facebook",
            SocialPlatform::Instagram => "Instagram",
            SocialPlatform::Twitter => "Twitter",
            SocialPlatform::LinkedIn => "LinkedIn",
        };
        write!(f, "{name}")
    }
}

/// Candidate contact signals gathered from one source (maps page, website,
/// facebook page). Ordered collections keep resolution deterministic no
/// matter what order the pages were walked in.
#[derive(Debug, Clone, Default)]
pub struct RawSignalSet {
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
    pub socials: BTreeMap<SocialPlatform, String>,
}

impl RawSignalSet {
    /// Fold another signal set into this one. Emails and phones union;
    /// an already-resolved social platform is never overridden.
    pub fn merge(&mut self, other: RawSignalSet) {
        self.emails.extend(other.emails);
        self.phones.extend(other.phones);
        for (platform, url) in other.socials {
            self.socials.entry(platform).or_insert(url);
        }
    }

    pub fn social(&self, platform: SocialPlatform) -> Option<&str> {
        self.socials.get(&platform).map(String::as_str)
    }
}

/// Which source tier produced the winning email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmailSource {
    Facebook,
    Website,
    Maps,
}

/// Resolved contact output for one business.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactBundle {
    pub maps_email: String,
    pub website_email: String,
    pub facebook_email: String,
    pub all_website_emails: Vec<String>,
    pub final_email: String,
    pub source: Option<EmailSource>,
    pub phones: Vec<String>,
    pub socials: BTreeMap<SocialPlatform, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosureStatus {
    #[default]
    Open,
    PermanentlyClosed,
    TemporarilyClosed,
}

impl fmt::Display for ClosureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ClosureStatus::Open => "Open",
            ClosureStatus::PermanentlyClosed => "Permanently Closed",
            ClosureStatus::TemporarilyClosed => "Temporarily Closed",
        };
        write!(f, "{text}")
    }
}

impl Serialize for ClosureStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-record outcome. A failed fetch still yields a record, carrying the
/// reason instead of aborting the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Scraped,
    Error(String),
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Scraped => write!(f, "SCRAPED"),
            RecordStatus::Error(reason) => write!(f, "ERROR: {reason}"),
        }
    }
}

impl Serialize for RecordStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The externally visible unit of output. Immutable once appended to a
/// session's result set.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessRecord {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub category: String,
    pub price_range: String,
    pub rating: String,
    pub reviews_count: String,
    pub opening_hours: String,
    pub closure_status: ClosureStatus,
    pub place_id: String,
    pub maps_url: String,
    pub website: String,
    pub search_query: String,
    pub location_code: String,
    pub contact: ContactBundle,
    pub status: RecordStatus,
}

impl BusinessRecord {
    /// Degraded record for a unit that failed before identity parsing.
    pub fn failed(reference: &DiscoveredReference, reason: &str) -> Self {
        let truncated: String = reason.chars().take(50).collect();
        BusinessRecord {
            name: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            category: String::new(),
            price_range: String::new(),
            rating: String::new(),
            reviews_count: String::new(),
            opening_hours: String::new(),
            closure_status: ClosureStatus::Open,
            place_id: String::new(),
            maps_url: reference.url.clone(),
            website: String::new(),
            search_query: reference.query.clone(),
            location_code: reference.location_code.clone(),
            contact: ContactBundle::default(),
            status: RecordStatus::Error(truncated),
        }
    }
}

/// A job's configuration with every knob resolved against the server-side
/// defaults. This is what the pipeline stages actually see.
#[derive(Debug, Clone)]
pub struct ResolvedJob {
    pub search_phrase: String,
    pub categories: Vec<String>,
    pub locations: Vec<String>,
    pub max_scrolls: u32,
    pub max_workers: usize,
    pub fetch_timeout: std::time::Duration,
    pub headless: bool,
    pub proxy: Option<String>,
}

/// One scraping job's configuration, as submitted by the front end.
/// Unset knobs fall back to the server-side scraping defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub search_phrase: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    pub max_scrolls: Option<u32>,
    pub max_workers: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub headless: Option<bool>,
    pub proxy: Option<String>,
}

impl JobConfig {
    pub fn resolve(self, defaults: &crate::config::ScrapingConfig) -> ResolvedJob {
        ResolvedJob {
            search_phrase: self.search_phrase,
            categories: self.categories,
            locations: self.locations,
            max_scrolls: self.max_scrolls.unwrap_or(defaults.max_scrolls),
            max_workers: self.max_workers.unwrap_or(defaults.max_workers),
            fetch_timeout: std::time::Duration::from_secs(
                self.fetch_timeout_secs.unwrap_or(defaults.fetch_timeout_secs),
            ),
            headless: self.headless.unwrap_or(defaults.headless),
            proxy: self.proxy,
        }
    }
}
