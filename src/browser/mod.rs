// src/browser/mod.rs
use crate::errors::FetchError;
use async_trait::async_trait;
use std::time::Duration;

pub mod webdriver;

pub use webdriver::WebDriverFetcher;

/// Launch options for one browser-automation handle.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: String,
    pub page_load_timeout: Duration,
}

impl BrowserOptions {
    pub fn new(headless: bool, proxy: Option<String>, user_agent: &str) -> Self {
        Self {
            headless,
            proxy,
            user_agent: user_agent.to_string(),
            page_load_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }
}

/// Opens exclusive browser page handles. Each fetch owns its handle for its
/// own duration and must close it on every exit path.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn open(&self, options: &BrowserOptions) -> Result<Box<dyn Page>, FetchError>;
}

/// One live browser page. Navigation, rendered-source access and the
/// scripted scroll/click actions the scraping stages rely on.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), FetchError>;

    /// Poll until `selector` is present, bounded by `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Rendered page source.
    async fn html(&self) -> Result<String, FetchError>;

    /// Scroll the container matching `selector` (or the window when `None`)
    /// down by `pixels`.
    async fn scroll_by(&self, selector: Option<&str>, pixels: i64) -> Result<(), FetchError>;

    /// Click up to `limit` elements matching `selector`; per-element click
    /// failures are skipped. Returns the number of successful clicks.
    async fn click_each(&self, selector: &str, limit: usize) -> Result<usize, FetchError>;

    /// All `(href, anchor text)` pairs on the page.
    async fn links(&self) -> Result<Vec<(String, String)>, FetchError>;

    /// Release the handle. Best-effort; never fails the caller.
    async fn close(self: Box<Self>);
}
