// src/browser/webdriver.rs
use crate::browser::{BrowserOptions, Page, PageFetcher};
use crate::errors::FetchError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Client for a W3C WebDriver endpoint (chromedriver, a selenium grid, a
/// remote pool). One `open` call creates one driver session; the returned
/// page owns that session until `close`.
pub struct WebDriverFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl WebDriverFetcher {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn open(&self, options: &BrowserOptions) -> Result<Box<dyn Page>, FetchError> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-software-rasterizer".to_string(),
            "--disable-extensions".to_string(),
            format!("--user-agent={}", options.user_agent),
        ];
        if options.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(ref proxy) = options.proxy {
            args.push(format!("--proxy-server={proxy}"));
        }

        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "eager",
                    "goog:chromeOptions": { "args": args },
                }
            }
        });

        let value = post_json(
            &self.client,
            &format!("{}/session", self.base_url),
            &body,
        )
        .await?;
        let session_id = value["sessionId"]
            .as_str()
            .or_else(|| value["value"]["sessionId"].as_str())
            .ok_or_else(|| FetchError::Parse("no sessionId in webdriver response".to_string()))?
            .to_string();

        debug!(session_id = session_id.as_str(), "Opened webdriver session");

        Ok(Box::new(WebDriverPage {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, session_id),
            page_load_timeout: options.page_load_timeout,
            closed: false,
        }))
    }
}

struct WebDriverPage {
    client: reqwest::Client,
    session_url: String,
    page_load_timeout: Duration,
    closed: bool,
}

impl WebDriverPage {
    async fn execute(&self, script: &str, args: Value) -> Result<Value, FetchError> {
        post_json(
            &self.client,
            &format!("{}/execute/sync", self.session_url),
            &json!({ "script": script, "args": args }),
        )
        .await
    }

    async fn element_ids(&self, selector: &str) -> Result<Vec<String>, FetchError> {
        let value = post_json(
            &self.client,
            &format!("{}/elements", self.session_url),
            &json!({ "using": "css selector", "value": selector }),
        )
        .await?;

        Ok(value
            .as_array()
            .map(|elements| {
                elements
                    .iter()
                    .filter_map(|e| e[ELEMENT_KEY].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), FetchError> {
        let url_endpoint = format!("{}/url", self.session_url);
        let body = json!({ "url": url });
        let navigate = post_json(&self.client, &url_endpoint, &body);
        match tokio::time::timeout(self.page_load_timeout, navigate).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(FetchError::NavigationTimeout(self.page_load_timeout)),
        }
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), FetchError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.element_ids(selector).await?.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(FetchError::ElementNotFound(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn html(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(format!("{}/source", self.session_url))
            .send()
            .await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        Ok(value["value"].as_str().unwrap_or_default().to_string())
    }

    async fn scroll_by(&self, selector: Option<&str>, pixels: i64) -> Result<(), FetchError> {
        match selector {
            Some(selector) => {
                self.execute(
                    "const el = document.querySelector(arguments[0]); \
                     if (el) { el.scrollBy(0, arguments[1]); }",
                    json!([selector, pixels]),
                )
                .await?;
            }
            None => {
                self.execute("window.scrollBy(0, arguments[0]);", json!([pixels]))
                    .await?;
            }
        }
        Ok(())
    }

    async fn click_each(&self, selector: &str, limit: usize) -> Result<usize, FetchError> {
        let ids = self.element_ids(selector).await?;
        let mut clicked = 0;
        for id in ids.into_iter().take(limit) {
            let result = post_json(
                &self.client,
                &format!("{}/element/{}/click", self.session_url, id),
                &json!({}),
            )
            .await;
            match result {
                Ok(_) => clicked += 1,
                Err(e) => debug!(error = %e, "Element click failed, skipping"),
            }
        }
        Ok(clicked)
    }

    async fn links(&self) -> Result<Vec<(String, String)>, FetchError> {
        let value = self
            .execute(
                "return Array.from(document.querySelectorAll('a[href]'))\
                 .map(a => [a.href, a.innerText]);",
                json!([]),
            )
            .await?;

        Ok(value
            .as_array()
            .map(|pairs| {
                pairs
                    .iter()
                    .filter_map(|pair| {
                        let href = pair[0].as_str()?;
                        let text = pair[1].as_str().unwrap_or_default();
                        Some((href.to_string(), text.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn close(mut self: Box<Self>) {
        self.closed = true;
        let delete = self.client.delete(&self.session_url).send().await;
        if let Err(e) = delete {
            warn!(error = %e, "Failed to close webdriver session");
        }
    }
}

impl Drop for WebDriverPage {
    fn drop(&mut self) {
        // Leak backstop: a handle dropped without close still releases its
        // driver session, detached.
        if !self.closed {
            let client = self.client.clone();
            let session_url = self.session_url.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = client.delete(&session_url).send().await;
                });
            }
        }
    }
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<Value, FetchError> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    let value: Value = response
        .json()
        .await
        .map_err(|e| FetchError::Parse(e.to_string()))?;

    if !status.is_success() {
        let message = value["value"]["message"]
            .as_str()
            .unwrap_or("webdriver error");
        return Err(FetchError::Connection(format!(
            "webdriver status {status}: {message}"
        )));
    }

    Ok(value["value"].clone())
}
