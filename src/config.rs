use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub scraping: ScrapingConfig,
    pub browser: BrowserConfig,
    pub email_filter: EmailFilterConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapingConfig {
    pub max_concurrent_sessions: usize,
    pub max_scrolls: u32,
    pub max_workers: usize,
    pub fetch_timeout_secs: u64,
    pub feed_wait_secs: u64,
    pub headless: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub user_agents: Vec<String>,
}

impl BrowserConfig {
    /// Rotating user agent for both browser sessions and plain HTTP requests.
    pub fn pick_user_agent(&self) -> &str {
        if self.user_agents.is_empty() {
            return DEFAULT_USER_AGENT;
        }
        &self.user_agents[fastrand::usize(..self.user_agents.len())]
    }
}

/// Heuristic email-validity lists. No single canonical list is correct for
/// every site, so these are data, not logic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailFilterConfig {
    pub blocked_extensions: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub blocked_keywords: Vec<String>,
    pub generic_domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub directory: String,
    pub pretty_json: bool,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

impl Default for Config {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig {
                max_concurrent_sessions: 20,
                max_scrolls: 10,
                max_workers: 10,
                fetch_timeout_secs: 15,
                feed_wait_secs: 10,
                headless: true,
            },
            browser: BrowserConfig {
                webdriver_url: "http://localhost:9515".to_string(),
                user_agents: vec![DEFAULT_USER_AGENT.to_string()],
            },
            email_filter: EmailFilterConfig {
                blocked_extensions: [
                    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".pdf", ".css", ".js",
                    ".ico",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                blocked_domains: [
                    "sentry.io",
                    "example.com",
                    "test.com",
                    "localhost",
                    "w3.org",
                    "schema.org",
                    "google.com",
                    "facebook.com",
                    "instagram.com",
                    "twitter.com",
                    "x.com",
                    "linkedin.com",
                    "youtube.com",
                    "maps.google.com",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                blocked_keywords: [
                    "noreply",
                    "no-reply",
                    "donotreply",
                    "mailer-daemon",
                    "postmaster",
                    "webmaster",
                    "abuse",
                    "spam",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                generic_domains: ["gmail.com", "yahoo.com", "hotmail.com", "outlook.com"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            output: OutputConfig {
                directory: "out".to_string(),
                pretty_json: true,
            },
        }
    }
}

pub async fn load_config(
    path: &str,
) -> std::result::Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let content = tokio::fs::read_to_string(path).await?;
    let config: Config = serde_yaml::from_str(&content)?;
    Ok(config)
}
