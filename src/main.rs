// src/main.rs
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod address;
mod api;
mod browser;
mod config;
mod contacts;
mod errors;
mod export;
mod models;
mod orchestrator;
mod scrape;
mod server;
mod session;

use browser::{PageFetcher, WebDriverFetcher};
use config::{load_config, Config};
use errors::Result;
use orchestrator::Orchestrator;
use session::SessionRegistry;
use std::sync::Arc;

#[rocket::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = match load_config("config.yml").await {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config.yml: {}. Using defaults.", e);
            Config::default()
        }
    };

    // Setup logging
    std::env::set_var(
        "RUST_LOG",
        "maps_lead_scraper=info,hyper=warn,rocket=warn",
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("maps_lead_scraper={}", config.logging.level)
                    .parse()
                    .unwrap(),
            ),
        )
        .init();

    // Create output directory
    tokio::fs::create_dir_all(&config.output.directory).await?;

    let config = Arc::new(config);
    let registry = Arc::new(SessionRegistry::new(
        config.scraping.max_concurrent_sessions,
    ));
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(WebDriverFetcher::new(&config.browser.webdriver_url));
    let orchestrator = Arc::new(Orchestrator::new(registry, fetcher, config.clone()));

    info!(
        webdriver = config.browser.webdriver_url.as_str(),
        max_sessions = config.scraping.max_concurrent_sessions,
        "Starting scraper API"
    );

    server::build_rocket(config, orchestrator).launch().await?;

    Ok(())
}
