// src/scrape/detail.rs
use crate::address::{derive_city_state, AddressParser};
use crate::browser::{BrowserOptions, Page, PageFetcher};
use crate::config::BrowserConfig;
use crate::contacts::{ContactResolver, SignalExtractor};
use crate::errors::FetchError;
use crate::models::{
    BusinessRecord, ClosureStatus, DiscoveredReference, RawSignalSet, RecordStatus, ResolvedJob,
    SocialPlatform,
};
use crate::scrape::facebook::FacebookScraper;
use crate::scrape::website::WebsiteScraper;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TITLE_SELECTOR: &str = "h1.DUwDvf, h1.lfPIob";

/// Turns one discovered reference into one fully enriched business record,
/// or a degraded `Error` record. Partial information always beats total
/// failure: every sub-step catches its own faults.
pub struct DetailScraper {
    fetcher: Arc<dyn PageFetcher>,
    website: WebsiteScraper,
    facebook: FacebookScraper,
    extractor: Arc<SignalExtractor>,
    resolver: ContactResolver,
    address_parser: Arc<dyn AddressParser>,
    browser: BrowserConfig,
    identity: IdentityParser,
}

impl DetailScraper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        website: WebsiteScraper,
        facebook: FacebookScraper,
        extractor: Arc<SignalExtractor>,
        resolver: ContactResolver,
        address_parser: Arc<dyn AddressParser>,
        browser: BrowserConfig,
    ) -> Self {
        Self {
            fetcher,
            website,
            facebook,
            extractor,
            resolver,
            address_parser,
            browser,
            identity: IdentityParser::new(),
        }
    }

    /// Fetch and enrich one business. Never fails the caller; a broken unit
    /// comes back as an `Error` record. The page handle is closed on every
    /// exit path.
    pub async fn scrape(
        &self,
        reference: &DiscoveredReference,
        job: &ResolvedJob,
    ) -> BusinessRecord {
        let options = BrowserOptions::new(
            job.headless,
            job.proxy.clone(),
            self.browser.pick_user_agent(),
        )
        .with_page_load_timeout(job.fetch_timeout);

        let page = match self.fetcher.open(&options).await {
            Ok(page) => page,
            Err(e) => return BusinessRecord::failed(reference, &e.to_string()),
        };
        let outcome = self
            .scrape_with_page(page.as_ref(), &options, reference, job)
            .await;
        page.close().await;

        match outcome {
            Ok(record) => record,
            Err(e) => BusinessRecord::failed(reference, &e.to_string()),
        }
    }

    async fn scrape_with_page(
        &self,
        page: &dyn Page,
        options: &BrowserOptions,
        reference: &DiscoveredReference,
        job: &ResolvedJob,
    ) -> Result<BusinessRecord, FetchError> {
        page.goto(&reference.url).await?;
        page.wait_for(TITLE_SELECTOR, job.fetch_timeout).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let html = page.html().await?;
        let identity = self.identity.parse(&html, &reference.url);
        let tagged = derive_city_state(self.address_parser.as_ref(), &identity.address);

        // Let lazy sections of the detail page render before the signal
        // sweep.
        for _ in 0..3 {
            let _ = page.scroll_by(None, 500).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let html = page.html().await?;

        let mut maps_signals = RawSignalSet {
            emails: self.extractor.find_emails(&html),
            socials: self.extractor.find_social_links(&html),
            ..Default::default()
        };
        if !identity.phone.is_empty() {
            maps_signals.phones.insert(identity.phone.clone());
        }
        debug!(
            name = identity.name.as_str(),
            emails = maps_signals.emails.len(),
            "Maps page signals"
        );

        let website_signals = if identity.website.is_empty() {
            RawSignalSet::default()
        } else {
            self.website
                .gather(self.fetcher.as_ref(), options, &identity.website)
                .await
        };

        let facebook_url = website_signals
            .social(SocialPlatform::Facebook)
            .or_else(|| maps_signals.social(SocialPlatform::Facebook))
            .map(str::to_string);
        let facebook_signals = match facebook_url {
            Some(url) => {
                self.facebook
                    .gather(self.fetcher.as_ref(), options, &url)
                    .await
            }
            None => RawSignalSet::default(),
        };

        let contact = self.resolver.resolve(
            &maps_signals,
            &website_signals,
            &facebook_signals,
            &identity.website,
        );

        info!(
            name = identity.name.as_str(),
            final_email = contact.final_email.as_str(),
            "Business scraped"
        );

        Ok(BusinessRecord {
            name: identity.name,
            address: identity.address,
            city: tagged.city,
            state: tagged.state,
            category: identity.category,
            price_range: identity.price,
            rating: identity.rating,
            reviews_count: identity.reviews,
            opening_hours: identity.hours,
            closure_status: identity.closure,
            place_id: identity.place_id,
            maps_url: reference.url.clone(),
            website: identity.website,
            search_query: reference.query.clone(),
            location_code: reference.location_code.clone(),
            contact,
            status: RecordStatus::Scraped,
        })
    }
}

#[derive(Debug, Default)]
struct Identity {
    name: String,
    address: String,
    phone: String,
    website: String,
    category: String,
    price: String,
    rating: String,
    reviews: String,
    hours: String,
    closure: ClosureStatus,
    place_id: String,
}

/// Identity-field parsing over the rendered detail page.
struct IdentityParser {
    place_id_regex: Regex,
    rating_regex: Regex,
    reviews_regex: Regex,
    permanently_closed: Regex,
    temporarily_closed: Regex,
}

impl IdentityParser {
    fn new() -> Self {
        Self {
            place_id_regex: Regex::new(r"ChIJ[a-zA-Z0-9_-]+").unwrap(),
            rating_regex: Regex::new(r"\d[.,]\d+").unwrap(),
            reviews_regex: Regex::new(r"\((\d{1,3}(?:[.,]\d{3})*)\)").unwrap(),
            permanently_closed: Regex::new(r"(?i)\bPermanently closed\b").unwrap(),
            temporarily_closed: Regex::new(r"(?i)\bTemporar(?:il)?y closed\b").unwrap(),
        }
    }

    fn parse(&self, html: &str, maps_url: &str) -> Identity {
        let document = Html::parse_document(html);

        let name = select_text(&document, TITLE_SELECTOR);
        let address = select_text(&document, r#"button[data-item-id="address"]"#);
        let phone = select_text(&document, r#"button[data-item-id^="phone"]"#);
        let website = select_attr(&document, r#"a[data-item-id="authority"]"#, "href");
        let category = select_text(&document, r#"button[jsaction*="category"]"#);
        let price = select_attr(&document, r#"[aria-label^="Price:"]"#, "aria-label")
            .trim_start_matches("Price:")
            .trim()
            .to_string();

        let rating_block = select_text(&document, "div.F7nice");
        let rating = self
            .rating_regex
            .find(&rating_block)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let reviews = self
            .reviews_regex
            .captures(&rating_block)
            .map(|caps| caps[1].replace(['.', ','], ""))
            .unwrap_or_default();

        let hours = select_text_joined(&document, "table.eK4R0e", "; ");

        Identity {
            name,
            address,
            phone,
            website,
            category,
            price,
            rating,
            reviews,
            hours,
            closure: self.classify_closure(html),
            place_id: self
                .place_id_regex
                .find(maps_url)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    fn classify_closure(&self, html: &str) -> ClosureStatus {
        if self.permanently_closed.is_match(html) {
            ClosureStatus::PermanentlyClosed
        } else if self.temporarily_closed.is_match(html) {
            ClosureStatus::TemporarilyClosed
        } else {
            ClosureStatus::Open
        }
    }
}

fn select_text(document: &Html, selector: &str) -> String {
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> String {
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
        .to_string()
}

fn select_text_joined(document: &Html, selector: &str, separator: &str) -> String {
    let selector = Selector::parse(selector).unwrap();
    document
        .select(&selector)
        .next()
        .map(|el| {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(separator)
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <h1 class="DUwDvf">Joe's Plumbing</h1>
          <button data-item-id="address">123 Main St, Springfield, IL 62704, USA</button>
          <button data-item-id="phone:tel">+1 (555) 123-4567</button>
          <a data-item-id="authority" href="https://joesplumbing.com/">joesplumbing.com</a>
          <button jsaction="pane.category">Plumber</button>
          <span aria-label="Price: $$">$$</span>
          <div class="F7nice">4.8 (1,234)</div>
          <table class="eK4R0e"><tr><td>Mon</td><td>9 AM–5 PM</td></tr></table>
        </body></html>"#;

    #[test]
    fn parses_identity_fields_from_the_detail_page() {
        let parser = IdentityParser::new();
        let identity = parser.parse(
            DETAIL_PAGE,
            "https://www.google.com/maps/place/Joe/data=!ChIJabc123_XY",
        );

        assert_eq!(identity.name, "Joe's Plumbing");
        assert_eq!(identity.address, "123 Main St, Springfield, IL 62704, USA");
        assert_eq!(identity.phone, "+1 (555) 123-4567");
        assert_eq!(identity.website, "https://joesplumbing.com/");
        assert_eq!(identity.category, "Plumber");
        assert_eq!(identity.price, "$$");
        assert_eq!(identity.rating, "4.8");
        assert_eq!(identity.reviews, "1234");
        assert_eq!(identity.hours, "Mon; 9 AM–5 PM");
        assert_eq!(identity.closure, ClosureStatus::Open);
        assert_eq!(identity.place_id, "ChIJabc123_XY");
    }

    #[test]
    fn missing_fields_parse_to_empty_strings() {
        let parser = IdentityParser::new();
        let identity = parser.parse("<html><body></body></html>", "https://maps/place/x");
        assert!(identity.name.is_empty());
        assert!(identity.place_id.is_empty());
        assert_eq!(identity.closure, ClosureStatus::Open);
    }

    #[test]
    fn closure_status_matches_page_text() {
        let parser = IdentityParser::new();
        assert_eq!(
            parser.classify_closure("<div>Permanently closed</div>"),
            ClosureStatus::PermanentlyClosed
        );
        assert_eq!(
            parser.classify_closure("<div>Temporarily closed</div>"),
            ClosureStatus::TemporarilyClosed
        );
        assert_eq!(
            parser.classify_closure("<div>Temporary closed</div>"),
            ClosureStatus::TemporarilyClosed
        );
        assert_eq!(parser.classify_closure("<div>Open now</div>"), ClosureStatus::Open);
    }
}
