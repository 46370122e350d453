// src/scrape/facebook.rs
use crate::browser::{BrowserOptions, Page, PageFetcher};
use crate::contacts::extract::is_plausible_phone;
use crate::contacts::SignalExtractor;
use crate::models::RawSignalSet;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sub-pages where pages keep their contact details.
const PROFILE_SUBPAGES: [&str; 7] = [
    "/about",
    "/about_contact_and_basic_info",
    "/about_details",
    "/about_profile",
    "",
    "/posts",
    "/reviews",
];

const SCROLL_WAVES: u32 = 10;
const SCROLL_PIXELS: i64 = 800;
const EXPANDABLE_SELECTOR: &str = r#"div[role="button"]"#;
const EXPANDABLE_CLICK_LIMIT: usize = 20;

/// Accumulates the "Facebook" signal set for one business by walking a
/// fixed set of profile sub-pages, scrolling each and expanding collapsed
/// sections. Phones come from `tel:` links and label proximity as well as
/// the generic pattern, since pages rarely print numbers as plain text.
pub struct FacebookScraper {
    extractor: Arc<SignalExtractor>,
    label_phone_regex: Regex,
}

impl FacebookScraper {
    pub fn new(extractor: Arc<SignalExtractor>) -> Self {
        Self {
            extractor,
            label_phone_regex: Regex::new(r"(?i)phone\D{0,30}(\+?\d[\d\s\-()]{8,})").unwrap(),
        }
    }

    pub async fn gather(
        &self,
        fetcher: &dyn PageFetcher,
        options: &BrowserOptions,
        profile_url: &str,
    ) -> RawSignalSet {
        if profile_url.is_empty() {
            return RawSignalSet::default();
        }

        let page = match fetcher.open(options).await {
            Ok(page) => page,
            Err(e) => {
                warn!(profile = profile_url, error = %e, "Facebook pass could not open a page");
                return RawSignalSet::default();
            }
        };
        let signals = self.gather_with_page(page.as_ref(), profile_url).await;
        page.close().await;

        debug!(
            profile = profile_url,
            emails = signals.emails.len(),
            phones = signals.phones.len(),
            "Facebook signal sweep done"
        );
        signals
    }

    async fn gather_with_page(&self, page: &dyn Page, profile_url: &str) -> RawSignalSet {
        let mut signals = RawSignalSet::default();
        let root = profile_url.trim_end_matches('/');

        for subpage in PROFILE_SUBPAGES {
            let url = format!("{root}{subpage}");
            if let Err(e) = page.goto(&url).await {
                warn!(url = url.as_str(), error = %e, "Facebook sub-page failed, skipping");
                continue;
            }
            tokio::time::sleep(Duration::from_secs(2)).await;

            for _ in 0..SCROLL_WAVES {
                let _ = page.scroll_by(None, SCROLL_PIXELS).await;
                tokio::time::sleep(Duration::from_millis(400)).await;
                if let Ok(html) = page.html().await {
                    self.harvest(&html, &mut signals);
                }
            }

            match page.click_each(EXPANDABLE_SELECTOR, EXPANDABLE_CLICK_LIMIT).await {
                Ok(clicked) if clicked > 0 => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                _ => {}
            }
            if let Ok(html) = page.html().await {
                self.harvest(&html, &mut signals);
            }
        }

        signals
    }

    fn harvest(&self, html: &str, signals: &mut RawSignalSet) {
        signals.emails.extend(self.extractor.find_emails(html));
        signals.phones.extend(self.extractor.find_phones(html));
        signals.phones.extend(self.find_linked_phones(html));
    }

    /// Phones the generic pattern misses: `tel:` link targets and numbers
    /// sitting next to a "Phone" label.
    fn find_linked_phones(&self, html: &str) -> BTreeSet<String> {
        let mut phones = BTreeSet::new();

        let tel_selector = Selector::parse(r#"a[href^="tel:"]"#).unwrap();
        let document = Html::parse_document(html);
        for anchor in document.select(&tel_selector) {
            if let Some(href) = anchor.value().attr("href") {
                let number = href.trim_start_matches("tel:").trim().to_string();
                if is_plausible_phone(&number) {
                    phones.insert(number);
                }
            }
        }

        for caps in self.label_phone_regex.captures_iter(html) {
            let candidate = caps[1].trim().to_string();
            if is_plausible_phone(&candidate) {
                phones.insert(candidate);
            }
        }

        phones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn scraper() -> FacebookScraper {
        FacebookScraper::new(Arc::new(SignalExtractor::new(Config::default().email_filter)))
    }

    #[test]
    fn tel_links_yield_phones() {
        let html = r#"<a href="tel:+1-555-123-4567">Call us</a>"#;
        let phones = scraper().find_linked_phones(html);
        assert!(phones.contains("+1-555-123-4567"));
    }

    #[test]
    fn short_tel_links_are_rejected() {
        let html = r#"<a href="tel:911">Emergency</a>"#;
        assert!(scraper().find_linked_phones(html).is_empty());
    }

    #[test]
    fn label_proximity_finds_a_number() {
        let html = "<div>Phone</div><div>(212) 555-0100</div>";
        let phones = scraper().find_linked_phones(html);
        assert!(phones.iter().any(|p| p.contains("555-0100")));
    }

    #[test]
    fn profile_subpage_list_is_fixed() {
        assert_eq!(PROFILE_SUBPAGES.len(), 7);
        assert_eq!(PROFILE_SUBPAGES[0], "/about");
        assert_eq!(PROFILE_SUBPAGES[4], "");
    }
}
