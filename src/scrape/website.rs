// src/scrape/website.rs
use crate::browser::{BrowserOptions, Page, PageFetcher};
use crate::contacts::SignalExtractor;
use crate::models::RawSignalSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Conventional locations for contact details on small-business sites.
const CONTACT_PAGE_PATHS: [&str; 20] = [
    "/contact",
    "/contact-us",
    "/contactus",
    "/contact_us",
    "/about",
    "/about-us",
    "/aboutus",
    "/about_us",
    "/team",
    "/our-team",
    "/staff",
    "/reach-us",
    "/get-in-touch",
    "/connect",
    "/support",
    "/help",
    "/info",
    "/email",
    "/reach",
    "/touch",
];

const CONTACT_KEYWORDS: [&str; 8] = [
    "contact", "about", "team", "reach", "connect", "email", "support", "info",
];

const HOME_TIMEOUT: Duration = Duration::from_secs(5);
const SUBPAGE_TIMEOUT: Duration = Duration::from_secs(3);
const DEEP_LINK_LIMIT: usize = 30;
// Three distinct addresses is plenty; stop burning page loads after that.
const ENOUGH_EMAILS: usize = 3;

/// Gathers the "Website" signal set for one business: a fast plain-HTTP
/// sweep over the home page and conventional contact paths, plus a deeper
/// browser-driven pass following same-site contact links.
pub struct WebsiteScraper {
    http: reqwest::Client,
    extractor: Arc<SignalExtractor>,
}

impl WebsiteScraper {
    pub fn new(http: reqwest::Client, extractor: Arc<SignalExtractor>) -> Self {
        Self { http, extractor }
    }

    pub async fn gather(
        &self,
        fetcher: &dyn PageFetcher,
        options: &BrowserOptions,
        website_url: &str,
    ) -> RawSignalSet {
        let mut signals = self.shallow_pass(website_url, &options.user_agent).await;
        let deep = self.deep_pass(fetcher, options, website_url).await;
        signals.merge(deep);
        debug!(
            website = website_url,
            emails = signals.emails.len(),
            "Website signal sweep done"
        );
        signals
    }

    /// Plain-HTTP pass: home page (emails + socials), then each contact
    /// path for emails only. Every request failure is non-fatal.
    pub async fn shallow_pass(&self, website_url: &str, user_agent: &str) -> RawSignalSet {
        let mut signals = RawSignalSet::default();

        match self.get_page(website_url, user_agent, HOME_TIMEOUT).await {
            Ok(body) => {
                signals.emails = self.extractor.find_emails(&body);
                signals.socials = self.extractor.find_social_links(&body);
            }
            Err(e) => {
                warn!(website = website_url, error = %e, "Home page fetch failed");
                return signals;
            }
        }

        for path in CONTACT_PAGE_PATHS {
            let page_url = match join_url(website_url, path) {
                Some(url) => url,
                None => continue,
            };
            if let Ok(body) = self.get_page(&page_url, user_agent, SUBPAGE_TIMEOUT).await {
                signals.emails.extend(self.extractor.find_emails(&body));
            }
        }

        signals
    }

    /// Browser-driven pass: scroll the home page, then follow up to
    /// `DEEP_LINK_LIMIT` same-site links whose URL or anchor text looks
    /// contact-related, stopping early once enough distinct emails are in
    /// hand. The page handle is closed on every exit path.
    pub async fn deep_pass(
        &self,
        fetcher: &dyn PageFetcher,
        options: &BrowserOptions,
        website_url: &str,
    ) -> RawSignalSet {
        let page = match fetcher.open(options).await {
            Ok(page) => page,
            Err(e) => {
                warn!(website = website_url, error = %e, "Deep pass could not open a page");
                return RawSignalSet::default();
            }
        };
        let signals = self.deep_pass_with_page(page.as_ref(), website_url).await;
        page.close().await;
        signals
    }

    async fn deep_pass_with_page(&self, page: &dyn Page, website_url: &str) -> RawSignalSet {
        let mut signals = RawSignalSet::default();

        if let Err(e) = page.goto(website_url).await {
            warn!(website = website_url, error = %e, "Deep pass navigation failed");
            return signals;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        for _ in 0..5 {
            let _ = page.scroll_by(None, 1000).await;
            tokio::time::sleep(Duration::from_millis(400)).await;
            if let Ok(html) = page.html().await {
                signals.emails.extend(self.extractor.find_emails(&html));
            }
        }
        if let Ok(html) = page.html().await {
            signals.socials = self.extractor.find_social_links(&html);
        }

        let links = match page.links().await {
            Ok(links) => links,
            Err(_) => return signals,
        };
        let candidates = contact_candidates(&links, website_url);

        for link in candidates {
            if signals.emails.len() >= ENOUGH_EMAILS {
                break;
            }
            if page.goto(&link).await.is_err() {
                continue;
            }
            tokio::time::sleep(Duration::from_millis(800)).await;
            for _ in 0..3 {
                let _ = page.scroll_by(None, 1000).await;
                tokio::time::sleep(Duration::from_millis(300)).await;
                if let Ok(html) = page.html().await {
                    signals.emails.extend(self.extractor.find_emails(&html));
                }
            }
        }

        signals
    }

    async fn get_page(
        &self,
        url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        response.text().await
    }
}

/// Same-site links whose href or anchor text matches a contact keyword,
/// capped at the deep-pass limit.
fn contact_candidates(links: &[(String, String)], website_url: &str) -> Vec<String> {
    let host = Url::parse(website_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()));
    let host = match host {
        Some(host) => host,
        None => return Vec::new(),
    };

    let mut seen = std::collections::BTreeSet::new();
    links
        .iter()
        .filter(|(href, text)| {
            let same_site = Url::parse(href)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.") == host))
                .unwrap_or(false);
            let href_lower = href.to_lowercase();
            let text_lower = text.to_lowercase();
            same_site
                && CONTACT_KEYWORDS
                    .iter()
                    .any(|kw| href_lower.contains(kw) || text_lower.contains(kw))
        })
        .map(|(href, _)| href.clone())
        .filter(|href| seen.insert(href.clone()))
        .take(DEEP_LINK_LIMIT)
        .collect()
}

fn join_url(base: &str, path: &str) -> Option<String> {
    Url::parse(base).ok()?.join(path).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(href: &str, text: &str) -> (String, String) {
        (href.to_string(), text.to_string())
    }

    #[test]
    fn candidates_are_same_site_and_contact_related() {
        let links = vec![
            link("https://biz.com/contact", ""),
            link("https://biz.com/products", "Products"),
            link("https://biz.com/story", "About our team"),
            link("https://other.com/contact", "Contact"),
            link("https://www.biz.com/contact", "dupe with www"),
        ];
        let candidates = contact_candidates(&links, "https://www.biz.com");
        assert_eq!(
            candidates,
            vec![
                "https://biz.com/contact",
                "https://biz.com/story",
                "https://www.biz.com/contact",
            ]
        );
    }

    #[test]
    fn no_candidates_from_an_unparseable_base() {
        assert!(contact_candidates(&[link("https://biz.com/contact", "")], "").is_empty());
    }

    #[test]
    fn join_handles_trailing_slashes() {
        assert_eq!(
            join_url("https://biz.com/", "/contact").as_deref(),
            Some("https://biz.com/contact")
        );
        assert_eq!(
            join_url("https://biz.com/home", "/about").as_deref(),
            Some("https://biz.com/about")
        );
    }
}
