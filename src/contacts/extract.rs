// src/contacts/extract.rs
use crate::config::EmailFilterConfig;
use crate::models::SocialPlatform;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Text-level signal extraction over raw page markup. Pure functions over
/// the input text; the validity lists come from configuration because no
/// hard-coded list survives contact with real sites.
pub struct SignalExtractor {
    email_regex: Regex,
    phone_regex: Regex,
    tag_regex: Regex,
    social_patterns: Vec<(SocialPlatform, Regex)>,
    filter: EmailFilterConfig,
}

impl SignalExtractor {
    pub fn new(filter: EmailFilterConfig) -> Self {
        Self {
            email_regex: Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}")
                .unwrap(),
            phone_regex: Regex::new(r"\+?\d[\d\s\-()]{8,}").unwrap(),
            tag_regex: Regex::new(r"<[^>]+>").unwrap(),
            social_patterns: vec![
                (
                    SocialPlatform::Facebook,
                    Regex::new(r#"(?i)https?://(?:www\.)?facebook\.com/[^\s"'<>]+"#).unwrap(),
                ),
                (
                    SocialPlatform::Instagram,
                    Regex::new(r#"(?i)https?://(?:www\.)?instagram\.com/[^\s"'<>]+"#).unwrap(),
                ),
                (
                    SocialPlatform::Twitter,
                    Regex::new(r#"(?i)https?://(?:www\.)?(?:twitter|x)\.com/[^\s"'<>]+"#)
                        .unwrap(),
                ),
                (
                    SocialPlatform::LinkedIn,
                    Regex::new(r#"(?i)https?://(?:[a-z]{2,3}\.)?linkedin\.com/[^\s"'<>]+"#)
                        .unwrap(),
                ),
            ],
            filter,
        }
    }

    /// Candidate emails in `html`, lowercased, de-obfuscated, filtered and
    /// sorted. Sorting makes downstream selection order-independent.
    pub fn find_emails(&self, html: &str) -> BTreeSet<String> {
        if html.is_empty() {
            return BTreeSet::new();
        }
        let text = deobfuscate(&html.to_lowercase());

        self.email_regex
            .find_iter(&text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|e| self.is_valid_email(e))
            .collect()
    }

    fn is_valid_email(&self, email: &str) -> bool {
        if email.matches('@').count() != 1 {
            return false;
        }
        if self
            .filter
            .blocked_extensions
            .iter()
            .any(|ext| email.contains(ext.as_str()))
        {
            return false;
        }

        let (local, domain) = match email.split_once('@') {
            Some(parts) => parts,
            None => return false,
        };
        if local.len() < 2 || domain.len() < 4 || !domain.contains('.') {
            return false;
        }
        if self
            .filter
            .blocked_keywords
            .iter()
            .any(|kw| local.contains(kw.as_str()))
        {
            return false;
        }
        if self
            .filter
            .blocked_domains
            .iter()
            .any(|d| domain.contains(d.as_str()))
        {
            return false;
        }

        true
    }

    /// Candidate phone numbers in `html`. Tags are stripped first so digit
    /// runs split across elements don't glue together; a candidate must
    /// keep at least 10 digits after removing punctuation.
    pub fn find_phones(&self, html: &str) -> BTreeSet<String> {
        let text = self.tag_regex.replace_all(html, " ");

        self.phone_regex
            .find_iter(&text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| is_plausible_phone(p))
            .collect()
    }

    /// First matched profile URL per platform, query string and trailing
    /// slash stripped.
    pub fn find_social_links(&self, html: &str) -> BTreeMap<SocialPlatform, String> {
        let mut socials = BTreeMap::new();
        for (platform, pattern) in &self.social_patterns {
            if let Some(m) = pattern.find(html) {
                let url = m
                    .as_str()
                    .split('?')
                    .next()
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .to_string();
                socials.insert(*platform, url);
            }
        }
        socials
    }
}

/// Accept a phone candidate only if stripping all non-digit characters
/// leaves at least 10 digits.
pub fn is_plausible_phone(candidate: &str) -> bool {
    candidate.chars().filter(|c| c.is_ascii_digit()).count() >= 10
}

/// Undo the common spam-protection spellings before matching.
fn deobfuscate(text: &str) -> String {
    text.replace("[at]", "@")
        .replace("(at)", "@")
        .replace("[dot]", ".")
        .replace("(dot)", ".")
        .replace(" at ", "@")
        .replace(" dot ", ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn extractor() -> SignalExtractor {
        SignalExtractor::new(Config::default().email_filter)
    }

    #[test]
    fn finds_plain_and_obfuscated_emails() {
        let html = "reach us: Info@Biz.com or sales[at]biz[dot]com";
        let emails = extractor().find_emails(html);
        assert!(emails.contains("info@biz.com"));
        assert!(emails.contains("sales@biz.com"));
    }

    #[test]
    fn rejects_blocked_domains_keywords_and_extensions() {
        let html = "noreply@biz.com hero@2x.png icon@sentry.io sales@biz.com";
        let emails = extractor().find_emails(html);
        assert_eq!(
            emails.into_iter().collect::<Vec<_>>(),
            vec!["sales@biz.com"]
        );
    }

    #[test]
    fn rejects_short_local_and_domain_parts() {
        let emails = extractor().find_emails("a@long-enough.com ok@x.y");
        assert!(emails.is_empty());
    }

    #[test]
    fn email_output_is_sorted_and_deduplicated() {
        let html = "z@biz.com a@biz.com z@biz.com";
        let emails: Vec<String> = extractor().find_emails(html).into_iter().collect();
        assert_eq!(emails, vec!["a@biz.com", "z@biz.com"]);
    }

    #[test]
    fn phone_needs_ten_digits() {
        assert!(is_plausible_phone("+1 (555) 123-4567"));
        assert!(!is_plausible_phone("555-1234"));
    }

    #[test]
    fn finds_phones_across_markup() {
        let html = "<div>Call <b>+1 (555) 123-4567</b> or 555-1234</div>";
        let phones = extractor().find_phones(html);
        assert_eq!(phones.len(), 1);
        assert!(phones.contains("+1 (555) 123-4567"));
    }

    #[test]
    fn social_links_take_first_match_and_strip_query() {
        let html = r#"<a href="https://www.facebook.com/bizpage?ref=nav">fb</a>
                      <a href="https://www.facebook.com/other">fb2</a>
                      <a href="https://instagram.com/bizgram/">ig</a>"#;
        let socials = extractor().find_social_links(html);
        assert_eq!(
            socials.get(&SocialPlatform::Facebook).map(String::as_str),
            Some("https://www.facebook.com/bizpage")
        );
        assert_eq!(
            socials.get(&SocialPlatform::Instagram).map(String::as_str),
            Some("https://instagram.com/bizgram")
        );
        assert!(!socials.contains_key(&SocialPlatform::LinkedIn));
    }
}
