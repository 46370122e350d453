// src/contacts/resolve.rs
use crate::contacts::extract::is_plausible_phone;
use crate::models::{ContactBundle, EmailSource, RawSignalSet};
use std::collections::BTreeSet;
use url::Url;

/// Folds per-source raw signal sets into one canonical contact bundle.
/// Pure and deterministic: same inputs, same bundle, regardless of the
/// order pages were scraped in.
pub struct ContactResolver {
    generic_domains: Vec<String>,
}

impl ContactResolver {
    pub fn new(generic_domains: Vec<String>) -> Self {
        Self { generic_domains }
    }

    pub fn resolve(
        &self,
        maps: &RawSignalSet,
        website: &RawSignalSet,
        facebook: &RawSignalSet,
        website_url: &str,
    ) -> ContactBundle {
        let maps_email = self.best_email(&maps.emails);
        let website_email = self.domain_matched_email(&website.emails, website_url);
        let facebook_email = self.best_email(&facebook.emails);

        // The priority waterfall is a frequently-adjusted business rule;
        // keep it a table folded first-present-wins, not nested branches.
        let candidates = [
            (EmailSource::Facebook, facebook_email.as_str()),
            (EmailSource::Website, website_email.as_str()),
            (EmailSource::Maps, maps_email.as_str()),
        ];
        let (source, final_email) = candidates
            .iter()
            .find(|(_, email)| !email.is_empty())
            .map(|(source, email)| (Some(*source), email.to_string()))
            .unwrap_or((None, String::new()));

        let phones: Vec<String> = maps
            .phones
            .iter()
            .chain(facebook.phones.iter())
            .filter(|p| is_plausible_phone(p))
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        let mut socials = RawSignalSet::default();
        socials.merge(website.clone());
        socials.merge(maps.clone());
        socials.merge(facebook.clone());

        ContactBundle {
            maps_email,
            website_email,
            facebook_email,
            all_website_emails: website.emails.iter().cloned().collect(),
            final_email,
            source,
            phones,
            socials: socials.socials,
        }
    }

    /// Best email from one source: prefer any address outside the generic
    /// consumer-mail domains, fall back to any address at all.
    fn best_email(&self, emails: &BTreeSet<String>) -> String {
        emails
            .iter()
            .find(|email| !self.is_generic_domain(email))
            .or_else(|| emails.iter().next())
            .cloned()
            .unwrap_or_default()
    }

    /// Website email prefers an address whose domain matches the site's own
    /// hostname (minus a leading `www.`), then falls back to the generic
    /// best-email rule.
    fn domain_matched_email(&self, emails: &BTreeSet<String>, website_url: &str) -> String {
        if emails.is_empty() {
            return String::new();
        }
        if let Some(host) = host_of(website_url) {
            if let Some(matched) = emails.iter().find(|email| {
                email
                    .split_once('@')
                    .is_some_and(|(_, domain)| domain.contains(&host))
            }) {
                return matched.clone();
            }
        }
        self.best_email(emails)
    }

    fn is_generic_domain(&self, email: &str) -> bool {
        match email.split_once('@') {
            Some((_, domain)) => self
                .generic_domains
                .iter()
                .any(|generic| domain.contains(generic.as_str())),
            None => false,
        }
    }
}

fn host_of(website_url: &str) -> Option<String> {
    let parsed = Url::parse(website_url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::SocialPlatform;

    fn resolver() -> ContactResolver {
        ContactResolver::new(Config::default().email_filter.generic_domains)
    }

    fn signals(emails: &[&str]) -> RawSignalSet {
        RawSignalSet {
            emails: emails.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn facebook_email_wins_the_waterfall() {
        let bundle = resolver().resolve(
            &signals(&["b@gmail.com"]),
            &signals(&[]),
            &signals(&["a@biz.com"]),
            "",
        );
        assert_eq!(bundle.final_email, "a@biz.com");
        assert_eq!(bundle.source, Some(EmailSource::Facebook));
    }

    #[test]
    fn domain_match_picks_the_website_email() {
        let bundle = resolver().resolve(
            &signals(&["z@gmail.com"]),
            &signals(&["info@biz.com", "x@gmail.com"]),
            &signals(&[]),
            "https://www.biz.com",
        );
        assert_eq!(bundle.website_email, "info@biz.com");
        assert_eq!(bundle.final_email, "info@biz.com");
        assert_eq!(bundle.source, Some(EmailSource::Website));
    }

    #[test]
    fn generic_maps_email_still_wins_when_alone() {
        let bundle =
            resolver().resolve(&signals(&["owner@gmail.com"]), &signals(&[]), &signals(&[]), "");
        assert_eq!(bundle.final_email, "owner@gmail.com");
        assert_eq!(bundle.source, Some(EmailSource::Maps));
    }

    #[test]
    fn empty_sources_resolve_to_nothing() {
        let bundle = resolver().resolve(&signals(&[]), &signals(&[]), &signals(&[]), "");
        assert!(bundle.final_email.is_empty());
        assert_eq!(bundle.source, None);
    }

    #[test]
    fn non_generic_domain_preferred_within_a_source() {
        let bundle = resolver().resolve(
            &signals(&["aaa@gmail.com", "zzz@biz.com"]),
            &signals(&[]),
            &signals(&[]),
            "",
        );
        assert_eq!(bundle.maps_email, "zzz@biz.com");
    }

    #[test]
    fn phones_union_is_filtered_deduplicated_and_sorted() {
        let maps = RawSignalSet {
            phones: ["+1 (555) 123-4567", "555-1234"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            ..Default::default()
        };
        let facebook = RawSignalSet {
            phones: ["(212) 555-0100", "+1 (555) 123-4567"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            ..Default::default()
        };
        let bundle = resolver().resolve(&maps, &RawSignalSet::default(), &facebook, "");
        assert_eq!(
            bundle.phones,
            vec!["(212) 555-0100", "+1 (555) 123-4567"]
        );
    }

    #[test]
    fn social_profiles_are_not_overridden_once_resolved() {
        let mut website = RawSignalSet::default();
        website.socials.insert(
            SocialPlatform::Facebook,
            "https://facebook.com/from-website".to_string(),
        );
        let mut maps = RawSignalSet::default();
        maps.socials.insert(
            SocialPlatform::Facebook,
            "https://facebook.com/from-maps".to_string(),
        );
        maps.socials.insert(
            SocialPlatform::Instagram,
            "https://instagram.com/from-maps".to_string(),
        );
        let bundle = resolver().resolve(&maps, &website, &RawSignalSet::default(), "");
        assert_eq!(
            bundle.socials.get(&SocialPlatform::Facebook).map(String::as_str),
            Some("https://facebook.com/from-website")
        );
        assert_eq!(
            bundle.socials.get(&SocialPlatform::Instagram).map(String::as_str),
            Some("https://instagram.com/from-maps")
        );
    }
}
