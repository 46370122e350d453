// src/address.rs
use crate::errors::FetchError;
use regex::Regex;

/// Structured fields pulled out of a postal address line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedAddress {
    pub city: String,
    pub state: String,
}

/// Best-effort structured address tagging. Callers are expected to fall
/// back to `positional_city_state` when tagging fails.
pub trait AddressParser: Send + Sync {
    fn tag(&self, address: &str) -> Result<TaggedAddress, FetchError>;
}

/// US-style addresses: locate the `ST 12345` segment, take the segment
/// before it as the city.
pub struct UsAddressParser {
    state_zip_regex: Regex,
}

impl UsAddressParser {
    pub fn new() -> Self {
        Self {
            state_zip_regex: Regex::new(r"^([A-Z]{2})\s+(\d{5})(?:-\d{4})?$").unwrap(),
        }
    }
}

impl Default for UsAddressParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressParser for UsAddressParser {
    fn tag(&self, address: &str) -> Result<TaggedAddress, FetchError> {
        let segments: Vec<&str> = address.split(", ").map(str::trim).collect();

        for (i, segment) in segments.iter().enumerate() {
            if let Some(caps) = self.state_zip_regex.captures(segment) {
                if i == 0 {
                    break;
                }
                return Ok(TaggedAddress {
                    city: segments[i - 1].to_string(),
                    state: caps[1].to_string(),
                });
            }
        }

        Err(FetchError::Parse(format!(
            "no state/zip segment in address: {address}"
        )))
    }
}

/// Positional fallback over the comma-separated address: third-from-last
/// segment is the city, the second-from-last segment's first token is the
/// state when that segment has more than one token.
pub fn positional_city_state(address: &str) -> TaggedAddress {
    let parts: Vec<&str> = address.split(", ").collect();
    if parts.len() < 3 {
        return TaggedAddress::default();
    }

    let city = parts[parts.len() - 3].to_string();
    let state_segment: Vec<&str> = parts[parts.len() - 2].split(' ').collect();
    let state = if state_segment.len() > 1 {
        state_segment[0].to_string()
    } else {
        String::new()
    };

    TaggedAddress { city, state }
}

/// Tag with the structured parser, falling back positionally.
pub fn derive_city_state(parser: &dyn AddressParser, address: &str) -> TaggedAddress {
    if address.is_empty() {
        return TaggedAddress::default();
    }
    parser
        .tag(address)
        .unwrap_or_else(|_| positional_city_state(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_a_conventional_us_address() {
        let parser = UsAddressParser::new();
        let tagged = parser.tag("123 Main St, Springfield, IL 62704, USA").unwrap();
        assert_eq!(tagged.city, "Springfield");
        assert_eq!(tagged.state, "IL");
    }

    #[test]
    fn tagging_fails_without_a_state_zip_segment() {
        let parser = UsAddressParser::new();
        assert!(parser.tag("Unit 4, The Old Mill, Somewhere").is_err());
    }

    #[test]
    fn positional_fallback_splits_by_position() {
        let tagged = positional_city_state("123 Main St, Springfield, IL 62704, USA");
        assert_eq!(tagged.city, "Springfield");
        assert_eq!(tagged.state, "IL");
    }

    #[test]
    fn positional_fallback_on_short_addresses_yields_nothing() {
        assert_eq!(positional_city_state("Springfield, USA"), TaggedAddress::default());
    }

    #[test]
    fn derive_uses_fallback_when_tagging_fails() {
        let parser = UsAddressParser::new();
        let tagged = derive_city_state(&parser, "5 Rue de la Paix, Paris, Île-de-France 75002, FR");
        assert_eq!(tagged.city, "Paris");
    }
}
