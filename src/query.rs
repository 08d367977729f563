//! Free-text lookup queries.
//!
//! A query is a whitespace-separated list of `field[op]=value` terms:
//!
//! | Term | Meaning |
//! |------|---------|
//! | `desc+=dns` | field contains `dns` |
//! | `act=block`, `act==block` | field equals `block` |
//! | `act!=block` | field differs from `block` |
//!
//! A bare IP address (`10.1.1.5`) probes rule sources and destinations at once.
//! Any other token is reported as invalid, networks (`10.1.1.0/24`) included.

use std::fmt;
use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Result, TrackerError};

/// Regex pattern for one query term, searched within a token
/// Format: field[+=!]?=value
static TERM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+)([+=!])?=(\S+)").expect("TERM_PATTERN: hardcoded regex is invalid")
});

/// Fields recognized by default
pub const DEFAULT_FIELDS: &[&str] = &["pf", "act", "desc", "src", "dst", "port"];

/// Comparison applied by a query term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `+`
    Contains,
    /// `=`
    Equals,
    /// `!`
    NotEquals,
}

impl Method {
    fn from_symbol(symbol: Option<&str>) -> Self {
        match symbol {
            Some("+") => Method::Contains,
            Some("!") => Method::NotEquals,
            _ => Method::Equals,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Method::Contains => '+',
            Method::Equals => '=',
            Method::NotEquals => '!',
        }
    }
}

/// One `field[op]=value` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    pub method: Method,
    pub value: String,
}

impl FieldQuery {
    pub fn new(method: Method, value: impl Into<String>) -> Self {
        Self {
            method,
            value: value.into(),
        }
    }
}

/// Result of parsing one query line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Every recognized field, in parser order, with its term if given
    fields: Vec<(String, Option<FieldQuery>)>,
    /// Bare IP address probe
    pub raw_ip: Option<IpAddr>,
    /// Field names that are not recognized, and tokens that are neither a
    /// term nor an IP address
    pub invalid: Vec<String>,
}

impl ParsedQuery {
    /// Term for a field, if the query specified one
    pub fn get(&self, field: &str) -> Option<&FieldQuery> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, query)| query.as_ref())
    }

    /// Recognized fields and their terms
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&FieldQuery>)> {
        self.fields
            .iter()
            .map(|(name, query)| (name.as_str(), query.as_ref()))
    }

    fn reject(&mut self, key: &str) {
        if !self.invalid.iter().any(|bad| bad == key) {
            self.invalid.push(key.to_string());
        }
    }

    pub fn is_success(&self) -> bool {
        self.invalid.is_empty()
    }

    /// True when nothing constrains the search (matches every rule)
    pub fn is_empty(&self) -> bool {
        self.raw_ip.is_none() && self.fields.iter().all(|(_, query)| query.is_none())
    }

    /// Convert an unsuccessful parse into an error listing every bad field.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TrackerError::InvalidQuery(self.invalid))
        }
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut terms = Vec::new();
        if let Some(ip) = self.raw_ip {
            terms.push(ip.to_string());
        }
        for (name, query) in self.fields() {
            if let Some(query) = query {
                terms.push(format!("{}{}={}", name, query.method.symbol(), query.value));
            }
        }
        f.write_str(&terms.join(" "))
    }
}

/// Parser for a fixed set of field names
#[derive(Debug, Clone)]
pub struct QueryParser {
    fields: Vec<String>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new(DEFAULT_FIELDS.iter().copied())
    }
}

impl QueryParser {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Parse a query line. Never fails; check [`ParsedQuery::is_success`].
    pub fn parse(&self, line: &str) -> ParsedQuery {
        let mut parsed = ParsedQuery {
            fields: self.fields.iter().map(|name| (name.clone(), None)).collect(),
            raw_ip: None,
            invalid: Vec::new(),
        };

        for token in line.split_whitespace() {
            let Some(captures) = TERM_PATTERN.captures(token) else {
                match token.parse::<IpAddr>() {
                    Ok(ip) => parsed.raw_ip = Some(ip),
                    Err(_) => {
                        debug!(token, "unrecognized query token");
                        parsed.reject(token);
                    }
                }
                continue;
            };

            let (Some(name), Some(value)) = (captures.get(1), captures.get(3)) else {
                continue;
            };
            let method = Method::from_symbol(captures.get(2).map(|m| m.as_str()));

            match parsed.fields.iter_mut().find(|(field, _)| field == name.as_str()) {
                Some((_, slot)) => *slot = Some(FieldQuery::new(method, value.as_str())),
                None => parsed.reject(name.as_str()),
            }
        }

        parsed
    }

    /// Field names starting with `prefix`, sorted, for line-editor completion
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        let mut matches: Vec<&str> = self
            .fields
            .iter()
            .map(String::as_str)
            .filter(|field| field.starts_with(prefix))
            .collect();
        matches.sort_unstable();
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_pattern_regex_compiles() {
        assert!(TERM_PATTERN.is_match("src=10.0.0.1"));
    }

    #[test]
    fn test_parse_equals_and_not_equals() {
        let parsed = QueryParser::default().parse("src=10.0.0.1 act!=block");
        assert!(parsed.is_success());
        assert_eq!(
            parsed.get("src"),
            Some(&FieldQuery::new(Method::Equals, "10.0.0.1"))
        );
        assert_eq!(
            parsed.get("act"),
            Some(&FieldQuery::new(Method::NotEquals, "block"))
        );
        for field in ["pf", "desc", "dst", "port"] {
            assert!(parsed.get(field).is_none(), "{} should be unset", field);
        }
        assert!(parsed.raw_ip.is_none());
    }

    #[test]
    fn test_parse_contains_and_double_equals() {
        let parsed = QueryParser::default().parse("desc+=dns pf==fw-edge");
        assert_eq!(parsed.get("desc"), Some(&FieldQuery::new(Method::Contains, "dns")));
        assert_eq!(parsed.get("pf"), Some(&FieldQuery::new(Method::Equals, "fw-edge")));
    }

    #[test]
    fn test_unknown_field_fails() {
        let parsed = QueryParser::default().parse("bogus=1");
        assert!(!parsed.is_success());
        assert_eq!(parsed.invalid, vec!["bogus".to_string()]);
    }

    #[test]
    fn test_every_unknown_field_is_reported() {
        let parsed = QueryParser::default().parse("bogus=1 src=10.0.0.1 proto=tcp bogus=2");
        assert_eq!(parsed.invalid, vec!["bogus".to_string(), "proto".to_string()]);
        assert!(parsed.get("src").is_some());

        let err = parsed.into_result().unwrap_err();
        assert!(format!("{}", err).contains("bogus, proto"));
    }

    #[test]
    fn test_empty_query_is_successful_noop() {
        let parsed = QueryParser::default().parse("   ");
        assert!(parsed.is_success());
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_bare_ip_is_raw_probe() {
        let parsed = QueryParser::default().parse("10.1.1.5");
        assert!(parsed.is_success());
        assert_eq!(parsed.raw_ip, Some("10.1.1.5".parse().unwrap()));
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_term_inside_malformed_token_reports_its_field() {
        let parsed = QueryParser::default().parse("src-ip=10.1.1.5");
        assert!(!parsed.is_success());
        assert_eq!(parsed.invalid, vec!["ip".to_string()]);
        assert!(parsed.get("src").is_none());
    }

    #[test]
    fn test_incomplete_ip_is_invalid() {
        let parsed = QueryParser::default().parse("10.1.1 act=block");
        assert!(!parsed.is_success());
        assert_eq!(parsed.invalid, vec!["10.1.1".to_string()]);
        assert!(parsed.raw_ip.is_none());
    }

    #[test]
    fn test_network_is_not_a_raw_probe() {
        let parsed = QueryParser::default().parse("10.1.1.0/24");
        assert!(!parsed.is_success());
        assert_eq!(parsed.invalid, vec!["10.1.1.0/24".to_string()]);
        assert!(parsed.raw_ip.is_none());
    }

    #[test]
    fn test_custom_field_set() {
        let parser = QueryParser::new(["src", "proto"]);
        let parsed = parser.parse("proto=tcp act=pass");
        assert_eq!(parsed.get("proto"), Some(&FieldQuery::new(Method::Equals, "tcp")));
        assert_eq!(parsed.invalid, vec!["act".to_string()]);
    }

    #[test]
    fn test_display_round_trips_terms() {
        let parsed = QueryParser::default().parse("act!=block desc+=web");
        assert_eq!(parsed.to_string(), "act!=block desc+=web");
    }

    #[test]
    fn test_complete_field_names() {
        let parser = QueryParser::default();
        assert_eq!(parser.complete("d"), vec!["desc", "dst"]);
        assert_eq!(parser.complete("").len(), 6);
    }
}
