//! pf-rule-tracker - find the packet-filter rules that match given traffic
//!
//! This library evaluates a firewall's saved configuration document the
//! way the firewall itself does and reports which rules a lookup hits:
//! - Interface, alias and filter rule decoding
//! - Nested alias resolution with cycle protection
//! - Source/destination resolution to concrete networks
//! - Floating/interface rule precedence
//! - Free-text lookup queries and raw IP probes
//! - Text table, HTML and CSV reports
//! - Device inventories and cached configuration retrieval
//!
//! # Example
//!
//! ```rust
//! use pf_rule_tracker::{MatchEngine, QueryParser, RuleSet};
//!
//! let document = r#"<pfsense>
//!   <aliases>
//!     <alias><name>blocked_hosts</name><address>10.1.1.5 10.1.1.6</address></alias>
//!   </aliases>
//!   <filter>
//!     <rule>
//!       <tracker>100</tracker><type>block</type><interface>lan</interface>
//!       <floating>yes</floating><quick>yes</quick>
//!       <source><address>blocked_hosts</address></source>
//!       <destination><any/></destination>
//!     </rule>
//!   </filter>
//! </pfsense>"#;
//!
//! // Parse and resolve the configuration
//! let rule_set = RuleSet::parse("fw-edge", document).unwrap();
//!
//! // Look up a host
//! let query = QueryParser::default().parse("10.1.1.5");
//! let matches = MatchEngine::new(&rule_set).scan(&query);
//!
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].rule.display.action, "BLOCK");
//! ```
//!
//! # Query Syntax
//!
//! A query line is a whitespace-separated list of terms:
//! ```text
//! field[op]=value ... [ip]
//! ```
//!
//! | Term | Meaning |
//! |------|---------|
//! | `src+=10.0.0.5` | source contains the address |
//! | `src=10.0.0.0/24` | source names exactly this network |
//! | `act!=pass` | action differs from `pass` |
//! | `desc+=dns` | description contains `dns` (case-insensitive) |
//! | `10.1.1.5` | source or, failing that, destination contains the address |
//!
//! Default fields: `pf` (device), `act`, `desc`, `src`, `dst`, `port`.

pub mod compile;
pub mod decode;
pub mod device;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod query;
pub mod render;
pub mod resolver;
pub mod tracker;
pub mod types;

// Re-export commonly used items
pub use compile::{DirectionLabel, EnrichedRule, Precedence, RuleDisplay, RuleSet};
pub use engine::{MatchEngine, MatchedRule};
pub use error::{FetchErrorKind, Result, TrackerError};
pub use matcher::NetworkAddress;
pub use parser::{parse_document, parse_document_from_file, ParsedDocument};
pub use query::{FieldQuery, Method, ParsedQuery, QueryParser, DEFAULT_FIELDS};
pub use types::{Alias, DirectionEntry, DirectionKind, Interface, ResolvedDirection, Rule};

// Re-export collaborator types
pub use device::{
    CachedFetcher, ConfigFetcher, Device, DirectoryFetcher, HttpFetcher, InventoryProvider,
    JsonInventory, StaticInventory, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL,
};
pub use render::{to_csv, HtmlReport, MatchTable, ReportRow, RowState, REPORT_FIELDS};
pub use resolver::{AliasResolver, DirectionResolver};
pub use tracker::{Tracker, TrackerOptions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_workflow() {
        let document = r#"<?xml version="1.0"?>
<pfsense>
  <interfaces>
    <wan><if>em0</if><descr>WAN</descr><ipaddr>203.0.113.2</ipaddr><subnet>29</subnet></wan>
    <lan><if>em1</if><descr>LAN</descr><ipaddr>10.20.0.1</ipaddr><subnet>24</subnet></lan>
  </interfaces>
  <aliases>
    <alias><name>blocked_hosts</name><type>host</type><address>10.1.1.5 10.1.1.6</address></alias>
    <alias><name>web_ports</name><type>port</type><address>80 443</address></alias>
  </aliases>
  <filter>
    <rule>
      <tracker>300</tracker><type>pass</type><interface>lan</interface>
      <descr>LAN to web</descr>
      <source><network>lan</network></source>
      <destination><any/><port>web_ports</port></destination>
    </rule>
    <rule>
      <tracker>100</tracker><type>block</type><interface>wan,lan</interface>
      <floating>yes</floating><quick>yes</quick><descr>Blocklist</descr>
      <source><address>blocked_hosts</address></source>
      <destination><any/></destination>
    </rule>
    <rule>
      <tracker>500</tracker><type>pass</type><interface>wan</interface>
      <floating>yes</floating><descr>Late floating</descr>
      <source><any/></source>
      <destination><network>wanip</network></destination>
    </rule>
  </filter>
</pfsense>"#;

        // Parse and resolve
        let rule_set = RuleSet::parse("fw-edge", document).unwrap();
        assert_eq!(rule_set.rule_count(), 3);
        let engine = MatchEngine::new(&rule_set);
        let parser = QueryParser::default();

        // Raw IP: blocklist by source, then the LAN rule by its `any` destination
        let matches = engine.scan(&parser.parse("10.1.1.5"));
        let trackers: Vec<&str> = matches.iter().map(|m| m.rule.rule.tracker.as_str()).collect();
        assert_eq!(trackers, vec!["100", "300"]);
        assert_eq!(matches[0].sequence, 1);
        assert_eq!(matches[0].rule.display.action, "BLOCK");
        assert_eq!(matches[1].sequence, 2);

        // Host on the LAN going to the web
        let matches = engine.scan(&parser.parse("src+=10.20.0.50 port=443"));
        let trackers: Vec<&str> = matches.iter().map(|m| m.rule.rule.tracker.as_str()).collect();
        assert_eq!(trackers, vec!["300"]);

        // Traffic towards the WAN address
        let matches = engine.scan(&parser.parse("dst=203.0.113.2 act=pass"));
        let trackers: Vec<&str> = matches.iter().map(|m| m.rule.rule.tracker.as_str()).collect();
        assert_eq!(trackers, vec!["500"]);

        // Unknown field
        let parsed = parser.parse("proto=tcp");
        assert!(!parsed.is_success());
        assert_eq!(parsed.invalid, vec!["proto"]);

        // Reports
        let matches = engine.scan(&parser.parse(""));
        let table = MatchTable::from_matches(&matches).to_string();
        assert!(table.contains("| Blocklist "));
        let csv = to_csv(matches.iter().map(|m| m.rule));
        assert_eq!(csv.lines().count(), 4);
        let html = HtmlReport::new().render(matches.iter().map(|m| ReportRow::from(m.rule)));
        assert!(html.contains("<td>Late floating</td>"));
    }
}
