//! Query evaluation over one rule set.

use std::net::IpAddr;

use tracing::debug;

use crate::compile::{EnrichedRule, RuleSet};
use crate::matcher::{match_direction, match_ports, match_text, parse_probe};
use crate::query::{FieldQuery, Method, ParsedQuery};

/// A rule surfaced by a query
#[derive(Debug, Clone, Copy)]
pub struct MatchedRule<'a> {
    /// Device the rule belongs to
    pub device: &'a str,
    /// 1-based position among this device's matches, in evaluation order
    pub sequence: usize,
    pub rule: &'a EnrichedRule,
}

/// Evaluates queries against a rule set in packet-filter order.
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine<'a> {
    rule_set: &'a RuleSet,
}

impl<'a> MatchEngine<'a> {
    pub fn new(rule_set: &'a RuleSet) -> Self {
        Self { rule_set }
    }

    /// Whether the probed source address is local to this device.
    ///
    /// The probe is the raw IP of the query, or else the `src` value.
    pub fn home_context(&self, query: &ParsedQuery) -> bool {
        let probe = query.raw_ip.or_else(|| {
            query
                .get("src")
                .and_then(|term| parse_probe(&term.value))
                .map(|network| network.addr())
        });
        probe.is_some_and(|ip| self.rule_set.is_home(ip))
    }

    /// Check one rule. Disabled rules never match; every field given in
    /// the query must hold.
    pub fn matches(&self, rule: &EnrichedRule, query: &ParsedQuery, home: bool) -> bool {
        if rule.rule.is_disabled() {
            return false;
        }
        if let Some(ip) = query.raw_ip {
            if !match_raw_ip(rule, ip, home) {
                return false;
            }
        }
        query.fields().all(|(field, term)| match term {
            Some(term) => self.match_field(rule, field, term, home),
            None => true,
        })
    }

    fn match_field(&self, rule: &EnrichedRule, field: &str, term: &FieldQuery, home: bool) -> bool {
        let term = Some(term);
        match field {
            "pf" => match_text(self.rule_set.name(), term),
            "act" => match_text(&rule.rule.rule_type, term),
            "desc" => match_text(&rule.rule.description, term),
            "src" => match_direction(&rule.source, term, !home),
            "dst" => match_direction(&rule.destination, term, false),
            "port" => match_ports(&rule.destination_ports, term),
            "proto" => match_text(&rule.rule.protocol, term),
            "gw" => match_text(&rule.rule.gateway, term),
            "if" => match_text(&rule.rule.interfaces.join(","), term),
            "tracker" => match_text(&rule.rule.tracker, term),
            other => {
                debug!(field = other, "field has no rule counterpart, ignoring");
                true
            }
        }
    }

    /// Every matching rule in evaluation order, numbered from 1.
    pub fn scan(&self, query: &ParsedQuery) -> Vec<MatchedRule<'a>> {
        let home = self.home_context(query);
        let mut matched = Vec::new();

        for rule in self.rule_set.in_precedence_order() {
            if self.matches(rule, query, home) {
                matched.push(MatchedRule {
                    device: self.rule_set.name(),
                    sequence: matched.len() + 1,
                    rule,
                });
            }
        }

        debug!(
            device = self.rule_set.name(),
            home,
            matched = matched.len(),
            "scan finished"
        );
        matched
    }
}

/// Raw IP lookup: the source contains the IP, or failing that the
/// destination does.
fn match_raw_ip(rule: &EnrichedRule, ip: IpAddr, home: bool) -> bool {
    let probe = FieldQuery::new(Method::Contains, ip.to_string());
    match_direction(&rule.source, Some(&probe), !home)
        || match_direction(&rule.destination, Some(&probe), false)
}
