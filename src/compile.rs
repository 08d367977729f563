use std::fmt;
use std::net::IpAddr;

use tracing::debug;

use crate::error::Result;
use crate::parser::{parse_document, Aliases, Interfaces, ParsedDocument};
use crate::resolver::{AliasResolver, DirectionResolver};
use crate::types::{DirectionEntry, DirectionKind, ResolvedDirection, Rule, Side};

/// Evaluation slot of a rule; the packet filter walks slots in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// Floating rules with `quick` set
    FloatingQuick,
    /// Rules bound to an interface
    Interface,
    /// Floating rules without `quick`
    Floating,
}

/// Display form of a source or destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionLabel {
    pub inverse: bool,
    /// Alias name, interface label, literal address or `any`
    pub address: String,
    /// Resolved leaves when `address` names an alias
    pub address_leaves: Vec<String>,
    pub port: String,
    /// Resolved leaves when `port` names an alias
    pub port_leaves: Vec<String>,
}

impl fmt::Display for DirectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverse {
            f.write_str("NOT ")?;
        }
        f.write_str(&self.address)?;
        if !self.address.is_empty() && !self.port.is_empty() {
            f.write_str(" → ")?;
        }
        f.write_str(&self.port)
    }
}

/// Human-readable fields of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDisplay {
    /// `BLOCK`/`REJECT` upper-cased, other types verbatim
    pub action: String,
    /// `yes (quick)`, `yes`, `no`
    pub floating: String,
    pub interfaces: Vec<String>,
    pub source: DirectionLabel,
    pub destination: DirectionLabel,
    pub created: String,
    pub updated: String,
}

/// A rule together with everything derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRule {
    pub rule: Rule,
    pub display: RuleDisplay,
    pub source: ResolvedDirection,
    pub destination: ResolvedDirection,
    /// Destination ports with port aliases expanded
    pub destination_ports: Vec<String>,
}

impl EnrichedRule {
    pub fn precedence(&self) -> Precedence {
        match (self.rule.is_floating(), self.rule.is_quick()) {
            (true, true) => Precedence::FloatingQuick,
            (true, false) => Precedence::Floating,
            (false, _) => Precedence::Interface,
        }
    }

    /// True when the rule blocks or rejects traffic
    pub fn is_blocking(&self) -> bool {
        matches!(self.rule.rule_type.as_str(), "block" | "reject")
    }
}

/// Parsed and resolved configuration of one firewall
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    interfaces: Interfaces,
    aliases: Aliases,
    rules: Vec<EnrichedRule>,
}

impl RuleSet {
    /// Parse a configuration document for the device `name`.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        Ok(Self::from_document(name, parse_document(text)?))
    }

    /// Build the rule set, running the display and match enrichment passes
    /// over every rule before returning.
    pub fn from_document(name: impl Into<String>, document: ParsedDocument) -> Self {
        let ParsedDocument {
            interfaces,
            aliases,
            filter,
        } = document;
        let name = name.into();

        let rules: Vec<Rule> = filter.iter().cloned().collect();
        let resolver = DirectionResolver::new(&interfaces, &aliases);

        let displays: Vec<RuleDisplay> = rules
            .iter()
            .map(|rule| describe_rule(rule, &interfaces, resolver.aliases()))
            .collect();

        let resolved: Vec<_> = rules
            .iter()
            .map(|rule| {
                (
                    resolver.resolve(&rule.source, rule, Side::Source),
                    resolver.resolve(&rule.destination, rule, Side::Destination),
                    resolver.resolve_ports(&rule.destination),
                )
            })
            .collect();

        let rules: Vec<EnrichedRule> = rules
            .into_iter()
            .zip(displays)
            .zip(resolved)
            .map(
                |((rule, display), (source, destination, destination_ports))| EnrichedRule {
                    rule,
                    display,
                    source,
                    destination,
                    destination_ports,
                },
            )
            .collect();

        debug!(device = %name, rules = rules.len(), "rule set ready");

        Self {
            name,
            interfaces,
            aliases,
            rules,
        }
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interfaces(&self) -> &Interfaces {
        &self.interfaces
    }

    pub fn aliases(&self) -> &Aliases {
        &self.aliases
    }

    /// Rules in document order
    pub fn rules(&self) -> &[EnrichedRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, tracker: &str) -> Option<&EnrichedRule> {
        self.rules.iter().find(|rule| rule.rule.tracker == tracker)
    }

    /// Rules in evaluation order: floating quick, interface-bound, then
    /// floating non-quick, each group in document order. Disabled rules are
    /// included.
    pub fn in_precedence_order(&self) -> Vec<&EnrichedRule> {
        let mut ordered: Vec<&EnrichedRule> = self.rules.iter().collect();
        ordered.sort_by_key(|rule| rule.precedence());
        ordered
    }

    /// True if `ip` belongs to one of this device's interface networks
    pub fn is_home(&self, ip: IpAddr) -> bool {
        self.interfaces
            .iter()
            .filter_map(|interface| interface.cidr)
            .any(|network| network.contains(&ip))
    }
}

fn describe_rule(rule: &Rule, interfaces: &Interfaces, aliases: &AliasResolver<'_>) -> RuleDisplay {
    let action = match rule.rule_type.as_str() {
        "block" | "reject" => rule.rule_type.to_uppercase(),
        other => other.to_string(),
    };
    let floating = if rule.is_quick() {
        format!("{} (quick)", rule.floating)
    } else {
        rule.floating.clone()
    };

    RuleDisplay {
        action,
        floating,
        interfaces: rule
            .interfaces
            .iter()
            .map(|name| interface_label(name, interfaces))
            .collect(),
        source: describe_direction(&rule.source, interfaces, aliases),
        destination: describe_direction(&rule.destination, interfaces, aliases),
        created: rule.created.as_ref().map(|s| s.label()).unwrap_or_default(),
        updated: rule.updated.as_ref().map(|s| s.label()).unwrap_or_default(),
    }
}

fn interface_label(name: &str, interfaces: &Interfaces) -> String {
    interfaces
        .get(name)
        .map(|interface| interface.label())
        .unwrap_or_else(|| name.to_string())
}

fn alias_leaves(name: &str, aliases: &AliasResolver<'_>) -> Vec<String> {
    if aliases.is_alias(name) {
        aliases.resolve_to_leaves(name)
    } else {
        Vec::new()
    }
}

fn describe_direction(
    entries: &[DirectionEntry],
    interfaces: &Interfaces,
    aliases: &AliasResolver<'_>,
) -> DirectionLabel {
    let mut label = DirectionLabel::default();
    for entry in entries {
        match entry.kind {
            DirectionKind::Address => {
                label.address = entry.value.clone();
                label.address_leaves = alias_leaves(&entry.value, aliases);
            }
            DirectionKind::Network => {
                label.address = interface_label(&entry.value, interfaces);
                label.address_leaves.clear();
            }
            DirectionKind::Any => {
                label.address = "any".to_string();
                label.address_leaves.clear();
            }
            DirectionKind::Not => label.inverse = true,
            DirectionKind::Port => {
                label.port = entry.value.clone();
                label.port_leaves = alias_leaves(&entry.value, aliases);
            }
            DirectionKind::Other(_) => {}
        }
    }
    label
}
