use ipnet::IpNet;

use super::AliasResolver;
use crate::matcher::NetworkAddress;
use crate::parser::{Aliases, Interfaces};
use crate::types::{DirectionEntry, DirectionKind, ResolvedDirection, Rule, Side};

/// Resolves raw source/destination specs against interfaces and aliases.
#[derive(Debug, Clone, Copy)]
pub struct DirectionResolver<'a> {
    interfaces: &'a Interfaces,
    aliases: AliasResolver<'a>,
}

impl<'a> DirectionResolver<'a> {
    pub fn new(interfaces: &'a Interfaces, aliases: &'a Aliases) -> Self {
        Self {
            interfaces,
            aliases: AliasResolver::new(aliases),
        }
    }

    pub fn aliases(&self) -> &AliasResolver<'a> {
        &self.aliases
    }

    /// Resolve one side of `rule`.
    ///
    /// `any` as the source of an interface-bound rule means "anything behind
    /// the bound interfaces", not `0.0.0.0/0`.
    pub fn resolve(&self, entries: &[DirectionEntry], rule: &Rule, side: Side) -> ResolvedDirection {
        let mut resolved = ResolvedDirection::default();

        for entry in entries {
            match entry.kind {
                DirectionKind::Address => resolved.members.extend(
                    self.aliases
                        .resolve_to_leaves(&entry.value)
                        .iter()
                        .map(|leaf| NetworkAddress::parse(leaf)),
                ),
                DirectionKind::Network => resolved.members.push(self.interface_network(&entry.value)),
                DirectionKind::Any => {
                    if side == Side::Source && !rule.is_floating() && !rule.interfaces.is_empty() {
                        resolved.members.extend(rule.interfaces.iter().map(|name| {
                            match name.as_str() {
                                "all" | "any" => NetworkAddress::universal(),
                                _ => self.interface_network(name),
                            }
                        }));
                    } else {
                        resolved.members.push(NetworkAddress::universal());
                    }
                }
                DirectionKind::Not => resolved.inverse = true,
                DirectionKind::Port | DirectionKind::Other(_) => {}
            }
        }

        resolved
    }

    /// Network behind an interface token.
    ///
    /// `lan` is the interface subnet, `lanip` its address; anything else
    /// (`(self)`, interfaces without a static address) becomes an
    /// `interface-<token>` symbol.
    pub fn interface_network(&self, token: &str) -> NetworkAddress {
        if let Some(cidr) = self.interfaces.get(token).and_then(|i| i.cidr) {
            return NetworkAddress::Network(cidr);
        }
        let host = token
            .strip_suffix("ip")
            .and_then(|name| self.interfaces.get(name))
            .and_then(|interface| interface.address());
        match host {
            Some(address) => NetworkAddress::Network(IpNet::from(address)),
            None => NetworkAddress::parse(&format!("interface-{token}")),
        }
    }

    /// Destination port leaves with port aliases expanded
    pub fn resolve_ports(&self, entries: &[DirectionEntry]) -> Vec<String> {
        entries
            .iter()
            .filter(|entry| entry.kind == DirectionKind::Port)
            .flat_map(|entry| self.aliases.resolve_to_leaves(&entry.value))
            .collect()
    }
}
