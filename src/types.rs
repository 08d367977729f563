use std::collections::HashMap;
use std::net::IpAddr;

use chrono::DateTime;
use ipnet::IpNet;

use crate::decode::{DecodedEntity, EntitySchema, GroupEntry};
use crate::matcher::NetworkAddress;

pub(crate) const INTERFACE_SCHEMA: EntitySchema = EntitySchema {
    scalars: &[
        ("enable", "no"),
        ("ifname", ""),
        ("descr", ""),
        ("ipaddr", ""),
        ("subnet", ""),
        ("gateway", ""),
    ],
    groups: &[],
    maps: &[],
    renames: &[("if", "ifname")],
};

pub(crate) const ALIAS_SCHEMA: EntitySchema = EntitySchema {
    scalars: &[
        ("name", ""),
        ("type", ""),
        ("address", ""),
        ("descr", ""),
        ("detail", ""),
    ],
    groups: &[],
    maps: &[],
    renames: &[],
};

pub(crate) const RULE_SCHEMA: EntitySchema = EntitySchema {
    scalars: &[
        ("id", ""),
        ("tracker", "-"),
        ("type", "port forward"),
        ("interface", "all"),
        ("ipprotocol", ""),
        ("tag", ""),
        ("tagged", ""),
        ("direction", ""),
        ("floating", "no"),
        ("statetype", ""),
        ("os", ""),
        ("protocol", "any"),
        ("descr", ""),
        ("quick", ""),
        ("disabled", "no"),
        ("gateway", ""),
    ],
    groups: &["source", "destination"],
    maps: &["created", "updated"],
    renames: &[],
};

/// Firewall interface (`<interfaces><lan>...</lan></interfaces>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Logical name, the element tag (`wan`, `lan`, `opt1`)
    pub name: String,
    /// Physical interface (`em0`, `igb1.20`)
    pub ifname: String,
    pub enabled: bool,
    pub description: String,
    pub ipaddr: String,
    pub subnet: String,
    pub gateway: String,
    /// Static network of the interface, when `ipaddr`/`subnet` form a valid CIDR
    pub cidr: Option<IpNet>,
}

impl Interface {
    pub(crate) fn from_entity(mut entity: DecodedEntity) -> Self {
        let ipaddr = entity.take_scalar("ipaddr");
        let subnet = entity.take_scalar("subnet");
        let cidr = if ipaddr.is_empty() || subnet.is_empty() {
            None
        } else {
            format!("{ipaddr}/{subnet}").parse::<IpNet>().ok()
        };

        Self {
            // `<enable/>` is a presence flag
            enabled: entity.scalar("enable") != "no",
            ifname: entity.take_scalar("ifname"),
            description: entity.take_scalar("descr"),
            gateway: entity.take_scalar("gateway"),
            name: entity.tag,
            ipaddr,
            subnet,
            cidr,
        }
    }

    /// Interface address as a host, when statically configured
    pub fn address(&self) -> Option<IpAddr> {
        self.cidr.map(|net| net.addr())
    }

    /// Human-readable label: description plus ` (ip/subnet)` when known
    pub fn label(&self) -> String {
        let name = if self.description.is_empty() {
            self.name.to_uppercase()
        } else {
            self.description.clone()
        };
        match self.cidr {
            Some(net) => format!("{name} ({net})"),
            None => name,
        }
    }
}

/// Named address/port group (`<aliases><alias>...</alias></aliases>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    /// `host`, `network`, `port`, `url`, ...
    pub kind: String,
    /// Member tokens; may name other aliases
    pub members: Vec<String>,
    pub description: String,
    pub detail: String,
}

impl Alias {
    pub(crate) fn from_entity(mut entity: DecodedEntity) -> Self {
        let members = entity
            .take_scalar("address")
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self {
            name: entity.take_scalar("name"),
            kind: entity.take_scalar("type"),
            members,
            description: entity.take_scalar("descr"),
            detail: entity.take_scalar("detail"),
        }
    }
}

/// Kind of one source/destination entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionKind {
    /// Literal address or alias name
    Address,
    /// Interface network (`lan`, `wanip`, `(self)`)
    Network,
    Any,
    /// Inverts the whole side
    Not,
    /// Port, port range or port alias
    Port,
    Other(String),
}

impl DirectionKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "address" => DirectionKind::Address,
            "network" => DirectionKind::Network,
            "any" => DirectionKind::Any,
            "not" => DirectionKind::Not,
            "port" => DirectionKind::Port,
            other => DirectionKind::Other(other.to_string()),
        }
    }
}

/// Raw source/destination entry as written in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionEntry {
    pub kind: DirectionKind,
    pub value: String,
}

impl From<GroupEntry> for DirectionEntry {
    fn from(entry: GroupEntry) -> Self {
        Self {
            kind: DirectionKind::from_tag(&entry.tag),
            value: entry.value,
        }
    }
}

/// Which side of a rule a direction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

/// Who changed a rule and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStamp {
    /// Unix epoch seconds
    pub time: i64,
    pub username: String,
}

impl UserStamp {
    fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let time = map.get("time")?.trim().parse().ok()?;
        let username = map.get("username")?.clone();
        Some(Self { time, username })
    }

    /// `dd.mm.YYYY HH:MM by user` in UTC, without auth-backend suffixes
    pub fn label(&self) -> String {
        let mut username = self.username.clone();
        for suffix in [" (Local Database)", " (LDAP/active directory)"] {
            username = username.replace(suffix, "");
        }
        match DateTime::from_timestamp(self.time, 0) {
            Some(at) => format!("{} by {}", at.format("%d.%m.%Y %H:%M"), username),
            None => format!("{} by {}", self.time, username),
        }
    }
}

/// Packet-filter rule (`<filter><rule>...</rule></filter>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    /// Stable identifier surviving reordering
    pub tracker: String,
    /// `pass`, `block`, `reject`
    pub rule_type: String,
    /// Interfaces the rule is bound to (several for floating rules)
    pub interfaces: Vec<String>,
    pub ipprotocol: String,
    pub tag: String,
    pub tagged: String,
    pub direction: String,
    pub floating: String,
    pub quick: String,
    pub statetype: String,
    pub os: String,
    pub protocol: String,
    pub description: String,
    pub disabled: String,
    pub gateway: String,
    pub source: Vec<DirectionEntry>,
    pub destination: Vec<DirectionEntry>,
    pub created: Option<UserStamp>,
    pub updated: Option<UserStamp>,
}

impl Rule {
    pub(crate) fn from_entity(mut entity: DecodedEntity) -> Self {
        let interfaces = entity
            .take_scalar("interface")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            id: entity.take_scalar("id"),
            tracker: entity.take_scalar("tracker"),
            rule_type: entity.take_scalar("type"),
            interfaces,
            ipprotocol: entity.take_scalar("ipprotocol"),
            tag: entity.take_scalar("tag"),
            tagged: entity.take_scalar("tagged"),
            direction: entity.take_scalar("direction"),
            floating: entity.take_scalar("floating"),
            quick: entity.take_scalar("quick"),
            statetype: entity.take_scalar("statetype"),
            os: entity.take_scalar("os"),
            protocol: entity.take_scalar("protocol"),
            description: entity.take_scalar("descr"),
            disabled: entity.take_scalar("disabled"),
            gateway: entity.take_scalar("gateway"),
            source: entity.take_group("source").into_iter().map(Into::into).collect(),
            destination: entity
                .take_group("destination")
                .into_iter()
                .map(Into::into)
                .collect(),
            created: UserStamp::from_map(&entity.take_map("created")),
            updated: UserStamp::from_map(&entity.take_map("updated")),
        }
    }

    pub fn is_floating(&self) -> bool {
        self.floating == "yes"
    }

    pub fn is_quick(&self) -> bool {
        !self.quick.is_empty()
    }

    /// `<disabled/>` (empty) or any value other than `no` disables the rule
    pub fn is_disabled(&self) -> bool {
        self.disabled != "no"
    }

    /// Whether a tracker id identifies this rule uniquely within its filter
    pub(crate) fn has_tracker(&self) -> bool {
        !self.tracker.is_empty() && self.tracker != "-"
    }
}

/// Source or destination of a rule resolved to concrete networks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDirection {
    pub inverse: bool,
    pub members: Vec<NetworkAddress>,
}
