use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use once_cell::sync::Lazy;
use tracing::debug;

/// Token the configuration uses for "every address"
pub const ANY_TOKEN: &str = "any";

/// Token produced for the firewall itself (`<network>(self)</network>`)
pub const SELF_TOKEN: &str = "interface-(self)";

static UNIVERSAL: Lazy<IpNet> = Lazy::new(|| {
    "0.0.0.0/0"
        .parse()
        .expect("UNIVERSAL: hardcoded network is invalid")
});

static LOOPBACK: Lazy<IpNet> = Lazy::new(|| {
    "127.0.0.1/32"
        .parse()
        .expect("LOOPBACK: hardcoded network is invalid")
});

/// Parse a probe given as a host (`10.0.0.1`) or a network (`10.0.0.0/24`).
pub(crate) fn parse_probe(probe: &str) -> Option<IpNet> {
    let probe = probe.trim();
    if probe.contains('/') {
        probe.parse::<IpNet>().ok()
    } else {
        probe.parse::<IpAddr>().ok().map(IpNet::from)
    }
}

/// A resolved network, or a token that could not be resolved to one.
///
/// Unresolved tokens (URL aliases, FQDNs, interfaces without a static
/// address) never match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkAddress {
    Network(IpNet),
    Symbol(String),
}

impl NetworkAddress {
    /// Build from a configuration token; never fails.
    pub fn parse(token: &str) -> Self {
        match token {
            ANY_TOKEN => NetworkAddress::Network(*UNIVERSAL),
            SELF_TOKEN => NetworkAddress::Network(*LOOPBACK),
            _ => match parse_probe(token) {
                Some(network) => NetworkAddress::Network(network),
                None => {
                    debug!(token, "unresolved network token kept as symbol");
                    NetworkAddress::Symbol(token.to_string())
                }
            },
        }
    }

    /// `0.0.0.0/0`
    pub fn universal() -> Self {
        NetworkAddress::Network(*UNIVERSAL)
    }

    pub fn network(&self) -> Option<IpNet> {
        match self {
            NetworkAddress::Network(network) => Some(*network),
            NetworkAddress::Symbol(_) => None,
        }
    }

    /// True for a zero-length prefix of either family (`0.0.0.0/0`, `::/0`)
    pub fn is_universal(&self) -> bool {
        self.network().is_some_and(|network| network.prefix_len() == 0)
    }

    /// True if the probe (host or network) lies within this network.
    pub fn in_range(&self, probe: &str) -> bool {
        let Some(network) = self.network() else {
            return false;
        };
        parse_probe(probe).is_some_and(|probe| network.contains(&probe))
    }

    /// True if the probe names this network exactly.
    ///
    /// A probe with a prefix length must cover the same range; a bare
    /// address is compared against the stored address only. `0.0.0.0`
    /// stands for `0.0.0.0/0`.
    pub fn exact_match(&self, probe: &str) -> bool {
        let Some(network) = self.network() else {
            return false;
        };
        let probe = probe.trim();
        if probe == "0.0.0.0" {
            return network == *UNIVERSAL;
        }
        if probe.contains('/') {
            probe
                .parse::<IpNet>()
                .is_ok_and(|probe| probe.trunc() == network.trunc())
        } else {
            probe
                .parse::<IpAddr>()
                .is_ok_and(|probe| probe == network.addr())
        }
    }
}

impl From<IpNet> for NetworkAddress {
    fn from(network: IpNet) -> Self {
        NetworkAddress::Network(network)
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkAddress::Network(network) => write!(f, "{network}"),
            NetworkAddress::Symbol(symbol) => f.write_str(symbol),
        }
    }
}
