mod network;

pub use network::{NetworkAddress, ANY_TOKEN, SELF_TOKEN};
pub(crate) use network::parse_probe;

use crate::query::{FieldQuery, Method};
use crate::types::ResolvedDirection;

/// Case-insensitive check of a text field. An absent query always matches.
pub fn match_text(field: &str, query: Option<&FieldQuery>) -> bool {
    let Some(query) = query else {
        return true;
    };
    let field = field.to_lowercase();
    let value = query.value.to_lowercase();
    match query.method {
        Method::Contains => field.contains(&value),
        Method::Equals => field == value,
        Method::NotEquals => field != value,
    }
}

/// Check a resolved source/destination against an address query.
///
/// With `skip_universal`, a `0.0.0.0/0` or `::/0` member never counts as a match.
/// The result is negated for inverse (`NOT`) directions.
pub fn match_direction(
    direction: &ResolvedDirection,
    query: Option<&FieldQuery>,
    skip_universal: bool,
) -> bool {
    let Some(query) = query else {
        return true;
    };

    let any_member = |test: fn(&NetworkAddress, &str) -> bool| {
        direction
            .members
            .iter()
            .filter(|member| !(skip_universal && member.is_universal()))
            .any(|member| test(member, &query.value))
    };

    let found = match query.method {
        Method::Contains => any_member(NetworkAddress::in_range),
        Method::Equals => any_member(NetworkAddress::exact_match),
        Method::NotEquals => !any_member(NetworkAddress::in_range),
    };

    found != direction.inverse
}

/// Check flattened destination ports.
///
/// A rule without port entries applies to every port, so it satisfies a
/// contains query.
pub fn match_ports(ports: &[String], query: Option<&FieldQuery>) -> bool {
    let Some(query) = query else {
        return true;
    };
    match query.method {
        Method::Contains => {
            ports.is_empty() || ports.iter().any(|port| port.contains(query.value.as_str()))
        }
        Method::Equals => ports.iter().any(|port| *port == query.value),
        Method::NotEquals => !ports.iter().any(|port| *port == query.value),
    }
}
