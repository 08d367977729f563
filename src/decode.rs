//! Schema-driven decoding of configuration elements.
//!
//! Every record kind in the configuration document (interfaces, aliases,
//! filter rules) is decoded by the same [`decode`] function, driven by an
//! [`EntitySchema`] describing which child tags are scalars, repeated groups
//! or flat key/value maps.

use std::collections::HashMap;

use roxmltree::Node;

/// Field layout of one record kind.
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    /// Scalar fields with the value used when the tag is absent
    pub scalars: &'static [(&'static str, &'static str)],
    /// Fields whose children accumulate as ordered `{tag, value}` entries
    pub groups: &'static [&'static str],
    /// Fields whose children accumulate as a `tag -> value` map
    pub maps: &'static [&'static str],
    /// Tag renames applied after `-` → `_` normalization
    pub renames: &'static [(&'static str, &'static str)],
}

/// One child of a group field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub tag: String,
    pub value: String,
}

/// Result of decoding one element against a schema.
#[derive(Debug, Clone, Default)]
pub struct DecodedEntity {
    /// Tag of the decoded element itself
    pub tag: String,
    scalars: HashMap<String, String>,
    groups: HashMap<String, Vec<GroupEntry>>,
    maps: HashMap<String, HashMap<String, String>>,
}

impl DecodedEntity {
    /// Value of a scalar field; empty when the schema does not declare it.
    pub fn scalar(&self, name: &str) -> &str {
        self.scalars.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn take_scalar(&mut self, name: &str) -> String {
        self.scalars.remove(name).unwrap_or_default()
    }

    pub fn take_group(&mut self, name: &str) -> Vec<GroupEntry> {
        self.groups.remove(name).unwrap_or_default()
    }

    pub fn take_map(&mut self, name: &str) -> HashMap<String, String> {
        self.maps.remove(name).unwrap_or_default()
    }
}

/// Normalize a tag name: `-` becomes `_`, then schema renames apply.
fn normalize_tag(tag: &str, renames: &[(&str, &str)]) -> String {
    let tag = tag.replace('-', "_");
    renames
        .iter()
        .find(|(from, _)| *from == tag)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(tag)
}

fn text_of(node: Node<'_, '_>) -> String {
    node.text().unwrap_or("").to_string()
}

/// Decode the immediate children of `node` according to `schema`.
///
/// Unknown child tags are ignored. A scalar tag that appears more than once
/// keeps its last value; group and map tags accumulate across occurrences.
pub fn decode(node: Node<'_, '_>, schema: &EntitySchema) -> DecodedEntity {
    let mut entity = DecodedEntity {
        tag: node.tag_name().name().to_string(),
        scalars: schema
            .scalars
            .iter()
            .map(|(name, default)| ((*name).to_string(), (*default).to_string()))
            .collect(),
        groups: schema
            .groups
            .iter()
            .map(|name| ((*name).to_string(), Vec::new()))
            .collect(),
        maps: schema
            .maps
            .iter()
            .map(|name| ((*name).to_string(), HashMap::new()))
            .collect(),
    };

    for child in node.children().filter(Node::is_element) {
        let name = normalize_tag(child.tag_name().name(), schema.renames);

        if let Some(slot) = entity.scalars.get_mut(&name) {
            *slot = text_of(child);
        } else if let Some(entries) = entity.groups.get_mut(&name) {
            entries.extend(child.children().filter(Node::is_element).map(|sub| {
                GroupEntry {
                    tag: sub.tag_name().name().to_string(),
                    value: text_of(sub),
                }
            }));
        } else if let Some(map) = entity.maps.get_mut(&name) {
            for sub in child.children().filter(Node::is_element) {
                map.insert(
                    normalize_tag(sub.tag_name().name(), schema.renames),
                    text_of(sub),
                );
            }
        }
    }

    entity
}
