use std::collections::HashMap;
use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::decode::decode;
use crate::error::{Result, TrackerError};
use crate::types::{Alias, Interface, Rule, ALIAS_SCHEMA, INTERFACE_SCHEMA, RULE_SCHEMA};

/// Ordered records with lookup by key.
///
/// Inserting an existing key replaces the record in place, so the position
/// of the first occurrence is kept and the content of the last one wins.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    fn insert(&mut self, key: String, item: T) {
        match self.index.get(&key) {
            Some(&pos) => self.items[pos] = item,
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(item);
            }
        }
    }

    fn push_unkeyed(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T> IntoIterator for &'a Registry<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> FromIterator<(String, T)> for Registry<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut registry = Registry::default();
        for (key, item) in iter {
            registry.insert(key, item);
        }
        registry
    }
}

/// Interfaces keyed by logical name
pub type Interfaces = Registry<Interface>;
/// Aliases keyed by alias name
pub type Aliases = Registry<Alias>;
/// Filter rules in document order, keyed by tracker id
pub type Filter = Registry<Rule>;

/// Raw content of one configuration document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub interfaces: Interfaces,
    pub aliases: Aliases,
    pub filter: Filter,
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn parse_interfaces(node: Node<'_, '_>) -> Interfaces {
    elements(node)
        .map(|child| {
            let interface = Interface::from_entity(decode(child, &INTERFACE_SCHEMA));
            (interface.name.clone(), interface)
        })
        .collect()
}

fn parse_aliases(node: Node<'_, '_>) -> Aliases {
    elements(node)
        .filter(|child| child.has_tag_name("alias"))
        .map(|child| {
            let alias = Alias::from_entity(decode(child, &ALIAS_SCHEMA));
            (alias.name.clone(), alias)
        })
        .collect()
}

fn parse_filter(node: Node<'_, '_>) -> Filter {
    let mut filter = Filter::default();
    for child in elements(node).filter(|child| child.has_tag_name("rule")) {
        let rule = Rule::from_entity(decode(child, &RULE_SCHEMA));
        if rule.has_tracker() {
            filter.insert(rule.tracker.clone(), rule);
        } else {
            filter.push_unkeyed(rule);
        }
    }
    filter
}

/// Parse a firewall configuration document.
///
/// Only the `interfaces`, `aliases` and `filter` sections are read; a missing
/// section yields an empty collection. A document that is not well-formed
/// XML is an error.
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    let document = Document::parse(text).map_err(|e| TrackerError::Document(e.to_string()))?;

    let mut parsed = ParsedDocument::default();
    for section in elements(document.root_element()) {
        match section.tag_name().name() {
            "interfaces" => parsed.interfaces = parse_interfaces(section),
            "aliases" => parsed.aliases = parse_aliases(section),
            "filter" => parsed.filter = parse_filter(section),
            _ => {}
        }
    }

    debug!(
        interfaces = parsed.interfaces.len(),
        aliases = parsed.aliases.len(),
        rules = parsed.filter.len(),
        "parsed configuration document"
    );
    Ok(parsed)
}

/// Parse a configuration document from a file.
pub fn parse_document_from_file(path: impl AsRef<Path>) -> Result<ParsedDocument> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        TrackerError::Document(format!(
            "Failed to read configuration file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_document(&text)
}
