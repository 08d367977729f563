use std::collections::HashSet;

use crate::parser::Aliases;

/// Expands (possibly nested) aliases to their leaf tokens.
#[derive(Debug, Clone, Copy)]
pub struct AliasResolver<'a> {
    aliases: &'a Aliases,
}

impl<'a> AliasResolver<'a> {
    pub fn new(aliases: &'a Aliases) -> Self {
        Self { aliases }
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains(name)
    }

    /// Resolve a name to its leaves, depth-first, left to right.
    ///
    /// A name that is not an alias is its own leaf. An alias reached again
    /// while it is still being expanded (a cycle) is returned as a leaf, as
    /// is an alias without members, so the result is never empty.
    pub fn resolve_to_leaves(&self, name: &str) -> Vec<String> {
        let mut visiting = HashSet::new();
        self.resolve_inner(name, &mut visiting)
    }

    fn resolve_inner<'n>(&self, name: &'n str, visiting: &mut HashSet<&'n str>) -> Vec<String>
    where
        'a: 'n,
    {
        let Some(alias) = self.aliases.get(name) else {
            return vec![name.to_string()];
        };
        if alias.members.is_empty() || !visiting.insert(name) {
            return vec![name.to_string()];
        }

        let mut leaves = Vec::new();
        for member in &alias.members {
            leaves.extend(self.resolve_inner(member, visiting));
        }

        visiting.remove(name);
        leaves
    }
}
