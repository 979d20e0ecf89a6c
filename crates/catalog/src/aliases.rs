use std::collections::{BTreeMap, BTreeSet};

use crate::CatalogDescriptor;

/// Legacy catalog identifiers still found in shared links and bookmarks.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("copernicus", "cdse-stac"),
    ("earth-search", "earth-search-aws"),
    ("element84", "earth-search-aws"),
    ("planetary-computer", "microsoft-pc"),
    ("microsoft", "microsoft-pc"),
];

/// The one place legacy catalog ids are mapped to canonical ones, and back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    to_canonical: BTreeMap<String, String>,
    to_aliases: BTreeMap<String, BTreeSet<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (alias, canonical) in DEFAULT_ALIASES {
            table.insert(*alias, *canonical);
        }
        table
    }

    /// Records `alias -> canonical`.
    ///
    /// Returns `false` (and changes nothing) for self-aliases and for aliases
    /// that are already canonical ids in the table.
    pub fn insert(&mut self, alias: impl Into<String>, canonical: impl Into<String>) -> bool {
        let alias = alias.into();
        let canonical = canonical.into();
        if alias == canonical || self.to_aliases.contains_key(&alias) {
            return false;
        }

        if let Some(previous) = self.to_canonical.insert(alias.clone(), canonical.clone()) {
            if let Some(set) = self.to_aliases.get_mut(&previous) {
                set.remove(&alias);
                if set.is_empty() {
                    self.to_aliases.remove(&previous);
                }
            }
        }
        self.to_aliases.entry(canonical).or_default().insert(alias);
        true
    }

    /// Adds every alias declared on the given descriptors.
    pub fn merge_descriptors<'a>(&mut self, descriptors: impl IntoIterator<Item = &'a CatalogDescriptor>) {
        for d in descriptors {
            for alias in &d.legacy_aliases {
                self.insert(alias.as_str(), d.id.as_str());
            }
        }
    }

    pub fn canonical_of(&self, alias: &str) -> Option<&str> {
        self.to_canonical.get(alias).map(|s| s.as_str())
    }

    pub fn aliases_of(&self, canonical: &str) -> impl Iterator<Item = &str> {
        self.to_aliases
            .get(canonical)
            .into_iter()
            .flat_map(|set| set.iter().map(|s| s.as_str()))
    }

    /// Maps a legacy alias to its canonical id; anything else is returned as-is.
    pub fn canonicalize<'a>(&'a self, id: &'a str) -> &'a str {
        self.canonical_of(id).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.to_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_canonical.is_empty()
    }
}
