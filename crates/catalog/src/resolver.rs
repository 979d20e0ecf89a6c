use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::{AliasTable, CatalogDescriptor, CatalogListing};

/// Resolves logical catalog ids (canonical or legacy) to live descriptors.
///
/// Nothing is cached here; every call asks the listing, which may itself be
/// a [`crate::CachedCatalogListing`]. There are no retries: callers that must
/// tolerate a list that is still loading wait and call again.
///
/// Aliases declared by listed descriptors are merged into the alias table
/// whenever a list is obtained, so [`Self::canonical_id`] learns them too.
pub struct CatalogResolver {
    listing: Rc<dyn CatalogListing>,
    aliases: RefCell<AliasTable>,
}

impl CatalogResolver {
    pub fn new(listing: Rc<dyn CatalogListing>) -> Self {
        Self::with_aliases(listing, AliasTable::with_defaults())
    }

    pub fn with_aliases(listing: Rc<dyn CatalogListing>, aliases: AliasTable) -> Self {
        Self {
            listing,
            aliases: RefCell::new(aliases),
        }
    }

    pub fn aliases(&self) -> AliasTable {
        self.aliases.borrow().clone()
    }

    /// Synchronous id normalization for URL generation.
    pub fn canonical_id(&self, id: &str) -> String {
        self.aliases.borrow().canonicalize(id).to_string()
    }

    /// Order: canonical id, then legacy alias; `None` when neither matches or
    /// the list cannot be obtained.
    pub async fn resolve(&self, catalog_id: &str) -> Option<CatalogDescriptor> {
        let catalog_id = catalog_id.trim();
        if catalog_id.is_empty() {
            return None;
        }

        let list = match self.listing.catalogs().await {
            Ok(list) => list,
            Err(err) => {
                warn!(catalog_id, "catalog resolution failed: {err}");
                return None;
            }
        };
        self.aliases.borrow_mut().merge_descriptors(&list);

        let resolved = self.resolve_in(&list, catalog_id);
        match &resolved {
            Some(d) if d.id != catalog_id => {
                debug!(catalog_id, canonical = %d.id, "resolved legacy catalog alias")
            }
            Some(_) => {}
            None => debug!(catalog_id, "catalog not found"),
        }
        resolved
    }

    pub fn resolve_in(&self, list: &[CatalogDescriptor], catalog_id: &str) -> Option<CatalogDescriptor> {
        if let Some(d) = list.iter().find(|d| d.id == catalog_id) {
            return Some(d.clone());
        }
        if let Some(d) = list.iter().find(|d| d.answers_to(catalog_id)) {
            return Some(d.clone());
        }
        let aliases = self.aliases.borrow();
        if let Some(canonical) = aliases.canonical_of(catalog_id) {
            if let Some(d) = list.iter().find(|d| d.id == canonical) {
                return Some(d.clone());
            }
        }
        // A list that still publishes a catalog under its legacy id.
        aliases
            .aliases_of(catalog_id)
            .find_map(|alias| list.iter().find(|d| d.id == alias))
            .cloned()
    }
}
