use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub mod aliases;
pub mod listing;
pub mod resolver;

pub use aliases::AliasTable;
pub use listing::{CachedCatalogListing, CatalogListing, StaticCatalogListing};
pub use resolver::CatalogResolver;

const BUILTIN_CATALOGS_JSON: &str = include_str!("../catalogs.json");

/// A named source of collections and its live service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDescriptor {
    /// Canonical identifier, as used in current URLs.
    pub id: String,
    pub name: String,
    /// Older identifiers still accepted in URLs.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub legacy_aliases: BTreeSet<String>,
    pub endpoint: CatalogEndpoint,
}

impl CatalogDescriptor {
    pub fn api(id: impl Into<String>, name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            legacy_aliases: BTreeSet::new(),
            endpoint: CatalogEndpoint::api(root),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.legacy_aliases.insert(alias.into());
        self
    }

    /// True for the canonical id and every declared legacy alias.
    pub fn answers_to(&self, id: &str) -> bool {
        self.id == id || self.legacy_aliases.contains(id)
    }
}

/// Where a catalog lives.
///
/// API catalogs expose `/collections` and `/search` below their root; static
/// catalogs are a tree of JSON documents reachable from a single root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EndpointSpec", into = "EndpointSpec")]
pub enum CatalogEndpoint {
    Api {
        root: String,
        collections_url: String,
        search_url: String,
    },
    Static {
        root: String,
    },
}

impl CatalogEndpoint {
    pub fn api(root: impl Into<String>) -> Self {
        let root = root.into();
        let (collections_url, search_url) = derived_urls(&root);
        CatalogEndpoint::Api {
            root,
            collections_url,
            search_url,
        }
    }

    pub fn root(&self) -> &str {
        match self {
            CatalogEndpoint::Api { root, .. } | CatalogEndpoint::Static { root } => root,
        }
    }

    pub fn is_api(&self) -> bool {
        matches!(self, CatalogEndpoint::Api { .. })
    }

    /// `{collections}/{collection}/items/{item}` for API catalogs; both ids
    /// are percent-encoded as single path segments.
    pub fn item_url(&self, collection_id: &str, item_id: &str) -> Option<String> {
        match self {
            CatalogEndpoint::Api {
                collections_url, ..
            } => Some(format!(
                "{}/{}/items/{}",
                collections_url.trim_end_matches('/'),
                urlencoding::encode(collection_id),
                urlencoding::encode(item_id)
            )),
            CatalogEndpoint::Static { .. } => None,
        }
    }
}

fn derived_urls(root: &str) -> (String, String) {
    let base = root.trim_end_matches('/');
    (format!("{base}/collections"), format!("{base}/search"))
}

// Wire form: derived URLs are optional and filled in from the root.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EndpointSpec {
    Api {
        root: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collections_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_url: Option<String>,
    },
    Static {
        root: String,
    },
}

impl From<EndpointSpec> for CatalogEndpoint {
    fn from(spec: EndpointSpec) -> Self {
        match spec {
            EndpointSpec::Api {
                root,
                collections_url,
                search_url,
            } => {
                let (derived_collections, derived_search) = derived_urls(&root);
                CatalogEndpoint::Api {
                    root,
                    collections_url: collections_url.unwrap_or(derived_collections),
                    search_url: search_url.unwrap_or(derived_search),
                }
            }
            EndpointSpec::Static { root } => CatalogEndpoint::Static { root },
        }
    }
}

impl From<CatalogEndpoint> for EndpointSpec {
    fn from(endpoint: CatalogEndpoint) -> Self {
        match endpoint {
            CatalogEndpoint::Api {
                root,
                collections_url,
                search_url,
            } => EndpointSpec::Api {
                root,
                collections_url: Some(collections_url),
                search_url: Some(search_url),
            },
            CatalogEndpoint::Static { root } => EndpointSpec::Static { root },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog list not loaded yet")]
    NotLoaded,
    #[error("catalog list fetch failed: {0}")]
    Fetch(String),
    #[error("catalog list corrupt: {0}")]
    Corrupt(String),
}

/// Parses a JSON array of catalog descriptors.
pub fn parse_catalog_list(json: &str) -> Result<Vec<CatalogDescriptor>, CatalogError> {
    serde_json::from_str(json).map_err(|e| CatalogError::Corrupt(e.to_string()))
}

/// The catalog list shipped with the explorer.
pub fn builtin_catalogs() -> Result<Vec<CatalogDescriptor>, CatalogError> {
    parse_catalog_list(BUILTIN_CATALOGS_JSON)
}
