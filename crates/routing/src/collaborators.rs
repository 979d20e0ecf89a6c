//! Outbound ports: the widgets and services the router drives.
//!
//! All of them are registered late (see [`LateBound`]) and may report
//! themselves not ready for a while after registration. Calls are
//! single-threaded; async operations return local futures.

use std::collections::BTreeMap;
use std::rc::Rc;

use catalog::{CatalogDescriptor, CatalogEndpoint};
use futures::future::LocalBoxFuture;
use runtime::LateBound;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::FetchError;
use crate::state::{DateFilter, MapView, SearchLocation};

/// The subset of a STAC item the explorer needs to display it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub assets: BTreeMap<String, serde_json::Value>,
}

impl StacItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: None,
            bbox: None,
            geometry: None,
            properties: serde_json::Map::new(),
            assets: BTreeMap::new(),
        }
    }

    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn has_asset(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }
}

/// Address bar contents, split at the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserUrl {
    pub path: String,
    /// Empty or starting with `?`.
    pub query: String,
}

impl BrowserUrl {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.split('#').next().unwrap_or_default();
        match raw.split_once('?') {
            Some((path, query)) if !query.is_empty() => Self {
                path: path.to_string(),
                query: format!("?{query}"),
            },
            Some((path, _)) => Self {
                path: path.to_string(),
                query: String::new(),
            },
            None => Self {
                path: raw.to_string(),
                query: String::new(),
            },
        }
    }
}

impl std::fmt::Display for BrowserUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.path, self.query)
    }
}

pub trait HistoryPort {
    fn current(&self) -> BrowserUrl;
    fn push(&self, url: &str);
    fn replace(&self, url: &str);
}

pub trait MapPort {
    fn is_ready(&self) -> bool;
    fn viewport(&self) -> Option<MapView>;
    fn set_viewport(&self, view: &MapView);
    fn show_location(&self, location: &SearchLocation);
    fn clear_location(&self);
    fn show_item(&self, item: &StacItem);
}

/// The search form, its collection picker, and its result list.
pub trait SearchPort {
    fn is_ready(&self) -> bool;

    fn set_catalog(&self, catalog: &CatalogDescriptor);
    fn selected_catalog(&self) -> Option<String>;
    /// True once the collection list of the selected catalog has arrived.
    fn collections_loaded(&self) -> bool;
    fn has_collection(&self, collection_id: &str) -> bool;
    fn select_collection(&self, collection_id: Option<&str>);
    fn selected_collection(&self) -> Option<String>;

    fn set_search_text(&self, text: Option<&str>);
    fn search_text(&self) -> Option<String>;
    fn set_date_filter(&self, filter: &DateFilter);
    fn date_filter(&self) -> DateFilter;
    fn set_cloud_cover(&self, max: Option<u8>);
    fn cloud_cover(&self) -> Option<u8>;
    fn set_location(&self, location: Option<&SearchLocation>);
    fn location(&self) -> Option<SearchLocation>;

    fn execute_search(&self) -> LocalBoxFuture<'_, Result<Vec<StacItem>, FetchError>>;
    fn has_results(&self) -> bool;
    fn find_result(&self, item_id: &str) -> Option<StacItem>;
}

/// Hierarchical catalog browser shown in browser mode.
pub trait CatalogBrowserPort {
    fn is_ready(&self) -> bool;
    fn show_root(&self);
    fn show_catalog<'a>(&'a self, catalog: &'a CatalogDescriptor) -> LocalBoxFuture<'a, Result<(), FetchError>>;
    fn show_collection<'a>(
        &'a self,
        catalog: &'a CatalogDescriptor,
        collection_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), FetchError>>;
    fn show_item<'a>(
        &'a self,
        catalog: &'a CatalogDescriptor,
        collection_id: &'a str,
        item_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), FetchError>>;
}

/// Item detail panel.
pub trait ItemViewPort {
    fn is_ready(&self) -> bool;
    fn show_item(&self, item: &StacItem, asset_key: Option<&str>);
    fn clear(&self);
}

pub trait ItemFetcher {
    fn fetch_item<'a>(
        &'a self,
        endpoint: &'a CatalogEndpoint,
        collection_id: &'a str,
        item_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<StacItem, FetchError>>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible notifications ("Item not found", ...).
pub trait Notifier {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Default notifier: the log is the only surface.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!(target: "notify", "{message}"),
            NoticeLevel::Warning => warn!(target: "notify", "{message}"),
            NoticeLevel::Error => error!(target: "notify", "{message}"),
        }
    }
}

pub trait SettingsPort {
    fn open(&self);
}

/// Every outbound collaborator the state manager and handlers use.
pub struct Collaborators {
    pub map: LateBound<dyn MapPort>,
    pub search: LateBound<dyn SearchPort>,
    pub browser: LateBound<dyn CatalogBrowserPort>,
    pub item_view: LateBound<dyn ItemViewPort>,
    pub settings: LateBound<dyn SettingsPort>,
    pub fetcher: LateBound<dyn ItemFetcher>,
    pub notifier: Rc<dyn Notifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Rc::new(LogNotifier))
    }
}

impl Collaborators {
    pub fn new(notifier: Rc<dyn Notifier>) -> Self {
        Self {
            map: LateBound::new(),
            search: LateBound::new(),
            browser: LateBound::new(),
            item_view: LateBound::new(),
            settings: LateBound::new(),
            fetcher: LateBound::new(),
            notifier,
        }
    }
}
