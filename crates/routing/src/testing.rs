//! In-memory collaborators for router and state-manager tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use catalog::{CatalogDescriptor, CatalogEndpoint, CatalogResolver, StaticCatalogListing, builtin_catalogs};
use futures::future::LocalBoxFuture;
use runtime::{ReadinessWaiter, TokioTimer};

use crate::collaborators::*;
use crate::config::RouterConfig;
use crate::error::FetchError;
use crate::handlers::CatalogRouteHandler;
use crate::route_table::RouteTable;
use crate::router::UnifiedRouter;
use crate::state::{DateFilter, MapView, SearchLocation};
use crate::state_manager::UnifiedStateManager;

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
pub struct FakeHistory {
    url: RefCell<String>,
    pushes: RefCell<Vec<String>>,
    replaces: RefCell<Vec<String>>,
}

impl FakeHistory {
    pub fn new(url: &str) -> Self {
        Self {
            url: RefCell::new(url.to_string()),
            ..Default::default()
        }
    }

    pub fn url(&self) -> String {
        self.url.borrow().clone()
    }

    /// Moves the address bar without recording a write, like back/forward.
    pub fn go_back_to(&self, url: &str) {
        *self.url.borrow_mut() = url.to_string();
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.borrow().clone()
    }

    pub fn replaces(&self) -> Vec<String> {
        self.replaces.borrow().clone()
    }
}

impl HistoryPort for FakeHistory {
    fn current(&self) -> BrowserUrl {
        BrowserUrl::parse(&self.url.borrow())
    }

    fn push(&self, url: &str) {
        self.pushes.borrow_mut().push(url.to_string());
        *self.url.borrow_mut() = url.to_string();
    }

    fn replace(&self, url: &str) {
        self.replaces.borrow_mut().push(url.to_string());
        *self.url.borrow_mut() = url.to_string();
    }
}

pub struct FakeSearch {
    log: Log,
    pub ready: Cell<bool>,
    catalog: RefCell<Option<String>>,
    pub collections: RefCell<Vec<String>>,
    /// Polls of `collections_loaded` after `set_catalog` before it reports true.
    pub load_delay_polls: Cell<u32>,
    polls_left: Cell<u32>,
    loaded: Cell<bool>,
    collection: RefCell<Option<String>>,
    text: RefCell<Option<String>>,
    date: RefCell<DateFilter>,
    cloud_cover: Cell<Option<u8>>,
    location: RefCell<Option<SearchLocation>>,
    pub results_source: RefCell<Vec<StacItem>>,
    results: RefCell<Option<Vec<StacItem>>>,
    pub searches: Cell<u32>,
}

impl FakeSearch {
    fn new(log: Log) -> Self {
        Self {
            log,
            ready: Cell::new(true),
            catalog: RefCell::new(None),
            collections: RefCell::new(vec!["sentinel-2-l2a".into(), "landsat-c2-l2".into()]),
            load_delay_polls: Cell::new(0),
            polls_left: Cell::new(0),
            loaded: Cell::new(true),
            collection: RefCell::new(None),
            text: RefCell::new(None),
            date: RefCell::new(DateFilter::Anytime),
            cloud_cover: Cell::new(None),
            location: RefCell::new(None),
            results_source: RefCell::new(Vec::new()),
            results: RefCell::new(None),
            searches: Cell::new(0),
        }
    }

    fn record(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

impl SearchPort for FakeSearch {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn set_catalog(&self, catalog: &CatalogDescriptor) {
        self.record(format!("search:catalog:{}", catalog.id));
        *self.catalog.borrow_mut() = Some(catalog.id.clone());
        self.loaded.set(false);
        self.polls_left.set(self.load_delay_polls.get());
    }

    fn selected_catalog(&self) -> Option<String> {
        self.catalog.borrow().clone()
    }

    fn collections_loaded(&self) -> bool {
        if !self.loaded.get() {
            match self.polls_left.get() {
                0 => self.loaded.set(true),
                n => self.polls_left.set(n - 1),
            }
        }
        self.loaded.get()
    }

    fn has_collection(&self, collection_id: &str) -> bool {
        self.loaded.get() && self.collections.borrow().iter().any(|c| c == collection_id)
    }

    fn select_collection(&self, collection_id: Option<&str>) {
        self.record(format!("search:collection:{}", collection_id.unwrap_or("-")));
        *self.collection.borrow_mut() = collection_id.map(str::to_string);
    }

    fn selected_collection(&self) -> Option<String> {
        self.collection.borrow().clone()
    }

    fn set_search_text(&self, text: Option<&str>) {
        if let Some(text) = text {
            self.record(format!("search:text:{text}"));
        }
        *self.text.borrow_mut() = text.map(str::to_string);
    }

    fn search_text(&self) -> Option<String> {
        self.text.borrow().clone()
    }

    fn set_date_filter(&self, filter: &DateFilter) {
        *self.date.borrow_mut() = filter.clone();
    }

    fn date_filter(&self) -> DateFilter {
        self.date.borrow().clone()
    }

    fn set_cloud_cover(&self, max: Option<u8>) {
        self.cloud_cover.set(max);
    }

    fn cloud_cover(&self) -> Option<u8> {
        self.cloud_cover.get()
    }

    fn set_location(&self, location: Option<&SearchLocation>) {
        *self.location.borrow_mut() = location.cloned();
    }

    fn location(&self) -> Option<SearchLocation> {
        self.location.borrow().clone()
    }

    fn execute_search(&self) -> LocalBoxFuture<'_, Result<Vec<StacItem>, FetchError>> {
        Box::pin(async move {
            self.record("search:execute".into());
            self.searches.set(self.searches.get() + 1);
            let items = self.results_source.borrow().clone();
            *self.results.borrow_mut() = Some(items.clone());
            Ok(items)
        })
    }

    fn has_results(&self) -> bool {
        self.results.borrow().is_some()
    }

    fn find_result(&self, item_id: &str) -> Option<StacItem> {
        self.results
            .borrow()
            .as_ref()
            .and_then(|items| items.iter().find(|i| i.id == item_id).cloned())
    }
}

pub struct FakeMap {
    log: Log,
    pub ready: Cell<bool>,
    viewport: Cell<Option<MapView>>,
}

impl MapPort for FakeMap {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn viewport(&self) -> Option<MapView> {
        self.viewport.get()
    }

    fn set_viewport(&self, view: &MapView) {
        self.log.borrow_mut().push("map:viewport".into());
        self.viewport.set(Some(*view));
    }

    fn show_location(&self, _location: &SearchLocation) {
        self.log.borrow_mut().push("map:location".into());
    }

    fn clear_location(&self) {
        self.log.borrow_mut().push("map:clear-location".into());
    }

    fn show_item(&self, item: &StacItem) {
        self.log.borrow_mut().push(format!("map:item:{}", item.id));
    }
}

pub struct FakeBrowser {
    log: Log,
    pub ready: Cell<bool>,
}

impl FakeBrowser {
    fn shown(&self, entry: String) -> LocalBoxFuture<'_, Result<(), FetchError>> {
        self.log.borrow_mut().push(entry);
        Box::pin(async { Ok(()) })
    }
}

impl CatalogBrowserPort for FakeBrowser {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn show_root(&self) {
        self.log.borrow_mut().push("browser:root".into());
    }

    fn show_catalog<'a>(&'a self, catalog: &'a CatalogDescriptor) -> LocalBoxFuture<'a, Result<(), FetchError>> {
        self.shown(format!("browser:catalog:{}", catalog.id))
    }

    fn show_collection<'a>(
        &'a self,
        catalog: &'a CatalogDescriptor,
        collection_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), FetchError>> {
        self.shown(format!("browser:collection:{}/{collection_id}", catalog.id))
    }

    fn show_item<'a>(
        &'a self,
        catalog: &'a CatalogDescriptor,
        collection_id: &'a str,
        item_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), FetchError>> {
        self.shown(format!("browser:item:{}/{collection_id}/{item_id}", catalog.id))
    }
}

pub struct FakeItemView {
    log: Log,
    pub ready: Cell<bool>,
}

impl ItemViewPort for FakeItemView {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn show_item(&self, item: &StacItem, asset_key: Option<&str>) {
        let entry = match asset_key {
            Some(asset) => format!("item-view:{}#{asset}", item.id),
            None => format!("item-view:{}", item.id),
        };
        self.log.borrow_mut().push(entry);
    }

    fn clear(&self) {
        self.log.borrow_mut().push("item-view:clear".into());
    }
}

pub struct FakeFetcher {
    log: Log,
    items: RefCell<BTreeMap<String, StacItem>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn add(&self, item: StacItem) {
        self.items.borrow_mut().insert(item.id.clone(), item);
    }
}

impl ItemFetcher for FakeFetcher {
    fn fetch_item<'a>(
        &'a self,
        _endpoint: &'a CatalogEndpoint,
        collection_id: &'a str,
        item_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<StacItem, FetchError>> {
        Box::pin(async move {
            let key = format!("{collection_id}/{item_id}");
            self.log.borrow_mut().push(format!("fetch:{key}"));
            self.calls.borrow_mut().push(key);
            self.items.borrow().get(item_id).cloned().ok_or(FetchError::NotFound)
        })
    }
}

#[derive(Default)]
pub struct FakeSettings {
    pub opened: Cell<u32>,
}

impl SettingsPort for FakeSettings {
    fn open(&self) {
        self.opened.set(self.opened.get() + 1);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: RefCell<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices.borrow().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.borrow_mut().push((level, message.to_string()));
    }
}

/// Fully wired router over fakes, using the built-in catalog list and a
/// tokio-backed timer (tests run with a paused clock).
pub struct Harness {
    log: Log,
    pub history: Rc<FakeHistory>,
    pub search: Rc<FakeSearch>,
    pub map: Rc<FakeMap>,
    pub browser: Rc<FakeBrowser>,
    pub item_view: Rc<FakeItemView>,
    pub fetcher: Rc<FakeFetcher>,
    pub settings: Rc<FakeSettings>,
    pub notifier: Rc<RecordingNotifier>,
    pub ports: Rc<Collaborators>,
    pub resolver: Rc<CatalogResolver>,
    pub manager: Rc<UnifiedStateManager>,
    pub router: Rc<UnifiedRouter>,
}

impl Harness {
    /// Every collaborator registered and ready.
    pub fn new(url: &str) -> Self {
        let h = Self::unbound(url);
        h.bind_all();
        h
    }

    /// Nothing registered yet.
    pub fn unbound(url: &str) -> Self {
        let log: Log = Rc::default();
        let notifier = Rc::new(RecordingNotifier::default());
        let ports = Rc::new(Collaborators::new(notifier.clone()));
        let config = RouterConfig::default();

        let catalogs = builtin_catalogs().unwrap();
        let resolver = Rc::new(CatalogResolver::new(Rc::new(StaticCatalogListing::new(catalogs))));
        let waiter = ReadinessWaiter::new(Rc::new(TokioTimer))
            .with_defaults(config.poll_interval(), config.ready_timeout());
        let manager = Rc::new(UnifiedStateManager::new(
            ports.clone(),
            resolver.clone(),
            waiter,
            config.clone(),
        ));
        let handler = Rc::new(CatalogRouteHandler::new(manager.clone(), resolver.clone()));
        let history = Rc::new(FakeHistory::new(url));
        let router = UnifiedRouter::new(
            RouteTable::new(config.base()),
            history.clone(),
            manager.clone(),
            handler,
        );

        Self {
            search: Rc::new(FakeSearch::new(log.clone())),
            map: Rc::new(FakeMap {
                log: log.clone(),
                ready: Cell::new(true),
                viewport: Cell::new(None),
            }),
            browser: Rc::new(FakeBrowser {
                log: log.clone(),
                ready: Cell::new(true),
            }),
            item_view: Rc::new(FakeItemView {
                log: log.clone(),
                ready: Cell::new(true),
            }),
            fetcher: Rc::new(FakeFetcher {
                log: log.clone(),
                items: RefCell::new(BTreeMap::new()),
                calls: RefCell::new(Vec::new()),
            }),
            settings: Rc::new(FakeSettings::default()),
            log,
            history,
            notifier,
            ports,
            resolver,
            manager,
            router,
        }
    }

    pub fn bind_all_but_fetcher(&self) {
        self.ports.search.set(self.search.clone());
        self.ports.map.set(self.map.clone());
        self.ports.browser.set(self.browser.clone());
        self.ports.item_view.set(self.item_view.clone());
        self.ports.settings.set(self.settings.clone());
    }

    pub fn bind_all(&self) {
        self.bind_all_but_fetcher();
        self.ports.fetcher.set(self.fetcher.clone());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}
