use std::cell::RefCell;
use std::rc::Rc;

use catalog::{CatalogDescriptor, CatalogResolver};
use runtime::{EventBus, LateBound, ReadinessWaiter};
use tracing::{debug, error, info, trace, warn};

use crate::codec::StateCodec;
use crate::collaborators::{Collaborators, MapPort, NoticeLevel, SearchPort, StacItem};
use crate::config::RouterConfig;
use crate::error::RouteError;
use crate::guard::RouteToken;
use crate::query::QueryParams;
use crate::route_table::{Mode, RouteTable};
use crate::state::{ApplicationState, ChangeTrigger, Field, MapView, SearchLocation, StatePatch};

/// Inbound notifications from the widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ModeChanged(Mode),
    SearchParameterChanged(StatePatch),
    ItemActivated {
        item_id: Option<String>,
        asset_key: Option<String>,
        catalog_id: Option<String>,
        collection_id: Option<String>,
    },
    CollectionSelected {
        collection_id: Option<String>,
        catalog_id: Option<String>,
    },
    LocationSelected(Option<SearchLocation>),
    CatalogBrowserChanged {
        catalog_id: Option<String>,
        collection_id: Option<String>,
        item_id: Option<String>,
    },
    /// Some form field changed; its value is read back from the widgets.
    FormFieldChanged,
    ViewportChanged(MapView),
}

/// Published after every change of the canonical state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub trigger: ChangeTrigger,
    pub state: ApplicationState,
}

/// What a route application actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Canonical id of the catalog that was applied.
    pub catalog: Option<String>,
    pub collection_selected: bool,
    pub item_shown: bool,
    pub searched: bool,
    /// Collaborators that never became ready; their steps were skipped.
    pub skipped: Vec<&'static str>,
}

/// Owner of the canonical [`ApplicationState`].
///
/// Widget events are merged into the snapshot and published on
/// [`Self::changes`]. Route handlers call the `apply_*` methods, which push a
/// target state out to the widgets in a fixed order, waiting for late
/// collaborators and re-checking the route token after every suspension.
pub struct UnifiedStateManager {
    state: RefCell<ApplicationState>,
    changes: EventBus<StateChange>,
    ports: Rc<Collaborators>,
    resolver: Rc<CatalogResolver>,
    codec: StateCodec,
    waiter: ReadinessWaiter,
    config: RouterConfig,
}

impl UnifiedStateManager {
    pub fn new(
        ports: Rc<Collaborators>,
        resolver: Rc<CatalogResolver>,
        waiter: ReadinessWaiter,
        config: RouterConfig,
    ) -> Self {
        Self {
            state: RefCell::new(ApplicationState::default()),
            changes: EventBus::new(),
            ports,
            resolver,
            codec: StateCodec::new(RouteTable::new(config.base())),
            waiter,
            config,
        }
    }

    pub fn snapshot(&self) -> ApplicationState {
        self.state.borrow().clone()
    }

    pub fn changes(&self) -> &EventBus<StateChange> {
        &self.changes
    }

    pub fn ports(&self) -> &Rc<Collaborators> {
        &self.ports
    }

    pub fn resolver(&self) -> &Rc<CatalogResolver> {
        &self.resolver
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn notify(&self, level: NoticeLevel, message: &str) {
        self.ports.notifier.notify(level, message);
    }

    pub fn set_mode(&self, mode: Mode) {
        self.handle_event(AppEvent::ModeChanged(mode));
    }

    /// Merges a widget event into the snapshot; publishes only real changes.
    pub fn handle_event(&self, event: AppEvent) {
        trace!(?event, "app event");
        let (trigger, patch) = match event {
            AppEvent::ModeChanged(mode) => (
                ChangeTrigger::ModeChanged,
                StatePatch {
                    mode: Some(mode),
                    ..Default::default()
                },
            ),
            AppEvent::SearchParameterChanged(patch) => (ChangeTrigger::SearchParameter, patch),
            AppEvent::ItemActivated {
                item_id,
                asset_key,
                catalog_id,
                collection_id,
            } => (
                ChangeTrigger::ItemActivated,
                StatePatch {
                    catalog_id: Field::set_if_some(catalog_id),
                    collection_id: Field::set_if_some(collection_id),
                    active_item_id: Field::from_option(item_id),
                    active_asset_key: Field::from_option(asset_key),
                    ..Default::default()
                },
            ),
            AppEvent::CollectionSelected {
                collection_id,
                catalog_id,
            } => {
                let switched = self.state.borrow().collection_id != collection_id;
                let mut patch = StatePatch {
                    catalog_id: Field::set_if_some(catalog_id),
                    collection_id: Field::from_option(collection_id),
                    ..Default::default()
                };
                if switched {
                    patch.active_item_id = Field::Clear;
                    patch.active_asset_key = Field::Clear;
                }
                (ChangeTrigger::CollectionSelected, patch)
            }
            AppEvent::LocationSelected(location) => (
                ChangeTrigger::LocationSelected,
                StatePatch {
                    location: Field::from_option(location),
                    ..Default::default()
                },
            ),
            AppEvent::CatalogBrowserChanged {
                catalog_id,
                collection_id,
                item_id,
            } => (
                ChangeTrigger::BrowserState,
                StatePatch {
                    catalog_id: Field::from_option(catalog_id),
                    collection_id: Field::from_option(collection_id),
                    active_item_id: Field::from_option(item_id),
                    ..Default::default()
                },
            ),
            AppEvent::FormFieldChanged => {
                let captured = self.capture_current_state();
                self.update(ChangeTrigger::FormField, |state| *state = captured);
                return;
            }
            AppEvent::ViewportChanged(view) => (
                ChangeTrigger::Viewport,
                StatePatch {
                    map_view: Field::Set(view.rounded(self.config.viewport_decimals)),
                    ..Default::default()
                },
            ),
        };
        self.update(trigger, |state| {
            state.apply(patch);
            self.canonicalize_catalog(state);
        });
    }

    /// Widgets may still report a legacy catalog id; the snapshot (and so
    /// every URL written from it) only ever holds canonical ones.
    fn canonicalize_catalog(&self, state: &mut ApplicationState) {
        if let Some(id) = state.catalog_id.as_mut() {
            let canonical = self.resolver.canonical_id(id);
            if canonical != *id {
                trace!(legacy = %id, %canonical, "canonicalized catalog id");
                *id = canonical;
            }
        }
    }

    /// Reads the live widget values over the snapshot. Fields whose widget
    /// is not registered keep their snapshot value.
    pub fn capture_current_state(&self) -> ApplicationState {
        let mut state = self.snapshot();
        if let Some(search) = self.ports.search.get() {
            if let Some(catalog) = search.selected_catalog() {
                state.catalog_id = Some(catalog);
            }
            state.collection_id = search.selected_collection();
            state.search_text = search.search_text();
            state.date_filter = search.date_filter();
            state.cloud_cover_max = search.cloud_cover();
            state.location = search.location();
        }
        if let Some(view) = self.ports.map.get().and_then(|map| map.viewport()) {
            state.map_view = Some(view.rounded(self.config.viewport_decimals));
        }
        self.canonicalize_catalog(&mut state);
        state.canonicalized()
    }

    fn update(&self, trigger: ChangeTrigger, mutate: impl FnOnce(&mut ApplicationState)) {
        let changed = {
            let mut current = self.state.borrow_mut();
            let mut next = current.clone();
            mutate(&mut next);
            let next = next.canonicalized();
            if *current == next {
                None
            } else {
                *current = next.clone();
                Some(next)
            }
        };
        match changed {
            Some(state) => self.changes.emit(StateChange { trigger, state }),
            None => trace!(?trigger, "state unchanged"),
        }
    }

    /// Applies viewer-mode query parameters.
    pub async fn apply_from_url(&self, query: &QueryParams, token: &RouteToken) -> Result<ApplyReport, RouteError> {
        let target = self.codec.from_query(query);
        self.apply_state(target, None, token).await
    }

    /// Pushes a viewer-mode target state to the widgets.
    ///
    /// Order: catalog, its collection list, the collection, then the
    /// collection-dependent search fields, the map, the active item, and
    /// finally a search if any search filter is set. Missing collaborators
    /// degrade the result instead of failing it.
    pub async fn apply_state(
        &self,
        target: ApplicationState,
        catalog: Option<CatalogDescriptor>,
        token: &RouteToken,
    ) -> Result<ApplyReport, RouteError> {
        let mut target = ApplicationState {
            mode: Mode::View,
            ..target
        }
        .canonicalized();
        let mut report = ApplyReport::default();

        let catalog = match (catalog, target.catalog_id.clone()) {
            (Some(descriptor), _) => Some(descriptor),
            (None, Some(id)) => {
                let resolved = self.resolver.resolve(&id).await;
                token.ensure_current()?;
                if resolved.is_none() {
                    self.notify(NoticeLevel::Warning, &format!("Catalog \"{id}\" is not available"));
                }
                resolved
            }
            (None, None) => None,
        };
        target.catalog_id = catalog.as_ref().map(|d| d.id.clone());
        report.catalog = target.catalog_id.clone();
        self.update(ChangeTrigger::Navigation, |state| *state = target.clone());

        let Some(search) = self.acquire(&self.ports.search, |s| s.is_ready(), "search form").await else {
            token.ensure_current()?;
            report.skipped.push("search form");
            self.apply_map(&target, token, &mut report).await?;
            return Ok(report);
        };
        token.ensure_current()?;

        let interval = self.config.poll_interval();
        let collection_timeout = self.config.collection_timeout();

        if let Some(descriptor) = &catalog {
            if search.selected_catalog().as_deref() != Some(descriptor.id.as_str()) {
                search.set_catalog(descriptor);
            }
            let loaded = self
                .waiter
                .wait(|| search.collections_loaded(), interval, collection_timeout)
                .await;
            token.ensure_current()?;
            if !loaded.is_settled() {
                warn!(catalog = %descriptor.id, "collection list did not load in time");
            }
        }

        match target.collection_id.as_deref() {
            Some(collection_id) => {
                let found = if search.collections_loaded() {
                    search.has_collection(collection_id)
                } else {
                    let status = self
                        .waiter
                        .wait(|| search.has_collection(collection_id), interval, collection_timeout)
                        .await;
                    token.ensure_current()?;
                    status.is_settled()
                };
                if found {
                    search.select_collection(Some(collection_id));
                    report.collection_selected = true;
                } else {
                    self.notify(
                        NoticeLevel::Warning,
                        &format!("Collection \"{collection_id}\" was not found"),
                    );
                }
            }
            None => search.select_collection(None),
        }

        search.set_search_text(target.search_text.as_deref());
        search.set_date_filter(&target.date_filter);
        search.set_cloud_cover(target.cloud_cover_max);
        search.set_location(target.location.as_ref());

        let map = self.apply_map(&target, token, &mut report).await?;

        let mut searched = false;
        if let Some(item_id) = target.active_item_id.as_deref() {
            let item = self
                .locate_item(
                    &*search,
                    catalog.as_ref(),
                    target.collection_id.as_deref(),
                    item_id,
                    &mut searched,
                    token,
                )
                .await?;
            if let Some(item) = item {
                if let Some(map) = &map {
                    map.show_item(&item);
                }
                self.show_item_details(&item, target.active_asset_key.as_deref(), token, &mut report)
                    .await?;
                report.item_shown = true;
            }
        }

        if target.has_search_filters() && !searched {
            self.run_search(&*search, token).await?;
            searched = true;
        }
        report.searched = searched;
        debug!(?report, "state applied");
        Ok(report)
    }

    /// Browser mode: only the catalog hierarchy is applied; search fields
    /// keep their values for when the user returns to the viewer.
    pub async fn apply_browser(
        &self,
        target: ApplicationState,
        catalog: Option<CatalogDescriptor>,
        token: &RouteToken,
    ) -> Result<ApplyReport, RouteError> {
        let mut report = ApplyReport {
            catalog: catalog.as_ref().map(|d| d.id.clone()),
            ..Default::default()
        };
        let (collection_id, item_id) = match &catalog {
            Some(_) => (target.collection_id, target.active_item_id),
            None => (None, None),
        };
        let catalog_id = report.catalog.clone();
        {
            let (collection_id, item_id) = (collection_id.clone(), item_id.clone());
            self.update(ChangeTrigger::Navigation, move |state| {
                state.mode = Mode::Browser;
                state.catalog_id = catalog_id;
                state.collection_id = collection_id;
                state.active_item_id = item_id;
            });
        }

        let Some(browser) = self.acquire(&self.ports.browser, |b| b.is_ready(), "catalog browser").await else {
            token.ensure_current()?;
            report.skipped.push("catalog browser");
            self.notify(NoticeLevel::Warning, "Catalog browser is not available");
            return Ok(report);
        };
        token.ensure_current()?;

        let shown = match (&catalog, collection_id.as_deref(), item_id.as_deref()) {
            (None, ..) => {
                browser.show_root();
                Ok(())
            }
            (Some(d), None, _) => browser.show_catalog(d).await,
            (Some(d), Some(c), None) => browser.show_collection(d, c).await,
            (Some(d), Some(c), Some(i)) => browser.show_item(d, c, i).await,
        };
        token.ensure_current()?;

        match shown {
            Ok(()) => {
                report.collection_selected = collection_id.is_some();
                report.item_shown = item_id.is_some();
            }
            Err(err) => self.notify(NoticeLevel::Error, &format!("Catalog browser could not open this location: {err}")),
        }
        Ok(report)
    }

    pub async fn open_settings(&self, token: &RouteToken) -> Result<ApplyReport, RouteError> {
        let mut report = ApplyReport::default();
        let settings = self.acquire(&self.ports.settings, |_| true, "settings").await;
        token.ensure_current()?;
        match settings {
            Some(settings) => settings.open(),
            None => report.skipped.push("settings"),
        }
        Ok(report)
    }

    /// Waits for a collaborator to be registered and then report ready,
    /// both within the waiter's single deadline.
    async fn acquire<T: ?Sized>(
        &self,
        slot: &LateBound<T>,
        ready: impl Fn(&T) -> bool,
        name: &'static str,
    ) -> Option<Rc<T>> {
        if !slot.is_bound() {
            debug!(collaborator = name, "waiting for registration");
        }
        let status = self
            .waiter
            .wait_after_signal(
                slot.ready_signal(),
                || slot.get().is_some_and(|port| ready(&*port)),
                self.waiter.interval(),
                self.waiter.timeout(),
            )
            .await;
        if status.is_settled() {
            slot.get()
        } else {
            warn!(collaborator = name, "collaborator not ready; step skipped");
            None
        }
    }

    async fn apply_map(
        &self,
        target: &ApplicationState,
        token: &RouteToken,
        report: &mut ApplyReport,
    ) -> Result<Option<Rc<dyn MapPort>>, RouteError> {
        let map = self.acquire(&self.ports.map, |m| m.is_ready(), "map").await;
        token.ensure_current()?;
        let Some(map) = map else {
            report.skipped.push("map");
            return Ok(None);
        };
        match &target.location {
            Some(location) => map.show_location(location),
            None => map.clear_location(),
        }
        if let Some(view) = &target.map_view {
            map.set_viewport(view);
        }
        Ok(Some(map))
    }

    /// Direct fetch when catalog and collection are known, otherwise the
    /// item is looked up in the search results.
    async fn locate_item(
        &self,
        search: &dyn SearchPort,
        catalog: Option<&CatalogDescriptor>,
        collection_id: Option<&str>,
        item_id: &str,
        searched: &mut bool,
        token: &RouteToken,
    ) -> Result<Option<StacItem>, RouteError> {
        if let (Some(descriptor), Some(collection_id)) = (catalog, collection_id) {
            if descriptor.endpoint.is_api() {
                let Some(fetcher) = self.ports.fetcher.get() else {
                    error!(item_id, "no API client available; item not loaded");
                    return Err(RouteError::NoApiClient);
                };
                let fetched = fetcher
                    .fetch_item(&descriptor.endpoint, collection_id, item_id)
                    .await;
                token.ensure_current()?;
                return match fetched {
                    Ok(item) => Ok(Some(item)),
                    Err(source) => {
                        let err = RouteError::Item {
                            item_id: item_id.to_string(),
                            source,
                        };
                        warn!("{err}");
                        self.notify(NoticeLevel::Error, &format!("Item \"{item_id}\" could not be loaded"));
                        Ok(None)
                    }
                };
            }
        }

        if !search.has_results() {
            self.run_search(search, token).await?;
            *searched = true;
        }
        match search.find_result(item_id) {
            Some(item) => Ok(Some(item)),
            None => {
                info!(item_id, "item not in search results");
                self.notify(
                    NoticeLevel::Warning,
                    &format!("Item \"{item_id}\" was not found in the search results"),
                );
                Ok(None)
            }
        }
    }

    async fn show_item_details(
        &self,
        item: &StacItem,
        asset_key: Option<&str>,
        token: &RouteToken,
        report: &mut ApplyReport,
    ) -> Result<(), RouteError> {
        let view = self.acquire(&self.ports.item_view, |v| v.is_ready(), "item view").await;
        token.ensure_current()?;
        let asset_key = asset_key.filter(|key| {
            let known = item.has_asset(key);
            if !known {
                info!(item_id = %item.id, asset = *key, "linked asset not on item; showing item only");
            }
            known
        });
        match view {
            Some(view) => view.show_item(item, asset_key),
            None => report.skipped.push("item view"),
        }
        Ok(())
    }

    async fn run_search(&self, search: &dyn SearchPort, token: &RouteToken) -> Result<(), RouteError> {
        let result = search.execute_search().await;
        token.ensure_current()?;
        match result {
            Ok(items) => debug!(count = items.len(), "search finished"),
            Err(err) => self.notify(NoticeLevel::Error, &format!("Search failed: {err}")),
        }
        Ok(())
    }
}
