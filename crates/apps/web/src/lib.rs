use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use catalog::{CachedCatalogListing, CatalogResolver};
use routing::{
    CatalogRouteHandler, Collaborators, HistoryPort, Mode, RouteTable, RouterConfig, UnifiedRouter,
    UnifiedStateManager,
};
use runtime::{ReadinessWaiter, Timer};
use serde::Deserialize;
use tracing::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

pub mod bridge;
pub mod events;
pub mod history;
pub mod logging;
pub mod remote;

use bridge::{JsBridge, JsCatalogBrowser, JsItemView, JsMap, JsNotifier, JsSearch, JsSettings};
use history::BrowserHistory;
use remote::{RemoteCatalogListing, RemoteItemFetcher};

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_SET: OnceLock<()> = OnceLock::new();

fn init_panic_hook() {
    PANIC_HOOK_SET.get_or_init(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = info.to_string();
            web_sys::console::error_1(&JsValue::from_str(&msg));
        }));
    });
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    init_panic_hook();
    Ok(())
}

/// Options the page passes to [`ExplorerApp::new`] as JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebConfig {
    pub router: RouterConfig,
    pub catalogs_url: String,
    pub log_level: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            catalogs_url: "/api/catalogs".to_string(),
            log_level: None,
        }
    }
}

impl WebConfig {
    pub fn from_json(raw: Option<&str>) -> Result<Self, String> {
        let config: WebConfig = match raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => serde_json::from_str(raw).map_err(|e| e.to_string())?,
            None => WebConfig::default(),
        };
        config.router.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

#[cfg(target_arch = "wasm32")]
fn event_loop_timer() -> Rc<dyn Timer> {
    Rc::new(runtime::BrowserTimer)
}

#[cfg(not(target_arch = "wasm32"))]
fn event_loop_timer() -> Rc<dyn Timer> {
    Rc::new(runtime::TokioTimer)
}

struct Inner {
    ports: Rc<Collaborators>,
    manager: Rc<UnifiedStateManager>,
    router: Rc<UnifiedRouter>,
    history: Rc<BrowserHistory>,
    popstate: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>>,
}

/// The explorer's routing core, driven from the page.
///
/// Widgets register themselves with the `register_*` methods whenever they
/// finish loading; routing waits for them. Widget events come in through
/// [`ExplorerApp::emit`].
#[wasm_bindgen]
pub struct ExplorerApp {
    inner: Rc<Inner>,
}

#[wasm_bindgen]
impl ExplorerApp {
    /// `notifier` is an object with a `notify(level, message)` method, or
    /// `null` to log notices only.
    #[wasm_bindgen(constructor)]
    pub fn new(notifier: JsValue, config_json: Option<String>) -> Result<ExplorerApp, JsValue> {
        let config = WebConfig::from_json(config_json.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        logging::init(logging::parse_level(config.log_level.as_deref()));

        let ports = if notifier.is_null() || notifier.is_undefined() {
            Rc::new(Collaborators::default())
        } else {
            let bridge = JsBridge::new("notifier", notifier)?;
            Rc::new(Collaborators::new(Rc::new(JsNotifier(bridge))))
        };
        ports.fetcher.set(Rc::new(RemoteItemFetcher));

        let listing = CachedCatalogListing::new(RemoteCatalogListing::new(config.catalogs_url.clone()));
        let resolver = Rc::new(CatalogResolver::new(Rc::new(listing)));
        let waiter = ReadinessWaiter::new(event_loop_timer())
            .with_defaults(config.router.poll_interval(), config.router.ready_timeout());
        let manager = Rc::new(UnifiedStateManager::new(
            ports.clone(),
            resolver.clone(),
            waiter,
            config.router.clone(),
        ));
        let handler = Rc::new(CatalogRouteHandler::new(manager.clone(), resolver));
        let history = Rc::new(BrowserHistory::new()?);
        let router = UnifiedRouter::new(
            RouteTable::new(config.router.base()),
            history.clone(),
            manager.clone(),
            handler,
        );
        info!(base = %config.router.base_path, "explorer created");

        Ok(ExplorerApp {
            inner: Rc::new(Inner {
                ports,
                manager,
                router,
                history,
                popstate: RefCell::new(None),
            }),
        })
    }

    /// Applies the URL the page was loaded with and starts following
    /// back/forward navigation.
    pub fn start(&self) -> Result<(), JsValue> {
        self.install_popstate()?;
        let router = self.inner.router.clone();
        spawn_local(async move {
            router.start().await;
        });
        Ok(())
    }

    /// In-app link: pushes `url` and applies it.
    pub fn navigate(&self, url: String) {
        let router = self.inner.router.clone();
        spawn_local(async move {
            router.navigate(&url).await;
        });
    }

    /// Forwards a widget event (see [`events::parse_event`] for the kinds).
    pub fn emit(&self, kind: &str, payload: &str) -> Result<(), JsValue> {
        let event = events::parse_event(kind, payload).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.inner.manager.handle_event(event);
        Ok(())
    }

    pub fn set_mode(&self, mode: &str) -> Result<(), JsValue> {
        let mode = Mode::parse(mode).ok_or_else(|| JsValue::from_str(&format!("unknown mode `{mode}`")))?;
        self.inner.manager.set_mode(mode);
        Ok(())
    }

    pub fn register_map(&self, target: JsValue) -> Result<(), JsValue> {
        self.inner.ports.map.set(Rc::new(JsMap(JsBridge::new("map", target)?)));
        debug!("map registered");
        Ok(())
    }

    pub fn register_search(&self, target: JsValue) -> Result<(), JsValue> {
        self.inner.ports.search.set(Rc::new(JsSearch(JsBridge::new("search", target)?)));
        debug!("search registered");
        Ok(())
    }

    pub fn register_browser(&self, target: JsValue) -> Result<(), JsValue> {
        let port = JsCatalogBrowser(JsBridge::new("browser", target)?);
        self.inner.ports.browser.set(Rc::new(port));
        debug!("catalog browser registered");
        Ok(())
    }

    pub fn register_item_view(&self, target: JsValue) -> Result<(), JsValue> {
        let port = JsItemView(JsBridge::new("item_view", target)?);
        self.inner.ports.item_view.set(Rc::new(port));
        debug!("item view registered");
        Ok(())
    }

    pub fn register_settings(&self, target: JsValue) -> Result<(), JsValue> {
        let port = JsSettings(JsBridge::new("settings", target)?);
        self.inner.ports.settings.set(Rc::new(port));
        Ok(())
    }

    /// The canonical state as JSON, for debugging panels.
    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.manager.snapshot()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn current_url(&self) -> String {
        self.inner.history.current().to_string()
    }
}

impl ExplorerApp {
    fn install_popstate(&self) -> Result<(), JsValue> {
        if self.inner.popstate.borrow().is_some() {
            return Ok(());
        }
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
            let Some(inner) = weak.upgrade() else {
                warn!("popstate after explorer was dropped");
                return;
            };
            let router = inner.router.clone();
            spawn_local(async move {
                router.on_popstate().await;
            });
        }));
        window.add_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref())?;
        *self.inner.popstate.borrow_mut() = Some(callback);
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let Some(callback) = self.popstate.get_mut().take() else {
            return;
        };
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref());
        }
    }
}
