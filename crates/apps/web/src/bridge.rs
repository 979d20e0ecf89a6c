//! Collaborator ports backed by JavaScript objects.
//!
//! Each widget registers a plain JS object; port calls become method calls on
//! it. Structured arguments and results cross the boundary as JSON.

use catalog::CatalogDescriptor;
use futures::future::LocalBoxFuture;
use js_sys::{Array, Function, JSON, Promise, Reflect};
use routing::{
    CatalogBrowserPort, DateFilter, FetchError, ItemViewPort, MapPort, MapView, NoticeLevel, Notifier,
    SearchLocation, SearchPort, SettingsPort, StacItem,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

/// A JS object whose methods are invoked by name.
#[derive(Clone)]
pub struct JsBridge {
    name: &'static str,
    target: JsValue,
}

impl JsBridge {
    pub fn new(name: &'static str, target: JsValue) -> Result<Self, JsValue> {
        if !target.is_object() {
            return Err(JsValue::from_str(&format!("{name}: expected an object")));
        }
        Ok(Self { name, target })
    }

    /// Calls `method`; a missing method or a thrown exception is logged and
    /// yields `None`.
    pub fn call(&self, method: &str, args: &[JsValue]) -> Option<JsValue> {
        let func = match Reflect::get(&self.target, &JsValue::from_str(method)) {
            Ok(value) if value.is_function() => value.unchecked_into::<Function>(),
            _ => {
                debug!(port = self.name, method, "method not provided");
                return None;
            }
        };
        let argv: Array = args.iter().collect();
        match func.apply(&self.target, &argv) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(port = self.name, method, error = %describe(&err), "port call threw");
                None
            }
        }
    }

    pub fn call_bool(&self, method: &str, args: &[JsValue]) -> bool {
        self.call(method, args).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn call_string(&self, method: &str) -> Option<String> {
        self.call(method, &[]).and_then(|v| v.as_string()).filter(|s| !s.is_empty())
    }

    /// Calls `method` and decodes its (JSON-compatible) result. `null` and
    /// `undefined` decode as `None`.
    pub fn call_json<T: DeserializeOwned>(&self, method: &str, args: &[JsValue]) -> Option<T> {
        let value = self.call(method, args)?;
        if value.is_null() || value.is_undefined() {
            return None;
        }
        match from_js(&value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(port = self.name, method, %err, "unexpected result shape");
                None
            }
        }
    }

    /// Calls a method that returns a promise (or a plain value) and awaits it.
    pub async fn call_async(&self, method: &str, args: &[JsValue]) -> Result<JsValue, FetchError> {
        let value = self
            .call(method, args)
            .ok_or_else(|| FetchError::Network(format!("{}.{method} unavailable", self.name)))?;
        if !value.has_type::<Promise>() {
            return Ok(value);
        }
        JsFuture::from(value.unchecked_into::<Promise>())
            .await
            .map_err(|err| FetchError::Network(describe(&err)))
    }
}

pub fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|text| JSON::parse(&text).ok())
        .unwrap_or(JsValue::NULL)
}

pub fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, FetchError> {
    let text: String = JSON::stringify(value)
        .map_err(|err| FetchError::Parse(describe(&err)))?
        .into();
    serde_json::from_str(&text).map_err(|e| FetchError::Parse(e.to_string()))
}

fn opt_str(value: Option<&str>) -> JsValue {
    value.map(JsValue::from_str).unwrap_or(JsValue::NULL)
}

pub fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

pub struct JsMap(pub JsBridge);

impl MapPort for JsMap {
    fn is_ready(&self) -> bool {
        self.0.call_bool("isReady", &[])
    }

    fn viewport(&self) -> Option<MapView> {
        self.0.call_json("viewport", &[])
    }

    fn set_viewport(&self, view: &MapView) {
        self.0.call("setViewport", &[to_js(view)]);
    }

    fn show_location(&self, location: &SearchLocation) {
        self.0.call("showLocation", &[to_js(location)]);
    }

    fn clear_location(&self) {
        self.0.call("clearLocation", &[]);
    }

    fn show_item(&self, item: &StacItem) {
        self.0.call("showItem", &[to_js(item)]);
    }
}

pub struct JsSearch(pub JsBridge);

impl SearchPort for JsSearch {
    fn is_ready(&self) -> bool {
        self.0.call_bool("isReady", &[])
    }

    fn set_catalog(&self, catalog: &CatalogDescriptor) {
        self.0.call("setCatalog", &[to_js(catalog)]);
    }

    fn selected_catalog(&self) -> Option<String> {
        self.0.call_string("selectedCatalog")
    }

    fn collections_loaded(&self) -> bool {
        self.0.call_bool("collectionsLoaded", &[])
    }

    fn has_collection(&self, collection_id: &str) -> bool {
        self.0.call_bool("hasCollection", &[JsValue::from_str(collection_id)])
    }

    fn select_collection(&self, collection_id: Option<&str>) {
        self.0.call("selectCollection", &[opt_str(collection_id)]);
    }

    fn selected_collection(&self) -> Option<String> {
        self.0.call_string("selectedCollection")
    }

    fn set_search_text(&self, text: Option<&str>) {
        self.0.call("setSearchText", &[opt_str(text)]);
    }

    fn search_text(&self) -> Option<String> {
        self.0.call_string("searchText")
    }

    fn set_date_filter(&self, filter: &DateFilter) {
        self.0.call("setDateFilter", &[to_js(filter)]);
    }

    fn date_filter(&self) -> DateFilter {
        self.0.call_json("dateFilter", &[]).unwrap_or_default()
    }

    fn set_cloud_cover(&self, max: Option<u8>) {
        let value = max.map(JsValue::from).unwrap_or(JsValue::NULL);
        self.0.call("setCloudCover", &[value]);
    }

    fn cloud_cover(&self) -> Option<u8> {
        self.0
            .call("cloudCover", &[])
            .and_then(|v| v.as_f64())
            .filter(|v| (0.0..=100.0).contains(v))
            .map(|v| v.round() as u8)
    }

    fn set_location(&self, location: Option<&SearchLocation>) {
        let value = location.map(to_js).unwrap_or(JsValue::NULL);
        self.0.call("setLocation", &[value]);
    }

    fn location(&self) -> Option<SearchLocation> {
        self.0.call_json("location", &[])
    }

    fn execute_search(&self) -> LocalBoxFuture<'_, Result<Vec<StacItem>, FetchError>> {
        Box::pin(async move {
            let value = self.0.call_async("executeSearch", &[]).await?;
            if value.is_null() || value.is_undefined() {
                return Ok(Vec::new());
            }
            from_js(&value)
        })
    }

    fn has_results(&self) -> bool {
        self.0.call_bool("hasResults", &[])
    }

    fn find_result(&self, item_id: &str) -> Option<StacItem> {
        self.0.call_json("findResult", &[JsValue::from_str(item_id)])
    }
}

pub struct JsCatalogBrowser(pub JsBridge);

impl JsCatalogBrowser {
    async fn show(&self, method: &str, args: &[JsValue]) -> Result<(), FetchError> {
        self.0.call_async(method, args).await.map(|_| ())
    }
}

impl CatalogBrowserPort for JsCatalogBrowser {
    fn is_ready(&self) -> bool {
        self.0.call_bool("isReady", &[])
    }

    fn show_root(&self) {
        self.0.call("showRoot", &[]);
    }

    fn show_catalog<'a>(&'a self, catalog: &'a CatalogDescriptor) -> LocalBoxFuture<'a, Result<(), FetchError>> {
        Box::pin(async move { self.show("showCatalog", &[to_js(catalog)]).await })
    }

    fn show_collection<'a>(
        &'a self,
        catalog: &'a CatalogDescriptor,
        collection_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), FetchError>> {
        Box::pin(async move {
            self.show("showCollection", &[to_js(catalog), JsValue::from_str(collection_id)])
                .await
        })
    }

    fn show_item<'a>(
        &'a self,
        catalog: &'a CatalogDescriptor,
        collection_id: &'a str,
        item_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<(), FetchError>> {
        Box::pin(async move {
            let args = [to_js(catalog), JsValue::from_str(collection_id), JsValue::from_str(item_id)];
            self.show("showItem", &args).await
        })
    }
}

pub struct JsItemView(pub JsBridge);

impl ItemViewPort for JsItemView {
    fn is_ready(&self) -> bool {
        self.0.call_bool("isReady", &[])
    }

    fn show_item(&self, item: &StacItem, asset_key: Option<&str>) {
        self.0.call("showItem", &[to_js(item), opt_str(asset_key)]);
    }

    fn clear(&self) {
        self.0.call("clear", &[]);
    }
}

pub struct JsSettings(pub JsBridge);

impl SettingsPort for JsSettings {
    fn open(&self) {
        self.0.call("open", &[]);
    }
}

/// Forwards notices to the page's toast area.
pub struct JsNotifier(pub JsBridge);

impl Notifier for JsNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        let level = to_js(&level);
        if self.0.call("notify", &[level, JsValue::from_str(message)]).is_none() {
            warn!(target: "notify", "{message}");
        }
    }
}
