use routing::{BrowserUrl, HistoryPort};
use tracing::warn;
use wasm_bindgen::JsValue;
use web_sys::{History, Location};

use crate::bridge::describe;

/// History port over the window's `history` and `location`.
pub struct BrowserHistory {
    history: History,
    location: Location,
}

impl BrowserHistory {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        Ok(Self {
            history: window.history()?,
            location: window.location(),
        })
    }
}

impl HistoryPort for BrowserHistory {
    fn current(&self) -> BrowserUrl {
        let path = self.location.pathname().unwrap_or_else(|_| "/".to_string());
        let search = self.location.search().unwrap_or_default();
        BrowserUrl::parse(&format!("{path}{search}"))
    }

    fn push(&self, url: &str) {
        if let Err(err) = self.history.push_state_with_url(&JsValue::NULL, "", Some(url)) {
            warn!(url, error = %describe(&err), "pushState failed");
        }
    }

    fn replace(&self, url: &str) {
        if let Err(err) = self.history.replace_state_with_url(&JsValue::NULL, "", Some(url)) {
            warn!(url, error = %describe(&err), "replaceState failed");
        }
    }
}
