//! Widget events as the page sends them: an event kind plus a JSON payload.

use routing::{AppEvent, DateFilter, Field, MapView, Mode, SearchLocation, StatePatch};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),
    #[error("invalid `{kind}` payload: {message}")]
    Payload { kind: String, message: String },
}

#[derive(Deserialize)]
struct ModePayload {
    mode: Mode,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ItemPayload {
    item_id: Option<String>,
    asset_key: Option<String>,
    catalog_id: Option<String>,
    collection_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CollectionPayload {
    collection_id: Option<String>,
    catalog_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LocationPayload {
    location: Option<SearchLocation>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct BrowserPayload {
    catalog_id: Option<String>,
    collection_id: Option<String>,
    item_id: Option<String>,
}

/// Decodes one event. An empty payload is read as `{}`.
///
/// Search-parameter payloads are partial: an absent key keeps the current
/// value, `null` clears it.
pub fn parse_event(kind: &str, payload: &str) -> Result<AppEvent, EventError> {
    let payload = if payload.trim().is_empty() { "{}" } else { payload };
    let event = match kind {
        "mode-changed" => AppEvent::ModeChanged(decode::<ModePayload>(kind, payload)?.mode),
        "search-parameter-changed" => AppEvent::SearchParameterChanged(search_patch(kind, payload)?),
        "item-activated" => {
            let p: ItemPayload = decode(kind, payload)?;
            AppEvent::ItemActivated {
                item_id: p.item_id,
                asset_key: p.asset_key,
                catalog_id: p.catalog_id,
                collection_id: p.collection_id,
            }
        }
        "collection-selected" => {
            let p: CollectionPayload = decode(kind, payload)?;
            AppEvent::CollectionSelected {
                collection_id: p.collection_id,
                catalog_id: p.catalog_id,
            }
        }
        "location-selected" => {
            AppEvent::LocationSelected(decode::<LocationPayload>(kind, payload)?.location)
        }
        "catalog-browser-changed" => {
            let p: BrowserPayload = decode(kind, payload)?;
            AppEvent::CatalogBrowserChanged {
                catalog_id: p.catalog_id,
                collection_id: p.collection_id,
                item_id: p.item_id,
            }
        }
        "form-field-changed" => AppEvent::FormFieldChanged,
        "viewport-changed" => AppEvent::ViewportChanged(decode::<MapView>(kind, payload)?),
        other => return Err(EventError::UnknownKind(other.to_string())),
    };
    Ok(event)
}

fn decode<T: DeserializeOwned>(kind: &str, payload: &str) -> Result<T, EventError> {
    serde_json::from_str(payload).map_err(|e| invalid(kind, e))
}

fn invalid(kind: &str, err: impl std::fmt::Display) -> EventError {
    EventError::Payload {
        kind: kind.to_string(),
        message: err.to_string(),
    }
}

fn search_patch(kind: &str, payload: &str) -> Result<StatePatch, EventError> {
    let map: Map<String, Value> = decode(kind, payload)?;
    let date_filter = match map.get("dateFilter") {
        None => None,
        Some(Value::Null) => Some(DateFilter::Anytime),
        Some(value) => Some(DateFilter::deserialize(value).map_err(|e| invalid(kind, e))?),
    };
    Ok(StatePatch {
        mode: None,
        catalog_id: field(kind, &map, "catalogId")?,
        collection_id: field(kind, &map, "collectionId")?,
        location: field(kind, &map, "location")?,
        date_filter,
        cloud_cover_max: field(kind, &map, "cloudCover")?,
        active_item_id: field(kind, &map, "itemId")?,
        active_asset_key: field(kind, &map, "assetKey")?,
        map_view: Field::Keep,
        search_text: field(kind, &map, "searchText")?,
    })
}

fn field<T: DeserializeOwned>(kind: &str, map: &Map<String, Value>, key: &str) -> Result<Field<T>, EventError> {
    match map.get(key) {
        None => Ok(Field::Keep),
        Some(Value::Null) => Ok(Field::Clear),
        Some(value) => T::deserialize(value)
            .map(Field::Set)
            .map_err(|e| invalid(kind, format!("{key}: {e}"))),
    }
}
