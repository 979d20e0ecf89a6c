use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use foundation::{BBox, DateBound, LatLng, round_to};
use serde::{Deserialize, Serialize};

use crate::route_table::Mode;

/// Cloud cover shown by the search form when nothing is set. Never encoded.
pub const DEFAULT_CLOUD_COVER: u8 = 20;
/// Location name meaning "no spatial filter".
pub const WORLD_LOCATION_NAME: &str = "the world";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DateFilter {
    #[default]
    Anytime,
    /// A named relative range ("last-30-days") interpreted by the search form.
    Preset { name: String },
    Custom {
        start: Option<DateBound>,
        end: Option<DateBound>,
    },
}

impl DateFilter {
    pub fn is_anytime(&self) -> bool {
        matches!(self, DateFilter::Anytime)
    }

    fn canonicalized(self) -> Self {
        match self {
            DateFilter::Preset { name } => match name.trim() {
                "" | "anytime" => DateFilter::Anytime,
                "custom" => DateFilter::Custom { start: None, end: None },
                trimmed => DateFilter::Preset {
                    name: trimmed.to_string(),
                },
            },
            other => other,
        }
    }
}

/// Geometry text (GeoJSON or WKT) as the location widgets hand it out. The
/// router treats it as opaque and only transports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeometryPayload(pub String);

impl GeometryPayload {
    pub fn to_param(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    pub fn from_param(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.trim().trim_end_matches('=')).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        (!text.trim().is_empty()).then_some(GeometryPayload(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchLocation {
    BBox {
        bbox: BBox,
        #[serde(default)]
        name: Option<String>,
    },
    Geometry {
        geometry: GeometryPayload,
        /// Extent used for zooming, when the widget knows it.
        #[serde(default)]
        bbox: Option<BBox>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl SearchLocation {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            SearchLocation::BBox { bbox, .. } => Some(*bbox),
            SearchLocation::Geometry { bbox, .. } => *bbox,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            SearchLocation::BBox { name, .. } | SearchLocation::Geometry { name, .. } => {
                name.as_deref()
            }
        }
    }

    /// `None` when the location is the whole world.
    fn canonicalized(self) -> Option<Self> {
        match self {
            SearchLocation::BBox { bbox, name } => {
                let name = canonical_location_name(name);
                if name.is_none() && bbox.is_world() {
                    return None;
                }
                Some(SearchLocation::BBox { bbox, name })
            }
            SearchLocation::Geometry {
                geometry,
                bbox,
                name,
            } => Some(SearchLocation::Geometry {
                geometry,
                bbox,
                name: canonical_location_name(name),
            }),
        }
    }
}

fn canonical_location_name(name: Option<String>) -> Option<String> {
    non_empty(name).filter(|n| !n.eq_ignore_ascii_case(WORLD_LOCATION_NAME))
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: f64,
}

impl MapView {
    pub fn new(center: LatLng, zoom: f64) -> Self {
        Self { center, zoom }
    }

    /// Viewport values are rounded before they are stored so small jitter
    /// from the map does not churn the URL.
    pub fn rounded(self, decimals: u32) -> Self {
        Self {
            center: self.center.rounded(decimals),
            zoom: round_to(self.zoom, 2),
        }
    }
}

/// Everything the URL can express. Fields equal to their defaults are stored
/// as absent so equal states always encode to the same URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationState {
    pub mode: Mode,
    pub catalog_id: Option<String>,
    pub collection_id: Option<String>,
    pub location: Option<SearchLocation>,
    pub date_filter: DateFilter,
    pub cloud_cover_max: Option<u8>,
    pub active_item_id: Option<String>,
    pub active_asset_key: Option<String>,
    pub map_view: Option<MapView>,
    pub search_text: Option<String>,
}

impl ApplicationState {
    pub fn canonicalized(mut self) -> Self {
        self.catalog_id = non_empty(self.catalog_id);
        self.collection_id = non_empty(self.collection_id);
        self.active_item_id = non_empty(self.active_item_id);
        self.active_asset_key = non_empty(self.active_asset_key);
        self.search_text = non_empty(self.search_text);
        self.location = self.location.and_then(SearchLocation::canonicalized);
        self.date_filter = self.date_filter.canonicalized();
        self.cloud_cover_max = self
            .cloud_cover_max
            .map(|cc| cc.min(100))
            .filter(|cc| *cc != DEFAULT_CLOUD_COVER);
        self.map_view = self
            .map_view
            .filter(|v| v.center.lat.is_finite() && v.center.lng.is_finite() && v.zoom.is_finite());
        if self.active_item_id.is_none() {
            self.active_asset_key = None;
        }
        self
    }

    /// The part of the state a URL can carry.
    ///
    /// Browser mode keeps the search fields in the snapshot for when the
    /// user returns to the viewer, but browser URLs hold only the catalog
    /// hierarchy, so only that survives a trip through the address bar.
    pub fn url_projection(&self) -> Self {
        match self.mode {
            Mode::View => self.clone(),
            Mode::Browser => {
                let catalog_id = self.catalog_id.clone();
                let collection_id = catalog_id.as_ref().and(self.collection_id.clone());
                let active_item_id = collection_id.as_ref().and(self.active_item_id.clone());
                ApplicationState {
                    mode: Mode::Browser,
                    catalog_id,
                    collection_id,
                    active_item_id,
                    ..Default::default()
                }
            }
        }
    }

    /// Cloud cover as the search form should display it.
    pub fn effective_cloud_cover(&self) -> u8 {
        self.cloud_cover_max.unwrap_or(DEFAULT_CLOUD_COVER)
    }

    /// True when any field that changes search results is set.
    pub fn has_search_filters(&self) -> bool {
        self.search_text.is_some()
            || self.location.is_some()
            || !self.date_filter.is_anytime()
            || self.cloud_cover_max.is_some()
    }

    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        patch.catalog_id.apply_to(&mut self.catalog_id);
        patch.collection_id.apply_to(&mut self.collection_id);
        patch.location.apply_to(&mut self.location);
        if let Some(filter) = patch.date_filter {
            self.date_filter = filter;
        }
        patch.cloud_cover_max.apply_to(&mut self.cloud_cover_max);
        patch.active_item_id.apply_to(&mut self.active_item_id);
        patch.active_asset_key.apply_to(&mut self.active_asset_key);
        patch.map_view.apply_to(&mut self.map_view);
        patch.search_text.apply_to(&mut self.search_text);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One field of a [`StatePatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Keep
    }
}

impl<T> Field<T> {
    /// `Some` sets, `None` clears.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Set(v),
            None => Field::Clear,
        }
    }

    /// `Some` sets, `None` keeps.
    pub fn set_if_some(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Set(v),
            None => Field::Keep,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Field::Keep)
    }

    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Field::Keep => {}
            Field::Set(v) => *slot = Some(v),
            Field::Clear => *slot = None,
        }
    }
}

/// A partial update merged over the canonical state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub mode: Option<Mode>,
    pub catalog_id: Field<String>,
    pub collection_id: Field<String>,
    pub location: Field<SearchLocation>,
    pub date_filter: Option<DateFilter>,
    pub cloud_cover_max: Field<u8>,
    pub active_item_id: Field<String>,
    pub active_asset_key: Field<String>,
    pub map_view: Field<MapView>,
    pub search_text: Field<String>,
}

/// Why the canonical state changed. Drives push-vs-replace and the
/// path-selection rules of the codec.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeTrigger {
    /// State applied from the address bar; never pushes.
    Navigation,
    ModeChanged,
    SearchParameter,
    ItemActivated,
    CollectionSelected,
    LocationSelected,
    BrowserState,
    FormField,
    Viewport,
}

impl ChangeTrigger {
    /// Changes that refine the current history entry instead of adding one.
    pub fn replaces_history(self) -> bool {
        matches!(self, ChangeTrigger::Navigation | ChangeTrigger::Viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_stored_as_absent() {
        let state = ApplicationState {
            cloud_cover_max: Some(DEFAULT_CLOUD_COVER),
            location: Some(SearchLocation::BBox {
                bbox: BBox::new(1.0, 2.0, 3.0, 4.0),
                name: Some("The World".into()),
            }),
            date_filter: DateFilter::Preset {
                name: "anytime".into(),
            },
            search_text: Some("   ".into()),
            active_asset_key: Some("B04".into()),
            ..Default::default()
        }
        .canonicalized();

        assert_eq!(state.cloud_cover_max, None);
        assert_eq!(state.date_filter, DateFilter::Anytime);
        assert_eq!(state.search_text, None);
        assert_eq!(state.active_asset_key, None);
        assert_eq!(
            state.location,
            Some(SearchLocation::BBox {
                bbox: BBox::new(1.0, 2.0, 3.0, 4.0),
                name: None
            })
        );
        assert!(state.has_search_filters());
        assert_eq!(state.effective_cloud_cover(), DEFAULT_CLOUD_COVER);
    }

    #[test]
    fn world_bbox_without_name_is_no_location() {
        let state = ApplicationState {
            location: Some(SearchLocation::BBox {
                bbox: BBox::WORLD,
                name: Some("the world".into()),
            }),
            ..Default::default()
        }
        .canonicalized();
        assert_eq!(state.location, None);
        assert!(!state.has_search_filters());
    }

    #[test]
    fn patch_keeps_sets_and_clears() {
        let mut state = ApplicationState {
            catalog_id: Some("cdse-stac".into()),
            collection_id: Some("sentinel-2-l2a".into()),
            search_text: Some("ice".into()),
            ..Default::default()
        };
        state.apply(StatePatch {
            mode: Some(Mode::Browser),
            collection_id: Field::Clear,
            search_text: Field::Set("snow".into()),
            ..Default::default()
        });
        assert_eq!(state.mode, Mode::Browser);
        assert_eq!(state.catalog_id.as_deref(), Some("cdse-stac"));
        assert_eq!(state.collection_id, None);
        assert_eq!(state.search_text.as_deref(), Some("snow"));
    }

    #[test]
    fn geometry_param_is_url_safe() {
        let geometry = GeometryPayload(r#"{"type":"Point","coordinates":[16.3,48.2]}"#.into());
        let param = geometry.to_param();
        assert!(!param.contains(['+', '/', '=']));
        assert_eq!(GeometryPayload::from_param(&param), Some(geometry));
        assert_eq!(GeometryPayload::from_param("***"), None);
    }

    #[test]
    fn viewport_rounding() {
        let view = MapView::new(LatLng::new(48.123456789, 16.987654321), 7.4567).rounded(5);
        assert_eq!(view, MapView::new(LatLng::new(48.12346, 16.98765), 7.46));
    }
}
