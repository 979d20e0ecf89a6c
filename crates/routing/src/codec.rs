use foundation::{BBox, DateBound, LatLng};

use crate::query::QueryParams;
use crate::route_table::{Mode, RoutePath, RouteTable};
use crate::state::{
    ApplicationState, ChangeTrigger, DEFAULT_CLOUD_COVER, DateFilter, GeometryPayload, MapView,
    SearchLocation,
};

/// Query keys. Short on purpose: these end up in shared links.
pub mod keys {
    pub const COLLECTION: &str = "cn";
    pub const SOURCE: &str = "src";
    pub const BBOX: &str = "bbox";
    pub const LOCATION_NAME: &str = "ln";
    pub const GEOMETRY: &str = "geom";
    pub const DATE_TYPE: &str = "dt";
    pub const DATE_START: &str = "ds";
    pub const DATE_END: &str = "de";
    pub const CLOUD_COVER: &str = "cc";
    pub const SEARCH_TEXT: &str = "q";
    pub const ASSET: &str = "asset";
    pub const CENTER: &str = "center";
    pub const ZOOM: &str = "zoom";
}

const DATE_ANYTIME: &str = "anytime";
const DATE_CUSTOM: &str = "custom";

/// Where the address bar should point for a given state.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTarget {
    pub path: RoutePath,
    pub query: QueryParams,
}

impl UrlTarget {
    pub fn to_url(&self, table: &RouteTable) -> String {
        format!("{}{}", table.format(&self.path), self.query.to_query_string())
    }
}

/// Pure mapping between [`ApplicationState`] and URLs.
#[derive(Debug, Clone, Default)]
pub struct StateCodec {
    table: RouteTable,
}

impl StateCodec {
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Encodes `state` given the path currently in the address bar and the
    /// reason for the change. Same inputs always give the same target.
    /// Decoding the result gives back [`ApplicationState::url_projection`].
    pub fn to_url(&self, state: &ApplicationState, current: &RoutePath, trigger: ChangeTrigger) -> UrlTarget {
        match state.mode {
            Mode::View => {
                let path = view_path(state, current, trigger);
                let query = view_query(state, &path);
                UrlTarget { path, query }
            }
            Mode::Browser => UrlTarget {
                path: browser_path(state),
                query: QueryParams::new(),
            },
        }
    }

    pub fn to_url_string(&self, state: &ApplicationState, current: &RoutePath, trigger: ChangeTrigger) -> String {
        self.to_url(state, current, trigger).to_url(&self.table)
    }

    /// Decodes a matched path plus query. Browser routes carry only the
    /// catalog hierarchy, so their query is ignored.
    pub fn from_url(&self, path: &RoutePath, mode: Mode, query: &QueryParams) -> ApplicationState {
        let mut state = ApplicationState {
            mode,
            catalog_id: path.catalog_id().map(str::to_string),
            collection_id: path.collection_id().map(str::to_string),
            active_item_id: path.item_id().map(str::to_string),
            ..Default::default()
        };
        if mode == Mode::View {
            decode_query_into(&mut state, query);
        }
        state.canonicalized()
    }

    /// Viewer-mode state from query parameters alone.
    pub fn from_query(&self, query: &QueryParams) -> ApplicationState {
        let mut state = ApplicationState::default();
        decode_query_into(&mut state, query);
        state.canonicalized()
    }

    /// Decodes a raw location; unknown paths decode as the viewer root.
    pub fn decode(&self, path: &str, query: &str) -> ApplicationState {
        let matched = self.table.resolve(path).matched;
        let mode = matched.mode().unwrap_or_default();
        self.from_url(&matched.path, mode, &QueryParams::parse(query))
    }
}

/// Path selection, first match wins:
/// 1. an active item always gets an item path;
/// 2. an explicit collection selection gets a collection path;
/// 3. an existing catalog-scoped path is kept while it still applies;
/// 4. search filters get the search path;
/// 5. otherwise the most specific hierarchy path.
fn view_path(state: &ApplicationState, current: &RoutePath, trigger: ChangeTrigger) -> RoutePath {
    let catalog = state.catalog_id.as_deref();
    let collection = state.collection_id.as_deref();

    if let Some(item) = state.active_item_id.as_deref() {
        return match (catalog, collection) {
            (Some(c), Some(k)) => RoutePath::viewer_catalog_item(c, k, item),
            _ => RoutePath::viewer_item(item),
        };
    }

    if trigger == ChangeTrigger::CollectionSelected {
        if let Some(k) = collection {
            return match catalog {
                Some(c) => RoutePath::viewer_catalog_collection(c, k),
                None => RoutePath::viewer_collection(k),
            };
        }
    }

    let keeps_scope = !matches!(trigger, ChangeTrigger::ModeChanged | ChangeTrigger::CollectionSelected);
    if keeps_scope && current.name.is_catalog_scoped_view() {
        if let (Some(c), Some(k)) = (catalog, collection) {
            return RoutePath::viewer_catalog_collection(c, k);
        }
    }

    if state.has_search_filters() {
        return RoutePath::viewer_search();
    }

    match (catalog, collection) {
        (Some(c), Some(k)) => RoutePath::viewer_catalog_collection(c, k),
        (None, Some(k)) => RoutePath::viewer_collection(k),
        (Some(c), None) => RoutePath::viewer_catalog(c),
        (None, None) => RoutePath::viewer_root(),
    }
}

fn browser_path(state: &ApplicationState) -> RoutePath {
    match (
        state.catalog_id.as_deref(),
        state.collection_id.as_deref(),
        state.active_item_id.as_deref(),
    ) {
        (Some(c), Some(k), Some(i)) => RoutePath::browser_catalog_item(c, k, i),
        (Some(c), Some(k), None) => RoutePath::browser_catalog_collection(c, k),
        (Some(c), None, _) => RoutePath::browser_catalog(c),
        (None, ..) => RoutePath::browser_root(),
    }
}

/// Everything the path does not already carry. Fixed key order.
fn view_query(state: &ApplicationState, path: &RoutePath) -> QueryParams {
    let mut q = QueryParams::new();

    if path.collection_id().is_none() {
        if let Some(k) = &state.collection_id {
            q.set(keys::COLLECTION, k.as_str());
        }
    }
    if path.catalog_id().is_none() {
        if let Some(c) = &state.catalog_id {
            q.set(keys::SOURCE, c.as_str());
        }
    }

    match &state.location {
        Some(SearchLocation::BBox { bbox, name }) => {
            q.set(keys::BBOX, bbox.to_param());
            q.set_opt(keys::LOCATION_NAME, name.as_deref());
        }
        Some(SearchLocation::Geometry { geometry, bbox, name }) => {
            q.set(keys::GEOMETRY, geometry.to_param());
            q.set_opt(keys::BBOX, bbox.map(|b| b.to_param()));
            q.set_opt(keys::LOCATION_NAME, name.as_deref());
        }
        None => {}
    }

    match &state.date_filter {
        DateFilter::Anytime => {}
        DateFilter::Preset { name } => q.set(keys::DATE_TYPE, name.as_str()),
        DateFilter::Custom { start, end } => {
            if start.is_none() && end.is_none() {
                q.set(keys::DATE_TYPE, DATE_CUSTOM);
            }
            q.set_opt(keys::DATE_START, start.map(|d| d.to_param()));
            q.set_opt(keys::DATE_END, end.map(|d| d.to_param()));
        }
    }

    if let Some(cc) = state.cloud_cover_max.filter(|cc| *cc != DEFAULT_CLOUD_COVER) {
        q.set(keys::CLOUD_COVER, cc.to_string());
    }
    q.set_opt(keys::SEARCH_TEXT, state.search_text.as_deref());
    if state.active_item_id.is_some() {
        q.set_opt(keys::ASSET, state.active_asset_key.as_deref());
    }
    if let Some(view) = &state.map_view {
        q.set(keys::CENTER, view.center.to_param());
        q.set(keys::ZOOM, view.zoom.to_string());
    }
    q
}

/// Unparseable values are dropped individually; the rest still applies.
fn decode_query_into(state: &mut ApplicationState, q: &QueryParams) {
    if state.collection_id.is_none() {
        state.collection_id = q.get(keys::COLLECTION).map(str::to_string);
    }
    if state.catalog_id.is_none() {
        state.catalog_id = q.get(keys::SOURCE).map(str::to_string);
    }

    let name = q.get(keys::LOCATION_NAME).map(str::to_string);
    let bbox = q.get(keys::BBOX).and_then(BBox::parse);
    state.location = match q.get(keys::GEOMETRY).and_then(GeometryPayload::from_param) {
        Some(geometry) => Some(SearchLocation::Geometry { geometry, bbox, name }),
        None => bbox.map(|bbox| SearchLocation::BBox { bbox, name }),
    };

    let start = q.get(keys::DATE_START).and_then(DateBound::parse);
    let end = q.get(keys::DATE_END).and_then(DateBound::parse);
    state.date_filter = match q.get(keys::DATE_TYPE) {
        Some(DATE_ANYTIME) => DateFilter::Anytime,
        Some(DATE_CUSTOM) => DateFilter::Custom { start, end },
        Some(preset) => DateFilter::Preset {
            name: preset.to_string(),
        },
        None if start.is_some() || end.is_some() => DateFilter::Custom { start, end },
        None => DateFilter::Anytime,
    };

    state.cloud_cover_max = q
        .get(keys::CLOUD_COVER)
        .and_then(|cc| cc.trim().parse::<u8>().ok())
        .filter(|cc| *cc <= 100);
    state.search_text = q.get(keys::SEARCH_TEXT).map(str::to_string);
    state.active_asset_key = q.get(keys::ASSET).map(str::to_string);

    let center = q.get(keys::CENTER).and_then(LatLng::parse);
    let zoom = q
        .get(keys::ZOOM)
        .and_then(|z| z.trim().parse::<f64>().ok())
        .filter(|z| z.is_finite());
    state.map_view = match (center, zoom) {
        (Some(center), Some(zoom)) => Some(MapView { center, zoom }),
        _ => None,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codec() -> StateCodec {
        StateCodec::default()
    }

    fn day(raw: &str) -> DateBound {
        DateBound::parse(raw).unwrap()
    }

    fn url(state: &ApplicationState, current: &RoutePath, trigger: ChangeTrigger) -> String {
        codec().to_url_string(state, current, trigger)
    }

    #[test]
    fn item_deep_link_does_not_repeat_collection_in_query() {
        let state = codec().decode("/viewer/cdse-stac/sentinel-2-l2a/S2A_123", "");
        assert_eq!(state.catalog_id.as_deref(), Some("cdse-stac"));
        assert_eq!(state.collection_id.as_deref(), Some("sentinel-2-l2a"));
        assert_eq!(state.active_item_id.as_deref(), Some("S2A_123"));

        let current = RoutePath::viewer_catalog_item("cdse-stac", "sentinel-2-l2a", "S2A_123");
        assert_eq!(
            url(&state, &current, ChangeTrigger::Navigation),
            "/viewer/cdse-stac/sentinel-2-l2a/S2A_123"
        );
    }

    #[test]
    fn search_link_decodes_custom_dates_and_cloud_cover() {
        let state = codec().decode("/viewer/search", "?ds=2024-01-01&de=2024-01-31&cc=10");
        assert_eq!(
            state.date_filter,
            DateFilter::Custom {
                start: Some(day("2024-01-01")),
                end: Some(day("2024-01-31")),
            }
        );
        assert_eq!(state.cloud_cover_max, Some(10));
        assert!(state.has_search_filters());
        assert_eq!(
            url(&state, &RoutePath::viewer_search(), ChangeTrigger::Navigation),
            "/viewer/search?ds=2024-01-01&de=2024-01-31&cc=10"
        );
    }

    #[test]
    fn collection_selection_gets_a_collection_path() {
        let state = ApplicationState {
            collection_id: Some("sentinel-2-l2a".into()),
            ..Default::default()
        };
        assert_eq!(
            url(&state, &RoutePath::viewer_root(), ChangeTrigger::CollectionSelected),
            "/viewer/collection/sentinel-2-l2a"
        );

        let scoped = ApplicationState {
            catalog_id: Some("cdse-stac".into()),
            ..state
        };
        assert_eq!(
            url(&scoped, &RoutePath::viewer_search(), ChangeTrigger::CollectionSelected),
            "/viewer/cdse-stac/sentinel-2-l2a"
        );
    }

    #[test]
    fn catalog_scoped_path_survives_filter_changes() {
        let state = ApplicationState {
            catalog_id: Some("cdse-stac".into()),
            collection_id: Some("sentinel-2-l2a".into()),
            cloud_cover_max: Some(5),
            ..Default::default()
        };
        let current = RoutePath::viewer_catalog_collection("cdse-stac", "sentinel-2-l2a");
        assert_eq!(
            url(&state, &current, ChangeTrigger::SearchParameter),
            "/viewer/cdse-stac/sentinel-2-l2a?cc=5"
        );
        // Elsewhere the same filters select the search path.
        assert_eq!(
            url(&state, &RoutePath::viewer_root(), ChangeTrigger::SearchParameter),
            "/viewer/search?cn=sentinel-2-l2a&src=cdse-stac&cc=5"
        );
    }

    #[test]
    fn clearing_the_item_downgrades_a_scoped_item_path() {
        let state = ApplicationState {
            catalog_id: Some("cdse-stac".into()),
            collection_id: Some("sentinel-2-l2a".into()),
            ..Default::default()
        };
        let current = RoutePath::viewer_catalog_item("cdse-stac", "sentinel-2-l2a", "S2A_123");
        assert_eq!(
            url(&state, &current, ChangeTrigger::ItemActivated),
            "/viewer/cdse-stac/sentinel-2-l2a"
        );
    }

    #[test]
    fn item_without_catalog_keeps_collection_in_query() {
        let state = ApplicationState {
            collection_id: Some("sentinel-2-l2a".into()),
            active_item_id: Some("S2A_123".into()),
            active_asset_key: Some("visual".into()),
            ..Default::default()
        };
        assert_eq!(
            url(&state, &RoutePath::viewer_root(), ChangeTrigger::ItemActivated),
            "/viewer/item/S2A_123?cn=sentinel-2-l2a&asset=visual"
        );
    }

    #[test]
    fn browser_urls_carry_hierarchy_only() {
        let state = ApplicationState {
            mode: Mode::Browser,
            catalog_id: Some("cdse-stac".into()),
            collection_id: Some("sentinel-2-l2a".into()),
            search_text: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(
            url(&state, &RoutePath::viewer_root(), ChangeTrigger::ModeChanged),
            "/browser/cdse-stac/sentinel-2-l2a"
        );
        let decoded = codec().decode("/browser/cdse-stac/sentinel-2-l2a", "?q=ignored");
        assert_eq!(decoded.search_text, None);
        assert_eq!(decoded.mode, Mode::Browser);
    }

    #[test]
    fn defaults_never_appear_in_query() {
        let state = ApplicationState {
            cloud_cover_max: Some(DEFAULT_CLOUD_COVER),
            location: Some(SearchLocation::BBox {
                bbox: BBox::WORLD,
                name: Some("the world".into()),
            }),
            ..Default::default()
        }
        .canonicalized();
        assert_eq!(url(&state, &RoutePath::viewer_root(), ChangeTrigger::FormField), "/viewer");

        let decoded = codec().decode("/viewer", "?cc=20&dt=anytime&ln=the+world");
        assert_eq!(decoded, ApplicationState::default());
    }

    #[test]
    fn preset_dates_encode_by_name() {
        let state = codec().decode("/viewer/search", "?dt=last-30-days&ds=2024-01-01");
        assert_eq!(
            state.date_filter,
            DateFilter::Preset {
                name: "last-30-days".into()
            }
        );
        assert_eq!(
            url(&state, &RoutePath::viewer_search(), ChangeTrigger::Navigation),
            "/viewer/search?dt=last-30-days"
        );
        let custom = codec().decode("/viewer/search", "?dt=custom");
        assert_eq!(custom.date_filter, DateFilter::Custom { start: None, end: None });
    }

    #[test]
    fn invalid_values_are_dropped_individually() {
        let state = codec().decode(
            "/viewer/search",
            "?bbox=1,2,3&cc=250&ds=yesterday&zoom=4&center=nope&q=ice",
        );
        assert_eq!(state.location, None);
        assert_eq!(state.cloud_cover_max, None);
        assert_eq!(state.date_filter, DateFilter::Anytime);
        assert_eq!(state.map_view, None);
        assert_eq!(state.search_text.as_deref(), Some("ice"));
    }

    #[test]
    fn representable_states_round_trip() {
        let states = [
            ApplicationState {
                catalog_id: Some("cdse-stac".into()),
                collection_id: Some("sentinel-2-l2a".into()),
                active_item_id: Some("S2A 123/x".into()),
                active_asset_key: Some("B04".into()),
                map_view: Some(MapView::new(LatLng::new(48.2, 16.37), 9.5)),
                ..Default::default()
            },
            ApplicationState {
                location: Some(SearchLocation::Geometry {
                    geometry: GeometryPayload("POLYGON((0 0,1 0,1 1,0 0))".into()),
                    bbox: Some(BBox::new(0.0, 0.0, 1.0, 1.0)),
                    name: Some("Triangle".into()),
                }),
                date_filter: DateFilter::Custom {
                    start: DateBound::parse("2024-03-01T10:00:00Z"),
                    end: None,
                },
                search_text: Some("sea ice & snow".into()),
                cloud_cover_max: Some(0),
                ..Default::default()
            },
            ApplicationState {
                mode: Mode::Browser,
                catalog_id: Some("earth-search-aws".into()),
                collection_id: Some("landsat-c2-l2".into()),
                active_item_id: Some("LC09".into()),
                ..Default::default()
            },
        ];
        for state in states {
            let state = state.canonicalized();
            let target = codec().to_url(&state, &RoutePath::viewer_root(), ChangeTrigger::Navigation);
            let full = target.to_url(codec().table());
            let (path, query) = full.split_once('?').unwrap_or((full.as_str(), ""));
            assert_eq!(codec().decode(path, query), state, "{full}");
        }
    }

    #[test]
    fn browser_urls_round_trip_the_hierarchy_only() {
        let state = ApplicationState {
            mode: Mode::Browser,
            catalog_id: Some("cdse-stac".into()),
            collection_id: Some("sentinel-2-l2a".into()),
            search_text: Some("ice".into()),
            cloud_cover_max: Some(20),
            map_view: Some(MapView::new(LatLng::new(48.2, 16.37), 9.0)),
            ..Default::default()
        }
        .canonicalized();
        let full = url(&state, &RoutePath::viewer_root(), ChangeTrigger::ModeChanged);
        assert_eq!(full, "/browser/cdse-stac/sentinel-2-l2a");

        let projected = state.url_projection();
        assert_ne!(projected, state);
        assert_eq!(codec().decode(&full, ""), projected);
        assert_eq!(projected.search_text, None);
        assert_eq!(projected.url_projection(), projected);
    }

    #[test]
    fn encoding_is_idempotent() {
        let state = codec().decode("/viewer/collection/s2", "?q=ice&cc=30&center=1,2&zoom=3");
        let first = url(&state, &RoutePath::viewer_collection("s2"), ChangeTrigger::Navigation);
        let (path, query) = first.split_once('?').unwrap();
        let again = codec().decode(path, query);
        let current = codec().table().match_path(path).unwrap().path;
        assert_eq!(url(&again, &current, ChangeTrigger::Navigation), first);
    }
}
