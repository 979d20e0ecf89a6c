use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level presentation mode; every URL belongs to exactly one.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    View,
    Browser,
}

impl Mode {
    /// First path segment of every route in this mode.
    pub fn root_segment(self) -> &'static str {
        match self {
            Mode::View => "viewer",
            Mode::Browser => "browser",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::View => "view",
            Mode::Browser => "browser",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "view" | "viewer" => Some(Mode::View),
            "browser" | "browse" => Some(Mode::Browser),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RouteName {
    ViewerRoot,
    ViewerSearch,
    ViewerItem,
    ViewerCollection,
    ViewerCatalog,
    ViewerCatalogCollection,
    ViewerCatalogItem,
    BrowserRoot,
    BrowserCatalog,
    BrowserCatalogCollection,
    BrowserCatalogItem,
    Settings,
}

impl RouteName {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteName::ViewerRoot => "viewRoot",
            RouteName::ViewerSearch => "viewSearch",
            RouteName::ViewerItem => "viewItem",
            RouteName::ViewerCollection => "viewCollection",
            RouteName::ViewerCatalog => "viewCatalog",
            RouteName::ViewerCatalogCollection => "viewCatalogCollection",
            RouteName::ViewerCatalogItem => "viewCatalogItem",
            RouteName::BrowserRoot => "browserRoot",
            RouteName::BrowserCatalog => "browserCatalog",
            RouteName::BrowserCatalogCollection => "browserCollection",
            RouteName::BrowserCatalogItem => "browserItem",
            RouteName::Settings => "settings",
        }
    }

    /// `None` for routes that leave the current mode alone.
    pub fn mode(self) -> Option<Mode> {
        match self {
            RouteName::ViewerRoot
            | RouteName::ViewerSearch
            | RouteName::ViewerItem
            | RouteName::ViewerCollection
            | RouteName::ViewerCatalog
            | RouteName::ViewerCatalogCollection
            | RouteName::ViewerCatalogItem => Some(Mode::View),
            RouteName::BrowserRoot
            | RouteName::BrowserCatalog
            | RouteName::BrowserCatalogCollection
            | RouteName::BrowserCatalogItem => Some(Mode::Browser),
            RouteName::Settings => None,
        }
    }

    /// Viewer paths that name both a catalog and a collection.
    pub fn is_catalog_scoped_view(self) -> bool {
        matches!(
            self,
            RouteName::ViewerCatalogCollection | RouteName::ViewerCatalogItem
        )
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(&'static str),
    Capture(&'static str),
}

#[derive(Debug)]
pub struct Route {
    pub name: RouteName,
    pub pattern: &'static [Segment],
}

impl Route {
    pub fn mode(&self) -> Option<Mode> {
        self.name.mode()
    }

    fn capture_count(&self) -> usize {
        self.pattern
            .iter()
            .filter(|s| matches!(s, Segment::Capture(_)))
            .count()
    }

    fn matches(&self, segments: &[Cow<'_, str>]) -> Option<Vec<String>> {
        if segments.len() != self.pattern.len() {
            return None;
        }
        let mut captures = Vec::new();
        for (pattern, segment) in self.pattern.iter().zip(segments) {
            match pattern {
                Segment::Literal(lit) if *lit == &**segment => {}
                Segment::Literal(_) => return None,
                Segment::Capture(_) => captures.push(segment.to_string()),
            }
        }
        Some(captures)
    }
}

use Segment::{Capture as C, Literal as L};

/// Ordered by priority: literal segments win over captures of the same arity.
static ROUTES: &[Route] = &[
    Route { name: RouteName::ViewerRoot, pattern: &[L("viewer")] },
    Route { name: RouteName::ViewerSearch, pattern: &[L("viewer"), L("search")] },
    Route { name: RouteName::ViewerItem, pattern: &[L("viewer"), L("item"), C("itemId")] },
    Route { name: RouteName::ViewerCollection, pattern: &[L("viewer"), L("collection"), C("collectionId")] },
    Route {
        name: RouteName::ViewerCatalogItem,
        pattern: &[L("viewer"), C("catalogId"), C("collectionId"), C("itemId")],
    },
    Route {
        name: RouteName::ViewerCatalogCollection,
        pattern: &[L("viewer"), C("catalogId"), C("collectionId")],
    },
    Route { name: RouteName::ViewerCatalog, pattern: &[L("viewer"), C("catalogId")] },
    Route { name: RouteName::BrowserRoot, pattern: &[L("browser")] },
    Route {
        name: RouteName::BrowserCatalogItem,
        pattern: &[L("browser"), C("catalogId"), C("collectionId"), C("itemId")],
    },
    Route {
        name: RouteName::BrowserCatalogCollection,
        pattern: &[L("browser"), C("catalogId"), C("collectionId")],
    },
    Route { name: RouteName::BrowserCatalog, pattern: &[L("browser"), C("catalogId")] },
    Route { name: RouteName::Settings, pattern: &[L("settings")] },
];

/// A route name plus its decoded captures, in pattern order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    pub name: RouteName,
    pub captures: Vec<String>,
}

impl RoutePath {
    fn new(name: RouteName, captures: &[&str]) -> Self {
        Self {
            name,
            captures: captures.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn viewer_root() -> Self {
        Self::new(RouteName::ViewerRoot, &[])
    }

    pub fn viewer_search() -> Self {
        Self::new(RouteName::ViewerSearch, &[])
    }

    pub fn viewer_item(item_id: &str) -> Self {
        Self::new(RouteName::ViewerItem, &[item_id])
    }

    pub fn viewer_collection(collection_id: &str) -> Self {
        Self::new(RouteName::ViewerCollection, &[collection_id])
    }

    pub fn viewer_catalog(catalog_id: &str) -> Self {
        Self::new(RouteName::ViewerCatalog, &[catalog_id])
    }

    pub fn viewer_catalog_collection(catalog_id: &str, collection_id: &str) -> Self {
        Self::new(RouteName::ViewerCatalogCollection, &[catalog_id, collection_id])
    }

    pub fn viewer_catalog_item(catalog_id: &str, collection_id: &str, item_id: &str) -> Self {
        Self::new(RouteName::ViewerCatalogItem, &[catalog_id, collection_id, item_id])
    }

    pub fn browser_root() -> Self {
        Self::new(RouteName::BrowserRoot, &[])
    }

    pub fn browser_catalog(catalog_id: &str) -> Self {
        Self::new(RouteName::BrowserCatalog, &[catalog_id])
    }

    pub fn browser_catalog_collection(catalog_id: &str, collection_id: &str) -> Self {
        Self::new(RouteName::BrowserCatalogCollection, &[catalog_id, collection_id])
    }

    pub fn browser_catalog_item(catalog_id: &str, collection_id: &str, item_id: &str) -> Self {
        Self::new(RouteName::BrowserCatalogItem, &[catalog_id, collection_id, item_id])
    }

    pub fn settings() -> Self {
        Self::new(RouteName::Settings, &[])
    }

    fn capture(&self, idx: usize) -> Option<&str> {
        self.captures.get(idx).map(String::as_str)
    }

    pub fn catalog_id(&self) -> Option<&str> {
        match self.name {
            RouteName::ViewerCatalog
            | RouteName::ViewerCatalogCollection
            | RouteName::ViewerCatalogItem
            | RouteName::BrowserCatalog
            | RouteName::BrowserCatalogCollection
            | RouteName::BrowserCatalogItem => self.capture(0),
            _ => None,
        }
    }

    pub fn collection_id(&self) -> Option<&str> {
        match self.name {
            RouteName::ViewerCollection => self.capture(0),
            RouteName::ViewerCatalogCollection
            | RouteName::ViewerCatalogItem
            | RouteName::BrowserCatalogCollection
            | RouteName::BrowserCatalogItem => self.capture(1),
            _ => None,
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self.name {
            RouteName::ViewerItem => self.capture(0),
            RouteName::ViewerCatalogItem | RouteName::BrowserCatalogItem => self.capture(2),
            _ => None,
        }
    }

    /// The route a catalog-scoped path degrades to when its catalog cannot be
    /// resolved. Paths without a catalog are returned unchanged.
    pub fn without_catalog(&self) -> RoutePath {
        match self.name {
            RouteName::ViewerCatalogItem => Self::new(RouteName::ViewerItem, &self.captures_from(2)),
            RouteName::ViewerCatalogCollection => {
                Self::new(RouteName::ViewerCollection, &self.captures_from(1))
            }
            RouteName::ViewerCatalog => Self::viewer_root(),
            RouteName::BrowserCatalog
            | RouteName::BrowserCatalogCollection
            | RouteName::BrowserCatalogItem => Self::browser_root(),
            _ => self.clone(),
        }
    }

    fn captures_from(&self, idx: usize) -> Vec<&str> {
        self.captures.iter().skip(idx).map(String::as_str).collect()
    }

    /// `/viewer/item/{i}` becoming `/viewer/{c}/{k}/{i}` (and the collection
    /// equivalent) refines the same location rather than navigating away.
    pub fn is_refined_by(&self, next: &RoutePath) -> bool {
        match (self.name, next.name) {
            (RouteName::ViewerItem, RouteName::ViewerCatalogItem) => self.item_id() == next.item_id(),
            (RouteName::ViewerCollection, RouteName::ViewerCatalogCollection) => {
                self.collection_id() == next.collection_id()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route: &'static Route,
    pub path: RoutePath,
}

impl RouteMatch {
    pub fn mode(&self) -> Option<Mode> {
        self.route.mode()
    }

    pub fn captures(&self) -> &[String] {
        &self.path.captures
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Deployment prefix the app is served under (`""` at the domain root).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasePath(String);

impl BasePath {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            BasePath(String::new())
        } else {
            BasePath(format!("/{trimmed}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Removes the prefix; unprefixed paths are accepted unchanged.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        if self.0.is_empty() {
            return path;
        }
        match path.strip_prefix(self.0.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }

    pub fn apply(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

/// Outcome of resolving a raw location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub matched: RouteMatch,
    /// Canonical path (with base) the address bar should be replaced with,
    /// when the requested path was a legacy or unknown form.
    pub redirect: Option<String>,
}

const MAX_REDIRECTS: usize = 4;

/// The fixed, ordered route list plus the deployment base path.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    base: BasePath,
}

impl RouteTable {
    pub fn new(base: BasePath) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BasePath {
        &self.base
    }

    pub fn routes(&self) -> &'static [Route] {
        ROUTES
    }

    /// First route (in priority order) whose pattern matches. Trailing
    /// slashes and empty segments are ignored.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let path = self.base.strip(path_only(path));
        let segments: Vec<Cow<'_, str>> = raw_segments(path).map(decode_segment).collect();
        ROUTES.iter().find_map(|route| {
            route.matches(&segments).map(|captures| RouteMatch {
                route,
                path: RoutePath {
                    name: route.name,
                    captures,
                },
            })
        })
    }

    /// Legacy and verbose path forms, rewritten to their canonical
    /// equivalent (without base). Captures keep their original encoding.
    pub fn legacy_redirect(&self, path: &str) -> Option<String> {
        let path = self.base.strip(path_only(path));
        let segments: Vec<&str> = raw_segments(path).collect();
        let rewritten: Vec<&str> = match segments.as_slice() {
            ["catalog", rest @ ..] => std::iter::once("browser").chain(rest.iter().copied()).collect(),
            ["view", rest @ ..] => std::iter::once("viewer").chain(rest.iter().copied()).collect(),
            ["browser", "catalog", catalog, "collection", collection, "item", item] => {
                vec!["browser", catalog, collection, item]
            }
            ["browser", "catalog", catalog, "collection", collection] => {
                vec!["browser", catalog, collection]
            }
            ["browser", "catalog", catalog] => vec!["browser", catalog],
            _ => return None,
        };
        Some(format!("/{}", rewritten.join("/")))
    }

    /// Follows legacy redirects and falls back to the viewer root for
    /// unknown paths, so every location resolves to some route.
    pub fn resolve(&self, path: &str) -> Resolution {
        let mut current = self.base.strip(path_only(path)).to_string();
        let mut redirected = false;

        for _ in 0..MAX_REDIRECTS {
            if let Some(next) = self.legacy_redirect(&current) {
                current = next;
                redirected = true;
                continue;
            }
            break;
        }

        let matched = match self.match_path(&current) {
            Some(m) => m,
            None => {
                redirected = true;
                self.viewer_root_match()
            }
        };

        Resolution {
            redirect: redirected.then(|| self.format(&matched.path)),
            matched,
        }
    }

    /// True for every path the single-page app answers (legacy forms included).
    pub fn is_app_path(&self, path: &str) -> bool {
        let stripped = self.base.strip(path_only(path));
        raw_segments(stripped).next().is_none()
            || self.legacy_redirect(stripped).is_some()
            || self.match_path(stripped).is_some()
    }

    /// Formats a path with the base prefix and percent-encoded captures.
    pub fn format(&self, path: &RoutePath) -> String {
        let Some(route) = ROUTES.iter().find(|r| r.name == path.name) else {
            return self.base.apply("/viewer");
        };
        debug_assert_eq!(route.capture_count(), path.captures.len());

        let mut captures = path.captures.iter();
        let mut out = String::new();
        for segment in route.pattern {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Capture(_) => {
                    if let Some(value) = captures.next() {
                        out.push_str(&urlencoding::encode(value));
                    }
                }
            }
        }
        self.base.apply(&out)
    }

    fn viewer_root_match(&self) -> RouteMatch {
        RouteMatch {
            route: &ROUTES[0],
            path: RoutePath::viewer_root(),
        }
    }
}

fn path_only(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

fn raw_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn decode_segment(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}
