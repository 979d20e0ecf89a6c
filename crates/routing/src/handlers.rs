use std::rc::Rc;

use catalog::CatalogResolver;
use futures::future::LocalBoxFuture;
use tracing::{info, instrument};

use crate::codec::StateCodec;
use crate::error::RouteError;
use crate::guard::RouteToken;
use crate::query::QueryParams;
use crate::route_table::{Mode, RouteMatch, RouteName, RouteTable};
use crate::state_manager::{ApplyReport, UnifiedStateManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// The route that was finally applied; differs from the matched route
    /// after a fallback.
    pub handled_as: RouteName,
    pub report: ApplyReport,
}

/// Applies one matched route. Must tolerate being superseded at any await.
pub trait RouteHandler {
    fn handle<'a>(
        &'a self,
        matched: &'a RouteMatch,
        query: &'a QueryParams,
        token: &'a RouteToken,
    ) -> LocalBoxFuture<'a, Result<HandlerOutcome, RouteError>>;
}

/// Handles every route of the table.
///
/// Catalog-scoped routes whose catalog cannot be resolved fall back to the
/// next less specific route with the same remaining captures and query:
/// catalog+collection becomes collection-only, catalog+item becomes
/// item-only, a bare catalog becomes the mode root.
pub struct CatalogRouteHandler {
    manager: Rc<UnifiedStateManager>,
    resolver: Rc<CatalogResolver>,
    codec: StateCodec,
}

impl CatalogRouteHandler {
    pub fn new(manager: Rc<UnifiedStateManager>, resolver: Rc<CatalogResolver>) -> Self {
        let codec = StateCodec::new(RouteTable::new(manager.config().base()));
        Self {
            manager,
            resolver,
            codec,
        }
    }

    #[instrument(skip_all, fields(route = %matched.path.name))]
    async fn dispatch(
        &self,
        matched: &RouteMatch,
        query: &QueryParams,
        token: &RouteToken,
    ) -> Result<HandlerOutcome, RouteError> {
        let Some(mode) = matched.mode() else {
            let report = self.manager.open_settings(token).await?;
            return Ok(HandlerOutcome {
                handled_as: matched.path.name,
                report,
            });
        };

        let mut path = matched.path.clone();
        let mut target = self.codec.from_url(&path, mode, query);

        let catalog = match path.catalog_id() {
            Some(catalog_id) => {
                let resolved = self.resolver.resolve(catalog_id).await;
                token.ensure_current()?;
                if resolved.is_none() {
                    let fallback = path.without_catalog();
                    info!(catalog_id, fallback = %fallback.name, "unknown catalog; falling back");
                    target.catalog_id = None;
                    if mode == Mode::Browser {
                        target.collection_id = None;
                        target.active_item_id = None;
                    }
                    path = fallback;
                }
                resolved
            }
            None => None,
        };

        let report = match mode {
            Mode::View => self.manager.apply_state(target, catalog, token).await?,
            Mode::Browser => self.manager.apply_browser(target, catalog, token).await?,
        };
        Ok(HandlerOutcome {
            handled_as: path.name,
            report,
        })
    }
}

impl RouteHandler for CatalogRouteHandler {
    fn handle<'a>(
        &'a self,
        matched: &'a RouteMatch,
        query: &'a QueryParams,
        token: &'a RouteToken,
    ) -> LocalBoxFuture<'a, Result<HandlerOutcome, RouteError>> {
        Box::pin(self.dispatch(matched, query, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SearchPort;
    use crate::guard::RouteGuard;
    use crate::testing::Harness;
    use pretty_assertions::assert_eq;

    async fn run(h: &Harness, path: &str, query: &str) -> (HandlerOutcome, crate::ApplicationState) {
        let handler = CatalogRouteHandler::new(h.manager.clone(), h.resolver.clone());
        let matched = RouteTable::default().match_path(path).unwrap();
        let guard = RouteGuard::new();
        let token = guard.begin();
        let outcome = handler
            .handle(&matched, &QueryParams::parse(query), &token)
            .await
            .unwrap();
        (outcome, h.manager.snapshot())
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_catalog_behaves_like_collection_route() {
        let scoped = Harness::new("/");
        let (outcome, scoped_state) = run(&scoped, "/viewer/no-such-catalog/sentinel-2-l2a", "?q=ice").await;
        assert_eq!(outcome.handled_as, RouteName::ViewerCollection);

        let plain = Harness::new("/");
        let (_, plain_state) = run(&plain, "/viewer/collection/sentinel-2-l2a", "?q=ice").await;

        assert_eq!(scoped_state, plain_state);
        assert_eq!(scoped.search.selected_collection(), plain.search.selected_collection());
        assert_eq!(scoped.log(), plain.log());
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_catalog_alias_resolves_to_canonical() {
        let h = Harness::new("/");
        let (outcome, state) = run(&h, "/viewer/copernicus/sentinel-2-l2a", "").await;
        assert_eq!(outcome.handled_as, RouteName::ViewerCatalogCollection);
        assert_eq!(state.catalog_id.as_deref(), Some("cdse-stac"));
        assert_eq!(outcome.report.catalog.as_deref(), Some("cdse-stac"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_browser_catalog_shows_root() {
        let h = Harness::new("/");
        let (outcome, state) = run(&h, "/browser/nowhere/x", "").await;
        assert_eq!(outcome.handled_as, RouteName::BrowserRoot);
        assert_eq!(state.mode, Mode::Browser);
        assert_eq!(state.collection_id, None);
        assert_eq!(h.log(), vec!["browser:root"]);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_keeps_mode() {
        let h = Harness::new("/");
        let (outcome, state) = run(&h, "/settings", "").await;
        assert_eq!(outcome.handled_as, RouteName::Settings);
        assert_eq!(state.mode, Mode::View);
        assert_eq!(h.settings.opened.get(), 1);
    }
}
