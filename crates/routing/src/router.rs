use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use runtime::SubscriptionId;
use tracing::{debug, info, warn};

use crate::codec::StateCodec;
use crate::collaborators::{HistoryPort, NoticeLevel};
use crate::guard::{RouteGuard, RouterPhase};
use crate::handlers::{HandlerOutcome, RouteHandler};
use crate::query::QueryParams;
use crate::route_table::{RouteName, RoutePath, RouteTable};
use crate::state::{ApplicationState, ChangeTrigger};
use crate::state_manager::{StateChange, UnifiedStateManager};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RouterStats {
    pub pushes: u64,
    pub replaces: u64,
    /// State changes that arrived while a route was being applied.
    pub suppressed: u64,
    pub routes_processed: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum HistoryWrite {
    Push,
    Replace,
}

/// The single writer of browser history.
///
/// Address-bar changes (initial load, back/forward, programmatic
/// navigation) are matched and handed to the route handler under a
/// [`RouteGuard`]; state changes published by the state manager are encoded
/// and written back, except while a route is being applied.
pub struct UnifiedRouter {
    table: RouteTable,
    codec: StateCodec,
    history: Rc<dyn HistoryPort>,
    manager: Rc<UnifiedStateManager>,
    handler: Rc<dyn RouteHandler>,
    guard: RouteGuard,
    current: RefCell<RoutePath>,
    stats: Cell<RouterStats>,
    subscription: Cell<Option<SubscriptionId>>,
}

impl UnifiedRouter {
    pub fn new(
        table: RouteTable,
        history: Rc<dyn HistoryPort>,
        manager: Rc<UnifiedStateManager>,
        handler: Rc<dyn RouteHandler>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<UnifiedRouter>| {
            let listener = weak.clone();
            let subscription = manager.changes().subscribe(move |change: &StateChange| {
                if let Some(router) = listener.upgrade() {
                    router.on_state_change(change);
                }
            });
            Self {
                codec: StateCodec::new(table.clone()),
                table,
                history,
                manager,
                handler,
                guard: RouteGuard::new(),
                current: RefCell::new(RoutePath::viewer_root()),
                stats: Cell::new(RouterStats::default()),
                subscription: Cell::new(Some(subscription)),
            }
        })
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn phase(&self) -> RouterPhase {
        self.guard.phase()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats.get()
    }

    pub fn current_path(&self) -> RoutePath {
        self.current.borrow().clone()
    }

    /// Processes the location the app was loaded with.
    pub async fn start(&self) -> Option<HandlerOutcome> {
        info!(url = %self.history.current(), "router starting");
        self.process_location().await
    }

    /// Back/forward: the browser already moved, so nothing is pushed.
    pub async fn on_popstate(&self) -> Option<HandlerOutcome> {
        debug!(url = %self.history.current(), "popstate");
        self.process_location().await
    }

    /// Programmatic navigation: push, then process.
    pub async fn navigate(&self, url: &str) -> Option<HandlerOutcome> {
        if self.history.current().to_string() != url {
            self.write(HistoryWrite::Push, url);
        }
        self.process_location().await
    }

    async fn process_location(&self) -> Option<HandlerOutcome> {
        let url = self.history.current();
        let resolution = self.table.resolve(&url.path);
        if let Some(redirect) = &resolution.redirect {
            let target = format!("{redirect}{}", url.query);
            info!(from = %url, to = %target, "redirecting to canonical path");
            self.write(HistoryWrite::Replace, &target);
        }

        let matched = resolution.matched;
        let query = QueryParams::parse(&url.query);
        let token = self.guard.begin();
        *self.current.borrow_mut() = matched.path.clone();
        debug!(route = %matched.path.name, route_id = token.route_id(), "processing route");

        let result = self.handler.handle(&matched, &query, &token).await;
        self.bump(|s| s.routes_processed += 1);

        let outcome = match result {
            Ok(outcome) => Some(outcome),
            Err(err) if err.is_superseded() => {
                debug!(route_id = token.route_id(), "route superseded");
                None
            }
            Err(err) => {
                warn!(route = %matched.path.name, "route failed: {err}");
                self.manager.notify(NoticeLevel::Error, &err.to_string());
                None
            }
        };

        if token.is_current() && matched.path.name != RouteName::Settings {
            let state = self.manager.snapshot();
            self.sync_url(&state, ChangeTrigger::Navigation);
        }
        outcome
    }

    fn on_state_change(&self, change: &StateChange) {
        if self.guard.is_processing() {
            self.bump(|s| s.suppressed += 1);
            debug!(trigger = ?change.trigger, "history write suppressed while routing");
            return;
        }
        self.sync_url(&change.state, change.trigger);
    }

    /// Writes the URL for `state` if it differs from the address bar.
    fn sync_url(&self, state: &ApplicationState, trigger: ChangeTrigger) {
        let current_url = self.history.current().to_string();
        let current_path = self.current.borrow().clone();
        let target = self.codec.to_url(state, &current_path, trigger);
        let url = target.to_url(&self.table);
        if url == current_url {
            return;
        }

        let kind = if trigger.replaces_history() || current_path.is_refined_by(&target.path) {
            HistoryWrite::Replace
        } else {
            HistoryWrite::Push
        };
        debug!(?trigger, ?kind, %url, "syncing URL");
        self.write(kind, &url);
        *self.current.borrow_mut() = target.path;
    }

    fn write(&self, kind: HistoryWrite, url: &str) {
        match kind {
            HistoryWrite::Push => {
                self.history.push(url);
                self.bump(|s| s.pushes += 1);
            }
            HistoryWrite::Replace => {
                self.history.replace(url);
                self.bump(|s| s.replaces += 1);
            }
        }
    }

    fn bump(&self, f: impl FnOnce(&mut RouterStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl Drop for UnifiedRouter {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.manager.changes().unsubscribe(id);
        }
    }
}
