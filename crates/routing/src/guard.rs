use std::cell::Cell;
use std::rc::Rc;

use crate::error::RouteError;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum RouterPhase {
    #[default]
    Idle,
    Processing {
        route_id: u64,
    },
}

#[derive(Default)]
struct GuardState {
    phase: Cell<RouterPhase>,
    next_id: Cell<u64>,
}

/// Tracks whether a route is being applied, and which one.
///
/// While processing, state changes must not write history. Starting a new
/// route supersedes the previous one: its token stops being current and
/// dropping it no longer returns the guard to idle.
#[derive(Clone, Default)]
pub struct RouteGuard {
    inner: Rc<GuardState>,
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RouterPhase {
        self.inner.phase.get()
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase(), RouterPhase::Processing { .. })
    }

    pub fn begin(&self) -> RouteToken {
        let route_id = self.inner.next_id.get().wrapping_add(1);
        self.inner.next_id.set(route_id);
        self.inner.phase.set(RouterPhase::Processing { route_id });
        RouteToken {
            guard: self.clone(),
            route_id,
        }
    }
}

/// Held for the duration of one route's processing; returns the guard to
/// idle on drop, on every exit path.
pub struct RouteToken {
    guard: RouteGuard,
    route_id: u64,
}

impl RouteToken {
    pub fn route_id(&self) -> u64 {
        self.route_id
    }

    /// False once a newer route has started.
    pub fn is_current(&self) -> bool {
        self.guard.phase()
            == RouterPhase::Processing {
                route_id: self.route_id,
            }
    }

    /// Checked after every suspension point.
    pub fn ensure_current(&self) -> Result<(), RouteError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(RouteError::Superseded)
        }
    }
}

impl Drop for RouteToken {
    fn drop(&mut self) {
        if self.is_current() {
            self.guard.inner.phase.set(RouterPhase::Idle);
        }
    }
}

impl std::fmt::Debug for RouteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteToken")
            .field("route_id", &self.route_id)
            .field("current", &self.is_current())
            .finish()
    }
}
