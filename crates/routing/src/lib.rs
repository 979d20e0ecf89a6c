//! URL routing and state synchronization for the catalog explorer.
//!
//! The browser address bar is the shareable form of [`ApplicationState`].
//! [`UnifiedRouter`] owns history writes, [`UnifiedStateManager`] owns the
//! canonical state snapshot, and [`StateCodec`] maps between the two.

pub mod codec;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod query;
pub mod route_table;
pub mod router;
pub mod state;
pub mod state_manager;

#[cfg(test)]
mod testing;

pub use codec::{StateCodec, UrlTarget, keys};
pub use collaborators::*;
pub use config::RouterConfig;
pub use error::{FetchError, RouteError};
pub use guard::{RouteGuard, RouteToken, RouterPhase};
pub use handlers::{CatalogRouteHandler, HandlerOutcome, RouteHandler};
pub use query::QueryParams;
pub use route_table::{BasePath, Mode, Resolution, Route, RouteMatch, RouteName, RoutePath, RouteTable};
pub use router::{RouterStats, UnifiedRouter};
pub use state::*;
pub use state_manager::{AppEvent, ApplyReport, StateChange, UnifiedStateManager};
