use thiserror::Error;

/// Failure talking to a catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    Parse(String),
    #[error("not found")]
    NotFound,
}

/// Why a route did not apply completely. Handlers degrade instead of failing
/// wherever they can, so most of these end up as user notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("item `{item_id}` could not be loaded: {source}")]
    Item {
        item_id: String,
        #[source]
        source: FetchError,
    },
    #[error("no API client available")]
    NoApiClient,
    #[error("superseded by a newer navigation")]
    Superseded,
    #[error("invalid router configuration: {0}")]
    Config(String),
}

impl RouteError {
    /// Superseded routes are expected and never reported to the user.
    pub fn is_superseded(&self) -> bool {
        matches!(self, RouteError::Superseded)
    }
}
