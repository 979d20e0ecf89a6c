use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::route_table::BasePath;

/// Router tunables. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Prefix the app is deployed under, e.g. `/explorer`.
    pub base_path: String,
    pub poll_interval_ms: u64,
    /// Deadline for a collaborator to appear and report ready.
    pub ready_timeout_ms: u64,
    /// Deadline for a catalog's collection list after switching catalogs.
    pub collection_timeout_ms: u64,
    /// Decimal places kept for the map center.
    pub viewport_decimals: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            poll_interval_ms: 100,
            ready_timeout_ms: 5_000,
            collection_timeout_ms: 10_000,
            viewport_decimals: 5,
        }
    }
}

impl RouterConfig {
    pub fn from_json(raw: &str) -> Result<Self, RouteError> {
        let config: RouterConfig =
            serde_json::from_str(raw).map_err(|e| RouteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if self.poll_interval_ms == 0 {
            return Err(RouteError::Config("poll_interval_ms must be positive".into()));
        }
        if self.viewport_decimals > 10 {
            return Err(RouteError::Config("viewport_decimals must be at most 10".into()));
        }
        Ok(())
    }

    pub fn base(&self) -> BasePath {
        BasePath::new(&self.base_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_millis(self.collection_timeout_ms)
    }
}
