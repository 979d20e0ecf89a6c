use std::cell::RefCell;

use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::{CatalogDescriptor, CatalogError};

/// Supplier of the authoritative catalog list.
///
/// The list belongs to the caller; implementations may fetch it over the
/// network on every call or wrap another listing with a cache.
pub trait CatalogListing {
    fn catalogs(&self) -> LocalBoxFuture<'_, Result<Vec<CatalogDescriptor>, CatalogError>>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticCatalogListing {
    catalogs: Vec<CatalogDescriptor>,
}

impl StaticCatalogListing {
    pub fn new(catalogs: Vec<CatalogDescriptor>) -> Self {
        Self { catalogs }
    }
}

impl CatalogListing for StaticCatalogListing {
    fn catalogs(&self) -> LocalBoxFuture<'_, Result<Vec<CatalogDescriptor>, CatalogError>> {
        let list = self.catalogs.clone();
        Box::pin(async move { Ok(list) })
    }
}

/// Memoizes the first successful listing of `inner`. Failures are not cached.
pub struct CachedCatalogListing<L> {
    inner: L,
    cached: RefCell<Option<Vec<CatalogDescriptor>>>,
}

impl<L: CatalogListing> CachedCatalogListing<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cached: RefCell::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.borrow().is_some()
    }

    pub fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }
}

impl<L: CatalogListing> CatalogListing for CachedCatalogListing<L> {
    fn catalogs(&self) -> LocalBoxFuture<'_, Result<Vec<CatalogDescriptor>, CatalogError>> {
        Box::pin(async move {
            if let Some(list) = self.cached.borrow().as_ref() {
                return Ok(list.clone());
            }
            let list = self.inner.catalogs().await?;
            debug!(count = list.len(), "catalog list loaded");
            *self.cached.borrow_mut() = Some(list.clone());
            Ok(list)
        })
    }
}
