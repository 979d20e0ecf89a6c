//! HTTP-backed catalog list and item lookup.

use catalog::{CatalogDescriptor, CatalogEndpoint, CatalogError, CatalogListing, builtin_catalogs, parse_catalog_list};
use futures::future::LocalBoxFuture;
use gloo_net::http::Request;
use routing::{FetchError, ItemFetcher, StacItem};
use tracing::{debug, warn};

async fn get_text(url: &str) -> Result<String, FetchError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    if resp.status() == 404 {
        return Err(FetchError::NotFound);
    }
    if !resp.ok() {
        return Err(FetchError::Status(resp.status()));
    }
    resp.text().await.map_err(|e| FetchError::Network(e.to_string()))
}

/// Catalog list served by the host (`/api/catalogs`). When the host cannot
/// deliver it, the list compiled into the app is used instead.
pub struct RemoteCatalogListing {
    url: String,
}

impl RemoteCatalogListing {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn load(&self) -> Result<Vec<CatalogDescriptor>, CatalogError> {
        let fetched = get_text(&self.url)
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))
            .and_then(|text| parse_catalog_list(&text));
        match fetched {
            Ok(list) => {
                debug!(url = %self.url, count = list.len(), "catalog list fetched");
                Ok(list)
            }
            Err(err) => {
                warn!(url = %self.url, %err, "catalog list unavailable; using built-in list");
                builtin_catalogs()
            }
        }
    }
}

impl CatalogListing for RemoteCatalogListing {
    fn catalogs(&self) -> LocalBoxFuture<'_, Result<Vec<CatalogDescriptor>, CatalogError>> {
        Box::pin(self.load())
    }
}

/// Fetches single items straight from a STAC API.
#[derive(Debug, Default, Copy, Clone)]
pub struct RemoteItemFetcher;

impl ItemFetcher for RemoteItemFetcher {
    fn fetch_item<'a>(
        &'a self,
        endpoint: &'a CatalogEndpoint,
        collection_id: &'a str,
        item_id: &'a str,
    ) -> LocalBoxFuture<'a, Result<StacItem, FetchError>> {
        Box::pin(async move {
            let url = endpoint
                .item_url(collection_id, item_id)
                .ok_or(FetchError::NotFound)?;
            debug!(%url, "fetching item");
            let text = get_text(&url).await?;
            serde_json::from_str(&text).map_err(|e| FetchError::Parse(e.to_string()))
        })
    }
}
