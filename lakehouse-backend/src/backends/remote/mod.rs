//! Remote GraphQL API backend

mod backend;
mod error;
mod http;
mod queries;
mod types;

use reqwest::Client;

use crate::backends::common::{bucket_from_registry, create_http_client, normalize_url};
use crate::credential::RemoteAuth;
use crate::error::Result;
use crate::types::CatalogConfig;

pub(crate) const BACKEND_NAME: &str = "remote-api";
/// Page size for `packages { page(...) }`
pub(crate) const PACKAGES_PAGE_SIZE: u32 = 100;

/// Backend that talks to the catalog's GraphQL endpoint.
///
/// Endpoints are fixed at construction. Every request carries the runtime
/// credential bound to the current task if there is one, otherwise the
/// credential attached here.
pub struct RemoteApiBackend {
    pub(crate) client: Client,
    pub(crate) catalog: CatalogConfig,
    pub(crate) auth: RemoteAuth,
    pub(crate) graphql_url: String,
    /// Bucket used when a package call names no registry.
    pub(crate) default_bucket: Option<String>,
}

impl RemoteApiBackend {
    pub fn new(catalog_url: &str, registry_url: &str, auth: RemoteAuth) -> Result<Self> {
        let catalog_url = normalize_url(catalog_url, "catalog_url", BACKEND_NAME)?;
        let registry_url = normalize_url(registry_url, "registry_url", BACKEND_NAME)?;
        let graphql_url = format!("{registry_url}/graphql");
        Ok(Self {
            client: create_http_client(BACKEND_NAME)?,
            catalog: CatalogConfig::new(catalog_url, registry_url),
            auth,
            graphql_url,
            default_bucket: None,
        })
    }

    /// Sets the bucket package calls fall back to; accepts `name` or `s3://name`.
    pub fn with_default_bucket(mut self, bucket: Option<&str>) -> Result<Self> {
        self.default_bucket = bucket
            .filter(|b| !b.trim().is_empty())
            .map(|b| bucket_from_registry(b, BACKEND_NAME))
            .transpose()?;
        Ok(self)
    }
}

impl std::fmt::Debug for RemoteApiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApiBackend")
            .field("catalog", &self.catalog)
            .field("auth", &self.auth)
            .field("default_bucket", &self.default_bucket)
            .finish_non_exhaustive()
    }
}
