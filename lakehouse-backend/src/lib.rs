//! # lakehouse-backend
//!
//! Backend abstraction for data-catalog operations. One [`Backend`] trait,
//! two implementations, one domain model, one error taxonomy.
//!
//! ## Backends
//!
//! | Backend | Feature Flag | Transport | Auth |
//! |---------|-------------|-----------|------|
//! | [`LocalLibraryBackend`] | `local-library` | native client library (on-disk state) | whatever the library manages |
//! | [`RemoteApiBackend`] | `remote-api` | GraphQL over HTTPS | Bearer token |
//!
//! ## Feature Flags
//!
//! - **`all-backends`** *(default)*: both backends.
//! - **`native-tls`** *(default)* / **`rustls`**: TLS implementation for `reqwest`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lakehouse_backend::{
//!     Backend, BackendConfig, Credential, CredentialSource, RemoteAuth, create_backend,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = create_backend(BackendConfig::RemoteApi {
//!         catalog_url: "https://catalog.example.com".to_string(),
//!         registry_url: "https://registry.example.com".to_string(),
//!         auth: RemoteAuth::Static(Credential::new("token", CredentialSource::Environment)),
//!         default_bucket: None,
//!     })?;
//!
//!     for name in backend.list_all_packages("s3://my-bucket").await? {
//!         println!("{name}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T, OpsError>`](OpsError). There are five
//! kinds: `Authentication`, `Permission`, `NotFound`, `Validation` and
//! `Backend`. Transport failures (`Network`, `Timeout`, `RateLimited`) are
//! retried with exponential backoff for queries, never for mutations.

mod backends;
mod credential;
mod error;
mod factory;
mod http_client;
mod traits;
mod types;
mod utils;

pub use error::{BackendFailure, ErrorKind, OpsError, Result};

pub use factory::{BackendConfig, create_backend};

// Internal traits (`ErrorMapper`) are not exported
pub use traits::Backend;

pub use credential::{
    Credential, CredentialSource, RemoteAuth, request_credential, scope_request_credential,
};

pub use types::{
    AdminCapability, AuthStatus, BackendKind, CatalogConfig, ContentInfo, ContentKind,
    CreateUserRequest, PackageInfo, PackageMetadata, Role, RoleType, SsoConfig,
    TabulatorOpenQuery, User,
};

pub use utils::{datetime, log_sanitizer::truncate_for_log};

#[cfg(feature = "local-library")]
pub use backends::{
    FsNativeClient, LocalLibraryBackend, NativeAdmin, NativeClient, NativeConfig, NativeEntry,
    NativeError, NativeManifest, NativeResult, NativeSession,
};

#[cfg(feature = "remote-api")]
pub use backends::RemoteApiBackend;
