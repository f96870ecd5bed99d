//! Backend factory.

use std::sync::Arc;

use crate::error::Result;
use crate::traits::Backend;

#[cfg(feature = "local-library")]
use crate::backends::{LocalLibraryBackend, NativeClient};
#[cfg(feature = "remote-api")]
use crate::backends::RemoteApiBackend;
#[cfg(feature = "remote-api")]
use crate::credential::RemoteAuth;

/// Everything needed to build one backend.
pub enum BackendConfig {
    #[cfg(feature = "remote-api")]
    RemoteApi {
        catalog_url: String,
        registry_url: String,
        auth: RemoteAuth,
        /// Bucket for package calls that name no registry.
        default_bucket: Option<String>,
    },
    #[cfg(feature = "local-library")]
    LocalLibrary { client: Arc<dyn NativeClient> },
}

/// Creates a [`Backend`] from `config`.
///
/// The concrete type follows the [`BackendConfig`] variant; the result is an
/// `Arc<dyn Backend>` ready to be shared across tasks.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use lakehouse_backend::{Backend, BackendConfig, FsNativeClient, create_backend};
///
/// let backend = create_backend(BackendConfig::LocalLibrary {
///     client: Arc::new(FsNativeClient::new("/home/me/.local/share/Quilt")),
/// })
/// .unwrap();
/// assert_eq!(backend.kind().as_str(), "local-library");
/// ```
pub fn create_backend(config: BackendConfig) -> Result<Arc<dyn Backend>> {
    match config {
        #[cfg(feature = "remote-api")]
        BackendConfig::RemoteApi {
            catalog_url,
            registry_url,
            auth,
            default_bucket,
        } => Ok(Arc::new(
            RemoteApiBackend::new(&catalog_url, &registry_url, auth)?
                .with_default_bucket(default_bucket.as_deref())?,
        )),
        #[cfg(feature = "local-library")]
        BackendConfig::LocalLibrary { client } => Ok(Arc::new(LocalLibraryBackend::new(client))),
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "remote-api")]
            Self::RemoteApi {
                catalog_url,
                registry_url,
                auth,
                default_bucket,
            } => f
                .debug_struct("RemoteApi")
                .field("catalog_url", catalog_url)
                .field("registry_url", registry_url)
                .field("auth", auth)
                .field("default_bucket", default_bucket)
                .finish(),
            #[cfg(feature = "local-library")]
            Self::LocalLibrary { .. } => f.debug_struct("LocalLibrary").finish_non_exhaustive(),
        }
    }
}

#[cfg(all(test, feature = "all-backends"))]
mod tests {
    use super::*;
    use crate::backends::FsNativeClient;
    use crate::error::ErrorKind;
    use crate::types::BackendKind;

    #[test]
    fn builds_remote() {
        let backend = create_backend(BackendConfig::RemoteApi {
            catalog_url: "https://catalog.example.com".into(),
            registry_url: "https://registry.example.com/".into(),
            auth: RemoteAuth::PerRequest,
            default_bucket: None,
        });
        assert_eq!(backend.map(|b| b.kind()).ok(), Some(BackendKind::RemoteApi));
    }

    #[test]
    fn remote_rejects_bad_endpoint() {
        let backend = create_backend(BackendConfig::RemoteApi {
            catalog_url: "catalog".into(),
            registry_url: "https://registry.example.com".into(),
            auth: RemoteAuth::PerRequest,
            default_bucket: None,
        });
        assert_eq!(backend.err().map(|e| e.kind()), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn remote_default_registry_is_the_bucket() {
        let Ok(backend) = create_backend(BackendConfig::RemoteApi {
            catalog_url: "https://catalog.example.com".into(),
            registry_url: "https://registry.example.com".into(),
            auth: RemoteAuth::PerRequest,
            default_bucket: Some("demo".into()),
        }) else {
            panic!("remote backend should build");
        };
        assert_eq!(
            backend.default_registry().await.ok().flatten().as_deref(),
            Some("s3://demo")
        );
    }

    #[test]
    fn remote_rejects_url_as_bucket() {
        let backend = create_backend(BackendConfig::RemoteApi {
            catalog_url: "https://catalog.example.com".into(),
            registry_url: "https://registry.example.com".into(),
            auth: RemoteAuth::PerRequest,
            default_bucket: Some("https://registry.example.com".into()),
        });
        assert_eq!(backend.err().map(|e| e.kind()), Some(ErrorKind::Validation));
    }

    #[test]
    fn builds_local_without_admin() {
        let backend = create_backend(BackendConfig::LocalLibrary {
            client: Arc::new(FsNativeClient::new("/nonexistent")),
        });
        let Ok(backend) = backend else {
            panic!("local backend should build");
        };
        assert_eq!(backend.kind(), BackendKind::LocalLibrary);
        assert!(!backend.admin_capability().available);
    }
}
