//! Process-wide backend construction.
//!
//! [`BackendFactory`] is created once in `main` and handed to whoever needs
//! the [`Ops`] surface. The first [`get_backend`](BackendFactory::get_backend)
//! resolves the deployment mode, validates endpoints, runs credential
//! discovery when the remote backend is selected, and caches the result;
//! concurrent first calls still build exactly one backend.

use std::sync::{Arc, OnceLock};

use lakehouse_backend::{BackendConfig, BackendKind, FsNativeClient, NativeClient, create_backend};
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::credentials::CredentialDiscovery;
use crate::error::{CoreError, CoreResult};
use crate::mode::{ModeConfig, Transport, resolve};
use crate::ops::Ops;

pub struct BackendFactory {
    settings: Settings,
    native: Arc<dyn NativeClient>,
    mode: OnceLock<ModeConfig>,
    ops: OnceCell<Arc<Ops>>,
}

impl BackendFactory {
    /// Factory using the native client library found at `settings.native_dir`.
    pub fn new(settings: Settings) -> Self {
        let native = Arc::new(FsNativeClient::new(settings.native_dir.clone()));
        Self::with_native_client(settings, native)
    }

    /// Factory with an explicit native client.
    pub fn with_native_client(settings: Settings, native: Arc<dyn NativeClient>) -> Self {
        Self {
            settings,
            native,
            mode: OnceLock::new(),
            ops: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The resolved deployment mode, computed on first use.
    pub fn mode(&self) -> CoreResult<ModeConfig> {
        if let Some(mode) = self.mode.get() {
            return Ok(mode.clone());
        }
        let mode = resolve(&self.settings.mode)?;
        Ok(self.mode.get_or_init(|| mode).clone())
    }

    /// The shared [`Ops`] instance, built on first call.
    pub async fn get_backend(&self) -> CoreResult<Arc<Ops>> {
        self.ops.get_or_try_init(|| self.build()).await.cloned()
    }

    /// Whether the backend has been built.
    pub fn is_initialized(&self) -> bool {
        self.ops.initialized()
    }

    /// Factory whose backend is already built. The mode is still resolved from `settings`.
    #[cfg(any(test, feature = "test-support"))]
    pub fn with_ops(settings: Settings, ops: Ops) -> Self {
        let native = Arc::new(FsNativeClient::new(settings.native_dir.clone()));
        Self {
            settings,
            native,
            mode: OnceLock::new(),
            ops: OnceCell::new_with(Some(Arc::new(ops))),
        }
    }

    /// Drops the cached mode and backend so the next call builds afresh.
    #[cfg(any(test, feature = "test-support"))]
    pub fn reset(&mut self) {
        self.mode = OnceLock::new();
        self.ops = OnceCell::new();
    }

    async fn build(&self) -> CoreResult<Arc<Ops>> {
        let mode = self.mode()?;
        log::info!(
            "Building {} backend (transport={}, multiuser={}, source={:?})",
            mode.backend,
            mode.transport,
            mode.multiuser,
            mode.source
        );

        let config = match mode.backend {
            BackendKind::RemoteApi => {
                let catalog_url = self.settings.catalog_url.as_deref();
                let registry_url = self.settings.registry_url.as_deref();
                mode.validate_endpoints(catalog_url, registry_url)?;
                let (Some(catalog_url), Some(registry_url)) = (catalog_url, registry_url) else {
                    return Err(CoreError::configuration("remote endpoints are not configured"));
                };

                let discovered = CredentialDiscovery::new()
                    .per_request(mode.transport == Transport::Http)
                    .env_token(self.settings.access_token.clone())
                    .native_session(self.native.clone(), Some(registry_url.to_string()))
                    .dev_mode(self.settings.dev_mode)
                    .discover_or_fail()
                    .await?;

                BackendConfig::RemoteApi {
                    catalog_url: catalog_url.to_string(),
                    registry_url: registry_url.to_string(),
                    auth: discovered.into_auth(),
                    default_bucket: self.settings.default_bucket.clone(),
                }
            }
            BackendKind::LocalLibrary => BackendConfig::LocalLibrary {
                client: self.native.clone(),
            },
        };

        let backend = create_backend(config)?;
        Ok(Arc::new(Ops::new(backend)))
    }
}

impl std::fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendFactory")
            .field("settings", &self.settings)
            .field("mode", &self.mode.get())
            .field("initialized", &self.ops.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use lakehouse_backend::{
        Credential, CredentialSource, NativeConfig, NativeError, NativeManifest, NativeResult,
        NativeSession, scope_request_credential,
    };
    use secrecy::SecretString;

    use super::*;
    use crate::mode::ModeInputs;

    /// Native client that records how often its session is asked for.
    #[derive(Default)]
    struct CountingNative {
        sessions: AtomicUsize,
        token: Option<&'static str>,
    }

    #[async_trait]
    impl NativeClient for CountingNative {
        async fn config(&self) -> NativeResult<NativeConfig> {
            Ok(NativeConfig::default())
        }

        async fn set_navigator_url(&self, url: &str) -> NativeResult<NativeConfig> {
            Ok(NativeConfig {
                navigator_url: Some(url.to_string()),
                ..NativeConfig::default()
            })
        }

        async fn session(&self, _registry_url: &str) -> NativeResult<Option<NativeSession>> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(self.token.map(|t| NativeSession {
                access_token: SecretString::new(t.to_string()),
                expires_at: None,
            }))
        }

        async fn list_packages(&self, _registry: &str) -> NativeResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn load_manifest(
            &self,
            name: &str,
            _registry: &str,
            _top_hash: Option<&str>,
        ) -> NativeResult<NativeManifest> {
            Err(NativeError::NoSuchPackage(name.to_string()))
        }
    }

    fn settings(preset: &str) -> Settings {
        let Ok(mut settings) = Settings::from_lookup(|_| None) else {
            panic!("empty settings should load");
        };
        settings.mode = ModeInputs {
            preset_flag: Some(preset.to_string()),
            ..ModeInputs::default()
        };
        settings
    }

    fn with_endpoints(mut settings: Settings) -> Settings {
        settings.catalog_url = Some("https://catalog.example.com".into());
        settings.registry_url = Some("https://registry.example.com".into());
        settings
    }

    fn factory(settings: Settings, native: &Arc<CountingNative>) -> BackendFactory {
        BackendFactory::with_native_client(settings, native.clone())
    }

    #[tokio::test]
    async fn legacy_builds_local_library_without_discovery() {
        let native = Arc::new(CountingNative::default());
        let factory = factory(settings("legacy"), &native);

        let Ok(first) = factory.get_backend().await else {
            panic!("legacy backend should build");
        };
        let Ok(second) = factory.get_backend().await else {
            panic!("cached backend should be returned");
        };
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), BackendKind::LocalLibrary);
        assert_eq!(native.sessions.load(Ordering::SeqCst), 0);
        assert!(factory.is_initialized());
    }

    #[tokio::test]
    async fn remote_without_endpoints_is_configuration_error() {
        let native = Arc::new(CountingNative::default());
        let factory = factory(settings("remote"), &native);

        let result = factory.get_backend().await;
        assert!(
            matches!(result, Err(CoreError::Configuration(_))),
            "unexpected: {result:?}"
        );
        assert_eq!(native.sessions.load(Ordering::SeqCst), 0);
        assert!(!factory.is_initialized());
    }

    #[tokio::test]
    async fn multiuser_without_any_credential_fails() {
        let native = Arc::new(CountingNative::default());
        let factory = factory(with_endpoints(settings("local")), &native);

        let result = factory.get_backend().await;
        let Err(CoreError::Authentication(failure)) = result else {
            panic!("expected discovery failure, got {result:?}");
        };
        assert_eq!(failure.attempts.len(), 4);
        assert_eq!(native.sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn native_session_is_used_when_env_is_absent() {
        let native = Arc::new(CountingNative {
            token: Some("native"),
            ..CountingNative::default()
        });
        let factory = factory(with_endpoints(settings("local")), &native);

        let ops = factory.get_backend().await;
        assert_eq!(ops.ok().map(|o| o.kind()), Some(BackendKind::RemoteApi));
        assert_eq!(native.sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn runtime_credential_short_circuits_lower_sources() {
        let native = Arc::new(CountingNative {
            token: Some("native"),
            ..CountingNative::default()
        });
        let factory = factory(with_endpoints(settings("local")), &native);

        let ops = scope_request_credential(
            Some(Credential::new("scoped", CredentialSource::RuntimeContext)),
            factory.get_backend(),
        )
        .await;
        assert!(ops.is_ok(), "unexpected: {ops:?}");
        assert_eq!(native.sessions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn http_transport_needs_no_startup_credential() {
        let native = Arc::new(CountingNative::default());
        let factory = factory(with_endpoints(settings("remote")), &native);

        assert!(factory.get_backend().await.is_ok());
        assert_eq!(native.sessions.load(Ordering::SeqCst), 0);
        assert_eq!(factory.mode().ok().map(|m| m.transport), Some(Transport::Http));
    }

    #[tokio::test]
    async fn reset_builds_a_fresh_instance() {
        let native = Arc::new(CountingNative::default());
        let mut factory = factory(settings("legacy"), &native);

        let Ok(first) = factory.get_backend().await else {
            panic!("backend should build");
        };
        factory.reset();
        assert!(!factory.is_initialized());
        let Ok(second) = factory.get_backend().await else {
            panic!("backend should rebuild");
        };
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_build_once() {
        let native = Arc::new(CountingNative {
            token: Some("native"),
            ..CountingNative::default()
        });
        let factory = Arc::new(factory(with_endpoints(settings("local")), &native));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                tokio::spawn(async move { factory.get_backend().await.ok() })
            })
            .collect();
        let results = futures::future::join_all(handles).await;

        let built: Vec<Arc<Ops>> = results
            .into_iter()
            .filter_map(|r| r.ok().flatten())
            .collect();
        assert_eq!(built.len(), 8);
        assert!(built.iter().all(|ops| Arc::ptr_eq(ops, &built[0])));
        assert_eq!(native.sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn preloaded_ops_skip_construction() {
        let settings = settings("remote");
        let factory = BackendFactory::with_ops(
            settings,
            Ops::new(Arc::new(crate::test_utils::MockBackend::new())),
        );
        assert!(factory.is_initialized());
        assert!(factory.get_backend().await.is_ok());
    }

    #[test]
    fn mode_is_cached() {
        let native = Arc::new(CountingNative::default());
        let factory = factory(settings("remote"), &native);
        let a = factory.mode().ok();
        let b = factory.mode().ok();
        assert_eq!(a, b);
        assert_eq!(a.map(|m| m.backend), Some(BackendKind::RemoteApi));
    }
}
