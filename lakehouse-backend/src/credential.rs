//! Bearer credentials and the per-request credential scope.

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Bound to the current request (e.g. an HTTP `Authorization` header).
    RuntimeContext,
    /// Process environment secret.
    Environment,
    /// Login state of the native client library.
    NativeSession,
    /// Locally synthesized development credential.
    Development,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RuntimeContext => "runtime context",
            Self::Environment => "environment secret",
            Self::NativeSession => "native session",
            Self::Development => "development credential",
        }
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque bearer token plus its provenance.
#[derive(Clone)]
pub struct Credential {
    token: SecretString,
    source: CredentialSource,
}

impl Credential {
    pub fn new(token: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            token: SecretString::new(token.into()),
            source,
        }
    }

    pub fn from_secret(token: SecretString, source: CredentialSource) -> Self {
        Self { token, source }
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub(crate) fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// The raw token. Callers must not log it.
    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// How the remote backend authenticates its calls.
#[derive(Debug, Clone)]
pub enum RemoteAuth {
    /// One credential discovered at construction, used for every call.
    Static(Credential),
    /// Every call supplies its own credential through [`scope_request_credential`].
    PerRequest,
}

tokio::task_local! {
    static REQUEST_CREDENTIAL: Option<Credential>;
}

/// Runs `fut` with `credential` bound as the runtime credential.
///
/// The binding is visible only to code awaited inside `fut` and disappears
/// when it completes.
pub async fn scope_request_credential<F>(credential: Option<Credential>, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_CREDENTIAL.scope(credential, fut).await
}

/// The credential bound to the current task, if any.
pub fn request_credential() -> Option<Credential> {
    REQUEST_CREDENTIAL
        .try_with(Clone::clone)
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_is_visible_inside_only() {
        assert!(request_credential().is_none());

        let seen = scope_request_credential(
            Some(Credential::new("abc", CredentialSource::RuntimeContext)),
            async { request_credential().map(|c| c.expose().to_string()) },
        )
        .await;

        assert_eq!(seen.as_deref(), Some("abc"));
        assert!(request_credential().is_none());
    }

    #[tokio::test]
    async fn empty_scope_yields_none() {
        let seen = scope_request_credential(None, async { request_credential().is_some() }).await;
        assert!(!seen);
    }

    #[test]
    fn debug_redacts_token() {
        let c = Credential::new("super-secret", CredentialSource::Environment);
        let printed = format!("{c:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("Environment"));
    }

    #[test]
    fn bearer_header_format() {
        let c = Credential::new("t0k", CredentialSource::Development);
        assert_eq!(c.bearer_header(), "Bearer t0k");
    }
}
