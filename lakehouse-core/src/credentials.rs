//! Credential discovery chain.
//!
//! Sources are tried in a fixed order and the first success wins:
//!
//! 1. runtime context (a task-scoped credential, or per-request bearer
//!    credentials when the process serves HTTP)
//! 2. environment secret
//! 3. native client library session
//! 4. development credential (opt-in)
//!
//! Lower sources are never consulted once a higher one succeeds. When every
//! source fails, the error lists each one and why it was unavailable.

use std::fmt;
use std::sync::Arc;

use lakehouse_backend::{
    Credential, CredentialSource, NativeClient, NativeError, RemoteAuth, request_credential,
};
use secrecy::SecretString;
use serde::Serialize;

use crate::config::{ENV_ACCESS_TOKEN, ENV_DEV_MODE};
use crate::error::{CoreError, CoreResult};

/// Result of asking one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Found,
    NotFound,
    Expired,
    Disabled,
    NotInstalled,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotFound => "not found",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
            Self::NotInstalled => "not installed",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source asked during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAttempt {
    pub source: CredentialSource,
    pub outcome: AttemptOutcome,
    pub detail: Option<String>,
}

impl SourceAttempt {
    fn new(source: CredentialSource, outcome: AttemptOutcome, detail: impl Into<String>) -> Self {
        Self {
            source,
            outcome,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for SourceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.outcome)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Every source failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryFailure {
    pub attempts: Vec<SourceAttempt>,
}

impl fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Authentication required but no credential was found")?;
        for (i, attempt) in self.attempts.iter().enumerate() {
            write!(f, "\n  {}. {attempt}", i + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for DiscoveryFailure {}

/// The winning source and the remote auth mode it yields.
#[derive(Debug, Clone)]
pub struct DiscoveredCredential {
    source: CredentialSource,
    auth: RemoteAuth,
    attempts: Vec<SourceAttempt>,
}

impl DiscoveredCredential {
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn auth(&self) -> &RemoteAuth {
        &self.auth
    }

    /// Every source asked, the winning one last.
    pub fn attempts(&self) -> &[SourceAttempt] {
        &self.attempts
    }

    pub fn into_auth(self) -> RemoteAuth {
        self.auth
    }
}

/// Configured discovery chain.
#[derive(Default)]
pub struct CredentialDiscovery {
    per_request: bool,
    env_token: Option<SecretString>,
    native: Option<Arc<dyn NativeClient>>,
    registry_url: Option<String>,
    dev_mode: bool,
}

enum Step {
    Found(RemoteAuth, SourceAttempt),
    Missing(SourceAttempt),
}

impl CredentialDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request carries its own bearer credential (HTTP transport).
    #[must_use]
    pub fn per_request(mut self, enabled: bool) -> Self {
        self.per_request = enabled;
        self
    }

    #[must_use]
    pub fn env_token(mut self, token: Option<SecretString>) -> Self {
        self.env_token = token;
        self
    }

    /// Native library to ask for a login session for `registry_url`.
    ///
    /// Without an explicit registry the library's configured one is used.
    #[must_use]
    pub fn native_session(
        mut self,
        client: Arc<dyn NativeClient>,
        registry_url: Option<String>,
    ) -> Self {
        self.native = Some(client);
        self.registry_url = registry_url;
        self
    }

    #[must_use]
    pub fn dev_mode(mut self, enabled: bool) -> Self {
        self.dev_mode = enabled;
        self
    }

    /// Runs the chain.
    pub async fn discover_or_fail(&self) -> CoreResult<DiscoveredCredential> {
        let mut attempts = Vec::with_capacity(4);

        for source in [
            CredentialSource::RuntimeContext,
            CredentialSource::Environment,
            CredentialSource::NativeSession,
            CredentialSource::Development,
        ] {
            let step = match source {
                CredentialSource::RuntimeContext => self.runtime_context(),
                CredentialSource::Environment => self.environment(),
                CredentialSource::NativeSession => self.native().await,
                CredentialSource::Development => self.development(),
            };
            match step {
                Step::Found(auth, attempt) => {
                    log::info!("Credential resolved from {source}");
                    attempts.push(attempt);
                    return Ok(DiscoveredCredential {
                        source,
                        auth,
                        attempts,
                    });
                }
                Step::Missing(attempt) => {
                    log::debug!("Credential source {attempt}");
                    attempts.push(attempt);
                }
            }
        }

        let failure = DiscoveryFailure { attempts };
        log::warn!("{failure}");
        Err(CoreError::Authentication(failure))
    }

    fn runtime_context(&self) -> Step {
        let source = CredentialSource::RuntimeContext;
        if request_credential().is_some() {
            return Step::Found(
                RemoteAuth::PerRequest,
                SourceAttempt::new(source, AttemptOutcome::Found, "bound to the current task"),
            );
        }
        if self.per_request {
            return Step::Found(
                RemoteAuth::PerRequest,
                SourceAttempt::new(
                    source,
                    AttemptOutcome::Found,
                    "each HTTP request supplies its own bearer credential",
                ),
            );
        }
        Step::Missing(SourceAttempt::new(
            source,
            AttemptOutcome::NotFound,
            "no credential bound to the current task",
        ))
    }

    fn environment(&self) -> Step {
        let source = CredentialSource::Environment;
        match &self.env_token {
            Some(token) => Step::Found(
                RemoteAuth::Static(Credential::from_secret(token.clone(), source)),
                SourceAttempt::new(source, AttemptOutcome::Found, ENV_ACCESS_TOKEN),
            ),
            None => Step::Missing(SourceAttempt::new(
                source,
                AttemptOutcome::NotFound,
                format!("{ENV_ACCESS_TOKEN} is not set"),
            )),
        }
    }

    async fn native(&self) -> Step {
        let source = CredentialSource::NativeSession;
        let missing = |outcome, detail: String| Step::Missing(SourceAttempt::new(source, outcome, detail));

        let Some(client) = &self.native else {
            return missing(AttemptOutcome::NotInstalled, "no native client library".into());
        };

        let registry_url = match &self.registry_url {
            Some(url) => url.clone(),
            None => match client.config().await {
                Ok(config) => match config.registry_url {
                    Some(url) => url,
                    None => {
                        return missing(AttemptOutcome::NotFound, "no registry configured".into());
                    }
                },
                Err(NativeError::NotInstalled(dir)) => {
                    return missing(AttemptOutcome::NotInstalled, format!("nothing at {dir}"));
                }
                Err(e) => return missing(AttemptOutcome::NotFound, e.to_string()),
            },
        };

        match client.session(&registry_url).await {
            Ok(Some(session)) if session.is_expired() => missing(
                AttemptOutcome::Expired,
                format!("session for {registry_url} has expired"),
            ),
            Ok(Some(session)) => Step::Found(
                RemoteAuth::Static(Credential::from_secret(session.access_token, source)),
                SourceAttempt::new(source, AttemptOutcome::Found, registry_url),
            ),
            Ok(None) => missing(
                AttemptOutcome::NotFound,
                format!("not logged in to {registry_url}"),
            ),
            Err(NativeError::NotInstalled(dir)) => {
                missing(AttemptOutcome::NotInstalled, format!("nothing at {dir}"))
            }
            Err(NativeError::SessionExpired(url)) => {
                missing(AttemptOutcome::Expired, format!("session for {url} has expired"))
            }
            Err(e) => missing(AttemptOutcome::NotFound, e.to_string()),
        }
    }

    fn development(&self) -> Step {
        let source = CredentialSource::Development;
        if !self.dev_mode {
            return Step::Missing(SourceAttempt::new(
                source,
                AttemptOutcome::Disabled,
                format!("{ENV_DEV_MODE} is off"),
            ));
        }
        log::warn!("Using a synthesized development credential");
        let token = format!("dev-{}", uuid::Uuid::new_v4());
        Step::Found(
            RemoteAuth::Static(Credential::new(token, source)),
            SourceAttempt::new(source, AttemptOutcome::Found, format!("{ENV_DEV_MODE} is on")),
        )
    }
}
