//! Boundary to the installed native client library.
//!
//! [`NativeClient`] is what the local backend drives. The shipped
//! implementation is [`FsNativeClient`](super::FsNativeClient), which reads
//! the library's on-disk state; anything else speaking this trait (an FFI
//! shim, a test fake) plugs in the same way.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::types::{CreateUserRequest, Role, SsoConfig, TabulatorOpenQuery, User};

/// Failures reported by the native client library.
#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    #[error("native client library is not installed ({0})")]
    NotInstalled(String),

    #[error("not logged in to {0}")]
    NotLoggedIn(String),

    #[error("session for {0} has expired")]
    SessionExpired(String),

    #[error("registry {0} does not exist")]
    NoSuchRegistry(String),

    #[error("package {0} does not exist")]
    NoSuchPackage(String),

    #[error("path {0} does not exist")]
    NoSuchPath(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("registry {0} cannot be reached by the local client")]
    UnsupportedRegistry(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt file {path}: {detail}")]
    Corrupt { path: String, detail: String },

    /// An admin command failed; `name` is the library's error name.
    #[error("{name}: {message}")]
    AdminCommand { name: String, message: String },
}

impl NativeError {
    /// Stable code fed to the error mapper.
    pub fn code(&self) -> &str {
        match self {
            Self::NotInstalled(_) => "NotInstalled",
            Self::NotLoggedIn(_) => "NotLoggedIn",
            Self::SessionExpired(_) => "SessionExpired",
            Self::NoSuchRegistry(_) => "NoSuchRegistry",
            Self::NoSuchPackage(_) => "NoSuchPackage",
            Self::NoSuchPath(_) => "NoSuchPath",
            Self::InvalidName(_) => "InvalidName",
            Self::UnsupportedRegistry(_) => "UnsupportedRegistry",
            Self::Forbidden(_) => "Forbidden",
            Self::Io { .. } => "Io",
            Self::Corrupt { .. } => "Corrupt",
            Self::AdminCommand { name, .. } => name,
        }
    }
}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// The library's persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NativeConfig {
    #[serde(default)]
    pub navigator_url: Option<String>,
    #[serde(default)]
    pub registry_url: Option<String>,
    /// Where `local` packages live; library default when unset.
    #[serde(default)]
    pub default_local_registry: Option<String>,
}

/// A login session held by the library.
#[derive(Clone)]
pub struct NativeSession {
    pub access_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NativeSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl std::fmt::Debug for NativeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSession")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEntry {
    pub logical_key: String,
    pub physical_key: Option<String>,
    pub size: u64,
}

/// A loaded package revision.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeManifest {
    pub name: String,
    /// Registry root the manifest was loaded from, as a URL.
    pub registry: String,
    pub top_hash: String,
    pub message: Option<String>,
    pub user_meta: Map<String, Value>,
    pub modified: DateTime<Utc>,
    pub tags: Vec<String>,
    pub entries: Vec<NativeEntry>,
}

#[async_trait]
pub trait NativeClient: Send + Sync {
    async fn config(&self) -> NativeResult<NativeConfig>;

    /// Points the library at a catalog and persists it.
    async fn set_navigator_url(&self, url: &str) -> NativeResult<NativeConfig>;

    /// Login session for `registry_url`, `None` if never logged in.
    async fn session(&self, registry_url: &str) -> NativeResult<Option<NativeSession>>;

    async fn list_packages(&self, registry: &str) -> NativeResult<Vec<String>>;

    /// Loads `top_hash`, or the `latest` revision when `None`.
    async fn load_manifest(
        &self,
        name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> NativeResult<NativeManifest>;

    /// The library's admin module, if it ships one.
    fn admin(&self) -> Option<Arc<dyn NativeAdmin>> {
        None
    }
}

/// Administrative module of the native library.
#[async_trait]
pub trait NativeAdmin: Send + Sync {
    async fn list_users(&self) -> NativeResult<Vec<User>>;
    async fn get_user(&self, name: &str) -> NativeResult<User>;
    async fn create_user(&self, req: &CreateUserRequest) -> NativeResult<User>;
    async fn delete_user(&self, name: &str) -> NativeResult<()>;
    async fn set_email(&self, name: &str, email: &str) -> NativeResult<User>;
    async fn set_admin(&self, name: &str, admin: bool) -> NativeResult<User>;
    async fn set_active(&self, name: &str, active: bool) -> NativeResult<User>;
    async fn reset_password(&self, name: &str) -> NativeResult<()>;
    async fn set_role(
        &self,
        name: &str,
        role: &str,
        extra_roles: &[String],
        append: bool,
    ) -> NativeResult<User>;
    async fn add_roles(&self, name: &str, roles: &[String]) -> NativeResult<User>;
    async fn remove_roles(
        &self,
        name: &str,
        roles: &[String],
        fallback: Option<&str>,
    ) -> NativeResult<User>;
    async fn list_roles(&self) -> NativeResult<Vec<Role>>;
    async fn get_sso_config(&self) -> NativeResult<Option<SsoConfig>>;
    /// `None` removes the configuration.
    async fn set_sso_config(&self, config: Option<&str>) -> NativeResult<Option<SsoConfig>>;
    async fn get_tabulator_open_query(&self) -> NativeResult<TabulatorOpenQuery>;
    async fn set_tabulator_open_query(&self, enabled: bool) -> NativeResult<TabulatorOpenQuery>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: Option<DateTime<Utc>>) -> NativeSession {
        NativeSession {
            access_token: SecretString::new("tok".to_string()),
            expires_at,
        }
    }

    #[test]
    fn expiry() {
        let now = Utc::now();
        assert!(session(Some(now - Duration::seconds(1))).is_expired_at(now));
        assert!(!session(Some(now + Duration::hours(1))).is_expired_at(now));
        assert!(!session(None).is_expired_at(now));
    }

    #[test]
    fn admin_command_code_is_its_name() {
        let e = NativeError::AdminCommand {
            name: "UserNotFound".into(),
            message: "no bob".into(),
        };
        assert_eq!(e.code(), "UserNotFound");
        assert_eq!(e.to_string(), "UserNotFound: no bob");
    }

    #[test]
    fn session_debug_redacts() {
        assert!(!format!("{:?}", session(None)).contains("tok"));
    }
}
