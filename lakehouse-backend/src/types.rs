//! Domain model shared by every backend.
//!
//! All values are plain immutable data. Backends build them at the moment an
//! underlying call succeeds and hand them upward by value; nothing here holds
//! a reference back to backend-native state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============ Backend identity ============

/// Which adapter is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Remote HTTP/GraphQL API.
    RemoteApi,
    /// Locally installed native client library.
    LocalLibrary,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteApi => "remote-api",
            Self::LocalLibrary => "local-library",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Preset names are not accepted here: preset `local` runs the remote backend.
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "remote-api" => Ok(Self::RemoteApi),
            "local-library" => Ok(Self::LocalLibrary),
            other => Err(format!(
                "unknown backend '{other}' (expected 'remote-api' or 'local-library')"
            )),
        }
    }
}

/// Whether the administrative subset can be used at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCapability {
    pub available: bool,
    /// Why admin is unavailable; `None` when available.
    pub reason: Option<String>,
}

impl AdminCapability {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

// ============ Session / catalog ============

/// Authentication status as seen by the active backend.
///
/// Construct through [`AuthStatus::authenticated`] or
/// [`AuthStatus::unauthenticated`]; the latter never carries a login URL.
/// Deserialization goes through the same rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "AuthStatusFields")]
pub struct AuthStatus {
    is_authenticated: bool,
    logged_in_url: Option<String>,
    catalog_name: Option<String>,
    registry_url: Option<String>,
}

impl AuthStatus {
    pub fn authenticated(
        logged_in_url: impl Into<String>,
        catalog_name: Option<String>,
        registry_url: Option<String>,
    ) -> Self {
        Self {
            is_authenticated: true,
            logged_in_url: Some(logged_in_url.into()),
            catalog_name,
            registry_url,
        }
    }

    pub fn unauthenticated(catalog_name: Option<String>, registry_url: Option<String>) -> Self {
        Self {
            is_authenticated: false,
            logged_in_url: None,
            catalog_name,
            registry_url,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn logged_in_url(&self) -> Option<&str> {
        self.logged_in_url.as_deref()
    }

    pub fn catalog_name(&self) -> Option<&str> {
        self.catalog_name.as_deref()
    }

    pub fn registry_url(&self) -> Option<&str> {
        self.registry_url.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthStatusFields {
    is_authenticated: bool,
    logged_in_url: Option<String>,
    catalog_name: Option<String>,
    registry_url: Option<String>,
}

impl TryFrom<AuthStatusFields> for AuthStatus {
    type Error = String;

    fn try_from(fields: AuthStatusFields) -> std::result::Result<Self, Self::Error> {
        match (fields.is_authenticated, fields.logged_in_url) {
            (true, Some(url)) => Ok(Self::authenticated(url, fields.catalog_name, fields.registry_url)),
            (false, None) => Ok(Self::unauthenticated(fields.catalog_name, fields.registry_url)),
            (true, None) => Err("an authenticated status needs loggedInUrl".to_string()),
            (false, Some(_)) => Err("an unauthenticated status cannot carry loggedInUrl".to_string()),
        }
    }
}

/// Catalog endpoints in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    pub catalog_url: String,
    pub registry_url: String,
    /// Host part of `catalog_url`.
    pub catalog_name: Option<String>,
}

impl CatalogConfig {
    /// Builds a config, deriving `catalog_name` from the catalog URL host.
    pub fn new(catalog_url: impl Into<String>, registry_url: impl Into<String>) -> Self {
        let catalog_url = catalog_url.into();
        let catalog_name = url::Url::parse(&catalog_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        Self {
            catalog_url,
            registry_url: registry_url.into(),
            catalog_name,
        }
    }
}

// ============ Packages ============

/// One package revision. Package-level metadata lives in [`PackageMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// RFC 3339, UTC.
    pub modified_date: String,
    pub registry: String,
    pub bucket: String,
    pub top_hash: String,
}

/// User metadata attached to a package revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub name: String,
    pub top_hash: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Directory,
}

/// An entry inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub size: Option<u64>,
    pub physical_key: Option<String>,
}

// ============ Admin ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    Managed,
    Unmanaged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    pub arn: Option<String>,
    #[serde(rename = "type")]
    pub role_type: RoleType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_sso_only: bool,
    pub is_service: bool,
    pub date_joined: Option<String>,
    pub last_login: Option<String>,
    pub role: Option<Role>,
    pub extra_roles: Vec<Role>,
}

/// Input for `user_create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub extra_roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoConfig {
    /// The raw configuration document.
    pub text: String,
    pub timestamp: String,
    pub uploader: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabulatorOpenQuery {
    pub enabled: bool,
}
