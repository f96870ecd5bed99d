//! GraphQL wire types

use serde::Deserialize;
use serde_json::Value;

use crate::types::{ContentInfo, ContentKind, Role, RoleType, SsoConfig, User};
use crate::utils::datetime;

// ============ Envelope ============

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse {
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlErrorExtensions {
    pub code: Option<String>,
}

// ============ 包 ============

#[derive(Debug, Deserialize)]
pub(crate) struct WirePackagePage {
    pub total: u64,
    pub page: Vec<WirePackageName>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePackageName {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePackage {
    pub bucket: String,
    pub name: String,
    pub revision: Option<WireRevision>,
    pub latest: Option<WireRevisionHash>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRevision {
    pub hash: String,
    pub modified: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRevisionHash {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRevisionMeta {
    pub hash: String,
    #[serde(default)]
    pub user_meta: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDir {
    pub children: Vec<WireDirChild>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub(crate) enum WireDirChild {
    #[serde(rename_all = "camelCase")]
    PackageFile {
        path: String,
        size: Option<u64>,
        physical_key: Option<String>,
    },
    PackageDir { path: String, size: Option<u64> },
}

impl From<WireDirChild> for ContentInfo {
    fn from(child: WireDirChild) -> Self {
        match child {
            WireDirChild::PackageFile {
                path,
                size,
                physical_key,
            } => Self {
                path,
                kind: ContentKind::File,
                size,
                physical_key,
            },
            WireDirChild::PackageDir { path, size } => Self {
                path,
                kind: ContentKind::Directory,
                size,
                physical_key: None,
            },
        }
    }
}

// ============ 用户 / 角色 ============

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub(crate) enum WireRole {
    ManagedRole {
        id: String,
        name: String,
        arn: Option<String>,
    },
    UnmanagedRole {
        id: String,
        name: String,
        arn: Option<String>,
    },
}

impl From<WireRole> for Role {
    fn from(role: WireRole) -> Self {
        let (id, name, arn, role_type) = match role {
            WireRole::ManagedRole { id, name, arn } => (id, name, arn, RoleType::Managed),
            WireRole::UnmanagedRole { id, name, arn } => (id, name, arn, RoleType::Unmanaged),
        };
        Self {
            id,
            name,
            arn,
            role_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireUser {
    pub name: String,
    pub email: String,
    pub date_joined: Option<String>,
    pub last_login: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    #[serde(default)]
    pub is_sso_only: bool,
    #[serde(default)]
    pub is_service: bool,
    pub role: Option<WireRole>,
    #[serde(default)]
    pub extra_roles: Vec<WireRole>,
}

impl From<WireUser> for User {
    fn from(u: WireUser) -> Self {
        Self {
            name: u.name,
            email: u.email,
            is_active: u.is_active,
            is_admin: u.is_admin,
            is_sso_only: u.is_sso_only,
            is_service: u.is_service,
            date_joined: u.date_joined.as_deref().map(datetime::normalize),
            last_login: u.last_login.as_deref().map(datetime::normalize),
            role: u.role.map(Role::from),
            extra_roles: u.extra_roles.into_iter().map(Role::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSsoConfig {
    pub text: String,
    pub timestamp: String,
    pub uploader: WireUploader,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUploader {
    pub name: String,
}

impl From<WireSsoConfig> for SsoConfig {
    fn from(c: WireSsoConfig) -> Self {
        Self {
            text: c.text,
            timestamp: datetime::normalize(&c.timestamp),
            uploader: c.uploader.name,
        }
    }
}
