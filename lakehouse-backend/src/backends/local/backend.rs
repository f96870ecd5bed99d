//! LocalLibraryBackend Backend trait 实现

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::common::{
    normalize_content_path, normalize_url, require_non_empty, validate_email,
    validate_package_name,
};
use crate::error::{OpsError, Result};
use crate::traits::{Backend, ErrorContext, ErrorMapper};
use crate::types::{
    AdminCapability, AuthStatus, BackendKind, CatalogConfig, ContentInfo, ContentKind,
    CreateUserRequest, PackageInfo, PackageMetadata, Role, SsoConfig, TabulatorOpenQuery, User,
};
use crate::utils::datetime;

use super::native::{NativeAdmin, NativeEntry, NativeError, NativeManifest};
use super::LocalLibraryBackend;

const NO_ADMIN_MODULE: &str = "the installed native client library has no admin module";
/// Registry name the native client resolves to its configured local registry.
const LOCAL_REGISTRY: &str = "local";

impl LocalLibraryBackend {
    fn admin_module(&self) -> Result<&Arc<dyn NativeAdmin>> {
        self.admin
            .as_ref()
            .ok_or_else(|| OpsError::admin_unavailable(self.backend_name(), NO_ADMIN_MODULE))
    }

    async fn manifest(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<NativeManifest> {
        validate_package_name(package_name, self.backend_name())?;
        self.client
            .load_manifest(package_name, registry, top_hash)
            .await
            .map_err(|e| {
                let resource = match top_hash {
                    Some(hash) => format!("{package_name}@{hash}"),
                    None => package_name.to_string(),
                };
                let context = ErrorContext {
                    resource: Some(resource),
                    param: Some("registry".to_string()),
                };
                self.native_error(&e, context)
            })
    }
}

/// Immediate children of `prefix` (no trailing slash; empty for the root).
///
/// Directories aggregate the sizes of everything below them. Returns `None`
/// when nothing lives under a non-empty prefix.
fn children_of(entries: &[NativeEntry], prefix: &str) -> Option<Vec<ContentInfo>> {
    let lead = if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}/")
    };

    let mut dirs: BTreeMap<String, u64> = BTreeMap::new();
    let mut files: BTreeMap<String, &NativeEntry> = BTreeMap::new();

    for entry in entries {
        let Some(rest) = entry.logical_key.strip_prefix(&lead) else {
            continue;
        };
        match rest.split_once('/') {
            Some((dir, _)) => *dirs.entry(format!("{lead}{dir}/")).or_default() += entry.size,
            None if !rest.is_empty() => {
                files.insert(entry.logical_key.clone(), entry);
            }
            None => {}
        }
    }

    if !prefix.is_empty() && dirs.is_empty() && files.is_empty() {
        return None;
    }

    let dirs = dirs.into_iter().map(|(path, size)| ContentInfo {
        path,
        kind: ContentKind::Directory,
        size: Some(size),
        physical_key: None,
    });
    let files = files.into_values().map(|e| ContentInfo {
        path: e.logical_key.clone(),
        kind: ContentKind::File,
        size: Some(e.size),
        physical_key: e.physical_key.clone(),
    });
    Some(dirs.chain(files).collect())
}

fn bucket_of(registry_url: &str) -> String {
    registry_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Backend for LocalLibraryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalLibrary
    }

    fn admin_capability(&self) -> AdminCapability {
        if self.admin.is_some() {
            AdminCapability::available()
        } else {
            AdminCapability::unavailable(NO_ADMIN_MODULE)
        }
    }

    async fn get_auth_status(&self) -> Result<AuthStatus> {
        let config = match self.client.config().await {
            Ok(config) => config,
            Err(NativeError::NotInstalled(dir)) => {
                log::debug!("[{}] library not installed at {dir}", self.backend_name());
                return Ok(AuthStatus::unauthenticated(None, None));
            }
            Err(e) => return Err(self.native_error(&e, ErrorContext::default())),
        };

        let catalog_name = config
            .navigator_url
            .as_deref()
            .and_then(|u| CatalogConfig::new(u, "").catalog_name);

        let (Some(navigator_url), Some(registry_url)) = (config.navigator_url, config.registry_url)
        else {
            return Ok(AuthStatus::unauthenticated(catalog_name, None));
        };

        let session = self
            .client
            .session(&registry_url)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::default()))?;

        Ok(match session {
            Some(s) if !s.is_expired() => {
                AuthStatus::authenticated(navigator_url, catalog_name, Some(registry_url))
            }
            _ => AuthStatus::unauthenticated(catalog_name, Some(registry_url)),
        })
    }

    async fn get_catalog_config(&self) -> Result<CatalogConfig> {
        let config = self
            .client
            .config()
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::default()))?;
        match config.navigator_url {
            Some(url) => Ok(CatalogConfig::new(url, config.registry_url.unwrap_or_default())),
            None => Err(OpsError::NotFound {
                backend: self.backend_name().to_string(),
                resource: "catalog configuration".to_string(),
                raw_message: Some("no catalog has been configured".to_string()),
            }),
        }
    }

    async fn configure_catalog(&self, catalog_url: &str) -> Result<CatalogConfig> {
        let url = normalize_url(catalog_url, "catalog_url", self.backend_name())?;
        let config = self
            .client
            .set_navigator_url(&url)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::param("catalog_url")))?;
        log::info!("[{}] catalog set to {url}", self.backend_name());
        Ok(CatalogConfig::new(
            config.navigator_url.unwrap_or(url),
            config.registry_url.unwrap_or_default(),
        ))
    }

    async fn get_registry_url(&self) -> Result<Option<String>> {
        match self.client.config().await {
            Ok(config) => Ok(config.registry_url),
            Err(NativeError::NotInstalled(_)) => Ok(None),
            Err(e) => Err(self.native_error(&e, ErrorContext::default())),
        }
    }

    async fn default_registry(&self) -> Result<Option<String>> {
        // `registry_url` in the library config is the remote login registry
        Ok(Some(LOCAL_REGISTRY.to_string()))
    }

    async fn browse_content(
        &self,
        package_name: &str,
        registry: &str,
        path: &str,
    ) -> Result<Vec<ContentInfo>> {
        let prefix = normalize_content_path(path, self.backend_name())?;
        let manifest = self.manifest(package_name, registry, None).await?;
        children_of(&manifest.entries, &prefix).ok_or_else(|| {
            self.native_error(
                &NativeError::NoSuchPath(prefix.clone()),
                ErrorContext::resource(format!("{package_name}/{prefix}")),
            )
        })
    }

    async fn list_all_packages(&self, registry: &str) -> Result<Vec<String>> {
        let mut packages = self
            .client
            .list_packages(registry)
            .await
            .map_err(|e| {
                self.native_error(
                    &e,
                    ErrorContext {
                        resource: Some(registry.to_string()),
                        param: Some("registry".to_string()),
                    },
                )
            })?;
        packages.sort();
        Ok(packages)
    }

    async fn get_package_info(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageInfo> {
        let manifest = self.manifest(package_name, registry, top_hash).await?;
        Ok(PackageInfo {
            name: manifest.name,
            description: manifest.message,
            tags: manifest.tags,
            modified_date: datetime::to_rfc3339(manifest.modified),
            bucket: bucket_of(&manifest.registry),
            registry: manifest.registry,
            top_hash: manifest.top_hash,
        })
    }

    async fn get_package_metadata(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageMetadata> {
        let manifest = self.manifest(package_name, registry, top_hash).await?;
        Ok(PackageMetadata {
            name: manifest.name,
            top_hash: manifest.top_hash,
            metadata: manifest.user_meta,
        })
    }

    // ============ 管理 ============

    async fn user_list(&self) -> Result<Vec<User>> {
        self.admin_module()?
            .list_users()
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::default()))
    }

    async fn user_get(&self, name: &str) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        self.admin_module()?
            .get_user(name)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::resource(name)))
    }

    async fn user_create(&self, req: &CreateUserRequest) -> Result<User> {
        require_non_empty(&req.name, "name", self.backend_name())?;
        validate_email(&req.email, self.backend_name())?;
        require_non_empty(&req.role, "role", self.backend_name())?;
        self.admin_module()?
            .create_user(req)
            .await
            .map_err(|e| {
                self.native_error(
                    &e,
                    ErrorContext {
                        resource: Some(req.name.clone()),
                        param: Some("name".to_string()),
                    },
                )
            })
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        require_non_empty(name, "name", self.backend_name())?;
        self.admin_module()?
            .delete_user(name)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::resource(name)))
    }

    async fn user_set_email(&self, name: &str, email: &str) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        validate_email(email, self.backend_name())?;
        self.admin_module()?
            .set_email(name, email)
            .await
            .map_err(|e| {
                self.native_error(
                    &e,
                    ErrorContext {
                        resource: Some(name.to_string()),
                        param: Some("email".to_string()),
                    },
                )
            })
    }

    async fn user_set_admin(&self, name: &str, admin: bool) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        self.admin_module()?
            .set_admin(name, admin)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::resource(name)))
    }

    async fn user_set_active(&self, name: &str, active: bool) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        self.admin_module()?
            .set_active(name, active)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::resource(name)))
    }

    async fn user_reset_password(&self, name: &str) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        let admin = self.admin_module()?;
        admin
            .reset_password(name)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::resource(name)))?;
        admin
            .get_user(name)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::resource(name)))
    }

    async fn user_set_role(
        &self,
        name: &str,
        role: &str,
        extra_roles: &[String],
        append: bool,
    ) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        require_non_empty(role, "role", self.backend_name())?;
        self.admin_module()?
            .set_role(name, role, extra_roles, append)
            .await
            .map_err(|e| {
                self.native_error(
                    &e,
                    ErrorContext {
                        resource: Some(name.to_string()),
                        param: Some("role".to_string()),
                    },
                )
            })
    }

    async fn user_add_roles(&self, name: &str, roles: &[String]) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        if roles.is_empty() {
            return Err(self.validation_error("roles", "at least one role is required"));
        }
        self.admin_module()?
            .add_roles(name, roles)
            .await
            .map_err(|e| {
                self.native_error(
                    &e,
                    ErrorContext {
                        resource: Some(name.to_string()),
                        param: Some("roles".to_string()),
                    },
                )
            })
    }

    async fn user_remove_roles(
        &self,
        name: &str,
        roles: &[String],
        fallback: Option<&str>,
    ) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        if roles.is_empty() {
            return Err(self.validation_error("roles", "at least one role is required"));
        }
        self.admin_module()?
            .remove_roles(name, roles, fallback)
            .await
            .map_err(|e| {
                self.native_error(
                    &e,
                    ErrorContext {
                        resource: Some(name.to_string()),
                        param: Some("roles".to_string()),
                    },
                )
            })
    }

    async fn role_list(&self) -> Result<Vec<Role>> {
        self.admin_module()?
            .list_roles()
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::default()))
    }

    async fn sso_config_get(&self) -> Result<Option<SsoConfig>> {
        self.admin_module()?
            .get_sso_config()
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::default()))
    }

    async fn sso_config_set(&self, config: &str) -> Result<SsoConfig> {
        require_non_empty(config, "config", self.backend_name())?;
        let saved = self
            .admin_module()?
            .set_sso_config(Some(config))
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::param("config")))?;
        saved.ok_or_else(|| self.parse_error("library returned no SSO configuration after set"))
    }

    async fn sso_config_remove(&self) -> Result<()> {
        self.admin_module()?
            .set_sso_config(None)
            .await
            .map(|_| ())
            .map_err(|e| self.native_error(&e, ErrorContext::param("config")))
    }

    async fn tabulator_open_query_get(&self) -> Result<TabulatorOpenQuery> {
        self.admin_module()?
            .get_tabulator_open_query()
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::default()))
    }

    async fn tabulator_open_query_set(&self, enabled: bool) -> Result<TabulatorOpenQuery> {
        self.admin_module()?
            .set_tabulator_open_query(enabled)
            .await
            .map_err(|e| self.native_error(&e, ErrorContext::param("enabled")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, size: u64) -> NativeEntry {
        NativeEntry {
            logical_key: key.to_string(),
            physical_key: Some(format!("file:///r/{key}")),
            size,
        }
    }

    #[test]
    fn root_children_aggregate_directories() {
        let entries = [
            entry("README.md", 5),
            entry("data/a.csv", 10),
            entry("data/raw/b.csv", 20),
            entry("img/c.png", 1),
        ];
        let children = children_of(&entries, "").unwrap_or_default();
        let summary: Vec<_> = children
            .iter()
            .map(|c| (c.path.as_str(), c.kind, c.size))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("data/", ContentKind::Directory, Some(30)),
                ("img/", ContentKind::Directory, Some(1)),
                ("README.md", ContentKind::File, Some(5)),
            ]
        );
    }

    #[test]
    fn nested_prefix() {
        let entries = [entry("data/a.csv", 10), entry("data/raw/b.csv", 20)];
        let children = children_of(&entries, "data").unwrap_or_default();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].path, "data/raw/");
        assert_eq!(children[1].path, "data/a.csv");
        assert_eq!(children[1].physical_key.as_deref(), Some("file:///r/data/a.csv"));
    }

    #[test]
    fn missing_prefix_is_none() {
        let entries = [entry("data/a.csv", 10)];
        assert!(children_of(&entries, "nope").is_none());
        // "dat" must not match "data/..."
        assert!(children_of(&entries, "dat").is_none());
    }

    #[test]
    fn empty_root_is_empty_list() {
        assert_eq!(children_of(&[], ""), Some(Vec::new()));
    }

    #[test]
    fn bucket_from_file_url() {
        assert_eq!(bucket_of("file:///home/me/packages"), "packages");
        assert_eq!(bucket_of("file:///home/me/packages/"), "packages");
    }
}
