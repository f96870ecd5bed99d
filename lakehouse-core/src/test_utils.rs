//! 测试辅助模块
//!
//! 提供 mock backend 实现，供本 crate 与下游（`test-support` feature）测试使用。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lakehouse_backend::{
    AdminCapability, AuthStatus, Backend, BackendFailure, BackendKind, CatalogConfig,
    ContentInfo, ContentKind, CreateUserRequest, OpsError, PackageInfo, PackageMetadata, Result,
    Role, RoleType, SsoConfig, TabulatorOpenQuery, User,
};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

const BACKEND: &str = "mock";
/// What [`MockBackend`] reports as its default registry.
pub const MOCK_REGISTRY: &str = "s3://mock-bucket";

// ===== MockBackend =====

/// In-memory backend. Every trait call bumps [`MockBackend::calls`].
pub struct MockBackend {
    pub calls: AtomicUsize,
    admin: AdminCapability,
    deny_admin: bool,
    fail_metadata: bool,
    users: RwLock<HashMap<String, User>>,
    sso: RwLock<Option<SsoConfig>>,
    open_query: RwLock<bool>,
    packages: Vec<String>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            admin: AdminCapability::available(),
            deny_admin: false,
            fail_metadata: false,
            users: RwLock::new(HashMap::new()),
            sso: RwLock::new(None),
            open_query: RwLock::new(false),
            packages: vec!["team/data".to_string()],
        }
    }

    #[must_use]
    pub fn without_admin(mut self) -> Self {
        self.admin = AdminCapability::unavailable("mock has no admin module");
        self
    }

    /// Admin is advertised, but every admin call is rejected as a non-admin caller.
    #[must_use]
    pub fn denying_admin(mut self) -> Self {
        self.deny_admin = true;
        self
    }

    #[must_use]
    pub fn failing_metadata(mut self) -> Self {
        self.fail_metadata = true;
        self
    }

    /// Replaces the listed package names; only `team/data` resolves to info.
    #[must_use]
    pub fn with_packages(mut self, names: &[&str]) -> Self {
        self.packages = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_user(mut self, name: &str, email: &str) -> Self {
        self.users
            .get_mut()
            .insert(name.to_string(), user(name, email));
        self
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn admin_call(&self) -> Result<()> {
        self.hit();
        if self.deny_admin {
            return Err(OpsError::Permission {
                backend: BACKEND.to_string(),
                raw_message: Some("caller is not an admin".to_string()),
            });
        }
        Ok(())
    }

    fn not_found(resource: &str) -> OpsError {
        OpsError::NotFound {
            backend: BACKEND.to_string(),
            resource: resource.to_string(),
            raw_message: None,
        }
    }

    /// Rejects endpoint URLs the way the real adapters do.
    fn check_registry(registry: &str) -> Result<()> {
        if registry.starts_with("s3://") {
            return Ok(());
        }
        Err(OpsError::Validation {
            backend: BACKEND.to_string(),
            param: "registry".to_string(),
            detail: format!("'{registry}' is not an s3:// registry"),
        })
    }

    async fn update(&self, name: &str, f: impl FnOnce(&mut User)) -> Result<User> {
        self.admin_call()?;
        let mut users = self.users.write().await;
        let found = users.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        f(found);
        Ok(found.clone())
    }
}

fn role(name: &str) -> Role {
    Role {
        id: format!("role-{name}"),
        name: name.to_string(),
        arn: None,
        role_type: RoleType::Managed,
    }
}

fn user(name: &str, email: &str) -> User {
    User {
        name: name.to_string(),
        email: email.to_string(),
        is_active: true,
        is_admin: false,
        is_sso_only: false,
        is_service: false,
        date_joined: Some("2024-01-01T00:00:00Z".to_string()),
        last_login: None,
        role: Some(role("Viewer")),
        extra_roles: Vec::new(),
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteApi
    }

    fn admin_capability(&self) -> AdminCapability {
        self.admin.clone()
    }

    async fn get_auth_status(&self) -> Result<AuthStatus> {
        self.hit();
        Ok(AuthStatus::authenticated(
            "https://catalog.example.com",
            Some("catalog.example.com".to_string()),
            Some("https://registry.example.com".to_string()),
        ))
    }

    async fn get_catalog_config(&self) -> Result<CatalogConfig> {
        self.hit();
        Ok(CatalogConfig::new(
            "https://catalog.example.com",
            "https://registry.example.com",
        ))
    }

    async fn configure_catalog(&self, catalog_url: &str) -> Result<CatalogConfig> {
        self.hit();
        Ok(CatalogConfig::new(catalog_url, "https://registry.example.com"))
    }

    async fn get_registry_url(&self) -> Result<Option<String>> {
        self.hit();
        Ok(Some("https://registry.example.com".to_string()))
    }

    async fn default_registry(&self) -> Result<Option<String>> {
        self.hit();
        Ok(Some(MOCK_REGISTRY.to_string()))
    }

    async fn browse_content(
        &self,
        package_name: &str,
        registry: &str,
        path: &str,
    ) -> Result<Vec<ContentInfo>> {
        self.hit();
        Self::check_registry(registry)?;
        if package_name != "team/data" {
            return Err(Self::not_found(package_name));
        }
        let prefix = path.trim_matches('/');
        let file = if prefix.is_empty() {
            "README.md".to_string()
        } else {
            format!("{prefix}/README.md")
        };
        Ok(vec![ContentInfo {
            path: file,
            kind: ContentKind::File,
            size: Some(5),
            physical_key: None,
        }])
    }

    async fn list_all_packages(&self, registry: &str) -> Result<Vec<String>> {
        self.hit();
        Self::check_registry(registry)?;
        Ok(self.packages.clone())
    }

    async fn get_package_info(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageInfo> {
        self.hit();
        Self::check_registry(registry)?;
        if package_name != "team/data" {
            return Err(Self::not_found(package_name));
        }
        Ok(PackageInfo {
            name: package_name.to_string(),
            description: Some("mock package".to_string()),
            tags: vec!["latest".to_string()],
            modified_date: "2024-03-01T09:00:00Z".to_string(),
            registry: registry.to_string(),
            bucket: registry.trim_start_matches("s3://").to_string(),
            top_hash: top_hash.unwrap_or("abc123").to_string(),
        })
    }

    async fn get_package_metadata(
        &self,
        package_name: &str,
        _registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageMetadata> {
        self.hit();
        if self.fail_metadata {
            return Err(OpsError::Backend {
                backend: BACKEND.to_string(),
                failure: BackendFailure::Timeout,
                detail: "metadata timed out".to_string(),
            });
        }
        let mut metadata = Map::new();
        metadata.insert("owner".to_string(), Value::String("ops".to_string()));
        Ok(PackageMetadata {
            name: package_name.to_string(),
            top_hash: top_hash.unwrap_or("abc123").to_string(),
            metadata,
        })
    }

    async fn user_list(&self) -> Result<Vec<User>> {
        self.admin_call()?;
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn user_get(&self, name: &str) -> Result<User> {
        self.update(name, |_| {}).await
    }

    async fn user_create(&self, req: &CreateUserRequest) -> Result<User> {
        self.admin_call()?;
        let mut users = self.users.write().await;
        if users.contains_key(&req.name) {
            return Err(OpsError::Validation {
                backend: BACKEND.to_string(),
                param: "name".to_string(),
                detail: format!("user {} already exists", req.name),
            });
        }
        let mut created = user(&req.name, &req.email);
        created.role = Some(role(&req.role));
        created.extra_roles = req.extra_roles.iter().map(|r| role(r)).collect();
        users.insert(req.name.clone(), created.clone());
        Ok(created)
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        self.admin_call()?;
        self.users
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(name))
    }

    async fn user_set_email(&self, name: &str, email: &str) -> Result<User> {
        self.update(name, |u| u.email = email.to_string()).await
    }

    async fn user_set_admin(&self, name: &str, admin: bool) -> Result<User> {
        self.update(name, |u| u.is_admin = admin).await
    }

    async fn user_set_active(&self, name: &str, active: bool) -> Result<User> {
        self.update(name, |u| u.is_active = active).await
    }

    async fn user_reset_password(&self, name: &str) -> Result<User> {
        self.update(name, |_| {}).await
    }

    async fn user_set_role(
        &self,
        name: &str,
        role_name: &str,
        extra_roles: &[String],
        append: bool,
    ) -> Result<User> {
        self.update(name, |u| {
            u.role = Some(role(role_name));
            if !append {
                u.extra_roles.clear();
            }
            u.extra_roles.extend(extra_roles.iter().map(|r| role(r)));
        })
        .await
    }

    async fn user_add_roles(&self, name: &str, roles: &[String]) -> Result<User> {
        self.update(name, |u| u.extra_roles.extend(roles.iter().map(|r| role(r))))
            .await
    }

    async fn user_remove_roles(
        &self,
        name: &str,
        roles: &[String],
        fallback: Option<&str>,
    ) -> Result<User> {
        self.update(name, |u| {
            u.extra_roles.retain(|r| !roles.contains(&r.name));
            if u.role.as_ref().is_some_and(|r| roles.contains(&r.name)) {
                u.role = fallback.map(role);
            }
        })
        .await
    }

    async fn role_list(&self) -> Result<Vec<Role>> {
        self.admin_call()?;
        Ok(vec![role("Viewer"), role("Editor")])
    }

    async fn sso_config_get(&self) -> Result<Option<SsoConfig>> {
        self.admin_call()?;
        Ok(self.sso.read().await.clone())
    }

    async fn sso_config_set(&self, config: &str) -> Result<SsoConfig> {
        self.admin_call()?;
        let saved = SsoConfig {
            text: config.to_string(),
            timestamp: "2024-05-05T05:05:05Z".to_string(),
            uploader: "admin".to_string(),
        };
        *self.sso.write().await = Some(saved.clone());
        Ok(saved)
    }

    async fn sso_config_remove(&self) -> Result<()> {
        self.admin_call()?;
        *self.sso.write().await = None;
        Ok(())
    }

    async fn tabulator_open_query_get(&self) -> Result<TabulatorOpenQuery> {
        self.admin_call()?;
        Ok(TabulatorOpenQuery {
            enabled: *self.open_query.read().await,
        })
    }

    async fn tabulator_open_query_set(&self, enabled: bool) -> Result<TabulatorOpenQuery> {
        self.admin_call()?;
        *self.open_query.write().await = enabled;
        Ok(TabulatorOpenQuery { enabled })
    }
}
