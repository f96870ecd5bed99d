//! The Ops surface: the only boundary tool code talks to.
//!
//! [`Ops`] forwards to the active [`Backend`], gates the admin subset on the
//! capability captured at construction, and grades failures in the log.

use std::sync::Arc;

use lakehouse_backend::{
    AdminCapability, AuthStatus, Backend, BackendKind, CatalogConfig, ContentInfo,
    CreateUserRequest, OpsError, PackageInfo, PackageMetadata, Result, Role, SsoConfig,
    TabulatorOpenQuery, User,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Package info plus best-effort metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOverview {
    #[serde(flatten)]
    pub info: PackageInfo,
    /// `None` when the metadata call failed.
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
}

/// Dispatcher over the active backend.
pub struct Ops {
    backend: Arc<dyn Backend>,
    admin: AdminCapability,
}

impl std::fmt::Debug for Ops {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ops")
            .field("backend", &self.backend.kind())
            .field("admin", &self.admin)
            .finish()
    }
}

fn log_failure(operation: &str, e: &OpsError) {
    if e.is_expected() {
        log::warn!("{operation} failed: {e}");
    } else {
        log::error!("{operation} failed: {e}");
    }
}

/// Forwards an admin call through the gate.
macro_rules! admin_call {
    ($self:ident, $op:literal, $call:expr) => {{
        $self.admin_gate()?;
        $call.await.inspect_err(|e| log_failure($op, e))
    }};
}

impl Ops {
    /// Wraps `backend`; admin availability is read once here.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let admin = backend.admin_capability();
        if let Some(reason) = &admin.reason {
            log::info!("[{}] admin operations unavailable: {reason}", backend.kind());
        }
        Self { backend, admin }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn admin_capability(&self) -> &AdminCapability {
        &self.admin
    }

    fn admin_gate(&self) -> Result<()> {
        if self.admin.available {
            return Ok(());
        }
        Err(OpsError::admin_unavailable(
            self.backend.kind().as_str(),
            self.admin
                .reason
                .clone()
                .unwrap_or_else(|| "admin operations are not available".to_string()),
        ))
    }

    // ============ Session / catalog ============

    pub async fn get_auth_status(&self) -> Result<AuthStatus> {
        self.backend
            .get_auth_status()
            .await
            .inspect_err(|e| log_failure("get_auth_status", e))
    }

    pub async fn get_catalog_config(&self) -> Result<CatalogConfig> {
        self.backend
            .get_catalog_config()
            .await
            .inspect_err(|e| log_failure("get_catalog_config", e))
    }

    pub async fn configure_catalog(&self, catalog_url: &str) -> Result<CatalogConfig> {
        self.backend
            .configure_catalog(catalog_url)
            .await
            .inspect_err(|e| log_failure("configure_catalog", e))
    }

    pub async fn get_registry_url(&self) -> Result<Option<String>> {
        self.backend
            .get_registry_url()
            .await
            .inspect_err(|e| log_failure("get_registry_url", e))
    }

    /// Registry for package calls that name none; `None` when nothing is configured.
    pub async fn default_registry(&self) -> Result<Option<String>> {
        self.backend
            .default_registry()
            .await
            .inspect_err(|e| log_failure("default_registry", e))
    }

    // ============ Packages ============

    pub async fn browse_content(
        &self,
        package_name: &str,
        registry: &str,
        path: &str,
    ) -> Result<Vec<ContentInfo>> {
        self.backend
            .browse_content(package_name, registry, path)
            .await
            .inspect_err(|e| log_failure("browse_content", e))
    }

    pub async fn list_all_packages(&self, registry: &str) -> Result<Vec<String>> {
        self.backend
            .list_all_packages(registry)
            .await
            .inspect_err(|e| log_failure("list_all_packages", e))
    }

    pub async fn get_package_info(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageInfo> {
        self.backend
            .get_package_info(package_name, registry, top_hash)
            .await
            .inspect_err(|e| log_failure("get_package_info", e))
    }

    pub async fn get_package_metadata(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageMetadata> {
        self.backend
            .get_package_metadata(package_name, registry, top_hash)
            .await
            .inspect_err(|e| log_failure("get_package_metadata", e))
    }

    /// Package info with metadata fetched for the same revision.
    ///
    /// A metadata failure does not fail the call; it is reported in
    /// `metadata_error` instead.
    pub async fn package_overview(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageOverview> {
        let info = self.get_package_info(package_name, registry, top_hash).await?;

        let (metadata, metadata_error) = match self
            .backend
            .get_package_metadata(package_name, registry, Some(&info.top_hash))
            .await
        {
            Ok(meta) => (Some(meta.metadata), None),
            Err(e) => {
                log::warn!("Metadata for {package_name}@{} unavailable: {e}", info.top_hash);
                (None, Some(e.to_string()))
            }
        };

        Ok(PackageOverview {
            info,
            metadata,
            metadata_error,
        })
    }

    // ============ Admin ============

    pub async fn user_list(&self) -> Result<Vec<User>> {
        admin_call!(self, "user_list", self.backend.user_list())
    }

    pub async fn user_get(&self, name: &str) -> Result<User> {
        admin_call!(self, "user_get", self.backend.user_get(name))
    }

    pub async fn user_create(&self, req: &CreateUserRequest) -> Result<User> {
        admin_call!(self, "user_create", self.backend.user_create(req))
    }

    pub async fn user_delete(&self, name: &str) -> Result<()> {
        admin_call!(self, "user_delete", self.backend.user_delete(name))
    }

    pub async fn user_set_email(&self, name: &str, email: &str) -> Result<User> {
        admin_call!(self, "user_set_email", self.backend.user_set_email(name, email))
    }

    pub async fn user_set_admin(&self, name: &str, admin: bool) -> Result<User> {
        admin_call!(self, "user_set_admin", self.backend.user_set_admin(name, admin))
    }

    pub async fn user_set_active(&self, name: &str, active: bool) -> Result<User> {
        admin_call!(self, "user_set_active", self.backend.user_set_active(name, active))
    }

    pub async fn user_reset_password(&self, name: &str) -> Result<User> {
        admin_call!(self, "user_reset_password", self.backend.user_reset_password(name))
    }

    pub async fn user_set_role(
        &self,
        name: &str,
        role: &str,
        extra_roles: &[String],
        append: bool,
    ) -> Result<User> {
        admin_call!(
            self,
            "user_set_role",
            self.backend.user_set_role(name, role, extra_roles, append)
        )
    }

    pub async fn user_add_roles(&self, name: &str, roles: &[String]) -> Result<User> {
        admin_call!(self, "user_add_roles", self.backend.user_add_roles(name, roles))
    }

    pub async fn user_remove_roles(
        &self,
        name: &str,
        roles: &[String],
        fallback: Option<&str>,
    ) -> Result<User> {
        admin_call!(
            self,
            "user_remove_roles",
            self.backend.user_remove_roles(name, roles, fallback)
        )
    }

    pub async fn role_list(&self) -> Result<Vec<Role>> {
        admin_call!(self, "role_list", self.backend.role_list())
    }

    pub async fn sso_config_get(&self) -> Result<Option<SsoConfig>> {
        admin_call!(self, "sso_config_get", self.backend.sso_config_get())
    }

    pub async fn sso_config_set(&self, config: &str) -> Result<SsoConfig> {
        admin_call!(self, "sso_config_set", self.backend.sso_config_set(config))
    }

    pub async fn sso_config_remove(&self) -> Result<()> {
        admin_call!(self, "sso_config_remove", self.backend.sso_config_remove())
    }

    pub async fn tabulator_open_query_get(&self) -> Result<TabulatorOpenQuery> {
        admin_call!(
            self,
            "tabulator_open_query_get",
            self.backend.tabulator_open_query_get()
        )
    }

    pub async fn tabulator_open_query_set(&self, enabled: bool) -> Result<TabulatorOpenQuery> {
        admin_call!(
            self,
            "tabulator_open_query_set",
            self.backend.tabulator_open_query_set(enabled)
        )
    }
}
