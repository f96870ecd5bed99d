//! RemoteApiBackend Backend trait 实现

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::backends::common::{
    bucket_from_registry, normalize_content_path, normalize_url, require_non_empty,
    validate_email, validate_package_name,
};
use crate::error::{ErrorKind, OpsError, Result};
use crate::traits::{Backend, ErrorContext, ErrorMapper};
use crate::types::{
    AdminCapability, AuthStatus, BackendKind, CatalogConfig, ContentInfo, CreateUserRequest,
    PackageInfo, PackageMetadata, Role, SsoConfig, TabulatorOpenQuery, User,
};
use crate::utils::datetime;

use super::types::{
    WireDir, WirePackage, WirePackagePage, WireRevisionMeta, WireRole, WireSsoConfig, WireUser,
};
use super::{PACKAGES_PAGE_SIZE, RemoteApiBackend, queries};

impl RemoteApiBackend {
    /// 运行 `admin.user.mutate(name)` 上的某个字段，返回 union 成功成员
    async fn user_mutation(
        &self,
        operation: &str,
        document: &str,
        name: &str,
        field: &str,
        mut variables: Map<String, Value>,
        param: Option<&str>,
    ) -> Result<Value> {
        require_non_empty(name, "name", self.backend_name())?;
        variables.insert("name".to_string(), Value::String(name.to_string()));

        let data = self
            .mutate(
                operation,
                document,
                Value::Object(variables),
                ErrorContext::resource(name),
            )
            .await?;

        let outcome: Option<Value> = self.extract(&data, &format!("/admin/user/mutate/{field}"))?;
        let Some(outcome) = outcome else {
            return Err(self.user_not_found(name));
        };

        let context = ErrorContext {
            resource: Some(name.to_string()),
            param: param.map(str::to_string),
        };
        self.union_outcome(outcome, context)
    }

    async fn user_mutation_returning_user(
        &self,
        operation: &str,
        document: &str,
        name: &str,
        field: &str,
        variables: Map<String, Value>,
        param: Option<&str>,
    ) -> Result<User> {
        let value = self
            .user_mutation(operation, document, name, field, variables, param)
            .await?;
        let user: WireUser =
            serde_json::from_value(value).map_err(|e| self.parse_error(e))?;
        Ok(user.into())
    }

    fn user_not_found(&self, name: &str) -> OpsError {
        OpsError::NotFound {
            backend: self.backend_name().to_string(),
            resource: name.to_string(),
            raw_message: None,
        }
    }

    fn package_not_found(&self, resource: String) -> OpsError {
        OpsError::NotFound {
            backend: self.backend_name().to_string(),
            resource,
            raw_message: None,
        }
    }

    async fn fetch_package(
        &self,
        document: &str,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
        extra: Map<String, Value>,
    ) -> Result<(String, Value)> {
        validate_package_name(package_name, self.backend_name())?;
        let bucket = bucket_from_registry(registry, self.backend_name())?;

        let mut variables = Map::new();
        variables.insert("bucket".into(), Value::String(bucket.clone()));
        variables.insert("name".into(), Value::String(package_name.to_string()));
        variables.insert(
            "hashOrTag".into(),
            Value::String(top_hash.unwrap_or("latest").to_string()),
        );
        variables.extend(extra);

        let data = self
            .query(
                "package",
                document,
                Value::Object(variables),
                ErrorContext::resource(package_name),
            )
            .await?;
        Ok((bucket, data))
    }
}

fn revision_label(package_name: &str, top_hash: Option<&str>) -> String {
    match top_hash {
        Some(hash) => format!("{package_name}@{hash}"),
        None => package_name.to_string(),
    }
}

#[async_trait]
impl Backend for RemoteApiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteApi
    }

    fn admin_capability(&self) -> AdminCapability {
        // 服务端按调用者身份鉴权，非管理员得到 Permission 错误
        AdminCapability::available()
    }

    async fn get_auth_status(&self) -> Result<AuthStatus> {
        let catalog_name = self.catalog.catalog_name.clone();
        let registry_url = Some(self.catalog.registry_url.clone());

        if self.current_credential().is_err() {
            return Ok(AuthStatus::unauthenticated(catalog_name, registry_url));
        }

        match self
            .query("me", queries::ME, json!({}), ErrorContext::default())
            .await
        {
            Ok(data) if data.pointer("/me").is_some_and(|me| !me.is_null()) => Ok(
                AuthStatus::authenticated(self.catalog.catalog_url.clone(), catalog_name, registry_url),
            ),
            Ok(_) => Ok(AuthStatus::unauthenticated(catalog_name, registry_url)),
            Err(e) if e.kind() == ErrorKind::Authentication => {
                log::debug!("[{}] credential rejected: {e}", self.backend_name());
                Ok(AuthStatus::unauthenticated(catalog_name, registry_url))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_catalog_config(&self) -> Result<CatalogConfig> {
        Ok(self.catalog.clone())
    }

    async fn configure_catalog(&self, catalog_url: &str) -> Result<CatalogConfig> {
        let requested = normalize_url(catalog_url, "catalog_url", self.backend_name())?;
        if requested == self.catalog.catalog_url {
            return Ok(self.catalog.clone());
        }
        Err(self.validation_error(
            "catalog_url",
            format!(
                "catalog endpoints are fixed by the deployment (configured: {}, requested: {requested})",
                self.catalog.catalog_url
            ),
        ))
    }

    async fn get_registry_url(&self) -> Result<Option<String>> {
        Ok(Some(self.catalog.registry_url.clone()))
    }

    async fn default_registry(&self) -> Result<Option<String>> {
        // The registry endpoint is an HTTP API, not a bucket
        Ok(self.default_bucket.as_ref().map(|b| format!("s3://{b}")))
    }

    async fn browse_content(
        &self,
        package_name: &str,
        registry: &str,
        path: &str,
    ) -> Result<Vec<ContentInfo>> {
        let path = normalize_content_path(path, self.backend_name())?;
        let mut extra = Map::new();
        extra.insert("path".into(), Value::String(path.clone()));

        let (_, data) = self
            .fetch_package(queries::PACKAGE_DIR, package_name, registry, None, extra)
            .await?;

        if data.pointer("/package").is_none_or(Value::is_null) {
            return Err(self.package_not_found(package_name.to_string()));
        }
        let dir: Option<WireDir> = self.extract(&data, "/package/revision/dir")?;
        let Some(dir) = dir else {
            return Err(self.package_not_found(format!("{package_name}/{path}")));
        };

        Ok(dir.children.into_iter().map(ContentInfo::from).collect())
    }

    async fn list_all_packages(&self, registry: &str) -> Result<Vec<String>> {
        let bucket = bucket_from_registry(registry, self.backend_name())?;
        let mut names = Vec::new();
        let mut page = 1_u32;

        loop {
            let data = self
                .query(
                    "packages",
                    queries::PACKAGES_PAGE,
                    json!({ "bucket": bucket, "page": page, "perPage": PACKAGES_PAGE_SIZE }),
                    ErrorContext::resource(&bucket),
                )
                .await?;

            let listing: Option<WirePackagePage> = self.extract(&data, "/packages")?;
            let Some(listing) = listing else {
                return Err(self.package_not_found(format!("s3://{bucket}")));
            };

            let fetched = listing.page.len();
            names.extend(listing.page.into_iter().map(|p| p.name));

            if fetched == 0 || names.len() as u64 >= listing.total {
                break;
            }
            page += 1;
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn get_package_info(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageInfo> {
        let (bucket, data) = self
            .fetch_package(queries::PACKAGE, package_name, registry, top_hash, Map::new())
            .await?;

        let package: Option<WirePackage> = self.extract(&data, "/package")?;
        let Some(package) = package else {
            return Err(self.package_not_found(package_name.to_string()));
        };
        let Some(revision) = package.revision else {
            return Err(self.package_not_found(revision_label(package_name, top_hash)));
        };

        let tags = match &package.latest {
            Some(latest) if latest.hash == revision.hash => vec!["latest".to_string()],
            _ => Vec::new(),
        };

        Ok(PackageInfo {
            name: package.name,
            description: revision.message.filter(|m| !m.is_empty()),
            tags,
            modified_date: datetime::normalize(&revision.modified),
            registry: format!("s3://{}", package.bucket),
            bucket,
            top_hash: revision.hash,
        })
    }

    async fn get_package_metadata(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageMetadata> {
        let (_, data) = self
            .fetch_package(queries::PACKAGE_META, package_name, registry, top_hash, Map::new())
            .await?;

        let revision: Option<WireRevisionMeta> = self.extract(&data, "/package/revision")?;
        let Some(revision) = revision else {
            return Err(self.package_not_found(revision_label(package_name, top_hash)));
        };

        let metadata = match revision.user_meta {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(self.parse_error(format!(
                    "userMeta is not an object: {}",
                    crate::utils::log_sanitizer::truncate_for_log(&other.to_string())
                )));
            }
        };

        Ok(PackageMetadata {
            name: package_name.to_string(),
            top_hash: revision.hash,
            metadata,
        })
    }

    // ============ 用户 ============

    async fn user_list(&self) -> Result<Vec<User>> {
        let data = self
            .query("user.list", queries::USER_LIST, json!({}), ErrorContext::default())
            .await?;
        let users: Option<Vec<WireUser>> = self.extract(&data, "/admin/user/list")?;
        Ok(users.unwrap_or_default().into_iter().map(User::from).collect())
    }

    async fn user_get(&self, name: &str) -> Result<User> {
        require_non_empty(name, "name", self.backend_name())?;
        let data = self
            .query(
                "user.get",
                queries::USER_GET,
                json!({ "name": name }),
                ErrorContext::resource(name),
            )
            .await?;
        let user: Option<WireUser> = self.extract(&data, "/admin/user/get")?;
        user.map(User::from).ok_or_else(|| self.user_not_found(name))
    }

    async fn user_create(&self, req: &CreateUserRequest) -> Result<User> {
        require_non_empty(&req.name, "name", self.backend_name())?;
        validate_email(&req.email, self.backend_name())?;
        require_non_empty(&req.role, "role", self.backend_name())?;

        let data = self
            .mutate(
                "user.create",
                queries::USER_CREATE,
                json!({ "input": {
                    "name": req.name,
                    "email": req.email,
                    "role": req.role,
                    "extraRoles": req.extra_roles,
                }}),
                ErrorContext::resource(&req.name),
            )
            .await?;

        let outcome = data
            .pointer("/admin/user/create")
            .cloned()
            .unwrap_or(Value::Null);
        let value = self.union_outcome(outcome, ErrorContext::param("name"))?;
        let user: WireUser = serde_json::from_value(value).map_err(|e| self.parse_error(e))?;
        Ok(user.into())
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        self.user_mutation("user.delete", queries::USER_DELETE, name, "delete", Map::new(), None)
            .await
            .map(|_| ())
    }

    async fn user_set_email(&self, name: &str, email: &str) -> Result<User> {
        validate_email(email, self.backend_name())?;
        let mut vars = Map::new();
        vars.insert("email".into(), Value::String(email.to_string()));
        self.user_mutation_returning_user(
            "user.setEmail",
            queries::USER_SET_EMAIL,
            name,
            "setEmail",
            vars,
            Some("email"),
        )
        .await
    }

    async fn user_set_admin(&self, name: &str, admin: bool) -> Result<User> {
        let mut vars = Map::new();
        vars.insert("admin".into(), Value::Bool(admin));
        self.user_mutation_returning_user(
            "user.setAdmin",
            queries::USER_SET_ADMIN,
            name,
            "setAdmin",
            vars,
            Some("admin"),
        )
        .await
    }

    async fn user_set_active(&self, name: &str, active: bool) -> Result<User> {
        let mut vars = Map::new();
        vars.insert("active".into(), Value::Bool(active));
        self.user_mutation_returning_user(
            "user.setActive",
            queries::USER_SET_ACTIVE,
            name,
            "setActive",
            vars,
            Some("active"),
        )
        .await
    }

    async fn user_reset_password(&self, name: &str) -> Result<User> {
        self.user_mutation(
            "user.resetPassword",
            queries::USER_RESET_PASSWORD,
            name,
            "resetPassword",
            Map::new(),
            None,
        )
        .await?;
        self.user_get(name).await
    }

    async fn user_set_role(
        &self,
        name: &str,
        role: &str,
        extra_roles: &[String],
        append: bool,
    ) -> Result<User> {
        require_non_empty(role, "role", self.backend_name())?;
        let mut vars = Map::new();
        vars.insert("role".into(), Value::String(role.to_string()));
        vars.insert("extraRoles".into(), json!(extra_roles));
        vars.insert("append".into(), Value::Bool(append));
        self.user_mutation_returning_user(
            "user.setRole",
            queries::USER_SET_ROLE,
            name,
            "setRole",
            vars,
            Some("role"),
        )
        .await
    }

    async fn user_add_roles(&self, name: &str, roles: &[String]) -> Result<User> {
        if roles.is_empty() {
            return Err(self.validation_error("roles", "at least one role is required"));
        }
        let mut vars = Map::new();
        vars.insert("roles".into(), json!(roles));
        self.user_mutation_returning_user(
            "user.addRoles",
            queries::USER_ADD_ROLES,
            name,
            "addRoles",
            vars,
            Some("roles"),
        )
        .await
    }

    async fn user_remove_roles(
        &self,
        name: &str,
        roles: &[String],
        fallback: Option<&str>,
    ) -> Result<User> {
        if roles.is_empty() {
            return Err(self.validation_error("roles", "at least one role is required"));
        }
        let mut vars = Map::new();
        vars.insert("roles".into(), json!(roles));
        vars.insert("fallback".into(), json!(fallback));
        self.user_mutation_returning_user(
            "user.removeRoles",
            queries::USER_REMOVE_ROLES,
            name,
            "removeRoles",
            vars,
            Some("roles"),
        )
        .await
    }

    // ============ 角色 / SSO / Tabulator ============

    async fn role_list(&self) -> Result<Vec<Role>> {
        let data = self
            .query("roles", queries::ROLE_LIST, json!({}), ErrorContext::default())
            .await?;
        let roles: Option<Vec<WireRole>> = self.extract(&data, "/roles")?;
        Ok(roles.unwrap_or_default().into_iter().map(Role::from).collect())
    }

    async fn sso_config_get(&self) -> Result<Option<SsoConfig>> {
        let data = self
            .query("ssoConfig", queries::SSO_CONFIG_GET, json!({}), ErrorContext::default())
            .await?;
        let config: Option<WireSsoConfig> = self.extract(&data, "/admin/ssoConfig")?;
        Ok(config.map(SsoConfig::from))
    }

    async fn sso_config_set(&self, config: &str) -> Result<SsoConfig> {
        require_non_empty(config, "config", self.backend_name())?;
        let data = self
            .mutate(
                "setSsoConfig",
                queries::SSO_CONFIG_SET,
                json!({ "config": config }),
                ErrorContext::param("config"),
            )
            .await?;
        let outcome = data
            .pointer("/admin/setSsoConfig")
            .cloned()
            .unwrap_or(Value::Null);
        let value = self.union_outcome(outcome, ErrorContext::param("config"))?;
        let config: WireSsoConfig =
            serde_json::from_value(value).map_err(|e| self.parse_error(e))?;
        Ok(config.into())
    }

    async fn sso_config_remove(&self) -> Result<()> {
        let data = self
            .mutate(
                "setSsoConfig",
                queries::SSO_CONFIG_SET,
                json!({ "config": null }),
                ErrorContext::param("config"),
            )
            .await?;
        let outcome = data
            .pointer("/admin/setSsoConfig")
            .cloned()
            .unwrap_or(Value::Null);
        self.union_outcome(outcome, ErrorContext::param("config"))
            .map(|_| ())
    }

    async fn tabulator_open_query_get(&self) -> Result<TabulatorOpenQuery> {
        let data = self
            .query(
                "tabulatorOpenQuery",
                queries::TABULATOR_OPEN_QUERY_GET,
                json!({}),
                ErrorContext::default(),
            )
            .await?;
        let enabled: bool = self.extract(&data, "/admin/tabulatorOpenQuery")?;
        Ok(TabulatorOpenQuery { enabled })
    }

    async fn tabulator_open_query_set(&self, enabled: bool) -> Result<TabulatorOpenQuery> {
        let data = self
            .mutate(
                "setTabulatorOpenQuery",
                queries::TABULATOR_OPEN_QUERY_SET,
                json!({ "enabled": enabled }),
                ErrorContext::param("enabled"),
            )
            .await?;
        let enabled: bool =
            self.extract(&data, "/admin/setTabulatorOpenQuery/tabulatorOpenQuery")?;
        Ok(TabulatorOpenQuery { enabled })
    }
}
