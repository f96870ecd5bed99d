//! MCP Server implementation for lakehouse operations.
//!
//! Exposes 8 tools. Every call goes through the shared [`Ops`] surface and
//! runs inside the runtime credential scope of its request.

use std::future::Future;
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Extensions, Implementation, ProtocolVersion, ServerCapabilities,
        ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use serde_json::json;

use lakehouse_backend::{
    AdminCapability, CatalogConfig, Credential, CredentialSource, ErrorKind, OpsError,
    scope_request_credential,
};
use lakehouse_core::{BackendFactory, CoreError, DeploymentPreset, ModeConfig, Ops};

use crate::admin;
use crate::schemas::{
    AdminParams, CatalogConfigureParams, EmptyParams, PackageBrowseParams, PackageInfoParams,
    PackagesListParams,
};

/// Default and maximum number of names returned by `packages_list`.
const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;

/// Sanitize error messages to prevent sensitive information leakage.
///
/// Logs the full error to stderr but returns a generic message to the client.
fn sanitize_internal_error(error: impl std::fmt::Display, context: &str) -> McpError {
    log::error!("{context} error: {error}");
    McpError::internal_error(
        format!("{context} failed - check server logs for details"),
        None,
    )
}

/// Expected failures keep their message; faults are sanitized.
fn map_ops_error(context: &str, error: &OpsError) -> McpError {
    if !error.is_expected() {
        return sanitize_internal_error(error, context);
    }
    log::warn!("{context} error: {error}");
    let data = Some(json!({ "kind": error.kind(), "backend": error.backend() }));
    match error.kind() {
        ErrorKind::Validation | ErrorKind::NotFound => {
            McpError::invalid_params(error.to_string(), data)
        }
        ErrorKind::Authentication | ErrorKind::Permission | ErrorKind::Backend => {
            McpError::internal_error(error.to_string(), data)
        }
    }
}

fn map_core_error(context: &str, error: &CoreError) -> McpError {
    match error {
        CoreError::Ops(e) => map_ops_error(context, e),
        CoreError::Configuration(_) | CoreError::Authentication(_) => {
            log::warn!("{context} error: {error}");
            McpError::internal_error(error.to_string(), None)
        }
    }
}

fn json_result<T: Serialize>(value: &T, context: &str) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| sanitize_internal_error(e, &format!("Serialize {context} result")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// The `Authorization: Bearer` credential of the HTTP request behind a call.
///
/// Absent on stdio, where no HTTP request exists.
fn request_bearer(extensions: &Extensions) -> Option<Credential> {
    let parts = extensions.get::<http::request::Parts>()?;
    let value = parts.headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty())
        .then(|| Credential::new(token, CredentialSource::RuntimeContext))
}

/// Uses `explicit` when given, otherwise the backend's default package registry.
///
/// Not the registry endpoint: package calls take a bucket (remote) or a
/// local registry, never the GraphQL URL.
async fn registry_or_default(ops: &Ops, explicit: Option<String>) -> lakehouse_backend::Result<String> {
    if let Some(registry) = explicit.filter(|r| !r.trim().is_empty()) {
        return Ok(registry);
    }
    ops.default_registry().await?.ok_or_else(|| OpsError::Validation {
        backend: ops.kind().as_str().to_string(),
        param: "registry".to_string(),
        detail: "no registry given and no default bucket is configured \
                 (set LAKEHOUSE_DEFAULT_BUCKET or --default-bucket)"
            .to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogInfo {
    #[serde(flatten)]
    config: CatalogConfig,
    active_registry: Option<String>,
}

#[derive(Debug, Serialize)]
struct PackageListing {
    registry: String,
    total: usize,
    truncated: bool,
    packages: Vec<String>,
}

impl PackageListing {
    fn new(registry: String, names: Vec<String>, prefix: Option<&str>, limit: Option<usize>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let mut matching: Vec<String> = names
            .into_iter()
            .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
            .collect();
        let total = matching.len();
        matching.truncate(limit);
        Self {
            registry,
            total,
            truncated: total > limit,
            packages: matching,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeploymentInfo {
    #[serde(flatten)]
    mode: ModeConfig,
    preset: Option<DeploymentPreset>,
    /// `None` until a backend could be built.
    admin: Option<AdminCapability>,
}

/// MCP Server for lakehouse catalog and registry operations.
#[derive(Clone)]
pub struct LakehouseMcp {
    factory: Arc<BackendFactory>,
    /// Tool router generated by macro.
    tool_router: ToolRouter<Self>,
}

impl LakehouseMcp {
    /// Create a new MCP server instance.
    #[must_use]
    pub fn new(factory: Arc<BackendFactory>) -> Self {
        Self {
            factory,
            tool_router: Self::tool_router(),
        }
    }

    /// Runs `call` against the shared [`Ops`] with `credential` bound for its duration.
    async fn run<T, F, Fut>(
        &self,
        credential: Option<Credential>,
        context: &'static str,
        call: F,
    ) -> Result<CallToolResult, McpError>
    where
        T: Serialize,
        F: FnOnce(Arc<Ops>) -> Fut,
        Fut: Future<Output = lakehouse_backend::Result<T>>,
    {
        scope_request_credential(credential, async move {
            let ops = self
                .factory
                .get_backend()
                .await
                .map_err(|e| map_core_error(context, &e))?;
            let value = call(ops).await.map_err(|e| map_ops_error(context, &e))?;
            json_result(&value, context)
        })
        .await
    }
}

#[tool_router]
impl LakehouseMcp {
    /// Report the catalog login state.
    #[tool(description = "Show whether the server is authenticated against a catalog, and which one")]
    async fn auth_status(
        &self,
        _params: Parameters<EmptyParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run(request_bearer(&context.extensions), "Auth status", |ops| async move {
            ops.get_auth_status().await
        })
        .await
    }

    /// Report the catalog configuration and active registry.
    #[tool(description = "Show the configured catalog URL, its registry, and the active registry")]
    async fn catalog_info(
        &self,
        _params: Parameters<EmptyParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run(request_bearer(&context.extensions), "Catalog info", |ops| async move {
            let config = ops.get_catalog_config().await?;
            let active_registry = ops.get_registry_url().await?;
            Ok::<_, OpsError>(CatalogInfo {
                config,
                active_registry,
            })
        })
        .await
    }

    /// Point the backend at a catalog.
    #[tool(description = "Configure the catalog URL (local deployments only; remote catalogs are fixed)")]
    async fn catalog_configure(
        &self,
        Parameters(params): Parameters<CatalogConfigureParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run(
            request_bearer(&context.extensions),
            "Configure catalog",
            move |ops| async move { ops.configure_catalog(&params.catalog_url).await },
        )
        .await
    }

    /// List package names in a registry.
    #[tool(description = "List package names in a registry, optionally filtered by prefix")]
    async fn packages_list(
        &self,
        Parameters(params): Parameters<PackagesListParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run(
            request_bearer(&context.extensions),
            "List packages",
            move |ops| async move {
                let registry = registry_or_default(&ops, params.registry).await?;
                let names = ops.list_all_packages(&registry).await?;
                Ok::<_, OpsError>(PackageListing::new(
                    registry,
                    names,
                    params.prefix.as_deref(),
                    params.limit,
                ))
            },
        )
        .await
    }

    /// Browse the entries of a package.
    #[tool(description = "List the files and directories directly under a path of the latest package revision")]
    async fn package_browse(
        &self,
        Parameters(params): Parameters<PackageBrowseParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run(
            request_bearer(&context.extensions),
            "Browse package",
            move |ops| async move {
                let registry = registry_or_default(&ops, params.registry).await?;
                ops.browse_content(&params.package_name, &registry, &params.path)
                    .await
            },
        )
        .await
    }

    /// Package info with its user metadata.
    #[tool(description = "Show a package revision (latest by default): tags, hash, modification date and user metadata")]
    async fn package_info(
        &self,
        Parameters(params): Parameters<PackageInfoParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.run(
            request_bearer(&context.extensions),
            "Package info",
            move |ops| async move {
                let registry = registry_or_default(&ops, params.registry).await?;
                ops.package_overview(&params.package_name, &registry, params.top_hash.as_deref())
                    .await
            },
        )
        .await
    }

    /// Administrative operations.
    #[tool(
        description = "Administer users, roles, SSO configuration and tabulator open query. \
                       command.action is one of user_list, user_get, user_create, user_delete, \
                       user_set_email, user_set_admin, user_set_active, user_reset_password, \
                       user_set_role, user_add_roles, user_remove_roles, role_list, sso_config_get, \
                       sso_config_set, sso_config_remove, tabulator_open_query_get, tabulator_open_query_set"
    )]
    async fn admin(
        &self,
        Parameters(params): Parameters<AdminParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        log::debug!("Admin action {}", params.command.action());
        self.run(request_bearer(&context.extensions), "Admin", move |ops| async move {
            admin::dispatch(&ops, params.command).await
        })
        .await
    }

    /// Report the resolved deployment mode.
    #[tool(description = "Show the resolved deployment mode: backend, transport, multiuser and how it was chosen")]
    async fn deployment_info(
        &self,
        _params: Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        self.deployment_report().await
    }
}

impl LakehouseMcp {
    async fn deployment_report(&self) -> Result<CallToolResult, McpError> {
        let mode = self
            .factory
            .mode()
            .map_err(|e| map_core_error("Deployment info", &e))?;
        let admin = self
            .factory
            .get_backend()
            .await
            .ok()
            .map(|ops| ops.admin_capability().clone());
        json_result(
            &DeploymentInfo {
                preset: mode.preset(),
                mode,
                admin,
            },
            "Deployment info",
        )
    }
}

#[tool_handler]
impl ServerHandler for LakehouseMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Lakehouse MCP Server - Browse data packages in a catalog registry and administer the catalog. \
                 Use auth_status and catalog_info to see where the server points, packages_list to find packages, \
                 package_info and package_browse to inspect them. \
                 The admin tool manages users, roles and SSO when the backend supports it; \
                 deployment_info reports how the server was configured."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
#[path = "test_mocks.rs"]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod test_mocks;

#[cfg(test)]
#[path = "server_tests.rs"]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests;

#[cfg(test)]
#[path = "client_integration_tests.rs"]
#[allow(clippy::unwrap_used, clippy::panic)]
mod client_integration_tests;
