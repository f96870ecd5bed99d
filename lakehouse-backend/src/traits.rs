use async_trait::async_trait;

use crate::error::{BackendFailure, ErrorKind, OpsError, Result};
use crate::types::{
    AdminCapability, AuthStatus, BackendKind, CatalogConfig, ContentInfo, CreateUserRequest,
    PackageInfo, PackageMetadata, Role, SsoConfig, TabulatorOpenQuery, User,
};

/// 原始后端错误（内部使用）
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// 错误码（GraphQL `extensions.code`、union `__typename`、`NativeError::code()`）
    pub code: Option<String>,
    /// 原始错误消息
    pub message: String,
}

impl RawApiError {
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// 错误上下文信息（内部使用）
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    /// 资源名称（包名、用户名、路径，用于 `NotFound`）
    pub resource: Option<String>,
    /// 参数名称（用于 `Validation`）
    pub param: Option<String>,
}

impl ErrorContext {
    pub fn resource(resource: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            param: None,
        }
    }

    pub fn param(param: impl Into<String>) -> Self {
        Self {
            resource: None,
            param: Some(param.into()),
        }
    }
}

/// 故障名称分类表（两个适配器共用）
///
/// 覆盖原生库的错误名与远程 API 的 `OperationError` 名称。
/// 不在表中的名称返回 `None`，由调用方按未知错误处理。
pub(crate) fn failure_kind(name: &str) -> Option<ErrorKind> {
    match name {
        "NotLoggedIn" | "SessionExpired" | "InvalidToken" | "TokenExpired" | "Unauthenticated" => {
            Some(ErrorKind::Authentication)
        }
        "Forbidden" | "Unauthorized" | "NotAdmin" => Some(ErrorKind::Permission),
        "NoSuchRegistry" | "NoSuchPackage" | "NoSuchPath" | "UserNotFound" | "RoleNotFound"
        | "PackageNotFound" | "BucketNotFound" | "RevisionNotFound" => Some(ErrorKind::NotFound),
        "InvalidName" | "UnsupportedRegistry" | "InvalidInput" | "UserAlreadyExists"
        | "RoleDoesNotExist" | "CannotRemoveRole" => Some(ErrorKind::Validation),
        _ => None,
    }
}

/// 后端错误映射 Trait（内部使用）
///
/// 适配器只处理自身特有的错误码，其余交给 [`failure_kind`]，
/// 保证同名故障在两个适配器中落入同一错误类别。
pub(crate) trait ErrorMapper {
    /// 后端标识符
    fn backend_name(&self) -> &'static str;

    /// 将原始错误映射到统一错误类型
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> OpsError;

    /// 按共用分类表映射
    fn map_named_failure(&self, raw: RawApiError, context: ErrorContext) -> OpsError {
        let kind = raw.code.as_deref().and_then(failure_kind);
        self.error_of_kind(kind, raw, context)
    }

    /// 构造指定类别的错误；`None` 与 `Backend` 均视为未知错误
    fn error_of_kind(
        &self,
        kind: Option<ErrorKind>,
        raw: RawApiError,
        context: ErrorContext,
    ) -> OpsError {
        let backend = self.backend_name().to_string();
        match kind {
            Some(ErrorKind::Authentication) => OpsError::Authentication {
                backend,
                detail: raw.message,
            },
            Some(ErrorKind::Permission) => OpsError::Permission {
                backend,
                raw_message: Some(raw.message),
            },
            Some(ErrorKind::NotFound) => OpsError::NotFound {
                backend,
                resource: context.resource.unwrap_or_else(|| "<unknown>".to_string()),
                raw_message: Some(raw.message),
            },
            Some(ErrorKind::Validation) => OpsError::Validation {
                backend,
                param: context.param.unwrap_or_else(|| "input".to_string()),
                detail: raw.message,
            },
            Some(ErrorKind::Backend) | None => self.unknown_error(raw),
        }
    }

    /// 快捷方法：解析错误
    fn parse_error(&self, detail: impl ToString) -> OpsError {
        OpsError::Backend {
            backend: self.backend_name().to_string(),
            failure: BackendFailure::Parse,
            detail: detail.to_string(),
        }
    }

    /// 快捷方法：参数错误
    fn validation_error(&self, param: &str, detail: impl ToString) -> OpsError {
        OpsError::Validation {
            backend: self.backend_name().to_string(),
            param: param.to_string(),
            detail: detail.to_string(),
        }
    }

    /// 快捷方法：未知错误（fallback）
    fn unknown_error(&self, raw: RawApiError) -> OpsError {
        OpsError::Backend {
            backend: self.backend_name().to_string(),
            failure: BackendFailure::Upstream { raw_code: raw.code },
            detail: raw.message,
        }
    }
}

/// 数据平台后端 Trait
///
/// 工具层只通过此接口访问后端；所有方法返回领域模型对象，绝不返回后端原生对象。
#[async_trait]
pub trait Backend: Send + Sync {
    /// 后端类型
    fn kind(&self) -> BackendKind;

    /// 是否具备管理能力
    ///
    /// 由 `Ops` 在构造时调用一次，不应发起网络请求。
    fn admin_capability(&self) -> AdminCapability;

    // ============ 会话 / Catalog ============

    /// 当前认证状态（每次调用都重新计算）
    async fn get_auth_status(&self) -> Result<AuthStatus>;

    /// 当前生效的 catalog 配置
    async fn get_catalog_config(&self) -> Result<CatalogConfig>;

    /// 指向新的 catalog
    async fn configure_catalog(&self, catalog_url: &str) -> Result<CatalogConfig>;

    /// 默认 registry（未配置时为 `None`）
    async fn get_registry_url(&self) -> Result<Option<String>>;

    /// 调用方未指定 registry 时，包操作使用的 registry
    ///
    /// 与 [`get_registry_url`](Backend::get_registry_url) 不同：返回值可以直接
    /// 传给 `list_all_packages` 等方法。没有可用默认值时为 `None`。
    async fn default_registry(&self) -> Result<Option<String>>;

    // ============ 包 / 内容 ============

    /// 列出包内某一层级的条目
    ///
    /// `path` 为空时列出根目录。
    async fn browse_content(
        &self,
        package_name: &str,
        registry: &str,
        path: &str,
    ) -> Result<Vec<ContentInfo>>;

    /// registry 中全部包名（已排序）
    async fn list_all_packages(&self, registry: &str) -> Result<Vec<String>>;

    /// 包信息，`top_hash` 为空时取最新版本
    async fn get_package_info(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageInfo>;

    /// 包级用户元数据
    async fn get_package_metadata(
        &self,
        package_name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> Result<PackageMetadata>;

    // ============ 管理（默认实现：不可用） ============

    async fn user_list(&self) -> Result<Vec<User>> {
        Err(self.admin_not_supported())
    }

    async fn user_get(&self, _name: &str) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn user_create(&self, _req: &CreateUserRequest) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn user_delete(&self, _name: &str) -> Result<()> {
        Err(self.admin_not_supported())
    }

    async fn user_set_email(&self, _name: &str, _email: &str) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn user_set_admin(&self, _name: &str, _admin: bool) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn user_set_active(&self, _name: &str, _active: bool) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn user_reset_password(&self, _name: &str) -> Result<User> {
        Err(self.admin_not_supported())
    }

    /// 设置主角色；`append` 为 `true` 时保留已有附加角色
    async fn user_set_role(
        &self,
        _name: &str,
        _role: &str,
        _extra_roles: &[String],
        _append: bool,
    ) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn user_add_roles(&self, _name: &str, _roles: &[String]) -> Result<User> {
        Err(self.admin_not_supported())
    }

    /// `fallback` 在主角色被移除时接替
    async fn user_remove_roles(
        &self,
        _name: &str,
        _roles: &[String],
        _fallback: Option<&str>,
    ) -> Result<User> {
        Err(self.admin_not_supported())
    }

    async fn role_list(&self) -> Result<Vec<Role>> {
        Err(self.admin_not_supported())
    }

    async fn sso_config_get(&self) -> Result<Option<SsoConfig>> {
        Err(self.admin_not_supported())
    }

    async fn sso_config_set(&self, _config: &str) -> Result<SsoConfig> {
        Err(self.admin_not_supported())
    }

    async fn sso_config_remove(&self) -> Result<()> {
        Err(self.admin_not_supported())
    }

    async fn tabulator_open_query_get(&self) -> Result<TabulatorOpenQuery> {
        Err(self.admin_not_supported())
    }

    async fn tabulator_open_query_set(&self, _enabled: bool) -> Result<TabulatorOpenQuery> {
        Err(self.admin_not_supported())
    }

    #[doc(hidden)]
    fn admin_not_supported(&self) -> OpsError {
        let reason = self
            .admin_capability()
            .reason
            .unwrap_or_else(|| "admin operations are not implemented".to_string());
        OpsError::admin_unavailable(self.kind().as_str(), reason)
    }
}
