//! 后端公共工具函数

use std::time::Duration;

use reqwest::Client;

use crate::error::{BackendFailure, OpsError, Result};

// ============ HTTP Client ============

/// 默认连接超时（秒）
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// 创建带超时配置的 HTTP Client
pub fn create_http_client(backend: &str) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("lakehouse-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| OpsError::Backend {
            backend: backend.to_string(),
            failure: BackendFailure::Network,
            detail: format!("failed to build HTTP client: {e}"),
        })
}

// ============ 输入校验 ============

fn invalid(backend: &str, param: &str, detail: impl Into<String>) -> OpsError {
    OpsError::Validation {
        backend: backend.to_string(),
        param: param.to_string(),
        detail: detail.into(),
    }
}

/// 校验包名格式 `namespace/name`
pub fn validate_package_name(name: &str, backend: &str) -> Result<()> {
    let mut parts = name.split('/');
    let (Some(ns), Some(pkg), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid(
            backend,
            "package_name",
            format!("expected 'namespace/name', got '{name}'"),
        ));
    };
    let valid_part = |s: &str| {
        !s.is_empty()
            && !matches!(s, "." | "..")
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if valid_part(ns) && valid_part(pkg) {
        Ok(())
    } else {
        Err(invalid(
            backend,
            "package_name",
            format!("'{name}' contains invalid characters"),
        ))
    }
}

/// 规范化 registry：`s3://bucket/` 与 `bucket` 都返回 `bucket`
pub fn bucket_from_registry(registry: &str, backend: &str) -> Result<String> {
    let trimmed = registry.trim();
    let bucket = trimmed
        .strip_prefix("s3://")
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if bucket.is_empty() || bucket.contains('/') || bucket.contains("://") {
        return Err(invalid(
            backend,
            "registry",
            format!("'{registry}' is not a bucket or s3:// URL"),
        ));
    }
    Ok(bucket.to_string())
}

/// 规范化包内路径：去掉首尾 `/`，拒绝 `..`
pub fn normalize_content_path(path: &str, backend: &str) -> Result<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.split('/').any(|seg| seg == "..") {
        return Err(invalid(backend, "path", "'..' segments are not allowed"));
    }
    Ok(trimmed.to_string())
}

/// 规范化 URL：校验并去掉末尾 `/`
pub fn normalize_url(raw: &str, param: &str, backend: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| invalid(backend, param, format!("'{raw}' is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(
            backend,
            param,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// 最基本的邮箱校验
pub fn validate_email(email: &str, backend: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(invalid(
            backend,
            "email",
            format!("'{email}' is not a valid email address"),
        )),
    }
}

/// 非空校验
pub fn require_non_empty(value: &str, param: &str, backend: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(invalid(backend, param, "must not be empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn package_names() {
        assert!(validate_package_name("team/data", "t").is_ok());
        assert!(validate_package_name("team-1/data_v2.0", "t").is_ok());
        for bad in ["team", "team/", "/data", "a/b/c", "team/da ta", ""] {
            let err = validate_package_name(bad, "t").err();
            assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Validation), "{bad}");
        }
    }

    #[test]
    fn registry_forms() {
        assert_eq!(bucket_from_registry("s3://bucket", "t").ok().as_deref(), Some("bucket"));
        assert_eq!(bucket_from_registry("s3://bucket/", "t").ok().as_deref(), Some("bucket"));
        assert_eq!(bucket_from_registry("bucket", "t").ok().as_deref(), Some("bucket"));
        assert!(bucket_from_registry("", "t").is_err());
        assert!(bucket_from_registry("s3://bucket/prefix", "t").is_err());
        assert!(bucket_from_registry("https://host", "t").is_err());
    }

    #[test]
    fn content_paths() {
        assert_eq!(normalize_content_path("/data/raw/", "t").ok().as_deref(), Some("data/raw"));
        assert_eq!(normalize_content_path("", "t").ok().as_deref(), Some(""));
        assert!(normalize_content_path("data/../etc", "t").is_err());
    }

    #[test]
    fn urls() {
        assert_eq!(
            normalize_url("https://demo.example.com/", "catalog_url", "t")
                .ok()
                .as_deref(),
            Some("https://demo.example.com")
        );
        assert!(normalize_url("ftp://x", "catalog_url", "t").is_err());
        assert!(normalize_url("nope", "catalog_url", "t").is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email("a@b.co", "t").is_ok());
        assert!(validate_email("ab.co", "t").is_err());
        assert!(validate_email("@b.co", "t").is_err());
        assert!(validate_email("a@localhost", "t").is_err());
    }
}
