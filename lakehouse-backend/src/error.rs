use serde::{Deserialize, Serialize};

/// Unified error type for every operation a [`Backend`](crate::Backend) exposes.
///
/// There are exactly five kinds (see [`ErrorKind`]). Each variant carries a
/// `backend` field identifying which adapter produced the error. Failures
/// that cannot be classified more precisely end up in
/// [`Backend`](Self::Backend) with an explanatory [`BackendFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum OpsError {
    /// No credential, or the credential was rejected.
    Authentication {
        /// Backend that produced the error.
        backend: String,
        /// Error details.
        detail: String,
    },

    /// Authenticated, but not authorized for the requested operation.
    Permission {
        /// Backend that produced the error.
        backend: String,
        /// Original error message from the backend, if available.
        raw_message: Option<String>,
    },

    /// The requested resource does not exist.
    NotFound {
        /// Backend that produced the error.
        backend: String,
        /// Name of the missing resource (package, user, path, ...).
        resource: String,
        /// Original error message from the backend, if available.
        raw_message: Option<String>,
    },

    /// Caller input was malformed or rejected.
    Validation {
        /// Backend that produced the error.
        backend: String,
        /// Name of the offending parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// Any transport or library failure not covered above.
    Backend {
        /// Backend that produced the error.
        backend: String,
        /// Sub-classification of the failure.
        failure: BackendFailure,
        /// Error details.
        detail: String,
    },
}

/// Sub-kinds of [`OpsError::Backend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFailure {
    /// Connection refused, DNS failure, 502-504, ...
    Network,
    /// The request timed out.
    Timeout,
    /// HTTP 429 or equivalent.
    RateLimited {
        /// Suggested wait in seconds, if the server sent one.
        retry_after: Option<u64>,
    },
    /// A response could not be decoded.
    Parse,
    /// This deployment has no administrative capability at all.
    AdminUnavailable,
    /// Unrecognized upstream failure.
    Upstream {
        /// Raw error code reported by the backend, if any.
        raw_code: Option<String>,
    },
}

/// The five top-level error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Permission,
    NotFound,
    Validation,
    Backend,
}

impl OpsError {
    /// Returns the top-level kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// Identifier of the backend that produced this error.
    pub fn backend(&self) -> &str {
        match self {
            Self::Authentication { backend, .. }
            | Self::Permission { backend, .. }
            | Self::NotFound { backend, .. }
            | Self::Validation { backend, .. }
            | Self::Backend { backend, .. } => backend,
        }
    }

    /// Builds the uniform "admin not available" error.
    pub fn admin_unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            failure: BackendFailure::AdminUnavailable,
            detail: reason.into(),
        }
    }

    /// Whether this is the "admin not available" error.
    pub fn is_admin_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                failure: BackendFailure::AdminUnavailable,
                ..
            }
        )
    }

    /// Whether the failure is caller-induced rather than a fault, used to pick
    /// the log level (`warn` when `true`, `error` otherwise).
    ///
    /// **Update this when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Authentication { .. }
            | Self::Permission { .. }
            | Self::NotFound { .. }
            | Self::Validation { .. } => true,
            Self::Backend { failure, .. } => matches!(
                failure,
                BackendFailure::AdminUnavailable | BackendFailure::RateLimited { .. }
            ),
        }
    }

    /// Transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                failure: BackendFailure::Network
                    | BackendFailure::Timeout
                    | BackendFailure::RateLimited { .. },
                ..
            }
        )
    }
}

impl std::fmt::Display for OpsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication { backend, detail } => {
                write!(f, "[{backend}] Authentication failed: {detail}")
            }
            Self::Permission {
                backend,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{backend}] Permission denied: {msg}")
                } else {
                    write!(f, "[{backend}] Permission denied")
                }
            }
            Self::NotFound {
                backend,
                resource,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{backend}] '{resource}' not found: {msg}")
                } else {
                    write!(f, "[{backend}] '{resource}' not found")
                }
            }
            Self::Validation {
                backend,
                param,
                detail,
            } => {
                write!(f, "[{backend}] Invalid parameter '{param}': {detail}")
            }
            Self::Backend {
                backend,
                failure,
                detail,
            } => match failure {
                BackendFailure::Network => write!(f, "[{backend}] Network error: {detail}"),
                BackendFailure::Timeout => write!(f, "[{backend}] Request timeout: {detail}"),
                BackendFailure::RateLimited {
                    retry_after: Some(secs),
                } => write!(f, "[{backend}] Rate limited (retry after {secs}s)"),
                BackendFailure::RateLimited { retry_after: None } => {
                    write!(f, "[{backend}] Rate limited")
                }
                BackendFailure::Parse => write!(f, "[{backend}] Parse error: {detail}"),
                BackendFailure::AdminUnavailable => {
                    write!(f, "[{backend}] Admin not available: {detail}")
                }
                BackendFailure::Upstream { .. } => write!(f, "[{backend}] {detail}"),
            },
        }
    }
}

impl std::error::Error for OpsError {}

/// Convenience type alias for `Result<T, OpsError>`.
pub type Result<T> = std::result::Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_error(failure: BackendFailure) -> OpsError {
        OpsError::Backend {
            backend: "test".to_string(),
            failure,
            detail: "boom".to_string(),
        }
    }

    #[test]
    fn display_authentication() {
        let e = OpsError::Authentication {
            backend: "remote-api".to_string(),
            detail: "token expired".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "[remote-api] Authentication failed: token expired"
        );
    }

    #[test]
    fn display_permission_with_and_without_message() {
        let with = OpsError::Permission {
            backend: "remote-api".to_string(),
            raw_message: Some("admins only".to_string()),
        };
        let without = OpsError::Permission {
            backend: "remote-api".to_string(),
            raw_message: None,
        };
        assert_eq!(with.to_string(), "[remote-api] Permission denied: admins only");
        assert_eq!(without.to_string(), "[remote-api] Permission denied");
    }

    #[test]
    fn display_not_found() {
        let e = OpsError::NotFound {
            backend: "local-library".to_string(),
            resource: "team/data".to_string(),
            raw_message: None,
        };
        assert_eq!(e.to_string(), "[local-library] 'team/data' not found");
    }

    #[test]
    fn display_validation() {
        let e = OpsError::Validation {
            backend: "test".to_string(),
            param: "email".to_string(),
            detail: "missing '@'".to_string(),
        };
        assert_eq!(e.to_string(), "[test] Invalid parameter 'email': missing '@'");
    }

    #[test]
    fn display_rate_limited() {
        let e = backend_error(BackendFailure::RateLimited {
            retry_after: Some(30),
        });
        assert_eq!(e.to_string(), "[test] Rate limited (retry after 30s)");
        let e = backend_error(BackendFailure::RateLimited { retry_after: None });
        assert_eq!(e.to_string(), "[test] Rate limited");
    }

    #[test]
    fn display_admin_unavailable() {
        let e = OpsError::admin_unavailable("local-library", "no admin module");
        assert_eq!(
            e.to_string(),
            "[local-library] Admin not available: no admin module"
        );
        assert!(e.is_admin_unavailable());
        assert_eq!(e.kind(), ErrorKind::Backend);
    }

    #[test]
    fn admin_unavailable_is_not_permission() {
        let admin = OpsError::admin_unavailable("x", "y");
        let denied = OpsError::Permission {
            backend: "x".to_string(),
            raw_message: None,
        };
        assert_ne!(admin.kind(), denied.kind());
        assert!(!denied.is_admin_unavailable());
    }

    #[test]
    fn kinds_cover_every_variant() {
        let cases = [
            (
                OpsError::Authentication {
                    backend: String::new(),
                    detail: String::new(),
                },
                ErrorKind::Authentication,
            ),
            (
                OpsError::Permission {
                    backend: String::new(),
                    raw_message: None,
                },
                ErrorKind::Permission,
            ),
            (
                OpsError::NotFound {
                    backend: String::new(),
                    resource: String::new(),
                    raw_message: None,
                },
                ErrorKind::NotFound,
            ),
            (
                OpsError::Validation {
                    backend: String::new(),
                    param: String::new(),
                    detail: String::new(),
                },
                ErrorKind::Validation,
            ),
            (backend_error(BackendFailure::Parse), ErrorKind::Backend),
        ];
        for (error, kind) in cases {
            assert_eq!(error.kind(), kind);
        }
    }

    #[test]
    fn retryable_only_for_transient_failures() {
        assert!(backend_error(BackendFailure::Network).is_retryable());
        assert!(backend_error(BackendFailure::Timeout).is_retryable());
        assert!(backend_error(BackendFailure::RateLimited { retry_after: None }).is_retryable());
        assert!(!backend_error(BackendFailure::Parse).is_retryable());
        assert!(!backend_error(BackendFailure::AdminUnavailable).is_retryable());
        assert!(
            !OpsError::Authentication {
                backend: String::new(),
                detail: String::new(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn is_expected_grades_log_level() {
        assert!(OpsError::admin_unavailable("x", "y").is_expected());
        assert!(!backend_error(BackendFailure::Network).is_expected());
        assert!(
            !backend_error(BackendFailure::Upstream {
                raw_code: Some("E1".to_string())
            })
            .is_expected()
        );
    }

    #[test]
    fn serializes_with_code_tag() {
        let e = OpsError::NotFound {
            backend: "remote-api".to_string(),
            resource: "alice".to_string(),
            raw_message: None,
        };
        let json = serde_json::to_value(&e).unwrap_or_default();
        assert_eq!(json["code"], "NotFound");
        assert_eq!(json["resource"], "alice");
    }
}
