//! GraphQL error mapping

use crate::error::{ErrorKind, OpsError};
use crate::traits::{ErrorContext, ErrorMapper, RawApiError};

use super::{BACKEND_NAME, RemoteApiBackend};

/// Codes come from three places: the HTTP status (see
/// [`status_code`](super::http::status_code)), `errors[].extensions.code`,
/// and the `name` of an `OperationError` union member.
impl ErrorMapper for RemoteApiBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> OpsError {
        // GraphQL `extensions.code` 与 HTTP 状态码；其余名称走共用分类表
        let kind = match raw.code.as_deref() {
            Some("UNAUTHENTICATED") => ErrorKind::Authentication,
            Some("FORBIDDEN") => ErrorKind::Permission,
            Some("NOT_FOUND") => ErrorKind::NotFound,
            Some("BAD_USER_INPUT" | "GRAPHQL_VALIDATION_FAILED") => ErrorKind::Validation,
            _ => return self.map_named_failure(raw, context),
        };
        self.error_of_kind(Some(kind), raw, context)
    }
}
