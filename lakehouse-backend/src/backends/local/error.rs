//! Native library error mapping

use crate::error::OpsError;
use crate::traits::{ErrorContext, ErrorMapper, RawApiError};

use super::{BACKEND_NAME, LocalLibraryBackend, NativeError};

impl ErrorMapper for LocalLibraryBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> OpsError {
        if raw.code.as_deref() == Some("Corrupt") {
            return self.parse_error(raw.message);
        }
        self.map_named_failure(raw, context)
    }
}

impl LocalLibraryBackend {
    pub(crate) fn native_error(&self, error: &NativeError, context: ErrorContext) -> OpsError {
        log::debug!("[{}] native failure: {error}", self.backend_name());
        self.map_error(
            RawApiError::with_code(error.code(), error.to_string()),
            context,
        )
    }
}
