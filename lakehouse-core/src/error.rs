//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

pub use lakehouse_backend::OpsError;

use crate::credentials::DiscoveryFailure;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Unparseable or inconsistent start-up configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No credential source produced a usable credential
    #[error("{0}")]
    Authentication(DiscoveryFailure),

    /// Per-call failure from the active backend
    #[error("{0}")]
    Ops(#[from] OpsError),
}

impl CoreError {
    /// Whether it is expected behavior (bad input, missing resource, ...); used for log grading.
    ///
    /// `true` logs at `warn`, `false` at `error`.
    /// **Update this method when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Authentication(_) => true,
            Self::Ops(e) => e.is_expected(),
        }
    }

    pub(crate) fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
