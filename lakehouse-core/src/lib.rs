//! Lakehouse Core Library
//!
//! Everything between the process entry point and a backend:
//! - deployment mode resolution (presets, overrides, legacy switches)
//! - settings from environment and command line
//! - credential discovery for the remote backend
//! - the process-wide [`BackendFactory`]
//! - the [`Ops`] surface with its admin gate
//!
//! Transport-agnostic; the MCP server is one consumer.

pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod mode;
pub mod ops;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

// Re-export common types
pub use config::{CliOverrides, Settings};
pub use credentials::{
    AttemptOutcome, CredentialDiscovery, DiscoveredCredential, DiscoveryFailure, SourceAttempt,
};
pub use error::{CoreError, CoreResult};
pub use factory::BackendFactory;
pub use mode::{DeploymentPreset, ModeConfig, ModeInputs, ModeSource, Transport, resolve};
pub use ops::{Ops, PackageOverview};

pub use lakehouse_backend as backend;
