//! Backend implementations

/// Shared utilities used by backend implementations.
pub mod common;

#[cfg(feature = "local-library")]
mod local;
#[cfg(feature = "remote-api")]
mod remote;

#[cfg(feature = "local-library")]
pub use local::{
    FsNativeClient, LocalLibraryBackend, NativeAdmin, NativeClient, NativeConfig, NativeEntry,
    NativeError, NativeManifest, NativeResult, NativeSession,
};
#[cfg(feature = "remote-api")]
pub use remote::RemoteApiBackend;
