//! Local native-library backend

mod backend;
mod error;
mod fs_client;
mod native;

use std::sync::Arc;

pub use fs_client::FsNativeClient;
pub use native::{
    NativeAdmin, NativeClient, NativeConfig, NativeEntry, NativeError, NativeManifest,
    NativeResult, NativeSession,
};

pub(crate) const BACKEND_NAME: &str = "local-library";

/// Backend that drives the installed native client library.
pub struct LocalLibraryBackend {
    pub(crate) client: Arc<dyn NativeClient>,
    pub(crate) admin: Option<Arc<dyn NativeAdmin>>,
}

impl LocalLibraryBackend {
    pub fn new(client: Arc<dyn NativeClient>) -> Self {
        let admin = client.admin();
        Self { client, admin }
    }
}
