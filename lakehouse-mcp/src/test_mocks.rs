use super::*;

use std::path::Path;

use lakehouse_backend::{
    Backend, FsNativeClient, LocalLibraryBackend, RemoteApiBackend, RemoteAuth,
};
use lakehouse_core::Settings;
use lakehouse_core::mode::ModeInputs;
use lakehouse_core::test_utils::MockBackend;

/// Settings resolved from an explicit preset, nothing read from the environment.
pub fn test_settings(preset: &str) -> Settings {
    let mut settings = Settings::from_lookup(|_| None).unwrap();
    settings.mode = ModeInputs {
        preset_flag: Some(preset.to_string()),
        ..ModeInputs::default()
    };
    settings
}

/// Server over a prebuilt [`Ops`] wrapping `backend`.
pub fn build_server(backend: Arc<MockBackend>) -> LakehouseMcp {
    build_server_with_preset(backend, "local")
}

pub fn build_server_with_preset(backend: Arc<MockBackend>, preset: &str) -> LakehouseMcp {
    server_over(backend, preset)
}

fn server_over(backend: Arc<dyn Backend>, preset: &str) -> LakehouseMcp {
    let factory = BackendFactory::with_ops(test_settings(preset), Ops::new(backend));
    LakehouseMcp::new(Arc::new(factory))
}

/// Server over a real local-library backend reading `native_dir`.
pub fn local_library_server(native_dir: &Path) -> LakehouseMcp {
    let client = Arc::new(FsNativeClient::new(native_dir));
    server_over(Arc::new(LocalLibraryBackend::new(client)), "legacy")
}

/// Server over a real remote backend talking to `registry_url`.
pub fn remote_server(registry_url: &str, default_bucket: Option<&str>) -> LakehouseMcp {
    let auth = RemoteAuth::Static(Credential::new("test-token", CredentialSource::Environment));
    let backend = RemoteApiBackend::new("https://catalog.example.com", registry_url, auth)
        .and_then(|b| b.with_default_bucket(default_bucket))
        .unwrap();
    server_over(Arc::new(backend), "local")
}

/// Native library directory whose local registry holds `names`.
///
/// Its config also names a remote login registry, which package tools must ignore.
pub fn write_local_registry(dir: &Path, names: &[&str]) {
    let named = dir.join("packages").join(".quilt").join("named_packages");
    for name in names {
        std::fs::create_dir_all(named.join(name)).unwrap();
    }
    std::fs::write(
        dir.join("config.json"),
        serde_json::json!({
            "navigator_url": "https://catalog.example.com",
            "registry_url": "https://registry.example.com",
        })
        .to_string(),
    )
    .unwrap();
}

/// Server whose factory has to build a backend and fails doing so.
pub fn unconfigured_remote_server() -> LakehouseMcp {
    LakehouseMcp::new(Arc::new(BackendFactory::new(test_settings("remote"))))
}

pub fn default_backend() -> Arc<MockBackend> {
    Arc::new(MockBackend::new().with_user("alice", "alice@example.com"))
}

/// First text block of a tool result.
pub fn result_text(result: &CallToolResult) -> &str {
    result
        .content
        .first()
        .and_then(|c| c.raw.as_text())
        .map(|t| t.text.as_str())
        .expect("expected text content in result")
}

pub fn result_json(result: &CallToolResult) -> serde_json::Value {
    serde_json::from_str(result_text(result)).unwrap()
}
