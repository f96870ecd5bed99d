//! Shared fixtures for backend integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lakehouse_backend::{
    Backend, CreateUserRequest, Credential, CredentialSource, FsNativeClient, LocalLibraryBackend,
    NativeAdmin, NativeClient, NativeConfig, NativeError, NativeManifest, NativeResult,
    NativeSession, RemoteApiBackend, RemoteAuth, Role, RoleType, SsoConfig, TabulatorOpenQuery,
    User,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use wiremock::ResponseTemplate;

/// Asserts `Result` is `Ok` and unwraps it (fails the test otherwise).
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Asserts `Result` is `Err` and unwraps the error.
#[macro_export]
macro_rules! require_err {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_err(), "expected Err(..), got {res:?}");
        let Err(err) = res else {
            return;
        };
        err
    }};
}

// ============ Remote ============

pub const TOKEN: &str = "test-token";

pub fn remote_backend(server_uri: &str, auth: RemoteAuth) -> Arc<dyn Backend> {
    match RemoteApiBackend::new("https://catalog.example.com", server_uri, auth) {
        Ok(backend) => Arc::new(backend),
        Err(e) => panic!("remote backend should build: {e}"),
    }
}

pub fn remote_backend_with_bucket(server_uri: &str, bucket: &str) -> Arc<dyn Backend> {
    let built = RemoteApiBackend::new("https://catalog.example.com", server_uri, static_auth())
        .and_then(|b| b.with_default_bucket(Some(bucket)));
    match built {
        Ok(backend) => Arc::new(backend),
        Err(e) => panic!("remote backend should build: {e}"),
    }
}

pub fn static_auth() -> RemoteAuth {
    RemoteAuth::Static(Credential::new(TOKEN, CredentialSource::Environment))
}

pub fn graphql_data(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

pub fn graphql_error(code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": null,
        "errors": [{ "message": message, "extensions": { "code": code } }]
    }))
}

pub fn wire_user(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "dateJoined": "2024-01-01T00:00:00Z",
        "lastLogin": "2024-06-01T12:00:00+00:00",
        "isActive": true,
        "isAdmin": false,
        "isSsoOnly": false,
        "isService": false,
        "role": { "__typename": "ManagedRole", "id": "1", "name": "Viewer", "arn": "arn:aws:iam::1:role/Viewer" },
        "extraRoles": []
    })
}

// ============ Local ============

pub const LATEST_HASH: &str = "aaa111";
pub const OLD_HASH: &str = "bbb222";

/// Writes a native library directory with one registry holding
/// `team/data` (two revisions) and `team/empty`.
pub fn write_library(dir: &Path) -> std::io::Result<()> {
    use std::fs;

    let registry = dir.join("packages");
    let named = registry.join(".quilt").join("named_packages").join("team");
    let manifests = registry.join(".quilt").join("packages");
    fs::create_dir_all(named.join("data"))?;
    fs::create_dir_all(named.join("empty"))?;
    fs::create_dir_all(&manifests)?;

    fs::write(named.join("data").join("latest"), format!("{LATEST_HASH}\n"))?;
    fs::write(named.join("data").join("1700000000"), OLD_HASH)?;
    fs::write(named.join("data").join("stable"), LATEST_HASH)?;

    let latest = [
        json!({"version": "v0", "message": "nightly refresh", "user_meta": {"owner": "ops", "rows": 42}}),
        json!({"logical_key": "README.md", "physical_keys": ["file:///src/README.md"], "size": 5}),
        json!({"logical_key": "data/a.csv", "physical_keys": ["file:///src/data/a.csv"], "size": 10}),
        json!({"logical_key": "data/raw/b.csv", "physical_keys": ["file:///src/data/raw/b.csv"], "size": 20}),
    ];
    let old = [
        json!({"version": "v0", "message": ""}),
        json!({"logical_key": "README.md", "physical_keys": [], "size": 3}),
    ];
    let to_jsonl =
        |lines: &[Value]| lines.iter().map(Value::to_string).collect::<Vec<_>>().join("\n");
    fs::write(manifests.join(LATEST_HASH), to_jsonl(&latest))?;
    fs::write(manifests.join(OLD_HASH), to_jsonl(&old))?;

    fs::write(
        dir.join("config.json"),
        json!({
            "navigator_url": "https://catalog.example.com",
            "registry_url": "https://registry.example.com",
        })
        .to_string(),
    )?;
    Ok(())
}

pub fn write_session(dir: &Path, expires_at: i64) -> std::io::Result<()> {
    std::fs::write(
        dir.join("auth.json"),
        json!({
            "https://registry.example.com/": {
                "access_token": "native-token",
                "refresh_token": "r",
                "expires_at": expires_at
            }
        })
        .to_string(),
    )
}

pub fn local_backend(dir: &Path) -> Arc<dyn Backend> {
    Arc::new(LocalLibraryBackend::new(Arc::new(FsNativeClient::new(dir))))
}

/// Native client with an in-memory admin module layered on an [`FsNativeClient`].
pub struct AdminNativeClient {
    inner: FsNativeClient,
    admin: Arc<FakeAdmin>,
}

impl AdminNativeClient {
    pub fn new(dir: &Path, admin: Arc<FakeAdmin>) -> Self {
        Self {
            inner: FsNativeClient::new(dir),
            admin,
        }
    }
}

#[async_trait]
impl NativeClient for AdminNativeClient {
    async fn config(&self) -> NativeResult<NativeConfig> {
        self.inner.config().await
    }

    async fn set_navigator_url(&self, url: &str) -> NativeResult<NativeConfig> {
        self.inner.set_navigator_url(url).await
    }

    async fn session(&self, registry_url: &str) -> NativeResult<Option<NativeSession>> {
        self.inner.session(registry_url).await
    }

    async fn list_packages(&self, registry: &str) -> NativeResult<Vec<String>> {
        self.inner.list_packages(registry).await
    }

    async fn load_manifest(
        &self,
        name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> NativeResult<NativeManifest> {
        self.inner.load_manifest(name, registry, top_hash).await
    }

    fn admin(&self) -> Option<Arc<dyn NativeAdmin>> {
        Some(self.admin.clone())
    }
}

fn viewer() -> Role {
    Role {
        id: "1".into(),
        name: "Viewer".into(),
        arn: None,
        role_type: RoleType::Managed,
    }
}

fn user(name: &str, email: &str) -> User {
    User {
        name: name.into(),
        email: email.into(),
        is_active: true,
        is_admin: false,
        is_sso_only: false,
        is_service: false,
        date_joined: None,
        last_login: None,
        role: Some(viewer()),
        extra_roles: Vec::new(),
    }
}

fn no_user(name: &str) -> NativeError {
    NativeError::AdminCommand {
        name: "UserNotFound".into(),
        message: format!("user {name} does not exist"),
    }
}

/// In-memory admin module: a user table plus recorded password resets.
#[derive(Default)]
pub struct FakeAdmin {
    pub users: Mutex<Vec<User>>,
    pub resets: Mutex<Vec<String>>,
    pub sso: Mutex<Option<SsoConfig>>,
    /// When set, every user command fails with this library error name.
    pub fail_with: Option<String>,
}

impl FakeAdmin {
    pub fn with_user(name: &str, email: &str) -> Self {
        Self {
            users: Mutex::new(vec![user(name, email)]),
            ..Self::default()
        }
    }

    pub fn failing(error_name: &str) -> Self {
        Self {
            fail_with: Some(error_name.to_string()),
            ..Self::default()
        }
    }

    async fn update(&self, name: &str, f: impl FnOnce(&mut User)) -> NativeResult<User> {
        if let Some(error_name) = &self.fail_with {
            return Err(NativeError::AdminCommand {
                name: error_name.clone(),
                message: format!("{error_name} for {name}"),
            });
        }
        let mut users = self.users.lock().await;
        let found = users
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| no_user(name))?;
        f(found);
        Ok(found.clone())
    }
}

#[async_trait]
impl NativeAdmin for FakeAdmin {
    async fn list_users(&self) -> NativeResult<Vec<User>> {
        Ok(self.users.lock().await.clone())
    }

    async fn get_user(&self, name: &str) -> NativeResult<User> {
        self.update(name, |_| {}).await
    }

    async fn create_user(&self, req: &CreateUserRequest) -> NativeResult<User> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.name == req.name) {
            return Err(NativeError::AdminCommand {
                name: "UserAlreadyExists".into(),
                message: format!("user {} exists", req.name),
            });
        }
        let created = user(&req.name, &req.email);
        users.push(created.clone());
        Ok(created)
    }

    async fn delete_user(&self, name: &str) -> NativeResult<()> {
        let mut users = self.users.lock().await;
        let before = users.len();
        users.retain(|u| u.name != name);
        if users.len() == before {
            Err(no_user(name))
        } else {
            Ok(())
        }
    }

    async fn set_email(&self, name: &str, email: &str) -> NativeResult<User> {
        self.update(name, |u| u.email = email.to_string()).await
    }

    async fn set_admin(&self, name: &str, admin: bool) -> NativeResult<User> {
        self.update(name, |u| u.is_admin = admin).await
    }

    async fn set_active(&self, name: &str, active: bool) -> NativeResult<User> {
        self.update(name, |u| u.is_active = active).await
    }

    async fn reset_password(&self, name: &str) -> NativeResult<()> {
        self.update(name, |_| {}).await?;
        self.resets.lock().await.push(name.to_string());
        Ok(())
    }

    async fn set_role(
        &self,
        name: &str,
        role: &str,
        _extra_roles: &[String],
        _append: bool,
    ) -> NativeResult<User> {
        self.update(name, |u| {
            u.role = Some(Role {
                name: role.to_string(),
                ..viewer()
            });
        })
        .await
    }

    async fn add_roles(&self, name: &str, roles: &[String]) -> NativeResult<User> {
        self.update(name, |u| {
            u.extra_roles.extend(roles.iter().map(|r| Role {
                name: r.clone(),
                ..viewer()
            }));
        })
        .await
    }

    async fn remove_roles(
        &self,
        name: &str,
        roles: &[String],
        _fallback: Option<&str>,
    ) -> NativeResult<User> {
        self.update(name, |u| u.extra_roles.retain(|r| !roles.contains(&r.name)))
            .await
    }

    async fn list_roles(&self) -> NativeResult<Vec<Role>> {
        Ok(vec![viewer()])
    }

    async fn get_sso_config(&self) -> NativeResult<Option<SsoConfig>> {
        Ok(self.sso.lock().await.clone())
    }

    async fn set_sso_config(&self, config: Option<&str>) -> NativeResult<Option<SsoConfig>> {
        let mut sso = self.sso.lock().await;
        *sso = config.map(|text| SsoConfig {
            text: text.to_string(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            uploader: "admin".into(),
        });
        Ok(sso.clone())
    }

    async fn get_tabulator_open_query(&self) -> NativeResult<TabulatorOpenQuery> {
        Ok(TabulatorOpenQuery { enabled: false })
    }

    async fn set_tabulator_open_query(&self, enabled: bool) -> NativeResult<TabulatorOpenQuery> {
        Ok(TabulatorOpenQuery { enabled })
    }
}
