//! Process settings: environment first, then command-line overrides.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::{CoreError, CoreResult};
use crate::mode::ModeInputs;

// ============ Environment variables ============

pub const ENV_DEPLOYMENT: &str = "LAKEHOUSE_DEPLOYMENT";
pub const ENV_BACKEND: &str = "LAKEHOUSE_BACKEND";
pub const ENV_TRANSPORT: &str = "LAKEHOUSE_TRANSPORT";
pub const ENV_MULTIUSER: &str = "LAKEHOUSE_MULTIUSER_MODE";
pub const ENV_CATALOG_URL: &str = "LAKEHOUSE_CATALOG_URL";
pub const ENV_REGISTRY_URL: &str = "LAKEHOUSE_REGISTRY_URL";
pub const ENV_DEFAULT_BUCKET: &str = "LAKEHOUSE_DEFAULT_BUCKET";
pub const ENV_ACCESS_TOKEN: &str = "LAKEHOUSE_ACCESS_TOKEN";
pub const ENV_DEV_MODE: &str = "LAKEHOUSE_DEV_MODE";
pub const ENV_NATIVE_DIR: &str = "LAKEHOUSE_NATIVE_DIR";
pub const ENV_HTTP_ADDR: &str = "LAKEHOUSE_HTTP_ADDR";

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8000";
/// Directory name of the native client library under the platform data dir.
const NATIVE_DIR_NAME: &str = "Quilt";

/// Values supplied on the command line; each one beats its environment twin.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub deployment: Option<String>,
    pub backend: Option<String>,
    pub catalog_url: Option<String>,
    pub registry_url: Option<String>,
    pub default_bucket: Option<String>,
    pub bind: Option<String>,
}

/// Effective process settings.
#[derive(Clone)]
pub struct Settings {
    /// Raw deployment inputs, parsed later by [`crate::mode::resolve`].
    pub mode: ModeInputs,
    pub catalog_url: Option<String>,
    pub registry_url: Option<String>,
    /// Bucket name (no `s3://`) used when a package tool names no registry.
    pub default_bucket: Option<String>,
    pub access_token: Option<SecretString>,
    pub dev_mode: bool,
    pub native_dir: PathBuf,
    pub http_addr: String,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let catalog_url = get(ENV_CATALOG_URL)
            .map(|raw| normalize_endpoint(ENV_CATALOG_URL, &raw))
            .transpose()?;
        let registry_url = get(ENV_REGISTRY_URL)
            .map(|raw| normalize_endpoint(ENV_REGISTRY_URL, &raw))
            .transpose()?;
        let default_bucket = get(ENV_DEFAULT_BUCKET)
            .map(|raw| normalize_bucket(ENV_DEFAULT_BUCKET, &raw))
            .transpose()?;
        let dev_mode = get(ENV_DEV_MODE)
            .map(|raw| parse_bool(ENV_DEV_MODE, &raw))
            .transpose()?
            .unwrap_or(false);
        let native_dir = get(ENV_NATIVE_DIR)
            .map_or_else(default_native_dir, PathBuf::from);

        Ok(Self {
            mode: ModeInputs {
                preset_flag: None,
                preset_env: get(ENV_DEPLOYMENT),
                backend_override: get(ENV_BACKEND),
                transport_override: get(ENV_TRANSPORT),
                multiuser_env: get(ENV_MULTIUSER),
            },
            catalog_url,
            registry_url,
            default_bucket,
            access_token: get(ENV_ACCESS_TOKEN).map(SecretString::new),
            dev_mode,
            native_dir,
            http_addr: get(ENV_HTTP_ADDR).unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
        })
    }

    /// Overlays command-line values.
    pub fn with_cli(mut self, cli: CliOverrides) -> CoreResult<Self> {
        let given = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(deployment) = given(cli.deployment) {
            self.mode.preset_flag = Some(deployment);
        }
        if let Some(backend) = given(cli.backend) {
            self.mode.backend_override = Some(backend);
        }
        if let Some(url) = given(cli.catalog_url) {
            self.catalog_url = Some(normalize_endpoint("--catalog-url", &url)?);
        }
        if let Some(url) = given(cli.registry_url) {
            self.registry_url = Some(normalize_endpoint("--registry-url", &url)?);
        }
        if let Some(bucket) = given(cli.default_bucket) {
            self.default_bucket = Some(normalize_bucket("--default-bucket", &bucket)?);
        }
        if let Some(bind) = given(cli.bind) {
            self.http_addr = bind;
        }
        Ok(self)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("mode", &self.mode)
            .field("catalog_url", &self.catalog_url)
            .field("registry_url", &self.registry_url)
            .field("default_bucket", &self.default_bucket)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("dev_mode", &self.dev_mode)
            .field("native_dir", &self.native_dir)
            .field("http_addr", &self.http_addr)
            .finish()
    }
}

fn default_native_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(NATIVE_DIR_NAME)
}

/// Validates an endpoint URL and strips trailing slashes.
pub(crate) fn normalize_endpoint(origin: &str, raw: &str) -> CoreResult<String> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| CoreError::configuration(format!("{origin}: invalid URL '{trimmed}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CoreError::configuration(format!(
            "{origin}: unsupported scheme '{}' (expected http or https)",
            parsed.scheme()
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Accepts `name` or `s3://name` and returns the bare bucket name.
pub(crate) fn normalize_bucket(origin: &str, raw: &str) -> CoreResult<String> {
    let trimmed = raw.trim();
    let bucket = trimmed
        .strip_prefix("s3://")
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if bucket.is_empty() || bucket.contains('/') || bucket.contains(':') {
        return Err(CoreError::configuration(format!(
            "{origin}: '{trimmed}' is not a bucket name or s3:// URL"
        )));
    }
    Ok(bucket.to_string())
}

/// Parses a boolean switch; anything outside the accepted spellings is an error.
pub(crate) fn parse_bool(origin: &str, raw: &str) -> CoreResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::configuration(format!(
            "{origin}: expected a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let Ok(settings) = Settings::from_lookup(lookup(&[])) else {
            panic!("defaults should load");
        };
        assert_eq!(settings.mode, ModeInputs::default());
        assert_eq!(settings.catalog_url, None);
        assert!(!settings.dev_mode);
        assert_eq!(settings.http_addr, DEFAULT_HTTP_ADDR);
        assert!(settings.native_dir.ends_with(NATIVE_DIR_NAME));
    }

    #[test]
    fn environment_values_are_read() {
        let Ok(settings) = Settings::from_lookup(lookup(&[
            (ENV_DEPLOYMENT, "remote"),
            (ENV_BACKEND, "local-library"),
            (ENV_TRANSPORT, "http"),
            (ENV_MULTIUSER, "false"),
            (ENV_CATALOG_URL, "https://catalog.example.com/"),
            (ENV_REGISTRY_URL, " https://registry.example.com "),
            (ENV_DEFAULT_BUCKET, "s3://demo-bucket/"),
            (ENV_ACCESS_TOKEN, "secret"),
            (ENV_DEV_MODE, "yes"),
            (ENV_NATIVE_DIR, "/opt/native"),
            (ENV_HTTP_ADDR, "0.0.0.0:9000"),
        ])) else {
            panic!("settings should load");
        };
        assert_eq!(settings.mode.preset_env.as_deref(), Some("remote"));
        assert_eq!(settings.mode.backend_override.as_deref(), Some("local-library"));
        assert_eq!(settings.mode.transport_override.as_deref(), Some("http"));
        assert_eq!(settings.mode.multiuser_env.as_deref(), Some("false"));
        assert_eq!(settings.catalog_url.as_deref(), Some("https://catalog.example.com"));
        assert_eq!(settings.registry_url.as_deref(), Some("https://registry.example.com"));
        assert_eq!(settings.default_bucket.as_deref(), Some("demo-bucket"));
        assert_eq!(
            settings.access_token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("secret")
        );
        assert!(settings.dev_mode);
        assert_eq!(settings.native_dir, PathBuf::from("/opt/native"));
        assert_eq!(settings.http_addr, "0.0.0.0:9000");
    }

    #[test]
    fn cli_beats_environment() {
        let Ok(settings) = Settings::from_lookup(lookup(&[
            (ENV_BACKEND, "local-library"),
            (ENV_CATALOG_URL, "https://env.example.com"),
        ])) else {
            panic!("settings should load");
        };
        let Ok(settings) = settings.with_cli(CliOverrides {
            deployment: Some("legacy".into()),
            backend: Some("remote-api".into()),
            catalog_url: Some("https://cli.example.com/".into()),
            registry_url: None,
            default_bucket: Some("cli-bucket".into()),
            bind: Some("127.0.0.1:7000".into()),
        }) else {
            panic!("cli overlay should apply");
        };
        assert_eq!(settings.mode.preset_flag.as_deref(), Some("legacy"));
        assert_eq!(settings.mode.backend_override.as_deref(), Some("remote-api"));
        assert_eq!(settings.catalog_url.as_deref(), Some("https://cli.example.com"));
        assert_eq!(settings.default_bucket.as_deref(), Some("cli-bucket"));
        assert_eq!(settings.http_addr, "127.0.0.1:7000");
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for vars in [
            [(ENV_CATALOG_URL, "not a url")],
            [(ENV_REGISTRY_URL, "ftp://registry.example.com")],
            [(ENV_DEV_MODE, "sometimes")],
            [(ENV_DEFAULT_BUCKET, "https://registry.example.com")],
        ] {
            let result = Settings::from_lookup(lookup(&vars));
            assert!(
                matches!(result, Err(CoreError::Configuration(_))),
                "{vars:?} should be rejected"
            );
        }
    }

    #[test]
    fn debug_redacts_token() {
        let Ok(settings) = Settings::from_lookup(lookup(&[(ENV_ACCESS_TOKEN, "hunter2")])) else {
            panic!("settings should load");
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("X", "TRUE").ok(), Some(true));
        assert_eq!(parse_bool("X", " off ").ok(), Some(false));
        assert!(parse_bool("X", "2").is_err());
    }
}
