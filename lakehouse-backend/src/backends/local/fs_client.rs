//! Native client backed by the library's on-disk state.
//!
//! Layout under the library directory:
//!
//! ```text
//! <dir>/config.json          {"navigator_url": .., "registry_url": .., "default_local_registry": ..}
//! <dir>/auth.json            {"<registry url>": {"access_token": .., "expires_at": ..}}
//! <dir>/packages/            default local registry
//!
//! <registry>/.quilt/named_packages/<ns>/<name>/latest       top hash of the newest revision
//! <registry>/.quilt/named_packages/<ns>/<name>/<timestamp>  top hash of an older revision
//! <registry>/.quilt/packages/<top hash>                     JSONL manifest
//! ```

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::utils::datetime;
use crate::utils::log_sanitizer::truncate_for_log;

use super::native::{
    NativeClient, NativeConfig, NativeEntry, NativeError, NativeManifest, NativeResult,
    NativeSession,
};

const CONFIG_FILE: &str = "config.json";
const AUTH_FILE: &str = "auth.json";
const DEFAULT_REGISTRY_DIR: &str = "packages";
const LATEST_TAG: &str = "latest";

#[derive(Debug, Deserialize)]
struct AuthEntry {
    access_token: String,
    #[serde(default, deserialize_with = "datetime::deserialize_optional")]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestHeader {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_meta: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ManifestLine {
    logical_key: String,
    #[serde(default)]
    physical_keys: Vec<String>,
    #[serde(default)]
    size: u64,
}

/// Reads the native library's files directly.
#[derive(Debug, Clone)]
pub struct FsNativeClient {
    dir: PathBuf,
}

impl FsNativeClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_installed(&self) -> NativeResult<()> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(NativeError::NotInstalled(self.dir.display().to_string())),
        }
    }

    async fn read_config(&self) -> NativeResult<NativeConfig> {
        self.ensure_installed().await?;
        let path = self.dir.join(CONFIG_FILE);
        match read_optional(&path).await? {
            Some(text) => parse_json(&text, &path),
            None => Ok(NativeConfig::default()),
        }
    }

    /// Resolves a registry argument to a directory and its `file://` URL.
    async fn registry_root(&self, registry: &str) -> NativeResult<(PathBuf, String)> {
        let registry = registry.trim();
        let root = match registry {
            "" | "local" => match self.read_config().await?.default_local_registry {
                Some(configured) => local_path(&configured)?,
                None => self.dir.join(DEFAULT_REGISTRY_DIR),
            },
            other => local_path(other)?,
        };

        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(NativeError::NoSuchRegistry(root.display().to_string())),
        }

        let url = url::Url::from_directory_path(&root)
            .map(|u| u.as_str().trim_end_matches('/').to_string())
            .unwrap_or_else(|()| format!("file://{}", root.display()));
        Ok((root, url))
    }
}

/// `file://` URLs and absolute paths; anything remote is unsupported.
fn local_path(registry: &str) -> NativeResult<PathBuf> {
    if registry.starts_with("file://") {
        return url::Url::parse(registry)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| NativeError::InvalidName(registry.to_string()));
    }
    let path = Path::new(registry);
    if registry.contains("://") || !path.is_absolute() {
        return Err(NativeError::UnsupportedRegistry(registry.to_string()));
    }
    Ok(path.to_path_buf())
}

async fn read_optional(path: &Path) -> NativeResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
        Err(source) => Err(NativeError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(text: &str, path: &Path) -> NativeResult<T> {
    serde_json::from_str(text).map_err(|e| {
        log::warn!(
            "[local-library] cannot parse {}: {e}; content: {}",
            path.display(),
            truncate_for_log(text)
        );
        NativeError::Corrupt {
            path: path.display().to_string(),
            detail: e.to_string(),
        }
    })
}

fn io_error(path: &Path, source: std::io::Error) -> NativeError {
    NativeError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Immediate subdirectory names, sorted. Missing directory yields nothing.
async fn subdirectories(path: &Path) -> NativeResult<Vec<String>> {
    let mut reader = match tokio::fs::read_dir(path).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(path, e)),
    };
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(path, e))? {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn is_hash(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn parse_manifest(text: &str, path: &Path) -> NativeResult<(ManifestHeader, Vec<NativeEntry>)> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = match lines.next() {
        Some(line) => parse_json::<ManifestHeader>(line, path)?,
        None => ManifestHeader::default(),
    };
    let entries = lines
        .map(|line| {
            parse_json::<ManifestLine>(line, path).map(|l| NativeEntry {
                logical_key: l.logical_key,
                physical_key: l.physical_keys.into_iter().next(),
                size: l.size,
            })
        })
        .collect::<NativeResult<Vec<_>>>()?;
    Ok((header, entries))
}

#[async_trait]
impl NativeClient for FsNativeClient {
    async fn config(&self) -> NativeResult<NativeConfig> {
        self.read_config().await
    }

    async fn set_navigator_url(&self, url: &str) -> NativeResult<NativeConfig> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let mut config = self.read_config().await?;
        config.navigator_url = Some(url.to_string());

        let path = self.dir.join(CONFIG_FILE);
        let text = serde_json::to_string_pretty(&config).map_err(|e| NativeError::Corrupt {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(config)
    }

    async fn session(&self, registry_url: &str) -> NativeResult<Option<NativeSession>> {
        self.ensure_installed().await?;
        let path = self.dir.join(AUTH_FILE);
        let Some(text) = read_optional(&path).await? else {
            return Ok(None);
        };
        let entries: HashMap<String, AuthEntry> = parse_json(&text, &path)?;
        let wanted = registry_url.trim_end_matches('/');
        Ok(entries
            .into_iter()
            .find(|(key, _)| key.trim_end_matches('/') == wanted)
            .map(|(_, entry)| NativeSession {
                access_token: SecretString::new(entry.access_token),
                expires_at: entry.expires_at,
            }))
    }

    async fn list_packages(&self, registry: &str) -> NativeResult<Vec<String>> {
        let (root, _) = self.registry_root(registry).await?;
        let named = root.join(".quilt").join("named_packages");
        let mut packages = Vec::new();
        for namespace in subdirectories(&named).await? {
            for name in subdirectories(&named.join(&namespace)).await? {
                packages.push(format!("{namespace}/{name}"));
            }
        }
        Ok(packages)
    }

    async fn load_manifest(
        &self,
        name: &str,
        registry: &str,
        top_hash: Option<&str>,
    ) -> NativeResult<NativeManifest> {
        let Some((namespace, short)) = name.split_once('/') else {
            return Err(NativeError::InvalidName(name.to_string()));
        };
        let (root, registry_url) = self.registry_root(registry).await?;
        let pkg_dir = root
            .join(".quilt")
            .join("named_packages")
            .join(namespace)
            .join(short);

        match tokio::fs::metadata(&pkg_dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(NativeError::NoSuchPackage(name.to_string())),
        }

        let top_hash = match top_hash {
            Some(hash) if is_hash(hash) => hash.to_string(),
            Some(hash) => return Err(NativeError::InvalidName(hash.to_string())),
            None => read_optional(&pkg_dir.join(LATEST_TAG))
                .await?
                .map(|s| s.trim().to_string())
                .filter(|s| is_hash(s))
                .ok_or_else(|| NativeError::NoSuchPackage(name.to_string()))?,
        };

        let manifest_path = root.join(".quilt").join("packages").join(&top_hash);
        let Some(text) = read_optional(&manifest_path).await? else {
            return Err(NativeError::NoSuchPackage(format!("{name}@{top_hash}")));
        };
        let (header, entries) = parse_manifest(&text, &manifest_path)?;

        let modified = tokio::fs::metadata(&manifest_path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| io_error(&manifest_path, e))?;

        let mut tags = Vec::new();
        let mut reader = tokio::fs::read_dir(&pkg_dir)
            .await
            .map_err(|e| io_error(&pkg_dir, e))?;
        while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(&pkg_dir, e))? {
            let tag = entry.file_name().to_string_lossy().into_owned();
            // Timestamp pointers record history and are not tags.
            if tag.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Some(content) = read_optional(&entry.path()).await?
                && content.trim() == top_hash
            {
                tags.push(tag);
            }
        }
        tags.sort();

        Ok(NativeManifest {
            name: name.to_string(),
            registry: registry_url,
            top_hash,
            message: header.message.filter(|m| !m.is_empty()),
            user_meta: header.user_meta.unwrap_or_default(),
            modified,
            tags,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths() {
        assert!(matches!(
            local_path("s3://bucket"),
            Err(NativeError::UnsupportedRegistry(_))
        ));
        assert!(matches!(
            local_path("relative/dir"),
            Err(NativeError::UnsupportedRegistry(_))
        ));
        assert_eq!(
            local_path("file:///tmp/reg").ok(),
            Some(PathBuf::from("/tmp/reg"))
        );
        assert_eq!(local_path("/tmp/reg").ok(), Some(PathBuf::from("/tmp/reg")));
    }

    #[test]
    fn manifest_lines() {
        let text = concat!(
            r#"{"version":"v0","message":"first","user_meta":{"owner":"ops"}}"#,
            "\n",
            r#"{"logical_key":"a.csv","physical_keys":["file:///r/a.csv"],"size":3,"hash":{"type":"SHA256","value":"00"},"meta":{}}"#,
            "\n\n",
            r#"{"logical_key":"dir/b.csv","physical_keys":[],"size":4}"#,
            "\n"
        );
        let (header, entries) = match parse_manifest(text, Path::new("m")) {
            Ok(parsed) => parsed,
            Err(e) => panic!("manifest should parse: {e}"),
        };
        assert_eq!(header.message.as_deref(), Some("first"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].physical_key.as_deref(), Some("file:///r/a.csv"));
        assert_eq!(entries[1].physical_key, None);
    }

    #[test]
    fn corrupt_manifest_line() {
        let result = parse_manifest("{}\nnot-json", Path::new("m"));
        assert!(matches!(result, Err(NativeError::Corrupt { .. })));
    }

    #[test]
    fn hashes() {
        assert!(is_hash("abc123"));
        assert!(!is_hash("../etc"));
        assert!(!is_hash(""));
    }
}
