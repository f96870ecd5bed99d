//! Deployment mode resolution.
//!
//! Turns the raw deployment inputs (flags and environment) into the effective
//! `(backend, transport, multiuser)` triple. Resolution is a pure function of
//! [`ModeInputs`]; the first matching level wins:
//!
//! 1. preset flag (`--deployment`)
//! 2. preset environment variable
//! 3. backend / transport overrides, missing halves taken from the default preset
//! 4. legacy multiuser boolean
//! 5. default preset (`local`)

use std::fmt;
use std::str::FromStr;

use lakehouse_backend::BackendKind;
use serde::Serialize;

use crate::config::parse_bool;
use crate::error::{CoreError, CoreResult};

/// Wire transport of the tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" | "streamable-http" => Ok(Self::Http),
            other => Err(format!(
                "unknown transport '{other}' (expected 'stdio' or 'http')"
            )),
        }
    }
}

/// Named deployment preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPreset {
    /// Hosted multi-user server.
    Remote,
    /// Single process on a workstation talking to the remote API.
    Local,
    /// Native client library only.
    Legacy,
}

impl DeploymentPreset {
    pub const ALL: [Self; 3] = [Self::Remote, Self::Local, Self::Legacy];
    pub const DEFAULT: Self = Self::Local;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Legacy => "legacy",
        }
    }

    /// `(backend, transport, multiuser)` for this preset.
    pub fn triple(self) -> (BackendKind, Transport, bool) {
        match self {
            Self::Remote => (BackendKind::RemoteApi, Transport::Http, true),
            Self::Local => (BackendKind::RemoteApi, Transport::Stdio, true),
            Self::Legacy => (BackendKind::LocalLibrary, Transport::Stdio, false),
        }
    }

    /// The preset producing exactly `triple`, if any.
    pub fn matching(triple: (BackendKind, Transport, bool)) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.triple() == triple)
    }
}

impl fmt::Display for DeploymentPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!(
                "unknown deployment preset '{other}' (expected 'remote', 'local' or 'legacy')"
            )),
        }
    }
}

/// Which precedence level decided the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSource {
    PresetFlag,
    PresetEnv,
    Overrides,
    LegacyMultiuser,
    Default,
}

/// Raw, unparsed resolver inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModeInputs {
    pub preset_flag: Option<String>,
    pub preset_env: Option<String>,
    pub backend_override: Option<String>,
    pub transport_override: Option<String>,
    pub multiuser_env: Option<String>,
}

/// The resolved deployment mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeConfig {
    pub backend: BackendKind,
    pub transport: Transport,
    pub multiuser: bool,
    pub source: ModeSource,
    /// The triple matches no preset.
    pub unusual: bool,
    pub inputs: ModeInputs,
}

impl ModeConfig {
    fn new(triple: (BackendKind, Transport, bool), source: ModeSource, inputs: &ModeInputs) -> Self {
        let (backend, transport, multiuser) = triple;
        Self {
            backend,
            transport,
            multiuser,
            source,
            unusual: DeploymentPreset::matching(triple).is_none(),
            inputs: inputs.clone(),
        }
    }

    /// Preset equivalent to the resolved triple.
    pub fn preset(&self) -> Option<DeploymentPreset> {
        DeploymentPreset::matching((self.backend, self.transport, self.multiuser))
    }

    /// Multi-user deployments must authenticate every call.
    pub fn requires_authentication(&self) -> bool {
        self.multiuser
    }

    /// Checks that the endpoints the resolved backend needs are configured.
    pub fn validate_endpoints(
        &self,
        catalog_url: Option<&str>,
        registry_url: Option<&str>,
    ) -> CoreResult<()> {
        if self.backend != BackendKind::RemoteApi {
            return Ok(());
        }
        let missing: Vec<&str> = [
            ("catalog URL", catalog_url),
            ("registry URL", registry_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::configuration(format!(
                "backend {} requires {} to be configured",
                self.backend,
                missing.join(" and ")
            )))
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_preset(raw: &str, origin: &str) -> CoreResult<DeploymentPreset> {
    raw.parse()
        .map_err(|e: String| CoreError::configuration(format!("{origin}: {e}")))
}

/// Resolves the deployment mode from raw inputs.
pub fn resolve(inputs: &ModeInputs) -> CoreResult<ModeConfig> {
    let mode = resolve_inner(inputs)?;
    if mode.unusual {
        log::warn!(
            "Unusual deployment mode: backend={} transport={} multiuser={} (matches no preset)",
            mode.backend,
            mode.transport,
            mode.multiuser
        );
    }
    log::debug!(
        "Deployment mode resolved from {:?}: backend={} transport={} multiuser={}",
        mode.source,
        mode.backend,
        mode.transport,
        mode.multiuser
    );
    Ok(mode)
}

fn resolve_inner(inputs: &ModeInputs) -> CoreResult<ModeConfig> {
    if let Some(raw) = non_empty(inputs.preset_flag.as_ref()) {
        let preset = parse_preset(raw, "--deployment")?;
        return Ok(ModeConfig::new(preset.triple(), ModeSource::PresetFlag, inputs));
    }

    if let Some(raw) = non_empty(inputs.preset_env.as_ref()) {
        let preset = parse_preset(raw, crate::config::ENV_DEPLOYMENT)?;
        return Ok(ModeConfig::new(preset.triple(), ModeSource::PresetEnv, inputs));
    }

    let backend = non_empty(inputs.backend_override.as_ref());
    let transport = non_empty(inputs.transport_override.as_ref());
    if backend.is_some() || transport.is_some() {
        let (default_backend, default_transport, _) = DeploymentPreset::DEFAULT.triple();
        let backend = match backend {
            Some(raw) => raw
                .parse::<BackendKind>()
                .map_err(|e| CoreError::configuration(format!("backend override: {e}")))?,
            None => default_backend,
        };
        let transport = match transport {
            Some(raw) => raw.parse::<Transport>().map_err(|e| {
                CoreError::configuration(format!("{}: {e}", crate::config::ENV_TRANSPORT))
            })?,
            None => default_transport,
        };
        let multiuser = backend == BackendKind::RemoteApi;
        return Ok(ModeConfig::new(
            (backend, transport, multiuser),
            ModeSource::Overrides,
            inputs,
        ));
    }

    if let Some(raw) = non_empty(inputs.multiuser_env.as_ref()) {
        let multiuser = parse_bool(crate::config::ENV_MULTIUSER, raw)?;
        let triple = if multiuser {
            (BackendKind::RemoteApi, Transport::Stdio, true)
        } else {
            DeploymentPreset::Legacy.triple()
        };
        return Ok(ModeConfig::new(triple, ModeSource::LegacyMultiuser, inputs));
    }

    Ok(ModeConfig::new(
        DeploymentPreset::DEFAULT.triple(),
        ModeSource::Default,
        inputs,
    ))
}
