//! Provider configuration.
//!
//! Readiness code never reaches for a global configuration: callers hand it a
//! [`ConfigProvider`]. [`FileConfig`] is the JSON-backed implementation used
//! by the CLI, stored at `~/.provider-ready/config.json` unless overridden.
//!
//! ```json
//! {
//!   "providers": {
//!     "local": {
//!       "name": "Local vLLM",
//!       "type": "openai",
//!       "base_url": "http://127.0.0.1:8000/v1",
//!       "api_key": "$LOCAL_KEY",
//!       "startup_command": "./scripts/start-vllm.sh",
//!       "startup_timeout_seconds": 120,
//!       "models": [{ "id": "qwen", "name": "Qwen 2.5" }]
//!     }
//!   },
//!   "agents": { "coder": { "model": "large" } },
//!   "models": { "large": { "provider": "local", "model": "qwen" } }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Startup timeout applied when none (or a non-positive one) is configured.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 60;

/// Agent whose model selection drives the status monitor.
pub const ACTIVE_AGENT: &str = "coder";

const CONFIG_DIR: &str = ".provider-ready";
const CONFIG_FILE: &str = "config.json";

/// Authentication scheme family of a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Azure,
    Anthropic,
    #[default]
    #[serde(other)]
    Other,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Azure => "azure",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Other => "other",
        }
    }
}

/// A model served by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A configured model-serving backend.
///
/// String fields may hold `$VAR`, `${VAR}` or `$(command)` references; they
/// are expanded by a [`crate::resolve::ValueResolver`] right before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_health_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_timeout_seconds: Option<i64>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub disable_stream: bool,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ProviderEndpoint {
    /// Human-facing identifier: name, then id, then base URL.
    pub fn display_name(&self) -> &str {
        [self.name.as_str(), self.id.as_str(), self.base_url.as_str()]
            .into_iter()
            .find(|value| !value.trim().is_empty())
            .unwrap_or("unknown")
    }

    /// Startup command, if one is configured and not blank.
    pub fn startup_command(&self) -> Option<&str> {
        self.startup_command
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }

    /// Configured startup timeout in whole seconds.
    pub fn startup_timeout_secs(&self) -> u64 {
        match self.startup_timeout_seconds {
            Some(secs) if secs > 0 => secs as u64,
            _ => DEFAULT_STARTUP_TIMEOUT_SECS,
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs())
    }

    pub fn model(&self, model_id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.id == model_id)
    }
}

/// Model chosen for a model type (e.g. "large").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub provider: String,
    pub model: String,
}

/// Agent configuration; `model` names a model type key in `models`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub model: String,
}

/// Why no active provider/model pairing could be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionGap {
    #[error("configuration unavailable")]
    Unavailable,
    #[error("coder agent not configured")]
    AgentNotConfigured,
    #[error("model not selected")]
    ModelNotSelected,
    #[error("provider not found")]
    ProviderNotFound,
}

/// Source of provider configuration consumed by the readiness subsystem.
pub trait ConfigProvider: Send + Sync {
    /// Look up a provider by id.
    fn provider(&self, id: &str) -> Option<ProviderEndpoint>;

    /// All configured providers, sorted by id.
    fn providers(&self) -> Vec<ProviderEndpoint>;

    /// Model selected for the active agent.
    fn active_model(&self) -> Result<SelectedModel, SelectionGap>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    providers: BTreeMap<String, ProviderEndpoint>,
    #[serde(default)]
    agents: BTreeMap<String, AgentConfig>,
    #[serde(default)]
    models: BTreeMap<String, SelectedModel>,
}

/// JSON configuration file.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
    file: Option<ConfigFile>,
}

impl FileConfig {
    /// Default configuration path (`~/.provider-ready/config.json`).
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(CONFIG_DIR)
            .join(CONFIG_FILE))
    }

    /// Load configuration from `path`.
    ///
    /// A missing file is not an error: the result reports
    /// [`SelectionGap::Unavailable`] and lists no providers.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            warn!("Configuration file not found: {:?}", path);
            return Ok(Self { path, file: None });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
        Self::from_json(path, &content)
    }

    fn from_json(path: PathBuf, content: &str) -> Result<Self> {
        let mut file: ConfigFile = serde_json::from_str(content)
            .with_context(|| format!("Failed to parse configuration file: {:?}", path))?;

        for (id, provider) in file.providers.iter_mut() {
            if provider.id.is_empty() {
                provider.id = id.clone();
            }
        }
        debug!(
            "Loaded {} provider(s) from {:?}",
            file.providers.len(),
            path
        );

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.file.is_some()
    }

    /// Model type to selection, e.g. `large -> local/qwen`.
    pub fn selections(&self) -> Vec<(String, SelectedModel)> {
        self.file
            .as_ref()
            .map(|f| {
                f.models
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ConfigProvider for FileConfig {
    fn provider(&self, id: &str) -> Option<ProviderEndpoint> {
        self.file.as_ref()?.providers.get(id).cloned()
    }

    fn providers(&self) -> Vec<ProviderEndpoint> {
        self.file
            .as_ref()
            .map(|f| f.providers.values().cloned().collect())
            .unwrap_or_default()
    }

    fn active_model(&self) -> Result<SelectedModel, SelectionGap> {
        let file = self.file.as_ref().ok_or(SelectionGap::Unavailable)?;
        let agent = file
            .agents
            .get(ACTIVE_AGENT)
            .filter(|a| !a.model.is_empty())
            .ok_or(SelectionGap::AgentNotConfigured)?;
        file.models
            .get(&agent.model)
            .filter(|m| !m.model.is_empty())
            .cloned()
            .ok_or(SelectionGap::ModelNotSelected)
    }
}
