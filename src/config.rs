//! Global configuration parsing and validation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::icon::AgentIconType;
use crate::models::transport::{McpServerConfig, TransportConfig};
use crate::shell_env::capture::{self, CaptureSettings};
use crate::{AppError, Result};

/// Request and capture time limits (seconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Bound on a single ACP request (including `session/prompt`).
    #[serde(default = "default_request_seconds")]
    pub request_seconds: u64,
    /// Bound on the login shell environment capture.
    #[serde(default = "default_shell_env_seconds")]
    pub shell_env_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_seconds: default_request_seconds(),
            shell_env_seconds: default_shell_env_seconds(),
        }
    }
}

fn default_request_seconds() -> u64 {
    120
}

fn default_shell_env_seconds() -> u64 {
    10
}

/// Login shell used for environment capture.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ShellConfig {
    /// Shell binary; `SHELL` and then the platform default when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Arguments that make the shell print `KEY=VALUE` lines and exit.
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

/// One launchable agent.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Unique agent name.
    pub name: String,
    /// How to reach the agent.
    pub transport: TransportConfig,
    /// Icon shown in the host UI.
    #[serde(default)]
    pub icon: AgentIconType,
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Agent used when none is named; first entry when absent.
    #[serde(default)]
    pub default_agent: Option<String>,
    /// Confine agent file access to the session working directory.
    #[serde(default)]
    pub restrict_fs_to_workspace: bool,
    /// Time limits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Login shell settings.
    #[serde(default)]
    pub shell: ShellConfig,
    /// Launchable agents.
    pub agents: Vec<AgentConfig>,
    /// Tool servers offered to every new session.
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up an agent by name, or the default agent when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no agent matches.
    pub fn agent(&self, name: Option<&str>) -> Result<&AgentConfig> {
        let wanted = name.or(self.default_agent.as_deref());
        match wanted {
            Some(wanted) => self
                .agents
                .iter()
                .find(|a| a.name == wanted)
                .ok_or_else(|| AppError::Config(format!("unknown agent: {wanted}"))),
            None => self
                .agents
                .first()
                .ok_or_else(|| AppError::Config("no agents configured".into())),
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request_seconds)
    }

    /// Settings for the shell environment loader.
    #[must_use]
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            shell: self.shell.path.clone(),
            args: self.shell.args.clone().unwrap_or_else(capture::default_args),
            timeout: Duration::from_secs(self.timeouts.shell_env_seconds),
            working_dir: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(AppError::Config("at least one agent must be configured".into()));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(AppError::Config("agent name must not be empty".into()));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate agent name: {}",
                    agent.name
                )));
            }
        }

        if let Some(default) = &self.default_agent {
            if !seen.contains(default.as_str()) {
                return Err(AppError::Config(format!(
                    "default_agent {default} is not a configured agent"
                )));
            }
        }

        if self.timeouts.request_seconds == 0 || self.timeouts.shell_env_seconds == 0 {
            return Err(AppError::Config("timeouts must be greater than zero".into()));
        }

        Ok(())
    }
}
