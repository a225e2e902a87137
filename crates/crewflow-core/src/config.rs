use std::collections::HashSet;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::CrewflowError;

const DEFAULT_CONFIG_PATH: &str = "config/agents.yaml";
const CONFIG_PATH_ENV: &str = "CREWFLOW_CONFIG";

/// Top-level agents configuration: a YAML document with an `agents` list.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    pub agents: Vec<AgentEntry>,
}

/// One declarative agent entry. Immutable after load; consumed once per run.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tools: Option<Vec<ToolRef>>,
}

impl AgentEntry {
    /// Tool references attached to this entry, treating a null list as empty.
    pub fn tool_refs(&self) -> &[ToolRef] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// Named reference into the tool registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRef {
    pub name: String,
}

/// Helper to load the agents configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `CREWFLOW_CONFIG` environment variable.
    /// 3. `config/agents.yaml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<AgentsConfig, CrewflowError> {
        let candidate = resolve_path(path);
        let raw = fs::read_to_string(&candidate)
            .map_err(|err| CrewflowError::config_io(candidate.clone(), err))?;
        let config: AgentsConfig = serde_yaml::from_str(&raw)
            .map_err(|err| CrewflowError::InvalidConfiguration(err.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &AgentsConfig) -> Result<(), CrewflowError> {
        if config.agents.is_empty() {
            return Err(CrewflowError::InvalidConfiguration(
                "agents list must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &config.agents {
            if entry.name.trim().is_empty() {
                return Err(CrewflowError::InvalidConfiguration(
                    "agent name must not be empty".into(),
                ));
            }
            if entry.role.trim().is_empty() {
                return Err(CrewflowError::InvalidConfiguration(format!(
                    "agent '{}' must declare a role",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(CrewflowError::InvalidConfiguration(format!(
                    "duplicate agent name '{}'",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}
