use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::action::{parse_local_actions, Action};
use crate::error::{ActionError, Result};
use crate::paths;
use crate::target::WorkspaceScope;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// `user@host` or an ssh alias. `None` runs commands through a local shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_current_library")]
    pub current_library: String,
    #[serde(default = "default_library_list")]
    pub library_list: Vec<String>,
    #[serde(default = "default_home_directory")]
    pub home_directory: String,
    /// Libraries `liblist -d` removes before the configured list is applied.
    #[serde(default)]
    pub default_user_libraries: Vec<String>,
    #[serde(default)]
    pub iasps: Vec<String>,
    #[serde(default)]
    pub read_only_mode: bool,
}

fn default_current_library() -> String {
    "QGPL".to_string()
}

fn default_library_list() -> Vec<String> {
    vec!["QGPL".to_string(), "QTEMP".to_string()]
}

fn default_home_directory() -> String {
    ".".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: String::new(),
            current_library: default_current_library(),
            library_list: default_library_list(),
            home_directory: default_home_directory(),
            default_user_libraries: Vec::new(),
            iasps: Vec::new(),
            read_only_mode: false,
        }
    }
}

impl ConnectionConfig {
    pub fn host_name(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }
}

// ---------------------------------------------------------------------------
// Smaller sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsConfig {
    /// Message ids never shown as diagnostics.
    #[serde(default)]
    pub hide_compile_errors: Vec<String>,
    #[serde(default)]
    pub clear_errors_before_build: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Run ILE commands with `system` instead of `system -s` so the job log
    /// lands in the output.
    #[serde(default)]
    pub log_compile_output: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_directory: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_variables: Vec<CustomVariable>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ActionError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        cfg.actions.iter_mut().for_each(Action::normalize);
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn find_action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. (name, type) pairs are unique within the global scope
        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert((action.name.as_str(), action.kind)) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("duplicate {} action '{}'", action.kind, action.name),
                });
            }
        }

        // 2. Empty command text can never run
        for action in self.actions.iter().filter(|a| a.command.trim().is_empty()) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("action '{}' has an empty command", action.name),
            });
        }

        // 3. Event files are only fetched for ILE commands
        for action in &self.actions {
            if action.wants_event_file() && action.environment != crate::types::Environment::Ile
            {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "action '{}' asks for *EVENTF but runs in {}; diagnostics will not be fetched",
                        action.name, action.environment
                    ),
                });
            }
        }

        if self.connection.current_library.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "connection.currentLibrary is empty".to_string(),
            });
        }

        for variable in &self.custom_variables {
            if variable.name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "custom variable with an empty name is ignored".to_string(),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Read-only view of persisted settings consumed by a run.
pub trait ConfigStore: Send + Sync {
    fn actions(&self) -> Vec<Action>;
    /// Actions defined in `<workspace>/.vscode/actions.json`.
    fn local_actions(&self, workspace: &WorkspaceScope) -> Result<Vec<Action>>;
    fn custom_variables(&self) -> Vec<CustomVariable>;
    fn connection(&self) -> ConnectionConfig;
    fn diagnostics(&self) -> DiagnosticsConfig;
    fn output(&self) -> OutputConfig;
    fn deploy_directory(&self, workspace: &WorkspaceScope) -> Option<String>;
}

impl ConfigStore for Config {
    fn actions(&self) -> Vec<Action> {
        self.actions.clone()
    }

    fn local_actions(&self, workspace: &WorkspaceScope) -> Result<Vec<Action>> {
        let path = paths::local_actions_path(&workspace.root);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut actions = parse_local_actions(&content, &path)?;
        actions.iter_mut().for_each(Action::normalize);
        Ok(actions)
    }

    fn custom_variables(&self) -> Vec<CustomVariable> {
        self.custom_variables.clone()
    }

    fn connection(&self) -> ConnectionConfig {
        self.connection.clone()
    }

    fn diagnostics(&self) -> DiagnosticsConfig {
        self.diagnostics.clone()
    }

    fn output(&self) -> OutputConfig {
        self.output.clone()
    }

    fn deploy_directory(&self, workspace: &WorkspaceScope) -> Option<String> {
        workspace
            .deploy_directory
            .clone()
            .or_else(|| self.workspace.deploy_directory.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
