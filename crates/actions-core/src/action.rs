//! Action data model.
//!
//! An `Action` is a user-defined command template bound to a resource type and
//! an extension filter. Actions are read from configuration (global scope) or
//! from a workspace's `.vscode/actions.json` (workspace scope, always `file`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ActionError, Result};
use crate::types::{ActionType, Environment, RefreshPolicy};

/// Extension wildcard accepted by every resource of the Action's type.
pub const GLOBAL_EXTENSION: &str = "GLOBAL";

/// Marker that makes an ILE compile emit an event file.
pub const EVENT_FILE_MARKER: &str = "*EVENTF";

/// `postDownload` entry that switches diagnostics to the local `.evfevent` folder.
pub const LOCAL_EVFEVENT_DIR: &str = ".evfevent";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub command: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub run_on_protected: bool,
    #[serde(default)]
    pub deploy_first: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_download: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_to_file: Option<String>,
    #[serde(default)]
    pub refresh: RefreshPolicy,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        kind: ActionType,
        command: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            command: command.into(),
            environment,
            extensions: None,
            run_on_protected: false,
            deploy_first: false,
            post_download: None,
            output_to_file: None,
            refresh: RefreshPolicy::No,
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = Some(extensions.iter().map(|e| e.to_string()).collect());
        self
    }

    /// Uppercase every configured extension so comparisons ignore case.
    pub fn normalize(&mut self) {
        if let Some(extensions) = self.extensions.as_mut() {
            for ext in extensions.iter_mut() {
                *ext = ext.trim().to_uppercase();
            }
        }
    }

    /// Whether this Action accepts every one of `extensions`, or the fragment.
    ///
    /// Expects `normalize` to have been called and uppercase inputs.
    pub fn accepts(&self, extensions: &[String], fragment: Option<&str>) -> bool {
        let Some(configured) = self.extensions.as_deref() else {
            return true;
        };
        if configured.is_empty() || configured.iter().any(|e| e == GLOBAL_EXTENSION) {
            return true;
        }
        if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
            if configured.iter().any(|e| e == fragment) {
                return true;
            }
        }
        !extensions.is_empty() && extensions.iter().all(|ext| configured.contains(ext))
    }

    pub fn wants_event_file(&self) -> bool {
        self.command.contains(EVENT_FILE_MARKER)
    }

    /// Diagnostics come from downloaded `.evfevent` files rather than the server.
    pub fn uses_local_evfevent(&self) -> bool {
        self.post_download.as_deref().is_some_and(|downloads| {
            downloads
                .iter()
                .any(|d| d.trim_end_matches('/') == LOCAL_EVFEVENT_DIR)
        })
    }
}

// ---------------------------------------------------------------------------
// Workspace actions file
// ---------------------------------------------------------------------------

/// Parse and validate the content of a workspace `actions.json`.
///
/// Every entry must carry a string `name` and `command`, an environment of
/// `ile`, `qsh` or `pase`, and an `extensions` array. Entries are forced to
/// type `file`. The first invalid entry rejects the whole file.
pub fn parse_local_actions(content: &str, path: &Path) -> Result<Vec<Action>> {
    let invalid = |reason: String| ActionError::InvalidLocalActions {
        path: path.display().to_string(),
        reason,
    };

    let value: serde_json::Value = serde_json::from_str(content)?;
    let Some(entries) = value.as_array() else {
        return Ok(Vec::new());
    };

    let mut actions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let name = entry.get("name").and_then(|v| v.as_str());
        let command = entry.get("command").and_then(|v| v.as_str());
        let environment = entry
            .get("environment")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse::<Environment>().ok());
        let has_extensions = entry.get("extensions").is_some_and(|v| v.is_array());

        let (Some(_), Some(_), Some(_), true) = (name, command, environment, has_extensions) else {
            return Err(invalid(format!("invalid action defined at index {index}")));
        };

        let mut entry = entry.clone();
        entry["type"] = serde_json::Value::String(ActionType::File.as_str().to_string());
        let action: Action = serde_json::from_value(entry)
            .map_err(|e| invalid(format!("index {index}: {e}")))?;
        actions.push(action);
    }

    Ok(actions)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
