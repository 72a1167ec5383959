//! Pick the Action a run applies: gather, filter, rank by last use, then
//! auto-select or ask.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::action::Action;
use crate::config::ConfigStore;
use crate::error::{ActionError, Result};
use crate::paths;
use crate::session::Ui;
use crate::target::Target;
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// Usage ranking
// ---------------------------------------------------------------------------

/// When each Action (by name) was last chosen.
pub trait UsageRanking: Send {
    fn last_used(&self, action: &str) -> Option<DateTime<Utc>>;

    fn mark_used(&mut self, action: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRanking {
    used: BTreeMap<String, DateTime<Utc>>,
}

impl InMemoryRanking {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageRanking for InMemoryRanking {
    fn last_used(&self, action: &str) -> Option<DateTime<Utc>> {
        self.used.get(action).copied()
    }

    fn mark_used(&mut self, action: &str, at: DateTime<Utc>) -> Result<()> {
        self.used.insert(action.to_string(), at);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UsageFile {
    #[serde(default)]
    last_used: BTreeMap<String, DateTime<Utc>>,
}

/// Ranking persisted in `.ibmi/usage.yaml`, rewritten on every use.
#[derive(Debug, Clone)]
pub struct YamlRanking {
    path: PathBuf,
    data: UsageFile,
}

impl YamlRanking {
    /// Load from `<root>/.ibmi/usage.yaml`; a missing file starts empty.
    pub fn open(root: &Path) -> Result<Self> {
        let path = paths::usage_path(root);
        let data = if path.exists() {
            serde_yaml::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            UsageFile::default()
        };
        Ok(Self { path, data })
    }
}

impl UsageRanking for YamlRanking {
    fn last_used(&self, action: &str) -> Option<DateTime<Utc>> {
        self.data.last_used.get(action).copied()
    }

    fn mark_used(&mut self, action: &str, at: DateTime<Utc>) -> Result<()> {
        self.data.last_used.insert(action.to_string(), at);
        let yaml = serde_yaml::to_string(&self.data)?;
        crate::io::atomic_write(&self.path, yaml.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resource type shared by every target.
pub fn common_kind(targets: &[Target]) -> Result<ActionType> {
    let first = targets.first().ok_or(ActionError::NoTargets)?;
    if targets.iter().any(|t| t.kind != first.kind) {
        let mut kinds: Vec<&str> = targets.iter().map(|t| t.kind.as_str()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        return Err(ActionError::MixedResourceTypes(kinds.join(", ")));
    }
    Ok(first.kind)
}

/// Every Action that could run against `targets`, most recently used first.
///
/// Workspace Actions are only considered for local files inside a workspace;
/// an unreadable workspace file is skipped with a warning. Protected targets
/// (or a read-only connection) keep only Actions allowed on them.
pub fn candidates(
    targets: &[Target],
    config: &dyn ConfigStore,
    ranking: &dyn UsageRanking,
) -> Result<Vec<Action>> {
    let kind = common_kind(targets)?;
    let mut all = all_actions(targets, kind, config);

    let extensions: Vec<String> = targets.iter().map(Target::extension).collect();
    let fragment = match targets {
        [single] => single.fragment_upper(),
        _ => None,
    };
    all.retain(|a| a.kind == kind && a.accepts(&extensions, fragment.as_deref()));

    let protected = config.connection().read_only_mode || targets.iter().any(|t| t.is_protected);
    if protected {
        let before = all.len();
        all.retain(|a| a.run_on_protected);
        if before > 0 && all.is_empty() {
            return Err(ActionError::ProtectedTarget);
        }
    }

    if all.is_empty() {
        return Err(ActionError::NoSuitableAction {
            kind: kind.to_string(),
            extension: fragment.unwrap_or_else(|| extensions.join(",")),
        });
    }

    // Stable: equal timestamps keep configuration order.
    all.sort_by(|a, b| ranking.last_used(&b.name).cmp(&ranking.last_used(&a.name)));
    debug!(count = all.len(), "candidate actions");
    Ok(all)
}

/// Look up an Action by name among those visible to `targets`, ignoring
/// extension filters.
pub fn find_named(targets: &[Target], config: &dyn ConfigStore, name: &str) -> Result<Action> {
    let kind = common_kind(targets)?;
    all_actions(targets, kind, config)
        .into_iter()
        .find(|a| a.name == name)
        .ok_or_else(|| ActionError::ActionNotFound(name.to_string()))
}

/// A single candidate is taken as is; otherwise the user picks one.
pub async fn select(ui: &dyn Ui, mut candidates: Vec<Action>) -> Result<Action> {
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }
    let labels: Vec<String> = candidates.iter().map(|a| a.name.clone()).collect();
    let index = ui
        .choose("Action to run", &labels, 0)
        .await
        .ok_or(ActionError::PromptCancelled)?;
    candidates
        .into_iter()
        .nth(index)
        .ok_or(ActionError::PromptCancelled)
}

fn all_actions(targets: &[Target], kind: ActionType, config: &dyn ConfigStore) -> Vec<Action> {
    let mut all = config.actions();
    if kind == ActionType::File {
        if let Some(workspace) = targets.first().and_then(|t| t.workspace.as_ref()) {
            match config.local_actions(workspace) {
                Ok(local) => all.extend(local),
                Err(e) => warn!(workspace = %workspace.root.display(), error = %e, "skipping workspace actions"),
            }
        }
    }
    all.iter_mut().for_each(Action::normalize);
    all
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
