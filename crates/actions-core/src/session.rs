//! Collaborators a run consumes: the remote session, the object catalog, the
//! user interface and the deploy tooling.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::target::WorkspaceScope;

// ---------------------------------------------------------------------------
// Remote session
// ---------------------------------------------------------------------------

/// Interpreter a command line is handed to on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shell {
    /// The PASE shell (`sh`).
    Pase,
    /// The QSH sub-interpreter, which understands `liblist` and `system`.
    Qsh,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecRequest {
    pub command: String,
    pub shell: Shell,
    pub cwd: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>, shell: Shell) -> Self {
        Self {
            command: command.into(),
            shell,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

/// Raw outcome of one remote call. `code` is `None` when the remote side did
/// not report one, which counts as success.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        matches!(self.code, None | Some(0))
    }
}

/// The single stateful command session to the remote host.
///
/// Implementations are not required to tolerate concurrent `exec` calls; the
/// orchestrator issues them one at a time.
#[async_trait]
pub trait Session: Send + Sync {
    async fn exec(&self, request: ExecRequest) -> Result<CommandOutput>;

    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;

    async fn download_file(&self, local: &Path, remote: &str) -> Result<()>;

    async fn download_directory(&self, local: &Path, remote: &str) -> Result<()>;

    async fn is_directory(&self, remote: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Raw lines of `LIBRARY/EVFEVENT(OBJECT)`.
    async fn event_listing(&self, library: &str, object: &str) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// User interface
// ---------------------------------------------------------------------------

/// A node of the resource tree an Action was triggered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub parent: Option<Box<TreeNode>>,
}

impl TreeNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
        }
    }

    pub fn child(self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: Some(Box::new(self)),
        }
    }

    /// Build a node from a `/`-separated path: `filter/LIB/OBJ` yields `OBJ`
    /// with ancestors `LIB` and `filter`.
    pub fn from_path(path: &str) -> Option<Self> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut node = TreeNode::new(segments.next()?);
        for segment in segments {
            node = node.child(segment);
        }
        Some(node)
    }

    /// Topmost ancestor; a node without a parent is its own root.
    pub fn root(&self) -> &TreeNode {
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            node = parent;
        }
        node
    }
}

/// What the UI should reload once a run is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "node", rename_all = "snake_case")]
pub enum RefreshScope {
    Node(String),
    IfsBrowser,
    ObjectBrowser,
}

#[async_trait]
pub trait Ui: Send + Sync {
    /// Pick one of `options`; `None` when dismissed.
    async fn choose(&self, title: &str, options: &[String], selected: usize) -> Option<usize>;

    /// Free text pre-filled with `default`; `None` when dismissed.
    async fn prompt(&self, label: &str, default: &str) -> Option<String>;

    fn invalidate(&self, scope: RefreshScope);
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Deployer: Send + Sync {
    /// Push the workspace to the remote side. Returns the remote directory,
    /// or `None` when the user cancelled.
    async fn deploy(&self, workspace: &WorkspaceScope) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_root_and_parent() {
        let node = TreeNode::from_path("/My filter/LIB1/QRPGLESRC").unwrap();
        assert_eq!(node.id, "QRPGLESRC");
        assert_eq!(node.parent.as_deref().map(|p| p.id.as_str()), Some("LIB1"));
        assert_eq!(node.root().id, "My filter");
        assert!(TreeNode::from_path("//").is_none());

        let lone = TreeNode::new("alone");
        assert_eq!(lone.root().id, "alone");
    }

    #[test]
    fn null_exit_code_is_success() {
        assert!(CommandOutput::default().succeeded());
        assert!(!CommandOutput { code: Some(1), ..CommandOutput::default() }.succeeded());
    }

    #[test]
    fn exec_request_builder() {
        let request = ExecRequest::new("ls", Shell::Pase).in_dir("/home/dev");
        assert_eq!(request.cwd.as_deref(), Some("/home/dev"));
        assert!(request.env.is_empty());
    }
}
