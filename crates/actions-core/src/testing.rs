//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{ActionError, Result};
use crate::session::{Catalog, CommandOutput, Deployer, ExecRequest, RefreshScope, Session, Ui};
use crate::target::WorkspaceScope;

// ---------------------------------------------------------------------------
// FakeSession
// ---------------------------------------------------------------------------

enum Reply {
    Output(CommandOutput),
    Fail(String),
}

/// Replies to `exec` from a queue; an empty queue answers exit code 0.
#[derive(Default)]
pub struct FakeSession {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ExecRequest>>,
    remote_files: BTreeMap<String, String>,
    remote_dirs: BTreeMap<String, Vec<(String, String)>>,
    downloads: Mutex<Vec<(PathBuf, String)>>,
    cancel: Option<(usize, CancellationToken)>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, output: CommandOutput) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Output(output));
        self
    }

    pub fn exit(self, code: i32) -> Self {
        self.respond(CommandOutput {
            code: Some(code),
            ..CommandOutput::default()
        })
    }

    /// Next `exec` raises a transport error.
    pub fn fail(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Fail(message.to_string()));
        self
    }

    pub fn with_remote_file(mut self, path: &str, content: &str) -> Self {
        self.remote_files.insert(path.to_string(), content.to_string());
        self
    }

    /// A remote directory holding `files` as `(name, content)`.
    pub fn with_remote_dir(mut self, path: &str, files: &[(&str, &str)]) -> Self {
        self.remote_dirs.insert(
            path.to_string(),
            files.iter().map(|(n, c)| (n.to_string(), c.to_string())).collect(),
        );
        self
    }

    /// Cancel `token` once `count` commands have been executed.
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel = Some((count, token));
        self
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.command).collect()
    }

    pub fn downloads(&self) -> Vec<(PathBuf, String)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn exec(&self, request: ExecRequest) -> Result<CommandOutput> {
        let executed = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some((count, token)) = &self.cancel {
            if executed >= *count {
                token.cancel();
            }
        }
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Fail(message)) => Err(ActionError::Transport(message)),
            None => Ok(CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            }),
        }
    }

    async fn upload_file(&self, _local: &Path, _remote: &str) -> Result<()> {
        Ok(())
    }

    async fn download_file(&self, local: &Path, remote: &str) -> Result<()> {
        let Some(content) = self.remote_files.get(remote) else {
            return Err(ActionError::Transport(format!("no such remote file: {remote}")));
        };
        std::fs::write(local, content)?;
        self.downloads.lock().unwrap().push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }

    async fn download_directory(&self, local: &Path, remote: &str) -> Result<()> {
        let Some(files) = self.remote_dirs.get(remote) else {
            return Err(ActionError::Transport(format!("no such remote directory: {remote}")));
        };
        std::fs::create_dir_all(local)?;
        for (name, content) in files {
            std::fs::write(local.join(name), content)?;
        }
        self.downloads.lock().unwrap().push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }

    async fn is_directory(&self, remote: &str) -> Result<bool> {
        Ok(self.remote_dirs.contains_key(remote))
    }
}

// ---------------------------------------------------------------------------
// ScriptedUi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Step {
    Choose(usize),
    Answer(String),
    /// Keep the pre-filled text.
    Accept,
    Dismiss,
}

/// Answers prompts from a script, in order. Running out of script dismisses.
#[derive(Default)]
pub struct ScriptedUi {
    steps: Mutex<VecDeque<Step>>,
    asked: Mutex<Vec<String>>,
    prefilled: Mutex<Vec<String>>,
    invalidated: Mutex<Vec<RefreshScope>>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choose(self, index: usize) -> Self {
        self.steps.lock().unwrap().push_back(Step::Choose(index));
        self
    }

    pub fn answer(self, text: &str) -> Self {
        self.steps.lock().unwrap().push_back(Step::Answer(text.to_string()));
        self
    }

    pub fn accept(self) -> Self {
        self.steps.lock().unwrap().push_back(Step::Accept);
        self
    }

    pub fn dismiss(self) -> Self {
        self.steps.lock().unwrap().push_back(Step::Dismiss);
        self
    }

    /// Titles and labels shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    /// Pre-filled text of every free-text prompt so far.
    pub fn prefilled(&self) -> Vec<String> {
        self.prefilled.lock().unwrap().clone()
    }

    pub fn invalidated(&self) -> Vec<RefreshScope> {
        self.invalidated.lock().unwrap().clone()
    }

    fn next(&self, label: &str) -> Option<Step> {
        self.asked.lock().unwrap().push(label.to_string());
        self.steps.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl Ui for ScriptedUi {
    async fn choose(&self, title: &str, options: &[String], _selected: usize) -> Option<usize> {
        match self.next(title)? {
            Step::Choose(index) if index < options.len() => Some(index),
            Step::Choose(index) => panic!("choice {index} out of range for {options:?}"),
            Step::Answer(text) => panic!("expected a choice for {title}, scripted answer {text:?}"),
            Step::Accept => panic!("expected a choice for {title}, scripted accept"),
            Step::Dismiss => None,
        }
    }

    async fn prompt(&self, label: &str, default: &str) -> Option<String> {
        self.prefilled.lock().unwrap().push(default.to_string());
        match self.next(label)? {
            Step::Answer(text) => Some(text),
            Step::Accept => Some(default.to_string()),
            Step::Choose(index) => panic!("expected text for {label}, scripted choice {index}"),
            Step::Dismiss => None,
        }
    }

    fn invalidate(&self, scope: RefreshScope) {
        self.invalidated.lock().unwrap().push(scope);
    }
}

// ---------------------------------------------------------------------------
// FakeCatalog / FakeDeployer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCatalog {
    listings: BTreeMap<(String, String), Vec<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, library: &str, object: &str, lines: Vec<String>) -> Self {
        self.listings
            .insert((library.to_string(), object.to_string()), lines);
        self
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn event_listing(&self, library: &str, object: &str) -> Result<Vec<String>> {
        let key = (library.to_string(), object.to_string());
        self.requests.lock().unwrap().push(key.clone());
        Ok(self.listings.get(&key).cloned().unwrap_or_default())
    }
}

/// Deploys to a fixed directory, or reports a cancelled deploy.
pub struct FakeDeployer {
    directory: Option<String>,
    deployed: Mutex<Vec<PathBuf>>,
}

impl FakeDeployer {
    pub fn to(directory: &str) -> Self {
        Self {
            directory: Some(directory.to_string()),
            deployed: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            directory: None,
            deployed: Mutex::new(Vec::new()),
        }
    }

    pub fn deployed(&self) -> Vec<PathBuf> {
        self.deployed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, workspace: &WorkspaceScope) -> Result<Option<String>> {
        self.deployed.lock().unwrap().push(workspace.root.clone());
        Ok(self.directory.clone())
    }
}
