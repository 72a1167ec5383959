//! Terminal-side collaborators: prompts on stdin/stderr and a deployer that
//! copies the workspace through the session.

use actions_core::paths::remote_join;
use actions_core::session::{Deployer, RefreshScope, Session, Ui};
use actions_core::WorkspaceScope;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// TerminalUi
// ---------------------------------------------------------------------------

/// Asks on stderr, reads answers from stdin. End of input dismisses.
pub struct TerminalUi {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self, question: &str) -> Option<String> {
        eprint!("{question}");
        let _ = std::io::stderr().flush();
        let mut input = self.input.lock().await;
        match input.next_line().await {
            Ok(Some(line)) => Some(line.trim_end_matches('\r').to_string()),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "could not read from stdin");
                None
            }
        }
    }
}

#[async_trait]
impl Ui for TerminalUi {
    async fn choose(&self, title: &str, options: &[String], selected: usize) -> Option<usize> {
        eprintln!("{title}:");
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}) {option}", i + 1);
        }
        let answer = self.read_line(&format!("Choice [{}]: ", selected + 1)).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Some(selected);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => Some(n - 1),
            _ => {
                eprintln!("'{answer}' is not one of the choices");
                None
            }
        }
    }

    async fn prompt(&self, label: &str, default: &str) -> Option<String> {
        let answer = if default.is_empty() {
            self.read_line(&format!("{label}: ")).await?
        } else {
            self.read_line(&format!("{label} [{default}]: ")).await?
        };
        if answer.is_empty() {
            Some(default.to_string())
        } else {
            Some(answer)
        }
    }

    fn invalidate(&self, scope: RefreshScope) {
        match scope {
            RefreshScope::Node(id) => eprintln!("Refresh requested for {id}"),
            RefreshScope::IfsBrowser => eprintln!("Refresh requested for the IFS browser"),
            RefreshScope::ObjectBrowser => eprintln!("Refresh requested for the object browser"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionDeployer
// ---------------------------------------------------------------------------

/// Uploads every non-hidden workspace file under the deploy directory.
pub struct SessionDeployer<'a> {
    session: &'a dyn Session,
    directory: Option<String>,
}

impl<'a> SessionDeployer<'a> {
    pub fn new(session: &'a dyn Session, directory: Option<String>) -> Self {
        Self { session, directory }
    }
}

#[async_trait]
impl Deployer for SessionDeployer<'_> {
    async fn deploy(&self, workspace: &WorkspaceScope) -> actions_core::Result<Option<String>> {
        let Some(directory) = workspace
            .deploy_directory
            .clone()
            .or_else(|| self.directory.clone())
        else {
            warn!(workspace = %workspace.root.display(), "no deploy directory configured");
            return Ok(None);
        };

        let files = deployable_files(&workspace.root)?;
        for file in &files {
            let Some(relative) = workspace.relative(file) else {
                continue;
            };
            self.session
                .upload_file(file, &remote_join(&directory, &relative))
                .await?;
        }
        info!(files = files.len(), directory = %directory, "workspace deployed");
        Ok(Some(directory))
    }
}

/// Files under `root`, skipping anything whose name starts with a dot.
fn deployable_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_dir() {
                pending.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_entries_are_not_deployed() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("qrpglesrc")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("qrpglesrc/hello.pgm.rpgle"), "").unwrap();
        std::fs::write(dir.path().join(".env"), "CURLIB=X").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "").unwrap();
        std::fs::write(dir.path().join("Makefile"), "").unwrap();

        let files = deployable_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["Makefile", "qrpglesrc/hello.pgm.rpgle"]);
    }
}
