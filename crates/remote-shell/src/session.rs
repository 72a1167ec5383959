use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use actions_core::session::{Catalog, CommandOutput, ExecRequest, Session, Shell};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, ShellError};
use crate::process::ShellProcess;

/// Interpreter QSH requests are handed to.
pub const QSH_BINARY: &str = "/QOpenSys/usr/bin/qsh";
/// Reads a source member as plain text, one record per line.
pub const RFILE_BINARY: &str = "/QOpenSys/usr/bin/Rfile";

// ---------------------------------------------------------------------------
// ShellConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    /// `user@host` or an ssh alias; `None` runs everything through a local `sh`.
    pub host: Option<String>,
    pub ssh_binary: Option<PathBuf>,
    pub scp_binary: Option<PathBuf>,
}

impl ShellConfig {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn remote(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ShellSession
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Transport {
    Local,
    Ssh {
        host: String,
        ssh: PathBuf,
        scp: PathBuf,
    },
}

/// A [`Session`] that runs every request as a fresh `ssh host` child (or a
/// local `sh -c` when no host is configured).
#[derive(Debug)]
pub struct ShellSession {
    transport: Transport,
}

impl ShellSession {
    pub fn new(config: ShellConfig) -> Result<Self> {
        let transport = match config.host {
            None => Transport::Local,
            Some(host) => Transport::Ssh {
                host,
                ssh: locate(config.ssh_binary, "ssh")?,
                scp: locate(config.scp_binary, "scp")?,
            },
        };
        Ok(Self { transport })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.transport, Transport::Local)
    }

    /// Run `script` through the transport's shell.
    async fn run_script(&self, script: &str) -> Result<CommandOutput> {
        debug!(script, "running");
        let cmd = match &self.transport {
            Transport::Local => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script);
                cmd
            }
            Transport::Ssh { host, ssh, .. } => {
                let mut cmd = Command::new(ssh);
                cmd.arg("-o").arg("BatchMode=yes").arg(host).arg(script);
                cmd
            }
        };
        ShellProcess::spawn(cmd)?.collect().await
    }

    /// Copy `from` to `to`, where exactly one side is remote.
    async fn copy(&self, from: &CopyEnd<'_>, to: &CopyEnd<'_>, recursive: bool) -> Result<()> {
        match &self.transport {
            Transport::Local => {
                let (from, to) = (PathBuf::from(from.path()), PathBuf::from(to.path()));
                tokio::task::spawn_blocking(move || {
                    if recursive {
                        copy_dir_all(&from, &to)
                    } else {
                        if let Some(parent) = to.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::copy(&from, &to).map(|_| ())
                    }
                })
                .await
                .map_err(|e| ShellError::Process(e.to_string()))??;
                Ok(())
            }
            Transport::Ssh { host, scp, .. } => {
                let mut cmd = Command::new(scp);
                cmd.arg("-q").arg("-o").arg("BatchMode=yes");
                if recursive {
                    cmd.arg("-r");
                }
                cmd.arg(from.scp_arg(host)).arg(to.scp_arg(host));
                ShellProcess::spawn(cmd)?.check().await
            }
        }
    }
}

fn locate(configured: Option<PathBuf>, name: &str) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path),
        None => which::which(name).map_err(|_| ShellError::BinaryNotFound(name.to_string())),
    }
}

enum CopyEnd<'a> {
    Local(&'a Path),
    Remote(&'a str),
}

impl CopyEnd<'_> {
    fn path(&self) -> String {
        match self {
            CopyEnd::Local(path) => path.display().to_string(),
            CopyEnd::Remote(path) => path.to_string(),
        }
    }

    fn scp_arg(&self, host: &str) -> String {
        match self {
            CopyEnd::Local(path) => path.display().to_string(),
            CopyEnd::Remote(path) => format!("{host}:{}", shell_quote(path)),
        }
    }
}

/// Copy the contents of `from` into `to`, creating `to` as needed.
fn copy_dir_all(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Script building
// ---------------------------------------------------------------------------

/// Single-quote `text` for a POSIX shell.
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// The shell script a request turns into.
///
/// PASE requests run directly with their variables exported. QSH requests
/// are handed to the QSH interpreter, which has its own environment.
pub fn build_script(request: &ExecRequest) -> String {
    let mut parts = Vec::new();
    if let Some(cwd) = &request.cwd {
        parts.push(format!("cd {}", shell_quote(cwd)));
    }
    match request.shell {
        Shell::Pase => {
            parts.extend(export_statements(&request.env));
            parts.push(request.command.clone());
        }
        Shell::Qsh => {
            parts.push(format!("{QSH_BINARY} -c {}", shell_quote(&request.command)));
        }
    }
    parts.join(" && ")
}

fn export_statements(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter()
        .map(|(name, value)| format!("export {name}={}", shell_quote(value)))
        .collect()
}

/// IFS path of a source member.
pub fn member_path(library: &str, file: &str, member: &str) -> String {
    format!("/QSYS.LIB/{library}.LIB/{file}.FILE/{member}.MBR")
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl Session for ShellSession {
    async fn exec(&self, request: ExecRequest) -> actions_core::Result<CommandOutput> {
        let script = build_script(&request);
        Ok(self.run_script(&script).await?)
    }

    async fn upload_file(&self, local: &Path, remote: &str) -> actions_core::Result<()> {
        let parent = actions_core::paths::remote_parent(remote);
        if !parent.is_empty() && !self.is_local() {
            self.run_script(&format!("mkdir -p {}", shell_quote(parent)))
                .await?;
        }
        Ok(self
            .copy(&CopyEnd::Local(local), &CopyEnd::Remote(remote), false)
            .await?)
    }

    async fn download_file(&self, local: &Path, remote: &str) -> actions_core::Result<()> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(self
            .copy(&CopyEnd::Remote(remote), &CopyEnd::Local(local), false)
            .await?)
    }

    async fn download_directory(&self, local: &Path, remote: &str) -> actions_core::Result<()> {
        tokio::fs::create_dir_all(local).await?;
        // scp -r copies into `local/<basename>` when `local` exists; copy the
        // contents instead.
        let from = match self.transport {
            Transport::Local => remote.to_string(),
            Transport::Ssh { .. } => format!("{}/.", remote.trim_end_matches('/')),
        };
        Ok(self
            .copy(&CopyEnd::Remote(&from), &CopyEnd::Local(local), true)
            .await?)
    }

    async fn is_directory(&self, remote: &str) -> actions_core::Result<bool> {
        let output = self
            .run_script(&format!("test -d {}", shell_quote(remote)))
            .await?;
        Ok(output.code == Some(0))
    }
}

#[async_trait]
impl Catalog for ShellSession {
    async fn event_listing(&self, library: &str, object: &str) -> actions_core::Result<Vec<String>> {
        let path = member_path(library, "EVFEVENT", object);
        let output = self
            .run_script(&format!("{RFILE_BINARY} -rQ {}", shell_quote(&path)))
            .await?;
        if !output.succeeded() {
            return Err(actions_core::ActionError::Transport(format!(
                "could not read {library}/EVFEVENT({object}): {}",
                output.stderr.trim()
            )));
        }
        Ok(output.stdout.lines().map(str::to_string).collect())
    }
}
