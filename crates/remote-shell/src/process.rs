use std::process::Stdio;

use actions_core::session::CommandOutput;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::{Result, ShellError};

// ─── ShellProcess ─────────────────────────────────────────────────────────

/// One spawned `ssh`, `scp` or `sh` child.
///
/// Stdin is closed. Stdout is read to the end; stderr is drained by a background task so a chatty child never blocks on a full
/// pipe. The child is killed if the process handle is dropped mid-flight.
pub(crate) struct ShellProcess {
    program: String,
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
}

impl ShellProcess {
    pub(crate) fn spawn(mut cmd: Command) -> Result<Self> {
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::Process("stdout not captured".into()))?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if !buf.is_empty() {
                        buf.push('\n');
                    }
                    buf.push_str(&line);
                }
                buf
            })
        });

        Ok(Self {
            program,
            child,
            stdout,
            stderr_task,
        })
    }

    /// Read stdout to the end and wait for the exit status. A signal-killed
    /// child reports no code.
    pub(crate) async fn collect(mut self) -> Result<CommandOutput> {
        let mut stdout = String::new();
        self.stdout.read_to_string(&mut stdout).await?;
        let status = self.child.wait().await?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }

    /// Like [`collect`](Self::collect) but any non-zero exit is an error.
    pub(crate) async fn check(self) -> Result<()> {
        let program = self.program.clone();
        let output = self.collect().await?;
        if output.succeeded() {
            return Ok(());
        }
        Err(ShellError::Exit {
            program,
            code: output.code.unwrap_or(-1),
            stderr: output.stderr,
        })
    }
}
