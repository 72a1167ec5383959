use actions_core::ActionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} not found on PATH")]
    BinaryNotFound(String),

    #[error("{program} exited with code {code}\nstderr: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("process error: {0}")]
    Process(String),
}

pub type Result<T> = std::result::Result<T, ShellError>;

impl From<ShellError> for ActionError {
    fn from(err: ShellError) -> Self {
        ActionError::Transport(err.to_string())
    }
}
