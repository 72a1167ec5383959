use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no suitable action found for {kind}-{extension}")]
    NoSuitableAction { kind: String, extension: String },

    #[error("action cannot be applied on a read only resource")]
    ProtectedTarget,

    #[error("actions can't be run on multiple items of different natures ({0})")]
    MixedResourceTypes(String),

    #[error("no targets given")]
    NoTargets,

    #[error("action '{0}' not found")]
    ActionNotFound(String),

    #[error("input was cancelled")]
    PromptCancelled,

    #[error("action \"{0}\" was cancelled")]
    DeployCancelled(String),

    #[error("no deploy directory setup for this workspace")]
    NoDeployDirectory,

    #[error("invalid path: {0}. Use format LIB/SPF/NAME.ext")]
    InvalidMemberPath(String),

    #[error("invalid object path: {0}. Use format LIB/NAME.TYPE")]
    InvalidObjectPath(String),

    #[error("invalid {kind} name: {name}")]
    InvalidName { kind: &'static str, name: String },

    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),

    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),

    #[error("configuration not found at {0}")]
    ConfigNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid local actions in {path}: {reason}")]
    InvalidLocalActions { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActionError>;
