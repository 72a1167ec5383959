pub mod action;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod prompt;
pub mod resolver;
pub mod session;
pub mod target;
pub mod types;
pub mod variables;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use action::Action;
pub use error::{ActionError, Result};
pub use orchestrator::{Orchestrator, Outcome, RunReport, RunRequest};
pub use target::{Target, WorkspaceScope};
pub use types::{ActionType, Environment, RefreshPolicy};
pub use variables::Variables;
