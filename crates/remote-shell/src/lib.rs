//! `remote-shell`: the subprocess-backed [`Session`](actions_core::session::Session)
//! and [`Catalog`](actions_core::session::Catalog) used by the CLI.
//!
//! Every request spawns one child: `ssh -o BatchMode=yes <host> '<script>'`
//! for a configured host, or `sh -c '<script>'` otherwise. QSH requests are
//! piped into `/QOpenSys/usr/bin/qsh` on stdin. File transfers use `scp`, or a
//! plain copy in local mode.

pub mod error;
pub mod session;

pub(crate) mod process;

pub use error::{Result, ShellError};
pub use session::{ShellConfig, ShellSession};
