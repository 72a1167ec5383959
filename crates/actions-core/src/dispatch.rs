//! Wrap final command text for its execution environment and send it through
//! the session.

use serde::Serialize;
use tracing::debug;

use crate::context::LibrarySetup;
use crate::error::Result;
use crate::session::{ExecRequest, Session, Shell};
use crate::types::Environment;
use crate::variables::Variables;

/// Exit code reported when there was nothing to run.
pub const DID_NOT_RUN: i32 = -123;

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Command text as confirmed, before environment wrapping.
    pub command_text: String,
}

impl ExecutionResult {
    pub fn did_not_run(command_text: impl Into<String>) -> Self {
        Self {
            exit_code: Some(DID_NOT_RUN),
            stdout: String::new(),
            stderr: "Command execution failed. (No command)".to_string(),
            command_text: command_text.into(),
        }
    }

    pub fn has_run(&self) -> bool {
        self.exit_code != Some(DID_NOT_RUN)
    }

    /// Zero or no exit code at all.
    pub fn succeeded(&self) -> bool {
        matches!(self.exit_code, None | Some(0))
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Dispatch<'a> {
    pub environment: Environment,
    /// Expanded, confirmed command text; may span several lines.
    pub command: &'a str,
    pub cwd: Option<&'a str>,
    pub variables: &'a Variables,
    pub libraries: &'a LibrarySetup,
    /// `system` instead of `system -s` for ILE commands.
    pub log_compile_output: bool,
    /// Skip the `liblist` statements.
    pub no_library_list: bool,
}

impl<'a> Dispatch<'a> {
    pub fn new(
        environment: Environment,
        command: &'a str,
        variables: &'a Variables,
        libraries: &'a LibrarySetup,
    ) -> Self {
        Self {
            environment,
            command,
            cwd: None,
            variables,
            libraries,
            log_compile_output: false,
            no_library_list: false,
        }
    }

    pub fn lines(&self) -> Vec<&'a str> {
        self.command
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect()
    }

    /// The remote call this dispatch turns into, `None` when no line remains.
    pub fn request(&self) -> Option<ExecRequest> {
        let lines = self.lines();
        if lines.is_empty() {
            return None;
        }

        let request = match self.environment {
            Environment::Pase => ExecRequest::new(lines.join(" && "), Shell::Pase)
                .with_env(self.variables.to_shell_env()),
            Environment::Qsh => {
                let mut statements = self.library_statements();
                statements.extend(lines.iter().map(|l| l.to_string()));
                ExecRequest::new(statements.join(" && "), Shell::Qsh)
            }
            Environment::Ile => {
                let system = if self.log_compile_output {
                    "system"
                } else {
                    "system -s"
                };
                let mut statements = self.library_statements();
                statements.extend(lines.iter().map(|line| {
                    format!(
                        "{system} \"{}\"; if [[ $? -ne 0 ]]; then exit 1; fi",
                        escape_for_shell(line)
                    )
                }));
                ExecRequest::new(statements.join(" && "), Shell::Qsh)
            }
        };

        Some(match self.cwd {
            Some(cwd) => request.in_dir(cwd),
            None => request,
        })
    }

    /// Lines describing the run, written ahead of the command output.
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::new();
        if self.environment != Environment::Pase && !self.no_library_list {
            header.push(format!("Current library: {}", self.libraries.current_library));
            header.push(format!("Library list: {}", self.libraries.library_list.join(" ")));
        }
        if let Some(cwd) = self.cwd {
            header.push(format!("Working directory: {cwd}"));
        }
        header.push("Commands:".to_string());
        header.extend(self.lines().iter().map(|l| format!("\t{l}")));
        header
    }

    fn library_statements(&self) -> Vec<String> {
        if self.no_library_list {
            return Vec::new();
        }
        let libraries = self.libraries;
        let mut statements = Vec::with_capacity(3);
        if !libraries.default_user_libraries.is_empty() {
            statements.push(format!(
                "liblist -d {}",
                sanitize_libraries(&libraries.default_user_libraries)
            ));
        }
        statements.push(format!(
            "liblist -c {}",
            sanitize_libraries(std::slice::from_ref(&libraries.current_library))
        ));
        let reversed = libraries.reversed();
        if !reversed.is_empty() {
            statements.push(format!("liblist -a {}", sanitize_libraries(&reversed)));
        }
        statements
    }
}

/// Run `dispatch` through `session`, appending the header and the command's
/// output to `output`. Transport failures come back as `Err`.
pub async fn run(
    session: &dyn Session,
    dispatch: Dispatch<'_>,
    output: &mut Vec<String>,
) -> Result<ExecutionResult> {
    let Some(request) = dispatch.request() else {
        return Ok(ExecutionResult::did_not_run(dispatch.command));
    };

    output.extend(dispatch.header());
    debug!(
        environment = %dispatch.environment,
        command = %request.command,
        "dispatching"
    );

    let result = session.exec(request).await?;
    push_text(output, &result.stdout);
    push_text(output, &result.stderr);

    Ok(ExecutionResult {
        exit_code: result.code,
        stdout: result.stdout,
        stderr: result.stderr,
        command_text: dispatch.lines().join("\n"),
    })
}

fn push_text(output: &mut Vec<String>, text: &str) {
    output.extend(text.lines().map(str::to_string));
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Escape text placed between double quotes in a shell line.
pub fn escape_for_shell(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Space-joined library names safe for an unquoted shell word list: names
/// starting with `#` are quoted and `$` is escaped.
pub fn sanitize_libraries(libraries: &[String]) -> String {
    libraries
        .iter()
        .map(|library| {
            let library = library.replace('$', "\\$");
            if library.starts_with('#') {
                format!("\"{library}\"")
            } else {
                library
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
