//! Interactive inputs embedded in command text.
//!
//! `${name|label|default}` asks for a value before the command runs. A
//! default holding commas becomes a single choice over the comma-split values
//! (first one selected); anything else is free text pre-filled with the
//! default. A command line starting with `?` is shown as a whole for editing.

use tracing::debug;

use crate::error::{ActionError, Result};
use crate::session::Ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptToken {
    pub name: String,
    pub label: String,
    pub default: String,
    /// Byte offset of `$`.
    pub start: usize,
    /// Byte offset one past `}`.
    pub end: usize,
}

impl PromptToken {
    pub fn choices(&self) -> Option<Vec<String>> {
        self.default
            .contains(',')
            .then(|| self.default.split(',').map(str::to_string).collect())
    }
}

/// Find every `${...}` token, left to right. An unterminated `${` ends the scan.
pub fn scan(command: &str) -> Vec<PromptToken> {
    let mut tokens = Vec::new();
    let mut from = 0;
    while let Some(offset) = command[from..].find("${") {
        let start = from + offset;
        let Some(close) = command[start..].find('}') else {
            break;
        };
        let end = start + close + 1;
        let mut fields = command[start + 2..end - 1].split('|');
        let name = fields.next().unwrap_or_default().to_string();
        let label = fields.next().unwrap_or_default().to_string();
        let default = fields.next().unwrap_or_default().to_string();
        tokens.push(PromptToken {
            label: if label.is_empty() { name.clone() } else { label },
            name,
            default,
            start,
            end,
        });
        from = end;
    }
    tokens
}

/// Replace `tokens` with `values`, last token first so that earlier offsets
/// stay valid whatever the length of each value.
pub fn substitute(command: &str, tokens: &[PromptToken], values: &[String]) -> String {
    let mut result = command.to_string();
    for (token, value) in tokens.iter().zip(values).rev() {
        result.replace_range(token.start..token.end, value);
    }
    result
}

/// Lines whose `${...}` inputs are asked; `?` lines are edited whole instead.
fn input_lines(commands: &str) -> impl Iterator<Item = &str> {
    commands
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('?'))
}

/// Ask for every input of `commands`, in discovery order.
pub async fn ask_inputs(ui: &dyn Ui, title: &str, commands: &str) -> Result<Vec<String>> {
    let mut values = Vec::new();
    for token in input_lines(commands).flat_map(scan) {
        let label = format!("{title}: {}", token.label);
        let value = match token.choices() {
            Some(choices) => ui
                .choose(&label, &choices, 0)
                .await
                .and_then(|idx| choices.get(idx).cloned()),
            None => ui.prompt(&label, &token.default).await,
        };
        values.push(value.ok_or(ActionError::PromptCancelled)?);
    }
    if !values.is_empty() {
        debug!(inputs = values.len(), "collected prompted inputs");
    }
    Ok(values)
}

/// Put `values` (as returned by [`ask_inputs`]) into the inputs of
/// `commands` and offer every `?` line for editing. Blank lines are dropped;
/// dismissing an edit or clearing a line cancels the lot.
pub async fn fill_commands(ui: &dyn Ui, commands: &str, values: &[String]) -> Result<String> {
    let mut remaining = values;
    let mut confirmed = Vec::new();
    for line in commands.lines().filter(|l| !l.trim().is_empty()) {
        let resolved = match line.strip_prefix('?') {
            Some(editable) => ui
                .prompt("Run Command", editable)
                .await
                .ok_or(ActionError::PromptCancelled)?,
            None => {
                let tokens = scan(line);
                let taken = tokens.len().min(remaining.len());
                let (mine, rest) = remaining.split_at(taken);
                remaining = rest;
                substitute(line, &tokens, mine)
            }
        };
        if resolved.trim().is_empty() {
            return Err(ActionError::PromptCancelled);
        }
        confirmed.push(resolved);
    }
    Ok(confirmed.join("\n"))
}

/// Ask for the inputs of `commands` and fill them in.
pub async fn confirm_commands(ui: &dyn Ui, title: &str, commands: &str) -> Result<String> {
    let values = ask_inputs(ui, title, commands).await?;
    fill_commands(ui, commands, &values).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
