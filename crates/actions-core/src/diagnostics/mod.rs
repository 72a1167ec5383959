//! Compiler diagnostics: parse event listings, place them on resource
//! identities and keep them in a store.

pub mod evfevent;
pub mod placement;
pub mod store;

pub use evfevent::{parse, CompileError};
pub use placement::{place, OpenEditors};
pub use store::DiagnosticStore;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::config::DiagnosticsConfig;
use crate::context::EvfEventInfo;
use crate::error::Result;
use crate::session::Catalog;
use crate::workspace;

/// Width of the span shown for messages without column information.
const WHOLE_LINE_WIDTH: u32 = 100;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Information,
}

impl Severity {
    pub fn from_code(severity: u8) -> Self {
        match severity {
            20 => Severity::Warning,
            30 | 40 | 50 => Severity::Error,
            _ => Severity::Information,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// 0-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open span `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether the two spans share at least one position, end points included.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    /// `<text> (<severity>)`.
    pub message: String,
    pub code: String,
}

impl Diagnostic {
    /// Convert a reported error: 1-based lines and start column become
    /// 0-based (never below zero), the end column is kept as the exclusive
    /// end, and an error without any column covers `[0, 100)` of its line.
    pub fn from_error(error: &CompileError) -> Self {
        let line = error.line_num.saturating_sub(1);
        let to_line = error.to_line_num.saturating_sub(1);
        let (start, end) = if error.column == 0 && error.to_column == 0 {
            (Position::new(line, 0), Position::new(line, WHOLE_LINE_WIDTH))
        } else {
            (
                Position::new(line, error.column.saturating_sub(1)),
                Position::new(to_line, error.to_column),
            )
        };
        Self {
            range: Range::new(start, end),
            severity: Severity::from_code(error.severity),
            message: format!("{} ({})", error.text, error.severity),
            code: error.code.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Applies parsed listings to a store according to the diagnostics settings.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    pub settings: &'a DiagnosticsConfig,
    pub iasps: &'a [String],
    pub open: &'a OpenEditors,
}

impl<'a> Extractor<'a> {
    pub fn new(settings: &'a DiagnosticsConfig, iasps: &'a [String], open: &'a OpenEditors) -> Self {
        Self {
            settings,
            iasps,
            open,
        }
    }

    /// Replace the diagnostics of every file in `listing`. An empty listing
    /// clears the whole store. Returns the number of diagnostics set.
    pub fn apply(
        &self,
        store: &mut DiagnosticStore,
        info: &EvfEventInfo,
        listing: &IndexMap<String, Vec<CompileError>>,
    ) -> usize {
        if self.settings.clear_errors_before_build || listing.is_empty() {
            store.clear();
        }

        let mut applied = 0;
        for (file_key, errors) in listing {
            let diagnostics: Vec<Diagnostic> = errors
                .iter()
                .filter(|e| !self.is_hidden(&e.code))
                .map(Diagnostic::from_error)
                .collect();
            let identity = place(file_key, info, self.iasps, self.open);
            debug!(file = %file_key, identity = %identity, count = diagnostics.len(), "placing diagnostics");
            applied += diagnostics.len();
            store.set(identity, diagnostics);
        }
        applied
    }

    /// Apply raw listing lines.
    pub fn apply_lines(&self, store: &mut DiagnosticStore, info: &EvfEventInfo, lines: &[String]) -> usize {
        self.apply(store, info, &parse(lines))
    }

    /// Fetch `LIBRARY/EVFEVENT(OBJECT)` through the catalog and apply it.
    pub async fn refresh_from_server(
        &self,
        catalog: &dyn Catalog,
        store: &mut DiagnosticStore,
        info: &EvfEventInfo,
    ) -> Result<usize> {
        let lines = catalog.event_listing(&info.library, &info.object).await?;
        let applied = self.apply_lines(store, info, &lines);
        info!(library = %info.library, object = %info.object, diagnostics = applied, "refreshed diagnostics");
        Ok(applied)
    }

    /// Read every file below the workspace's `.evfevent` folders and apply
    /// them together. No files at all clears the store.
    pub fn refresh_from_files(
        &self,
        store: &mut DiagnosticStore,
        info: &EvfEventInfo,
        workspace_root: &Path,
    ) -> Result<usize> {
        let files = workspace::evfevent_files(workspace_root)?;
        let mut listing: IndexMap<String, Vec<CompileError>> = IndexMap::new();
        for file in &files {
            let content = std::fs::read_to_string(file)?;
            let lines: Vec<String> = content.lines().map(str::to_string).collect();
            for (key, errors) in parse(&lines) {
                listing.entry(key).or_default().extend(errors);
            }
        }
        let applied = self.apply(store, info, &listing);
        info!(files = files.len(), diagnostics = applied, "refreshed diagnostics from local event files");
        Ok(applied)
    }

    fn is_hidden(&self, code: &str) -> bool {
        self.settings
            .hide_compile_errors
            .iter()
            .any(|hidden| hidden.trim().eq_ignore_ascii_case(code))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
