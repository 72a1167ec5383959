use indexmap::IndexMap;
use serde::Serialize;

use super::{Diagnostic, Range};

/// Diagnostics keyed by resource identity.
///
/// Setting an identity replaces whatever it held before; nothing is merged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DiagnosticStore {
    entries: IndexMap<String, Vec<Diagnostic>>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, identity: impl Into<String>, diagnostics: Vec<Diagnostic>) {
        self.entries.insert(identity.into(), diagnostics);
    }

    pub fn get(&self, identity: &str) -> Option<&[Diagnostic]> {
        self.entries.get(identity).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop the diagnostics of `identity` that touch `range`, e.g. after the
    /// user edited those lines.
    pub fn clear_range(&mut self, identity: &str, range: &Range) {
        if let Some(diagnostics) = self.entries.get_mut(identity) {
            diagnostics.retain(|d| !d.range.overlaps(range));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Diagnostic])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Diagnostics across every identity.
    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
