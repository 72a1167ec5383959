use crate::output::{print_json, print_table};
use actions_core::context::EvfEventInfo;
use actions_core::diagnostics::{DiagnosticStore, Extractor, OpenEditors};
use anyhow::Context;
use std::path::Path;

/// Parse a downloaded event file and print the diagnostics it yields, keyed
/// the way a run would attach them.
pub fn run(
    root: &Path,
    file: &Path,
    asp: Option<String>,
    ext: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config_or_default(root)?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read event file '{}'", file.display()))?;
    let lines: Vec<String> = content.lines().map(str::to_string).collect();

    let info = EvfEventInfo {
        asp: asp.map(|a| a.to_uppercase()),
        extension: ext.map(|e| e.to_uppercase()),
        ..EvfEventInfo::default()
    };
    let open = OpenEditors::new(Vec::new());
    let mut store = DiagnosticStore::new();
    Extractor::new(&config.diagnostics, &config.connection.iasps, &open)
        .apply_lines(&mut store, &info, &lines);

    if json {
        return print_json(&store);
    }

    if store.is_empty() {
        println!("No diagnostics.");
        return Ok(());
    }
    print_table(super::DIAGNOSTIC_HEADERS, super::diagnostic_rows(&store));
    Ok(())
}
