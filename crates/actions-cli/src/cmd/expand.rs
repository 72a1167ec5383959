use crate::output::print_json;
use crate::terminal::{SessionDeployer, TerminalUi};
use actions_core::diagnostics::{DiagnosticStore, OpenEditors};
use actions_core::resolver::YamlRanking;
use actions_core::{Orchestrator, RunRequest};
use anyhow::Context;
use std::path::Path;

/// Print the command `action` would send for each resource. Prompted
/// inputs are still asked; nothing is deployed or dispatched.
pub fn run(
    root: &Path,
    resources: &[String],
    action: &str,
    workspace: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let targets = super::targets(root, resources, workspace)?;
    let session = super::open_session(&config)?;
    let mut ranking = YamlRanking::open(root).context("failed to read action usage")?;
    let mut diagnostics = DiagnosticStore::new();
    let ui = TerminalUi::new();
    let deployer = SessionDeployer::new(&session, None);

    let request = RunRequest {
        action: Some(action.to_string()),
        ..RunRequest::new(targets)
    };

    let rt = tokio::runtime::Runtime::new()?;
    let previews = rt.block_on(async {
        let mut orchestrator = Orchestrator {
            session: &session,
            catalog: &session,
            ui: &ui,
            deployer: &deployer,
            config: &config,
            ranking: &mut ranking,
            diagnostics: &mut diagnostics,
            open_editors: OpenEditors::new(Vec::new()),
        };
        orchestrator.preview(request).await
    })?;

    if json {
        let value: Vec<serde_json::Value> = previews
            .iter()
            .map(|(target, command)| serde_json::json!({ "target": target, "command": command }))
            .collect();
        return print_json(&value);
    }

    for (target, command) in &previews {
        if previews.len() > 1 {
            println!("{target}:");
        }
        println!("{command}");
    }
    Ok(())
}
