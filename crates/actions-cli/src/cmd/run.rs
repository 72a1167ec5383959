use crate::output::{print_json, print_table};
use crate::terminal::{SessionDeployer, TerminalUi};
use actions_core::diagnostics::{DiagnosticStore, OpenEditors};
use actions_core::resolver::YamlRanking;
use actions_core::session::TreeNode;
use actions_core::{Orchestrator, Outcome, RunReport, RunRequest};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Exit status of a run that did not fully succeed.
pub const EXIT_NOT_SUCCESSFUL: i32 = 2;
/// Exit status of a run interrupted before every target started.
pub const EXIT_CANCELLED: i32 = 130;

pub struct RunArgs {
    pub resources: Vec<String>,
    pub action: Option<String>,
    pub workspace: Option<PathBuf>,
    pub node: Option<String>,
    pub prompt_each: bool,
}

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<i32> {
    let config = super::load_config(root)?;
    let targets = super::targets(root, &args.resources, args.workspace.as_deref())?;
    let session = super::open_session(&config)?;
    let mut ranking = YamlRanking::open(root).context("failed to read action usage")?;
    let mut diagnostics = DiagnosticStore::new();
    let ui = TerminalUi::new();
    let deployer = SessionDeployer::new(&session, config.workspace.deploy_directory.clone());

    let request = RunRequest {
        targets,
        action: args.action,
        node: args.node.as_deref().and_then(TreeNode::from_path),
        prompt_per_target: args.prompt_each,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling after the current target...");
                    cancel.cancel();
                }
            })
        };

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
        let report = orchestrator.run_action(request, &cancel).await;
        interrupt.abort();
        report
    })?;

    if json {
        print_json(&serde_json::json!({
            "report": report,
            "diagnostics": diagnostics,
        }))?;
    } else {
        print_report(&report, &diagnostics);
    }

    Ok(match report.outcome {
        Outcome::Successful => 0,
        Outcome::PartiallyFailed { .. } => EXIT_NOT_SUCCESSFUL,
        Outcome::Cancelled => EXIT_CANCELLED,
    })
}

fn print_report(report: &RunReport, diagnostics: &DiagnosticStore) {
    for target in &report.targets {
        println!("== {} [{}]", target.target, target.status());
        for line in &target.state.output_lines {
            println!("{line}");
        }
        if let Some(file) = &target.output_file {
            println!("Output written to {}", file.display());
        }
        println!();
    }

    if !diagnostics.is_empty() {
        print_table(super::DIAGNOSTIC_HEADERS, super::diagnostic_rows(diagnostics));
        println!();
    }

    println!("{}", report.message());
}
