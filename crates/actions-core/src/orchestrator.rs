//! Run one Action against a list of targets.
//!
//! Targets are processed strictly one after another on the single remote
//! session: derive context, prompt, stage, dispatch, fetch diagnostics,
//! download. Cancellation is checked before each target starts; a target
//! already dispatched always finishes and is recorded.

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::config::ConfigStore;
use crate::context::{self, ContextSource, EvfEventInfo, TargetContext, TEMP_SOURCE_FILE};
use crate::diagnostics::{DiagnosticStore, Extractor, OpenEditors};
use crate::dispatch::{self, Dispatch, ExecutionResult};
use crate::error::{ActionError, Result};
use crate::io;
use crate::paths;
use crate::prompt;
use crate::resolver::{self, UsageRanking};
use crate::session::{Catalog, Deployer, RefreshScope, Session, TreeNode, Ui};
use crate::target::Target;
use crate::types::{ActionType, Environment, RefreshPolicy};
use crate::workspace;

/// Record length of the temporary source file stream files are copied into.
const TEMP_SOURCE_RECORD_LENGTH: u32 = 112;

/// CCSID of stream files copied into the temporary member.
const STREAM_FILE_CCSID: u32 = 1208;

static PARM_RE: OnceLock<Regex> = OnceLock::new();

fn parm_re() -> &'static Regex {
    PARM_RE.get_or_init(|| Regex::new(r"(PNLGRP|OBJ|PGM|MODULE)\((?P<object>.+?)\)").unwrap())
}

/// Object a CL command creates, from its first `PNLGRP`, `OBJ`, `PGM` or
/// `MODULE` parameter: `(library, object)`.
pub fn object_from_command(command: &str) -> Option<(Option<String>, String)> {
    let upper = command.to_uppercase();
    let object = parm_re().captures(&upper)?.name("object")?.as_str().to_string();
    let parts: Vec<&str> = object.split('/').collect();
    match parts.as_slice() {
        [library, name] => Some((Some(library.to_string()), name.to_string())),
        _ => Some((None, parts[0].to_string())),
    }
}

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub targets: Vec<Target>,
    /// Action name to run instead of resolving one.
    pub action: Option<String>,
    /// Tree node the run was triggered from, used for refreshing.
    pub node: Option<TreeNode>,
    /// Ask prompted inputs for every target instead of once for the run.
    pub prompt_per_target: bool,
}

impl RunRequest {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }
}

/// Mutable state of one target, owned by the run loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetRunState {
    pub has_run: bool,
    pub execution_ok: bool,
    pub processed: bool,
    pub output_lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl TargetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetStatus::Succeeded => "succeeded",
            TargetStatus::Failed => "failed",
            TargetStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub target: String,
    /// Action name, qualified with the created object when one was found.
    pub label: String,
    pub state: TargetRunState,
    pub result: Option<ExecutionResult>,
    pub evfevent: EvfEventInfo,
    pub output_file: Option<PathBuf>,
}

impl TargetResult {
    fn pending(target: &Target, action: &Action) -> Self {
        Self {
            target: target.label(),
            label: action.name.clone(),
            state: TargetRunState::default(),
            result: None,
            evfevent: EvfEventInfo::default(),
            output_file: None,
        }
    }

    pub fn status(&self) -> TargetStatus {
        match (self.state.processed, self.state.execution_ok) {
            (false, _) => TargetStatus::Cancelled,
            (true, true) => TargetStatus::Succeeded,
            (true, false) => TargetStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Successful,
    PartiallyFailed { failures: usize },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub id: Uuid,
    pub action: String,
    pub started_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub targets: Vec<TargetResult>,
}

impl RunReport {
    /// The single message shown once the run is over.
    pub fn message(&self) -> String {
        let name = match self.targets.as_slice() {
            [only] => only.label.as_str(),
            _ => self.action.as_str(),
        };
        match self.outcome {
            Outcome::Successful => format!("Action {name} was successful."),
            Outcome::PartiallyFailed { failures } if self.targets.len() > 1 => format!(
                "Action {name} was not successful ({failures} of {} targets failed).",
                self.targets.len()
            ),
            Outcome::PartiallyFailed { .. } => format!("Action {name} was not successful."),
            Outcome::Cancelled => format!("Action {name} was cancelled."),
        }
    }
}

/// Aggregate target results: cancelled when a target never started,
/// successful when every processed target executed OK.
pub fn aggregate(results: &[TargetResult]) -> Outcome {
    if results.iter().any(|r| !r.state.processed) {
        return Outcome::Cancelled;
    }
    match results.iter().filter(|r| !r.state.execution_ok).count() {
        0 => Outcome::Successful,
        failures => Outcome::PartiallyFailed { failures },
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// A target with everything derived ahead of prompting.
struct Prepared {
    target: Target,
    remote_cwd: String,
    context: Result<TargetContext>,
}

pub struct Orchestrator<'a> {
    pub session: &'a dyn Session,
    pub catalog: &'a dyn Catalog,
    pub ui: &'a dyn Ui,
    pub deployer: &'a dyn Deployer,
    pub config: &'a dyn ConfigStore,
    pub ranking: &'a mut dyn UsageRanking,
    pub diagnostics: &'a mut DiagnosticStore,
    pub open_editors: OpenEditors,
}

impl<'a> Orchestrator<'a> {
    /// Pick the Action for `request`: the named override, the only
    /// candidate, or the user's choice. Marks it as used.
    pub async fn resolve(&mut self, request: &RunRequest) -> Result<Action> {
        let action = match request.action.as_deref() {
            Some(name) => resolver::find_named(&request.targets, self.config, name)?,
            None => {
                let candidates = resolver::candidates(&request.targets, self.config, &*self.ranking)?;
                resolver::select(self.ui, candidates).await?
            }
        };
        if let Err(e) = self.ranking.mark_used(&action.name, Utc::now()) {
            warn!(action = %action.name, error = %e, "could not record action usage");
        }
        Ok(action)
    }

    /// Run the Action `request` resolves to against every target.
    pub async fn run_action(&mut self, request: RunRequest, cancel: &CancellationToken) -> Result<RunReport> {
        let started_at = Utc::now();
        let action = self.resolve(&request).await?;
        let prepared = self.prepare(&action, &request.targets, true).await?;

        // Inputs shared by every target are asked once, before anything runs.
        let shared_inputs = if request.prompt_per_target {
            None
        } else {
            self.shared_inputs(&action, &prepared).await?
        };

        let settings = self.config.diagnostics();
        let output_settings = self.config.output();
        let iasps = self.config.connection().iasps;
        let mut results = Vec::with_capacity(prepared.len());
        let mut prompt_cancelled = false;

        for item in &prepared {
            if cancel.is_cancelled() || prompt_cancelled {
                results.push(TargetResult::pending(&item.target, &action));
                continue;
            }

            let mut result = TargetResult::pending(&item.target, &action);
            let state = &mut result.state;
            state
                .output_lines
                .push(format!("Running Action: {} ({})", action.name, Local::now().format("%H:%M:%S")));

            let context = match &item.context {
                Ok(context) => context,
                Err(e) => {
                    state.output_lines.push(e.to_string());
                    state.processed = true;
                    warn!(target_label = %result.target, error = %e, "target context failed");
                    results.push(result);
                    continue;
                }
            };
            result.evfevent = context.evfevent.clone();

            let expanded = context.variables.expand(&action.command);
            let confirmed = match &shared_inputs {
                Some(values) => prompt::fill_commands(self.ui, &expanded, values).await,
                None => prompt::confirm_commands(self.ui, &action.name, &expanded).await,
            };
            let command = match confirmed {
                Ok(command) => command,
                Err(ActionError::PromptCancelled) => {
                    prompt_cancelled = true;
                    results.push(TargetResult::pending(&item.target, &action));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let extractor = Extractor::new(&settings, &iasps, &self.open_editors);
            let run = TargetRun {
                session: self.session,
                catalog: self.catalog,
                action: &action,
                target: &item.target,
                remote_cwd: &item.remote_cwd,
                context,
                log_compile_output: output_settings.log_compile_output,
            };
            run.execute(&command, &mut result, &extractor, self.diagnostics).await;

            if let Some(template) = action.output_to_file.as_deref() {
                result.output_file = write_output(&context.variables.expand(template), &result.state.output_lines);
            }

            info!(
                target_label = %result.target,
                ok = result.state.execution_ok,
                "target finished"
            );
            results.push(result);
        }

        if let Some(node) = request.node.as_ref() {
            if results.iter().any(|r| r.state.has_run && r.state.execution_ok) {
                self.refresh(&action, node);
            }
        }

        let outcome = aggregate(&results);
        info!(action = %action.name, ?outcome, "run finished");
        Ok(RunReport {
            id: Uuid::new_v4(),
            action: action.name,
            started_at,
            outcome,
            targets: results,
        })
    }

    /// Resolve the Action and print the commands each target would run,
    /// prompting as a run would but without deploying or dispatching.
    pub async fn preview(&mut self, request: RunRequest) -> Result<Vec<(String, String)>> {
        let action = self.resolve(&request).await?;
        let prepared = self.prepare(&action, &request.targets, false).await?;
        let shared_inputs = if request.prompt_per_target {
            None
        } else {
            self.shared_inputs(&action, &prepared).await?
        };

        let mut previews = Vec::with_capacity(prepared.len());
        for item in prepared {
            let context = item.context?;
            let expanded = context.variables.expand(&action.command);
            let command = match &shared_inputs {
                Some(values) => prompt::fill_commands(self.ui, &expanded, values).await?,
                None => prompt::confirm_commands(self.ui, &action.name, &expanded).await?,
            };
            previews.push((item.target.label(), command));
        }
        Ok(previews)
    }

    /// Ask the inputs of the first target's expanded command once for the
    /// whole run. `None` when no target has a usable context.
    async fn shared_inputs(&self, action: &Action, prepared: &[Prepared]) -> Result<Option<Vec<String>>> {
        let Some(context) = prepared.iter().find_map(|p| p.context.as_ref().ok()) else {
            return Ok(None);
        };
        let expanded = context.variables.expand(&action.command);
        prompt::ask_inputs(self.ui, &action.name, &expanded).await.map(Some)
    }

    /// Work out each target's remote directory (deploying once per
    /// workspace when asked to) and derive its context.
    async fn prepare(&self, action: &Action, targets: &[Target], deploy: bool) -> Result<Vec<Prepared>> {
        let connection = self.config.connection();
        let custom_variables = self.config.custom_variables();
        let mut deployed: BTreeMap<PathBuf, String> = BTreeMap::new();
        let mut prepared = Vec::with_capacity(targets.len());

        for target in targets {
            let mut target = target.clone();
            let mut remote_cwd = connection.home_directory.clone();

            if let (ActionType::File, Some(scope)) = (action.kind, target.workspace.as_mut()) {
                let known = deployed.get(&scope.root).cloned();
                let directory = match known {
                    Some(directory) => directory,
                    None if deploy && action.deploy_first => {
                        let directory = self
                            .deployer
                            .deploy(scope)
                            .await?
                            .ok_or_else(|| ActionError::DeployCancelled(action.name.clone()))?;
                        info!(workspace = %scope.root.display(), directory = %directory, "deployed workspace");
                        deployed.insert(scope.root.clone(), directory.clone());
                        directory
                    }
                    None => self
                        .config
                        .deploy_directory(scope)
                        .ok_or(ActionError::NoDeployDirectory)?,
                };
                scope.deploy_directory = Some(directory.clone());
                remote_cwd = directory;
            }

            let (env, branch) = match target.workspace.as_ref() {
                Some(scope) => {
                    let env = workspace::read_env(&scope.root).unwrap_or_else(|e| {
                        warn!(workspace = %scope.root.display(), error = %e, "ignoring unreadable .env");
                        BTreeMap::new()
                    });
                    (env, workspace::git_branch(&scope.root))
                }
                None => (BTreeMap::new(), None),
            };

            let source = ContextSource {
                connection: &connection,
                custom_variables: &custom_variables,
                env: &env,
                remote_cwd: &remote_cwd,
                branch: branch.as_deref(),
            };
            let context = context::derive(action, &target, source);
            prepared.push(Prepared {
                target,
                remote_cwd,
                context,
            });
        }
        Ok(prepared)
    }

    fn refresh(&self, action: &Action, node: &TreeNode) {
        let scope = match action.refresh {
            RefreshPolicy::No => None,
            RefreshPolicy::Parent => node.parent.as_deref().map(|p| RefreshScope::Node(p.id.clone())),
            RefreshPolicy::Filter => Some(RefreshScope::Node(node.root().id.clone())),
            RefreshPolicy::Browser => match action.kind {
                ActionType::Streamfile => Some(RefreshScope::IfsBrowser),
                ActionType::Member | ActionType::Object => Some(RefreshScope::ObjectBrowser),
                ActionType::File => None,
            },
        };
        if let Some(scope) = scope {
            debug!(?scope, "refreshing");
            self.ui.invalidate(scope);
        }
    }
}

// ---------------------------------------------------------------------------
// One target
// ---------------------------------------------------------------------------

struct TargetRun<'r> {
    session: &'r dyn Session,
    catalog: &'r dyn Catalog,
    action: &'r Action,
    target: &'r Target,
    remote_cwd: &'r str,
    context: &'r TargetContext,
    log_compile_output: bool,
}

impl TargetRun<'_> {
    /// Stage, dispatch and collect diagnostics and downloads. Failures of
    /// any step are recorded on `result`, never returned.
    async fn execute(
        &self,
        command: &str,
        result: &mut TargetResult,
        extractor: &Extractor<'_>,
        store: &mut DiagnosticStore,
    ) {
        result.state.processed = true;

        if let Err(message) = self.stage_source_member().await {
            result.state.output_lines.push(message);
            return;
        }

        let mut dispatch = Dispatch::new(
            self.action.environment,
            command,
            &self.context.variables,
            &self.context.libraries,
        );
        dispatch.cwd = Some(self.remote_cwd);
        dispatch.log_compile_output = self.log_compile_output;

        let outcome = dispatch::run(self.session, dispatch, &mut result.state.output_lines).await;
        let executed = match outcome {
            Ok(executed) => executed,
            Err(e) => {
                warn!(target_label = %result.target, error = %e, "dispatch failed");
                result.state.output_lines.push(e.to_string());
                return;
            }
        };

        if !executed.has_run() {
            result.state.output_lines.push("Command did not run.".to_string());
            result.result = Some(executed);
            return;
        }

        result.state.has_run = true;
        let mut successful = executed.succeeded();
        let is_ile = self.action.environment == Environment::Ile;

        if is_ile {
            if let Some((library, object)) = object_from_command(&executed.command_text) {
                if let Some(library) = library {
                    result.evfevent.library = library;
                }
                result.evfevent.object = object;
                result.label = format!(
                    "{} for {}/{}",
                    self.action.name, result.evfevent.library, result.evfevent.object
                );
            }
        }
        result.state.output_lines.push(String::new());

        let workspace = self.target.workspace.as_ref();
        let use_local = workspace.is_some() && self.action.uses_local_evfevent();
        let info = &result.evfevent;
        if use_local {
            result.state.output_lines.push("Fetching errors from .evfevent.".to_string());
        } else if !info.object.is_empty() && !info.library.is_empty() {
            if self.action.wants_event_file() && is_ile {
                result
                    .state
                    .output_lines
                    .push(format!("Fetching errors for {}/{}.", info.library, info.object));
                if let Err(e) = extractor.refresh_from_server(self.catalog, store, info).await {
                    warn!(library = %info.library, object = %info.object, error = %e, "could not fetch diagnostics");
                    result.state.output_lines.push(format!("Failed to fetch errors: {e}"));
                }
            } else if self.action.command.trim_start().to_uppercase().starts_with("CRT") {
                result.state.output_lines.push(format!(
                    "*EVENTF not found in command string. Not fetching errors for {}/{}.",
                    info.library, info.object
                ));
            }
        }

        let downloads = self.action.post_download.as_deref().unwrap_or_default();
        if let (ActionType::File, Some(scope), false) = (self.action.kind, workspace, downloads.is_empty()) {
            match post_download(self.session, downloads, self.remote_cwd, &scope.root).await {
                Ok(()) => {
                    result
                        .state
                        .output_lines
                        .push(format!("Downloaded files as part of Action: {}", downloads.join(", ")));
                    if use_local {
                        if let Err(e) = extractor.refresh_from_files(store, &result.evfevent, &scope.root) {
                            warn!(error = %e, "could not read local event files");
                        }
                    }
                }
                Err(e) => {
                    result
                        .state
                        .output_lines
                        .push(format!("Failed to download a file after Action: {e}"));
                    successful = false;
                }
            }
        }

        result.state.execution_ok = successful;
        result.result = Some(executed);
    }

    /// Copy a stream file into `LIB/QTMPSRC` when the command compiles from
    /// `&SRCFILE`. The source file may already exist; the copy must succeed.
    async fn stage_source_member(&self) -> std::result::Result<(), String> {
        let variables = &self.context.variables;
        let (Some(full_path), Some(_)) = (variables.get("&FULLPATH"), variables.get("&SRCFILE")) else {
            return Ok(());
        };
        let info = &self.context.evfevent;
        if info.object.is_empty() {
            return Ok(());
        }

        let library = &info.library;
        let create = format!("CRTSRCPF FILE({library}/{TEMP_SOURCE_FILE}) RCDLEN({TEMP_SOURCE_RECORD_LENGTH})");
        let copy = format!(
            "CPYFRMSTMF FROMSTMF('{full_path}') TOMBR('/QSYS.LIB/{library}.LIB/{TEMP_SOURCE_FILE}.FILE/{}.MBR') \
             MBROPT(*REPLACE) DBFCCSID(*FILE) STMFCCSID({STREAM_FILE_CCSID})",
            info.object
        );

        let mut scratch = Vec::new();
        if let Err(e) = self.run_plain(&create, &mut scratch).await {
            debug!(error = %e, "creating temporary source file failed");
        }
        match self.run_plain(&copy, &mut scratch).await {
            Ok(copied) if copied.succeeded() => Ok(()),
            Ok(copied) => Err(format!("Failed to copy file to a temporary member.\n\t{}", copied.stderr)),
            Err(e) => Err(format!("Failed to copy file to a temporary member.\n\t{e}")),
        }
    }

    /// An ILE command without library list setup.
    async fn run_plain(&self, command: &str, output: &mut Vec<String>) -> Result<ExecutionResult> {
        let mut dispatch = Dispatch::new(
            Environment::Ile,
            command,
            &self.context.variables,
            &self.context.libraries,
        );
        dispatch.no_library_list = true;
        dispatch::run(self.session, dispatch, output).await
    }
}

/// Fetch each `postDownload` entry from the remote directory into the
/// workspace. Local directories receiving downloads are emptied first.
async fn post_download(session: &dyn Session, entries: &[String], remote_cwd: &str, root: &Path) -> Result<()> {
    let mut planned = Vec::with_capacity(entries.len());
    let mut directories: Vec<PathBuf> = Vec::new();

    for entry in entries {
        let relative = entry.trim_start_matches("./").trim_matches('/');
        let remote = paths::remote_join(remote_cwd, relative);
        let local = root.join(relative);
        let is_directory = session.is_directory(&remote).await?;
        if is_directory {
            directories.push(local.clone());
        } else if let Some(parent) = Path::new(relative).parent().filter(|p| !p.as_os_str().is_empty()) {
            directories.push(root.join(parent));
        }
        planned.push((remote, local, is_directory));
    }

    directories.sort();
    directories.dedup();
    for directory in &directories {
        io::reset_dir(directory)?;
    }

    for (remote, local, is_directory) in planned {
        debug!(remote = %remote, local = %local.display(), "downloading");
        if is_directory {
            session.download_directory(&local, &remote).await?;
        } else {
            session.download_file(&local, &remote).await?;
        }
    }
    Ok(())
}

/// Write a target's output to `template` (`~` and `&i` expanded). Failures
/// are logged only.
fn write_output(template: &str, lines: &[String]) -> Option<PathBuf> {
    let path = io::first_free_indexed(template);
    match io::atomic_write(&path, lines.join("\n").as_bytes()) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not write action output");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
