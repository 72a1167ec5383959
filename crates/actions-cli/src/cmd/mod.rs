pub mod actions;
pub mod config;
pub mod evfevent;
pub mod expand;
pub mod run;

use actions_core::config::Config;
use actions_core::diagnostics::DiagnosticStore;
use actions_core::{ActionError, ActionType, Target, WorkspaceScope};
use anyhow::Context;
use remote_shell::{ShellConfig, ShellSession};
use std::path::{Path, PathBuf};

pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}

/// Config when present, defaults otherwise; a malformed file is still an error.
pub fn load_config_or_default(root: &Path) -> anyhow::Result<Config> {
    match Config::load(root) {
        Ok(config) => Ok(config),
        Err(ActionError::ConfigNotFound(_)) => Ok(Config::default()),
        Err(e) => Err(e).context("failed to load config"),
    }
}

pub fn open_session(config: &Config) -> anyhow::Result<ShellSession> {
    let shell = ShellConfig {
        host: config.connection.host.clone(),
        ..ShellConfig::default()
    };
    ShellSession::new(shell).context("failed to open shell session")
}

/// Parse resource arguments. Local paths are made absolute and attached to
/// `workspace` (the project root by default) when they live inside it.
pub fn targets(root: &Path, resources: &[String], workspace: Option<&Path>) -> anyhow::Result<Vec<Target>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let scope_root = absolute(&cwd, workspace.unwrap_or(root));

    resources
        .iter()
        .map(|resource| {
            let mut target =
                Target::parse(resource).with_context(|| format!("invalid resource '{resource}'"))?;
            if target.kind == ActionType::File {
                let path = absolute(&cwd, Path::new(&target.path));
                target.path = path.display().to_string();
                let scope = WorkspaceScope::new(scope_root.clone());
                if scope.contains(&path) {
                    target = target.in_workspace(scope);
                }
            }
            Ok(target)
        })
        .collect()
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    std::fs::canonicalize(&joined).unwrap_or(joined)
}

/// One row per diagnostic: identity, line, column, severity, code, message.
pub fn diagnostic_rows(store: &DiagnosticStore) -> Vec<Vec<String>> {
    store
        .iter()
        .flat_map(|(identity, diagnostics)| {
            diagnostics.iter().map(move |d| {
                vec![
                    identity.to_string(),
                    (d.range.start.line + 1).to_string(),
                    (d.range.start.character + 1).to_string(),
                    d.severity.to_string(),
                    d.code.clone(),
                    d.message.clone(),
                ]
            })
        })
        .collect()
}

pub const DIAGNOSTIC_HEADERS: &[&str] = &["FILE", "LINE", "COL", "SEVERITY", "CODE", "MESSAGE"];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_paths_join_the_workspace() {
        let dir = TempDir::new().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("qrpglesrc")).unwrap();
        let source = root.join("qrpglesrc/hello.pgm.rpgle");
        std::fs::write(&source, "").unwrap();

        let resources = vec![
            source.display().to_string(),
            "member:/LIB1/QRPGLESRC/PGM1.RPGLE".to_string(),
            "/elsewhere/other.rpgle".to_string(),
        ];
        let targets = targets(&root, &resources, None).unwrap();

        assert_eq!(targets[0].kind, ActionType::File);
        assert_eq!(targets[0].workspace.as_ref().map(|w| w.root.clone()), Some(root.clone()));
        assert_eq!(targets[1].kind, ActionType::Member);
        assert!(targets[1].workspace.is_none());
        assert!(targets[2].workspace.is_none());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = targets(dir.path(), &["library:/QGPL".to_string()], None).unwrap_err();
        assert!(format!("{err:#}").contains("unknown resource type 'library'"));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_or_default(dir.path()).unwrap();
        assert_eq!(config.connection.current_library, "QGPL");
        assert!(load_config(dir.path()).is_err());
    }
}
