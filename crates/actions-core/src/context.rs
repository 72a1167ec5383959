//! Per-target context: the variables a target contributes to the namespace
//! and where its compiler diagnostics live.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::action::Action;
use crate::config::{ConnectionConfig, CustomVariable};
use crate::error::Result;
use crate::paths;
use crate::target::{MemberPath, ObjectPath, Target, WorkspaceScope};
use crate::types::ActionType;
use crate::variables::Variables;
use crate::workspace;

/// Secondary extensions produced by build tooling (`hello.pgm.rpgle`).
const OBJECT_TYPE_SUFFIXES: &[&str] = &["PGM", "SRVPGM"];

/// Source file used to stage stream files for commands referencing `&SRCFILE`.
pub const TEMP_SOURCE_FILE: &str = "QTMPSRC";

// ---------------------------------------------------------------------------
// EvfEventInfo
// ---------------------------------------------------------------------------

/// Where a compile's event listing is fetched from and attached to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvfEventInfo {
    pub library: String,
    pub object: String,
    pub extension: Option<String>,
    pub asp: Option<String>,
    pub workspace: Option<WorkspaceScope>,
}

// ---------------------------------------------------------------------------
// LibrarySetup
// ---------------------------------------------------------------------------

/// Current library and library list applied before ILE/QSH commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibrarySetup {
    pub current_library: String,
    /// Configured order, placeholders substituted, duplicates removed.
    pub library_list: Vec<String>,
    pub default_user_libraries: Vec<String>,
}

impl LibrarySetup {
    /// Resolve the setup from the connection, letting `.env` `CURLIB` and
    /// `LIBL` (space separated) win over configured values.
    pub fn resolve(connection: &ConnectionConfig, env: &BTreeMap<String, String>) -> Self {
        let current_library = env
            .get("CURLIB")
            .cloned()
            .unwrap_or_else(|| connection.current_library.clone());

        let configured: Vec<String> = match env.get("LIBL") {
            Some(libl) => libl.split_whitespace().map(str::to_string).collect(),
            None => connection.library_list.clone(),
        };

        let mut library_list: Vec<String> = Vec::with_capacity(configured.len());
        for library in configured {
            let library = match library.trim() {
                "&CURLIB" | "&BUILDLIB" => current_library.clone(),
                other => other.to_string(),
            };
            if !library.is_empty() && !library_list.contains(&library) {
                library_list.push(library);
            }
        }

        Self {
            current_library,
            library_list,
            default_user_libraries: connection.default_user_libraries.clone(),
        }
    }

    /// List in `liblist -a` order. Each append lands at the head, so the
    /// configured list is applied back to front.
    pub fn reversed(&self) -> Vec<String> {
        self.library_list.iter().rev().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Inputs shared by every target of a run.
#[derive(Debug, Clone, Copy)]
pub struct ContextSource<'a> {
    pub connection: &'a ConnectionConfig,
    pub custom_variables: &'a [CustomVariable],
    /// Workspace `.env` entries, bare keys.
    pub env: &'a BTreeMap<String, String>,
    /// Remote working directory: the deploy directory for `file` actions,
    /// the home directory otherwise.
    pub remote_cwd: &'a str,
    pub branch: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct TargetContext {
    pub variables: Variables,
    pub evfevent: EvfEventInfo,
    pub libraries: LibrarySetup,
}

/// Compute every variable for `target` under `action`.
///
/// Generic values come first, then the type-specific ones, then custom
/// variables; workspace `.env` entries are applied last and win.
pub fn derive(action: &Action, target: &Target, source: ContextSource<'_>) -> Result<TargetContext> {
    let libraries = LibrarySetup::resolve(source.connection, source.env);
    let mut variables = generic_variables(&libraries, source);

    let mut evfevent = EvfEventInfo {
        extension: Some(target.extension()).filter(|e| !e.is_empty()),
        workspace: target.workspace.clone(),
        ..EvfEventInfo::default()
    };

    match action.kind {
        ActionType::Member => member_variables(target, &mut variables, &mut evfevent)?,
        ActionType::Streamfile | ActionType::File => {
            path_variables(action, target, source, &libraries, &mut variables, &mut evfevent)
        }
        ActionType::Object => object_variables(target, &mut variables, &mut evfevent)?,
    }

    for custom in source.custom_variables {
        if !custom.name.trim().is_empty() {
            variables.set(format!("&{}", custom.name.trim().to_uppercase()), &custom.value);
        }
    }
    for (key, value) in source.env {
        variables.set(format!("&{key}"), value);
    }

    debug!(
        resource = %target.label(),
        variables = variables.len(),
        library = %evfevent.library,
        object = %evfevent.object,
        "derived target context"
    );

    Ok(TargetContext {
        variables,
        evfevent,
        libraries,
    })
}

fn generic_variables(libraries: &LibrarySetup, source: ContextSource<'_>) -> Variables {
    let reversed = libraries.reversed();
    let user = source.connection.user.as_str();
    let host = source.connection.host_name();

    let mut variables = Variables::new();
    variables
        .set("&CURLIB", &libraries.current_library)
        .set("*CURLIB", &libraries.current_library)
        .set("&BUILDLIB", &libraries.current_library)
        .set("&USERNAME", user)
        .set("{usrprf}", user)
        .set("&HOST", host)
        .set("{host}", host)
        .set("&HOME", &source.connection.home_directory)
        .set("&WORKDIR", source.remote_cwd)
        .set("&LIBLC", reversed.join(","))
        .set("&LIBLS", reversed.join(" "));
    variables
}

fn member_variables(
    target: &Target,
    variables: &mut Variables,
    evfevent: &mut EvfEventInfo,
) -> Result<()> {
    let member = MemberPath::parse(&target.path)?;

    variables
        .set("&OPENLIBL", member.library.to_lowercase())
        .set("&OPENLIB", &member.library)
        .set("&OPENSPFL", member.file.to_lowercase())
        .set("&OPENSPF", &member.file)
        .set("&OPENMBRL", member.name.to_lowercase())
        .set("&OPENMBR", &member.name)
        .set("&EXTL", member.extension.to_lowercase())
        .set("&EXT", &member.extension);

    evfevent.library = member.library;
    evfevent.object = member.name;
    evfevent.extension = Some(member.extension);
    evfevent.asp = member.asp;
    Ok(())
}

fn path_variables(
    action: &Action,
    target: &Target,
    source: ContextSource<'_>,
    libraries: &LibrarySetup,
    variables: &mut Variables,
    evfevent: &mut EvfEventInfo,
) {
    let path = Path::new(&target.path);
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let raw_extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = object_name(&basename);
    let extension = target.extension();

    evfevent.library = libraries.current_library.to_uppercase();
    evfevent.object = name.to_uppercase();
    evfevent.extension = Some(raw_extension);

    if action.command.contains("&SRCFILE") {
        variables
            .set("&SRCLIB", &evfevent.library)
            .set("&SRCPF", TEMP_SOURCE_FILE)
            .set("&SRCFILE", format!("{}/{TEMP_SOURCE_FILE}", evfevent.library));
    }

    match action.kind {
        ActionType::File => {
            variables.set("&LOCALPATH", &target.path);
            if let Some(relative) = target.workspace.as_ref().and_then(|ws| ws.relative(path)) {
                let full_path = paths::remote_join(source.remote_cwd, &relative);
                variables
                    .set("&RELATIVEPATH", &relative)
                    .set("&FULLPATH", &full_path)
                    .set("{path}", &full_path)
                    .set("&WORKDIR", source.remote_cwd)
                    .set("&FILEDIR", paths::remote_parent(&full_path));

                if let Some(branch) = source.branch {
                    variables
                        .set("&BRANCHLIB", workspace::branch_library_name(branch))
                        .set("&BRANCH", branch)
                        .set("{branch}", branch);
                }
            }
        }
        _ => {
            variables
                .set("&RELATIVEPATH", paths::remote_relative(source.remote_cwd, &target.path))
                .set("&FULLPATH", &target.path)
                .set("&FILEDIR", paths::remote_parent(&target.path));
        }
    }

    variables
        .set("&PARENT", parent)
        .set("&BASENAME", &basename)
        .set("{filename}", &basename)
        .set("&NAMEL", name.to_lowercase())
        .set("&NAME", &name)
        .set("&EXTL", extension.to_lowercase())
        .set("&EXT", &extension);
}

fn object_variables(
    target: &Target,
    variables: &mut Variables,
    evfevent: &mut EvfEventInfo,
) -> Result<()> {
    let object = ObjectPath::parse(&target.path)?;

    variables
        .set("&LIBRARYL", object.library.to_lowercase())
        .set("&LIBRARY", &object.library)
        .set("&NAMEL", object.name.to_lowercase())
        .set("&NAME", &object.name)
        .set("&TYPEL", object.object_type.to_lowercase())
        .set("&TYPE", &object.object_type)
        .set("&EXTL", object.object_type.to_lowercase())
        .set("&EXT", &object.object_type);

    evfevent.library = object.library;
    evfevent.object = object.name;
    evfevent.extension = Some(object.object_type);
    Ok(())
}

/// Object name for a stream file: the stem without a `.pgm`/`.srvpgm`
/// secondary extension and without any `-description` suffix.
pub fn object_name(basename: &str) -> String {
    let mut name = match basename.rfind('.') {
        Some(idx) if idx > 0 => &basename[..idx],
        _ => basename,
    };
    if let Some(idx) = name.rfind('.') {
        if idx > 0 && OBJECT_TYPE_SUFFIXES.contains(&name[idx + 1..].to_uppercase().as_str()) {
            name = &name[..idx];
        }
    }
    match name.find('-') {
        Some(idx) => name[..idx].to_string(),
        None => name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Environment;

    fn connection() -> ConnectionConfig {
        ConnectionConfig {
            host: Some("dev@ibmi".into()),
            user: "DEV".into(),
            current_library: "C".into(),
            library_list: vec!["A".into(), "&CURLIB".into(), "B".into()],
            home_directory: "/home/dev".into(),
            ..ConnectionConfig::default()
        }
    }

    fn source<'a>(
        connection: &'a ConnectionConfig,
        env: &'a BTreeMap<String, String>,
        remote_cwd: &'a str,
    ) -> ContextSource<'a> {
        ContextSource {
            connection,
            custom_variables: &[],
            env,
            remote_cwd,
            branch: None,
        }
    }

    #[test]
    fn library_list_is_reversed_with_placeholders_substituted() {
        let conn = connection();
        let env = BTreeMap::new();
        let setup = LibrarySetup::resolve(&conn, &env);
        assert_eq!(setup.reversed(), vec!["B", "C", "A"]);

        let action = Action::new("x", ActionType::Member, "", Environment::Ile);
        let target = Target::new(ActionType::Member, "/LIB1/QRPGLESRC/PGM1.RPGLE");
        let ctx = derive(&action, &target, source(&conn, &env, "/home/dev")).unwrap();
        assert_eq!(ctx.variables.get("&LIBLC"), Some("B,C,A"));
        assert_eq!(ctx.variables.get("&LIBLS"), Some("B C A"));
    }

    #[test]
    fn env_overrides_current_library_and_list() {
        let conn = connection();
        let env: BTreeMap<String, String> = [
            ("CURLIB".to_string(), "MYLIB".to_string()),
            ("LIBL".to_string(), "X &BUILDLIB X Y".to_string()),
        ]
        .into_iter()
        .collect();
        let setup = LibrarySetup::resolve(&conn, &env);
        assert_eq!(setup.current_library, "MYLIB");
        assert_eq!(setup.library_list, vec!["X", "MYLIB", "Y"]);
    }

    #[test]
    fn member_context_sets_open_variables() {
        let conn = connection();
        let env = BTreeMap::new();
        let action = Action::new(
            "Compile",
            ActionType::Member,
            "CRTBNDRPG PGM(&OPENLIB/&OPENMBR) SRCFILE(&OPENLIB/&OPENSPF) SRCMBR(&OPENMBR)",
            Environment::Ile,
        );
        let target = Target::new(ActionType::Member, "/LIB1/QRPGLESRC/PGM1.RPGLE");
        let ctx = derive(&action, &target, source(&conn, &env, "/home/dev")).unwrap();

        assert_eq!(
            ctx.variables.expand(&action.command),
            "CRTBNDRPG PGM(LIB1/PGM1) SRCFILE(LIB1/QRPGLESRC) SRCMBR(PGM1)"
        );
        assert_eq!(ctx.variables.get("&OPENLIBL"), Some("lib1"));
        assert_eq!(ctx.evfevent.library, "LIB1");
        assert_eq!(ctx.evfevent.object, "PGM1");
        assert_eq!(ctx.evfevent.extension.as_deref(), Some("RPGLE"));
    }

    #[test]
    fn member_context_rejects_bad_path() {
        let conn = connection();
        let env = BTreeMap::new();
        let action = Action::new("x", ActionType::Member, "", Environment::Ile);
        let target = Target::new(ActionType::Member, "/QRPGLESRC/PGM1.RPGLE");
        assert!(derive(&action, &target, source(&conn, &env, ".")).is_err());
    }

    #[test]
    fn streamfile_context() {
        let conn = connection();
        let env = BTreeMap::new();
        let action = Action::new(
            "Compile",
            ActionType::Streamfile,
            "CRTBNDRPG SRCSTMF('&FULLPATH') OBJ(&SRCFILE)",
            Environment::Ile,
        );
        let target = Target::new(ActionType::Streamfile, "/home/dev/src/hello.pgm.rpgle");
        let ctx = derive(&action, &target, source(&conn, &env, "/home/dev")).unwrap();
        let vars = &ctx.variables;

        assert_eq!(vars.get("&RELATIVEPATH"), Some("src/hello.pgm.rpgle"));
        assert_eq!(vars.get("&FULLPATH"), Some("/home/dev/src/hello.pgm.rpgle"));
        assert_eq!(vars.get("&FILEDIR"), Some("/home/dev/src"));
        assert_eq!(vars.get("&PARENT"), Some("src"));
        assert_eq!(vars.get("&NAME"), Some("hello"));
        assert_eq!(vars.get("&EXT"), Some("RPGLE"));
        assert_eq!(vars.get("&EXTL"), Some("rpgle"));
        assert_eq!(vars.get("&SRCFILE"), Some("C/QTMPSRC"));
        assert_eq!(ctx.evfevent.library, "C");
        assert_eq!(ctx.evfevent.object, "HELLO");
    }

    #[test]
    fn file_context_uses_deploy_directory_and_branch() {
        let conn = connection();
        let env: BTreeMap<String, String> =
            [("CURLIB".to_string(), "WSLIB".to_string())].into_iter().collect();
        let action = Action::new("Build", ActionType::File, "gmake &NAME.pgm", Environment::Pase);
        let ws = WorkspaceScope::new("/work/proj");
        let target = Target::new(ActionType::File, "/work/proj/qrpglesrc/employees-list.rpgle")
            .in_workspace(ws);
        let mut src = source(&conn, &env, "/home/dev/builds/proj");
        src.branch = Some("feature/42-login");

        let ctx = derive(&action, &target, src).unwrap();
        let vars = &ctx.variables;
        assert_eq!(vars.get("&RELATIVEPATH"), Some("qrpglesrc/employees-list.rpgle"));
        assert_eq!(
            vars.get("&FULLPATH"),
            Some("/home/dev/builds/proj/qrpglesrc/employees-list.rpgle")
        );
        assert_eq!(vars.get("&WORKDIR"), Some("/home/dev/builds/proj"));
        assert_eq!(vars.get("&NAME"), Some("employees"));
        assert_eq!(vars.get("&BRANCHLIB"), Some("FEA42"));
        assert_eq!(vars.get("&CURLIB"), Some("WSLIB"));
        assert_eq!(ctx.evfevent.library, "WSLIB");
        assert!(ctx.evfevent.workspace.is_some());
    }

    #[test]
    fn object_context() {
        let conn = connection();
        let env = BTreeMap::new();
        let action = Action::new("Call", ActionType::Object, "CALL &LIBRARY/&NAME", Environment::Ile);
        let target = Target::new(ActionType::Object, "/LIB1/HELLO.PGM");
        let ctx = derive(&action, &target, source(&conn, &env, "/home/dev")).unwrap();
        assert_eq!(ctx.variables.expand(&action.command), "CALL LIB1/HELLO");
        assert_eq!(ctx.variables.get("&TYPEL"), Some("pgm"));
        assert_eq!(ctx.evfevent.extension.as_deref(), Some("PGM"));
    }

    #[test]
    fn custom_variables_are_uppercased_and_env_wins() {
        let conn = connection();
        let env: BTreeMap<String, String> =
            [("TGTRLS".to_string(), "V7R5M0".to_string())].into_iter().collect();
        let custom = vec![
            CustomVariable { name: "tgtrls".into(), value: "V7R4M0".into() },
            CustomVariable { name: "owner".into(), value: "QPGMR".into() },
        ];
        let action = Action::new("x", ActionType::Object, "", Environment::Ile);
        let target = Target::new(ActionType::Object, "/LIB1/HELLO.PGM");
        let mut src = source(&conn, &env, "/home/dev");
        src.custom_variables = &custom;
        let ctx = derive(&action, &target, src).unwrap();
        assert_eq!(ctx.variables.get("&OWNER"), Some("QPGMR"));
        assert_eq!(ctx.variables.get("&TGTRLS"), Some("V7R5M0"));
    }

    #[test]
    fn object_names_drop_secondary_extension_and_suffix() {
        assert_eq!(object_name("hello.pgm.rpgle"), "hello");
        assert_eq!(object_name("utils.srvpgm.sqlrpgle"), "utils");
        assert_eq!(object_name("emp-list.rpgle"), "emp");
        assert_eq!(object_name("a.b.rpgle"), "a.b");
        assert_eq!(object_name("makefile"), "makefile");
    }
}
