//! Decide which resource identity a listing's file key belongs to.

use std::path::Path;

use crate::context::EvfEventInfo;
use crate::target::WorkspaceScope;

/// Stream files below this root are matched case-sensitively.
const CASE_SENSITIVE_ROOT: &str = "/QOpenSys";

/// Identities currently open in the editor, e.g. `member:/LIB/FILE/MBR.RPGLE`.
#[derive(Debug, Clone, Default)]
pub struct OpenEditors {
    identities: Vec<String>,
}

impl OpenEditors {
    pub fn new(identities: impl IntoIterator<Item = String>) -> Self {
        Self {
            identities: identities.into_iter().collect(),
        }
    }

    /// An open identity equal to `candidate`, ignoring case unless it is a
    /// stream file under `/QOpenSys`.
    pub fn find_existing(&self, candidate: &str) -> Option<&str> {
        let case_sensitive = candidate
            .strip_prefix("streamfile:")
            .is_some_and(|p| p.starts_with(CASE_SENSITIVE_ROOT));
        self.identities
            .iter()
            .find(|open| {
                if case_sensitive {
                    open.as_str() == candidate
                } else {
                    open.eq_ignore_ascii_case(candidate)
                }
            })
            .map(String::as_str)
    }

    /// An open identity whose last path segment is `file_name`.
    pub fn find_by_name(&self, file_name: &str) -> Option<&str> {
        self.identities
            .iter()
            .find(|open| {
                open.rsplit(['/', '\\'])
                    .next()
                    .is_some_and(|name| name.eq_ignore_ascii_case(file_name))
            })
            .map(String::as_str)
    }
}

/// Resolve the identity diagnostics for `file_key` should attach to.
///
/// Workspace compiles map the remote deploy path back onto the workspace,
/// falling back to an open editor with the same name. Everything else
/// becomes a `streamfile:` or `member:` identity, reusing an open equivalent.
pub fn place(file_key: &str, info: &EvfEventInfo, iasps: &[String], open: &OpenEditors) -> String {
    if let Some(workspace) = &info.workspace {
        if let Some(identity) = workspace_identity(file_key, workspace, iasps) {
            return identity;
        }
        if let Some(extension) = info.extension.as_deref().filter(|e| !e.is_empty()) {
            let base = file_key.rsplit('/').next().unwrap_or(file_key);
            if let Some(existing) = open.find_by_name(&format!("{base}.{extension}")) {
                return existing.to_string();
            }
        }
    }

    let candidate = if file_key.starts_with('/') {
        format!("streamfile:{file_key}")
    } else {
        let asp = info
            .asp
            .as_deref()
            .map(|asp| format!("{asp}/"))
            .unwrap_or_default();
        let extension = info
            .extension
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        format!("member:/{asp}{file_key}{extension}")
    };

    open.find_existing(&candidate)
        .map(str::to_string)
        .unwrap_or(candidate)
}

fn workspace_identity(file_key: &str, workspace: &WorkspaceScope, iasps: &[String]) -> Option<String> {
    let deploy = workspace.deploy_directory.as_deref()?.trim_end_matches('/');
    if deploy.is_empty() {
        return None;
    }
    let index = find_ignore_ascii_case(file_key, deploy)?;
    let mut relative = format!("{}{}", &file_key[..index], &file_key[index + deploy.len()..]);

    // A deploy directory reached through an IASP shows up with its root.
    for asp in iasps {
        let root = format!("/{asp}");
        if let Some(rest) = relative.strip_prefix(&root) {
            relative = rest.to_string();
            break;
        }
    }

    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }
    let local = workspace.root.join(Path::new(relative));
    Some(format!("file:{}", local.display()))
}

/// Byte offset of the first occurrence of `needle` in `haystack`, ignoring
/// ASCII case. Non-ASCII bytes must match exactly, so both ends of a match
/// fall on char boundaries.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    haystack.char_indices().map(|(i, _)| i).find(|&i| {
        bytes
            .get(i..i + needle.len())
            .is_some_and(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn member_info() -> EvfEventInfo {
        EvfEventInfo {
            library: "LIB1".into(),
            object: "PGM1".into(),
            extension: Some("RPGLE".into()),
            ..EvfEventInfo::default()
        }
    }

    #[test]
    fn member_key_becomes_member_identity() {
        let identity = place("LIB1/QRPGLESRC/PGM1", &member_info(), &[], &OpenEditors::default());
        assert_eq!(identity, "member:/LIB1/QRPGLESRC/PGM1.RPGLE");

        let mut info = member_info();
        info.asp = Some("IASP1".into());
        let identity = place("LIB1/QRPGLESRC/PGM1", &info, &[], &OpenEditors::default());
        assert_eq!(identity, "member:/IASP1/LIB1/QRPGLESRC/PGM1.RPGLE");
    }

    #[test]
    fn reuses_open_member_ignoring_case() {
        let open = OpenEditors::new(["member:/lib1/qrpglesrc/pgm1.rpgle".to_string()]);
        let identity = place("LIB1/QRPGLESRC/PGM1", &member_info(), &[], &open);
        assert_eq!(identity, "member:/lib1/qrpglesrc/pgm1.rpgle");
    }

    #[test]
    fn stream_files_under_qopensys_are_case_sensitive() {
        let open = OpenEditors::new([
            "streamfile:/qopensys/home/a.rpgle".to_string(),
            "streamfile:/home/Dev/b.rpgle".to_string(),
        ]);
        let info = EvfEventInfo::default();
        assert_eq!(
            place("/QOpenSys/home/a.rpgle", &info, &[], &open),
            "streamfile:/QOpenSys/home/a.rpgle"
        );
        assert_eq!(
            place("/home/dev/b.rpgle", &info, &[], &open),
            "streamfile:/home/Dev/b.rpgle"
        );
    }

    #[test]
    fn workspace_key_strips_deploy_path_and_iasp() {
        let ws = WorkspaceScope::new("/work/proj").with_deploy_directory("/home/dev/builds/proj");
        let info = EvfEventInfo {
            workspace: Some(ws),
            extension: Some("rpgle".into()),
            ..EvfEventInfo::default()
        };
        let identity = place(
            "/IASP1/home/DEV/builds/proj/qrpglesrc/hello.pgm.rpgle",
            &info,
            &["IASP1".to_string()],
            &OpenEditors::default(),
        );
        assert_eq!(identity, "file:/work/proj/qrpglesrc/hello.pgm.rpgle");
    }

    #[test]
    fn workspace_temp_member_falls_back_to_open_editor() {
        let ws = WorkspaceScope::new("/work/proj").with_deploy_directory("/home/dev/builds/proj");
        let info = EvfEventInfo {
            library: "DEVLIB".into(),
            object: "HELLO".into(),
            workspace: Some(ws),
            extension: Some("rpgle".into()),
            ..EvfEventInfo::default()
        };
        let open = OpenEditors::new(["file:/work/proj/qrpglesrc/HELLO.rpgle".to_string()]);
        let identity = place("DEVLIB/QTMPSRC/HELLO", &info, &[], &open);
        assert_eq!(identity, "file:/work/proj/qrpglesrc/HELLO.rpgle");
    }

    #[test]
    fn workspace_key_with_non_ascii_segments() {
        let ws = WorkspaceScope::new("/work/proj").with_deploy_directory("/home/dev/proj");
        let info = EvfEventInfo {
            workspace: Some(ws),
            ..EvfEventInfo::default()
        };
        let open = OpenEditors::default();
        assert_eq!(
            place("/home/DEV/proj/src/café.rpgle", &info, &[], &open),
            "file:/work/proj/src/café.rpgle"
        );
        // Lowercasing `İ` changes its length; offsets still line up.
        assert_eq!(
            place("/İ/home/dev/projé/x.rpgle", &info, &[], &open),
            "file:/work/proj/İé/x.rpgle"
        );
    }

    #[test]
    fn ascii_case_search_keeps_byte_offsets() {
        assert_eq!(find_ignore_ascii_case("/İ/HOME/x", "/home"), Some(3));
        assert_eq!(find_ignore_ascii_case("/home", "/home/dev"), None);
        assert_eq!(find_ignore_ascii_case("/é", "/e"), None);
    }
}
