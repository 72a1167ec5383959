use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const IBMI_DIR: &str = ".ibmi";
pub const CONFIG_FILE: &str = ".ibmi/config.yaml";
pub const USAGE_FILE: &str = ".ibmi/usage.yaml";

pub const LOCAL_ACTIONS_FILE: &str = ".vscode/actions.json";
pub const ENV_FILE: &str = ".env";
pub const GIT_HEAD_FILE: &str = ".git/HEAD";
pub const EVFEVENT_DIR: &str = ".evfevent";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn usage_path(root: &Path) -> PathBuf {
    root.join(USAGE_FILE)
}

pub fn local_actions_path(workspace: &Path) -> PathBuf {
    workspace.join(LOCAL_ACTIONS_FILE)
}

pub fn env_path(workspace: &Path) -> PathBuf {
    workspace.join(ENV_FILE)
}

pub fn git_head_path(workspace: &Path) -> PathBuf {
    workspace.join(GIT_HEAD_FILE)
}

/// Join remote IFS path segments with `/`, collapsing duplicate separators.
pub fn remote_join(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches("./").trim_start_matches('/');
    if relative.is_empty() {
        return base.to_string();
    }
    format!("{base}/{relative}")
}

/// Parent directory of a remote path, `/` for top-level entries.
pub fn remote_parent(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// `path` relative to the directory `base`, using `..` where needed.
pub fn remote_relative(base: &str, path: &str) -> String {
    let base: Vec<&str> = base.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let target: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = std::iter::repeat("..").take(base.len() - common).collect();
    parts.extend_from_slice(&target[common..]);
    parts.join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(config_path(root), PathBuf::from("/tmp/proj/.ibmi/config.yaml"));
        assert_eq!(
            local_actions_path(root),
            PathBuf::from("/tmp/proj/.vscode/actions.json")
        );
        assert_eq!(git_head_path(root), PathBuf::from("/tmp/proj/.git/HEAD"));
    }

    #[test]
    fn remote_path_helpers() {
        assert_eq!(remote_join("/home/me/build/", "./src/a.rpgle"), "/home/me/build/src/a.rpgle");
        assert_eq!(remote_join("/home/me", ""), "/home/me");
        assert_eq!(remote_parent("/home/me/a.rpgle"), "/home/me");
        assert_eq!(remote_parent("/a.rpgle"), "/");
        assert_eq!(remote_relative("/home/me", "/home/me/src/a.rpgle"), "src/a.rpgle");
        assert_eq!(remote_relative("/home/me/", "/home/other/a.rpgle"), "../other/a.rpgle");
    }
}
