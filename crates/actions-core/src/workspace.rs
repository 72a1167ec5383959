//! Local workspace helpers: `.env` overrides, the git branch, downloaded
//! `.evfevent` listings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::paths;

/// Parse `KEY=VALUE` lines. `#` comments, carriage returns and entries with a
/// blank key or value are ignored.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for line in content.replace('\r', "").lines() {
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if !key.is_empty() && !value.is_empty() {
            env.insert(key.to_string(), value.to_string());
        }
    }
    env
}

/// Read `<workspace>/.env`, empty when the file does not exist.
pub fn read_env(workspace: &Path) -> Result<BTreeMap<String, String>> {
    let path = paths::env_path(workspace);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    Ok(parse_env(&std::fs::read_to_string(path)?))
}

/// Current branch from `.git/HEAD`; `None` when detached or not a repository.
pub fn git_branch(workspace: &Path) -> Option<String> {
    let head = std::fs::read_to_string(paths::git_head_path(workspace)).ok()?;
    head.trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::to_string)
        .filter(|b| !b.is_empty())
}

/// Library name derived from a branch name.
///
/// `feature/1234-login` becomes `FEA1234`; without a short numeric part the
/// first seven characters of the second segment are used. Single-segment
/// names are truncated to ten characters.
pub fn branch_library_name(branch: &str) -> String {
    let parts: Vec<&str> = branch.split(['/', '-', ' ']).collect();
    if parts.len() > 1 {
        let branch_type: String = parts[0].chars().take(3).collect();
        let numeric = parts.iter().find(|p| {
            p.chars().count() <= 7 && p.chars().next().is_some_and(|c| c.is_ascii_digit())
        });
        let id: String = match numeric {
            Some(id) => id.to_string(),
            None => parts[1].chars().take(7).collect(),
        };
        format!("{branch_type}{id}").trim().to_uppercase()
    } else {
        branch.chars().take(10).collect::<String>().to_uppercase()
    }
}

/// Every file directly inside a `.evfevent` directory anywhere under the
/// workspace, sorted by path.
pub fn evfevent_files(workspace: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_evfevent_files(workspace, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_evfevent_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name == paths::EVFEVENT_DIR {
            for file in std::fs::read_dir(&path)? {
                let file = file?.path();
                if file.is_file() {
                    found.push(file);
                }
            }
        } else if name != ".git" {
            collect_evfevent_files(&path, found)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn env_parsing_skips_comments_and_blanks() {
        let env = parse_env("# comment\r\nCURLIB=DEVLIB\r\nLIBL = A B C\nEMPTY=\n=novalue\n");
        assert_eq!(env.get("CURLIB").map(String::as_str), Some("DEVLIB"));
        assert_eq!(env.get("LIBL").map(String::as_str), Some("A B C"));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn read_env_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_env(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn git_branch_from_head() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/feature/123-login\n").unwrap();
        assert_eq!(git_branch(dir.path()).as_deref(), Some("feature/123-login"));

        std::fs::write(dir.path().join(".git/HEAD"), "4f2c0a1b\n").unwrap();
        assert_eq!(git_branch(dir.path()), None);
    }

    #[test]
    fn branch_library_names() {
        assert_eq!(branch_library_name("feature/123-login"), "FEA123");
        assert_eq!(branch_library_name("bugfix/loginpage"), "BUGLOGINPA");
        assert_eq!(branch_library_name("fix/longnamehere"), "FIXLONGNAM");
        assert_eq!(branch_library_name("main"), "MAIN");
        assert_eq!(branch_library_name("averyveryverylongbranch"), "AVERYVERYV");
    }

    #[test]
    fn finds_nested_evfevent_files() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("build/.evfevent");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("hello.evfevent"), "x").unwrap();
        std::fs::create_dir_all(dir.path().join(".evfevent")).unwrap();
        std::fs::write(dir.path().join(".evfevent/a.evfevent"), "x").unwrap();

        let files = evfevent_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }
}
