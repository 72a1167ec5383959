//! Resource locators an Action runs against.
//!
//! A resource is written `scheme:/path[#fragment]` where the scheme is an
//! [`ActionType`]. Anything without a known scheme is a local `file` path.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{ActionError, Result};
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// WorkspaceScope
// ---------------------------------------------------------------------------

/// Local workspace folder owning a `file` target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceScope {
    pub root: PathBuf,
    /// Remote directory the workspace deploys to.
    pub deploy_directory: Option<String>,
}

impl WorkspaceScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            deploy_directory: None,
        }
    }

    pub fn with_deploy_directory(mut self, directory: impl Into<String>) -> Self {
        self.deploy_directory = Some(directory.into());
        self
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Workspace-relative path with `/` separators.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub kind: ActionType,
    /// Path part of the locator: `/LIB/FILE/MBR.EXT`, an IFS path, a local
    /// path or `/LIB/NAME.TYPE`.
    pub path: String,
    pub fragment: Option<String>,
    pub is_protected: bool,
    pub workspace: Option<WorkspaceScope>,
}

impl Target {
    pub fn new(kind: ActionType, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            fragment: None,
            is_protected: false,
            workspace: None,
        }
    }

    /// Parse `member:/LIB/FILE/MBR.EXT`, `streamfile:/a/b.c`, `object:/LIB/X.PGM`,
    /// `file:/abs/path` or a bare local path, each with an optional `#fragment`.
    pub fn parse(resource: &str) -> Result<Self> {
        let (locator, fragment) = match resource.split_once('#') {
            Some((locator, fragment)) => (locator, Some(fragment.to_string())),
            None => (resource, None),
        };

        let (kind, path) = match locator.split_once(':') {
            Some((scheme, rest)) if scheme.len() > 1 => match scheme.parse::<ActionType>() {
                Ok(kind) => (kind, rest.to_string()),
                Err(_) => return Err(ActionError::UnknownResourceType(scheme.to_string())),
            },
            _ => (ActionType::File, locator.to_string()),
        };

        if path.is_empty() {
            return Err(ActionError::UnknownResourceType(resource.to_string()));
        }

        Ok(Self {
            kind,
            path,
            fragment: fragment.filter(|f| !f.is_empty()),
            is_protected: false,
            workspace: None,
        })
    }

    pub fn protected(mut self, is_protected: bool) -> Self {
        self.is_protected = is_protected;
        self
    }

    pub fn in_workspace(mut self, workspace: WorkspaceScope) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Uppercased text after the last `.` of the path, empty when there is none.
    pub fn extension(&self) -> String {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match name.rfind('.') {
            Some(idx) => name[idx + 1..].to_uppercase(),
            None => String::new(),
        }
    }

    pub fn fragment_upper(&self) -> Option<String> {
        self.fragment.as_deref().map(str::to_uppercase)
    }

    /// `scheme:path[#fragment]`, the identity used in logs and reports.
    pub fn label(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}:{}#{fragment}", self.kind, self.path),
            None => format!("{}:{}", self.kind, self.path),
        }
    }
}

// ---------------------------------------------------------------------------
// QSYS names
// ---------------------------------------------------------------------------

static QSYS_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn qsys_name_re() -> &'static Regex {
    QSYS_NAME_RE.get_or_init(|| Regex::new(r"^[A-Z0-9$#@][A-Z0-9_$#@.]{0,9}$").unwrap())
}

fn validate_qsys_name(kind: &'static str, name: &str) -> Result<()> {
    if !qsys_name_re().is_match(name) {
        return Err(ActionError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MemberPath
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberPath {
    pub asp: Option<String>,
    pub library: String,
    pub file: String,
    pub name: String,
    pub extension: String,
    pub basename: String,
}

impl MemberPath {
    /// Parse `[ASP/]LIB/FILE/NAME.EXT`, leading slash optional, case-folded
    /// to upper. The extension may be blank but the dot is required.
    pub fn parse(path: &str) -> Result<Self> {
        let upper = path.strip_prefix('/').unwrap_or(path).to_uppercase();
        let parts: Vec<&str> = upper.split('/').collect();
        let from_end = |n: usize| {
            parts
                .len()
                .checked_sub(n)
                .and_then(|i| parts.get(i))
                .copied()
                .filter(|s| !s.is_empty())
        };

        let (Some(basename), Some(file), Some(library)) = (from_end(1), from_end(2), from_end(3))
        else {
            return Err(ActionError::InvalidMemberPath(path.to_string()));
        };
        let asp = from_end(4);

        if let Some(asp) = asp {
            validate_qsys_name("ASP", asp)?;
        }
        validate_qsys_name("library", library)?;
        validate_qsys_name("source file", file)?;

        let Some(dot) = basename.rfind('.') else {
            return Err(ActionError::InvalidMemberPath(path.to_string()));
        };
        let name = &basename[..dot];
        let extension = basename[dot + 1..].trim();

        validate_qsys_name("member", name)?;
        if !extension.is_empty() {
            validate_qsys_name("member extension", extension)?;
        }

        Ok(Self {
            asp: asp.map(str::to_string),
            library: library.to_string(),
            file: file.to_string(),
            name: name.to_string(),
            extension: extension.to_string(),
            basename: basename.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// ObjectPath
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectPath {
    pub library: String,
    pub name: String,
    pub object_type: String,
}

impl ObjectPath {
    /// Parse `/LIB/NAME.TYPE`, case-folded to upper.
    pub fn parse(path: &str) -> Result<Self> {
        let upper = path.strip_prefix('/').unwrap_or(path).to_uppercase();
        let Some((library, full_name)) = upper.split_once('/') else {
            return Err(ActionError::InvalidObjectPath(path.to_string()));
        };
        let (name, object_type) = match full_name.rfind('.') {
            Some(idx) => (&full_name[..idx], &full_name[idx + 1..]),
            None => return Err(ActionError::InvalidObjectPath(path.to_string())),
        };
        if library.is_empty() || name.is_empty() || full_name.contains('/') {
            return Err(ActionError::InvalidObjectPath(path.to_string()));
        }
        Ok(Self {
            library: library.to_string(),
            name: name.to_string(),
            object_type: object_type.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
