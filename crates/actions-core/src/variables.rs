//! Ordered variable namespace used to expand Action command text.
//!
//! Names are literal, case-sensitive tokens such as `&OPENLIB`, `*CURLIB` or
//! `{branch}`. Expansion is a single left-to-right scan: at each position the
//! longest registered name that matches is replaced by its value, and the
//! emitted value is never scanned again.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    entries: IndexMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`. A known name keeps its original position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every registered name found in `template` with its value.
    ///
    /// Unknown tokens are left verbatim. Values are inserted literally.
    pub fn expand(&self, template: &str) -> String {
        let Some(pattern) = self.pattern() else {
            return template.to_string();
        };
        pattern
            .replace_all(template, |caps: &Captures| {
                let name = &caps[0];
                self.get(name).unwrap_or(name).to_string()
            })
            .into_owned()
    }

    /// Variables usable as a PASE shell environment.
    ///
    /// Only names starting with a letter or `&` survive; the leading `&` is
    /// stripped and the rest must be a valid shell identifier.
    pub fn to_shell_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for (name, value) in self.iter() {
            if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '&') {
                continue;
            }
            let key = name.strip_prefix('&').unwrap_or(name);
            if is_shell_identifier(key) {
                env.insert(key.to_string(), value.to_string());
            }
        }
        env
    }

    /// Alternation of escaped names, longest first so that leftmost-first
    /// matching picks the longest name at each position.
    fn pattern(&self) -> Option<Regex> {
        let mut names: Vec<&str> = self
            .entries
            .keys()
            .map(String::as_str)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return None;
        }
        names.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&alternation).ok()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut variables = Variables::new();
        for (k, v) in iter {
            variables.set(k, v);
        }
        variables
    }
}

fn is_shell_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
