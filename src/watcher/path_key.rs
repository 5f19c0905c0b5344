//! Canonical file identity keys.
//!
//! Every signal source refers to files by a normalized key so the glob
//! watcher, the per-file watchers, and the poll sweep all agree on file
//! identity regardless of how a path was spelled.

use std::fmt;
use std::path::{Component, Path};

/// Canonical, comparable identity for a file path.
///
/// Produced only by [`PathKey::normalize`]; used as the key of every
/// per-file map in the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    /// Normalize a path into a canonical key.
    ///
    /// Purely lexical: no file-system access and no failure path. `.`
    /// components are dropped, `..` pops a preceding component where one
    /// exists, separators become `/`, and on hosts with case-insensitive
    /// file systems the key is case-folded. Input that cannot be
    /// simplified normalizes to itself.
    pub fn normalize(path: &Path) -> Self {
        let mut prefix = String::new();
        let mut rooted = false;
        let mut parts: Vec<String> = Vec::new();

        for component in path.components() {
            match component {
                Component::Prefix(p) => {
                    prefix = p.as_os_str().to_string_lossy().replace('\\', "/");
                }
                Component::RootDir => rooted = true,
                Component::CurDir => {}
                Component::ParentDir => {
                    let poppable = matches!(parts.last(), Some(last) if last != "..");
                    if poppable {
                        parts.pop();
                    } else if !rooted {
                        // Relative paths keep leading `..` components;
                        // `/..` collapses to `/`.
                        parts.push("..".to_string());
                    }
                }
                Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            }
        }

        let mut key = prefix;
        if rooted {
            key.push('/');
        }
        key.push_str(&parts.join("/"));
        if key.is_empty() {
            key.push('.');
        }

        if cfg!(any(windows, target_os = "macos")) {
            key = key.to_lowercase();
        }

        PathKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
