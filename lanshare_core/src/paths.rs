//! Resolution of user supplied paths into the shared set.

use crate::error::ShareError;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    File,
    Directory,
}

/// An absolute, canonical path the user opted to share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPath {
    pub path: PathBuf,
    pub kind: ShareKind,
}

impl SharedPath {
    /// Build from an existing path, canonicalizing it
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = std::fs::canonicalize(path.as_ref())?;
        let kind = if path.is_dir() {
            ShareKind::Directory
        } else {
            ShareKind::File
        };
        Ok(Self { path, kind })
    }

    /// Last path component, used as the display name
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ShareKind::Directory
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(input: &str) -> PathBuf {
    let rest = if input == "~" {
        Some("")
    } else {
        input
            .strip_prefix("~/")
            .or_else(|| input.strip_prefix("~\\"))
    };

    match rest {
        Some(rest) => match directories::UserDirs::new() {
            Some(dirs) if rest.is_empty() => dirs.home_dir().to_path_buf(),
            Some(dirs) => dirs.home_dir().join(rest),
            None => PathBuf::from(input),
        },
        None => PathBuf::from(input),
    }
}

/// Validate user supplied paths.
///
/// Missing entries are skipped with a warning; the result keeps the input
/// order and contains each canonical path once. Fails only when nothing is
/// left to share.
pub fn resolve_paths<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<SharedPath>, ShareError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for input in inputs {
        let expanded = expand_home(input.as_ref());
        let shared = match SharedPath::new(&expanded) {
            Ok(shared) => shared,
            Err(e) => {
                tracing::warn!("Path does not exist: {} ({})", expanded.display(), e);
                continue;
            }
        };

        if seen.insert(shared.path.clone()) {
            resolved.push(shared);
        } else {
            tracing::debug!("Skipping duplicate path: {}", shared.path.display());
        }
    }

    if resolved.is_empty() {
        return Err(ShareError::NoValidPaths);
    }
    Ok(resolved)
}
