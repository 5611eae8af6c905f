//! Catalog of downloadable items derived from the shared paths.
//!
//! The item list and the route lookup table are computed once when the
//! session is created; handlers only read them.

use crate::constants::DOWNLOAD_PREFIX;
use crate::error::ShareError;
use crate::paths::{ShareKind, SharedPath};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    ZippedFolder,
}

/// One downloadable unit exposed to clients
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    pub name: String,
    /// Declared size; for zipped folders this is the sum of the contents,
    /// not the compressed size
    pub size: u64,
    pub size_human: String,
    pub kind: ItemKind,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
}

/// What a download route points at on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    File(PathBuf),
    Folder(PathBuf),
}

#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    routes: HashMap<String, RouteTarget>,
}

impl Catalog {
    /// Derive the items for `shared`, rejecting route collisions
    pub fn build(shared: &[SharedPath], zip_folders: bool) -> Result<Self, ShareError> {
        let mut catalog = Catalog::default();

        for entry in shared {
            match entry.kind {
                ShareKind::File => {
                    let size = std::fs::metadata(&entry.path)?.len();
                    catalog.insert(
                        entry.name(),
                        size,
                        ItemKind::File,
                        None,
                        RouteTarget::File(entry.path.clone()),
                    )?;
                }
                ShareKind::Directory if zip_folders => {
                    let files = walk_files(&entry.path);
                    let size = files.iter().map(|(_, size)| size).sum();
                    catalog.insert(
                        format!("{}.zip", entry.name()),
                        size,
                        ItemKind::ZippedFolder,
                        Some(files.len()),
                        RouteTarget::Folder(entry.path.clone()),
                    )?;
                    // Contained files stay reachable by relative path but
                    // are not listed
                    for (file, _) in files {
                        let Some(name) = relative_name(&entry.path, &file) else {
                            continue;
                        };
                        catalog.insert_route(name, RouteTarget::File(file))?;
                    }
                }
                ShareKind::Directory => {
                    for (file, size) in walk_files(&entry.path) {
                        let Some(name) = relative_name(&entry.path, &file) else {
                            continue;
                        };
                        catalog.insert(name, size, ItemKind::File, None, RouteTarget::File(file))?;
                    }
                }
            }
        }

        Ok(catalog)
    }

    fn insert(
        &mut self,
        name: String,
        size: u64,
        kind: ItemKind,
        file_count: Option<usize>,
        target: RouteTarget,
    ) -> Result<(), ShareError> {
        let route = self.insert_route(name.clone(), target)?;
        self.items.push(CatalogItem {
            size_human: format_file_size(size),
            name,
            size,
            kind,
            route,
            file_count,
        });
        Ok(())
    }

    /// Register a download route, returning its full path
    fn insert_route(&mut self, name: String, target: RouteTarget) -> Result<String, ShareError> {
        let route = format!("{}{}", DOWNLOAD_PREFIX, name);
        if self.routes.contains_key(&name) {
            return Err(ShareError::DuplicateRoute(route));
        }
        self.routes.insert(name, target);
        Ok(route)
    }

    pub fn list_items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn files_count(&self) -> usize {
        self.items.len()
    }

    /// Look up an item by the part of the route after `/download/`
    pub fn resolve_route(&self, name: &str) -> Option<&RouteTarget> {
        self.routes.get(name)
    }
}

/// All regular files below `root` with their sizes, sorted by path.
///
/// Unreadable entries are skipped with a warning.
pub(crate) fn walk_files(root: &Path) -> Vec<(PathBuf, u64)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }
        let metadata = entry.path().metadata();
        match metadata {
            Ok(meta) => files.push((entry.into_path(), meta.len())),
            Err(e) => tracing::warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }
    files
}

/// `file` relative to `root`, always joined with `/`
pub(crate) fn relative_name(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Format file size in human readable form (1024 based)
pub fn format_file_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}
