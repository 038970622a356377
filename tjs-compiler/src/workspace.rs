use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// File extensions treated as modules.
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs"];

/// The set of module sources one build sees, keyed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    root: Option<PathBuf>,
    sources: BTreeMap<PathBuf, String>,
}

impl Workspace {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            sources: BTreeMap::new(),
        }
    }

    /// Reads every module below `root`, skipping hidden directories and
    /// `node_modules`.
    pub fn discover(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("failed to resolve workspace root {}", root.display()))?;
        let mut workspace = Self::with_root(root.clone());

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry));
        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                continue;
            }
            let contents = fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            workspace.insert(entry.into_path(), contents);
        }

        debug!(root = %root.display(), modules = workspace.len(), "workspace discovered");
        Ok(workspace)
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.sources.insert(path.into(), contents.into());
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn source(&self, path: &Path) -> Option<&str> {
        self.sources.get(path).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.sources.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.sources
            .iter()
            .map(|(path, contents)| (path, contents.as_str()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// `path` relative to the workspace root when it lies below it.
    pub fn display_path(&self, path: &Path) -> String {
        self.root
            .as_deref()
            .and_then(|root| pathdiff::diff_paths(path, root))
            .filter(|relative| !relative.starts_with(".."))
            .unwrap_or_else(|| path.to_path_buf())
            .display()
            .to_string()
    }
}

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| SOURCE_EXTENSIONS.contains(&extension))
        .unwrap_or(false)
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || name == "node_modules")
}
