use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: SourceId,
    pub path: PathBuf,
    pub contents: String,
}

impl SourceFile {
    pub fn new(id: SourceId, path: PathBuf, contents: String) -> Self {
        Self { id, path, contents }
    }
}

/// One-based line lookup, used when rendering a diagnostic or a hover label.
pub fn source_line(contents: &str, line: usize) -> Option<&str> {
    contents.lines().nth(line.checked_sub(1)?)
}
