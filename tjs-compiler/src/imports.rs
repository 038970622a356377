use std::ffi::OsString;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::Serialize;

use crate::ast::{
    ImportedName, Module, NodeId, NodeRef, SourceSpan, StatementKind, DEFAULT_EXPORT,
};

/// Extensions tried, in order, for a specifier written without one.
const PROBE_EXTENSIONS: &[&str] = &["js", "mjs"];

/// Where an import specifier points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Resolution {
    /// A workspace file.
    Local(PathBuf),
    /// A bare specifier such as `"lodash"`; never part of the build.
    External,
    /// A relative specifier whose target does not exist. Carries the
    /// normalized path that was looked for.
    Missing(PathBuf),
}

impl Resolution {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Resolution::Local(path) => Some(path),
            _ => None,
        }
    }
}

/// Maps import specifiers to workspace paths. `exists` answers whether a
/// candidate path is a module of the workspace being built.
pub struct ImportResolver<F> {
    exists: F,
}

impl<F> ImportResolver<F>
where
    F: Fn(&Path) -> bool,
{
    pub fn new(exists: F) -> Self {
        Self { exists }
    }

    pub fn resolve(&self, specifier: &str, importer: &Path) -> Resolution {
        if !is_relative(specifier) {
            return Resolution::External;
        }

        let base = importer.parent().unwrap_or_else(|| Path::new(""));
        let target = if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else {
            base.join(specifier)
        }
        .clean();

        for candidate in candidates(&target) {
            if (self.exists)(&candidate) {
                return Resolution::Local(candidate);
            }
        }
        Resolution::Missing(target)
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with('.') || specifier.starts_with('/')
}

fn candidates(target: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![target.to_path_buf()];
    if target.extension().is_none() {
        for extension in PROBE_EXTENSIONS {
            let mut with_extension = OsString::from(target.as_os_str());
            with_extension.push(".");
            with_extension.push(extension);
            candidates.push(PathBuf::from(with_extension));
        }
    }
    candidates
}

/// One import statement together with its resolved target.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRecord {
    pub statement: NodeId,
    pub node: NodeRef,
    pub specifier: String,
    pub specifier_span: SourceSpan,
    pub resolution: Resolution,
    pub names: Vec<ImportedName>,
}

impl ImportRecord {
    pub fn resolved(&self) -> Option<&Path> {
        self.resolution.local_path()
    }
}

/// Collects every import declaration of `module`, resolving each specifier
/// relative to `importer`.
pub fn extract_imports<F>(module: &Module, importer: &Path, resolver: &ImportResolver<F>) -> Vec<ImportRecord>
where
    F: Fn(&Path) -> bool,
{
    module
        .imports()
        .map(|(statement, import)| ImportRecord {
            statement: statement.id,
            node: statement.node_ref(),
            specifier: import.source.clone(),
            specifier_span: import.source_span,
            resolution: resolver.resolve(&import.source, importer),
            names: import
                .specifiers
                .iter()
                .map(|specifier| specifier.imported.clone())
                .collect(),
        })
        .collect()
}

/// Names a module exports, in declaration order. `export default` is listed
/// under the reserved default key.
pub fn extract_exports(module: &Module) -> Vec<String> {
    let mut exports = Vec::new();
    let mut push = |name: &str| {
        if !exports.iter().any(|existing| existing == name) {
            exports.push(name.to_string());
        }
    };

    for statement in &module.statements {
        match &statement.kind {
            StatementKind::ExportNamed(export) => {
                if let Some(declaration) = &export.declaration {
                    for identifier in declaration.declared_names() {
                        push(&identifier.name);
                    }
                }
                for specifier in &export.specifiers {
                    push(&specifier.exported.name);
                }
            }
            StatementKind::ExportDefault(_) => push(DEFAULT_EXPORT),
            _ => {}
        }
    }
    exports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::source::{SourceFile, SourceId};
    use std::collections::HashSet;

    fn resolver(files: &[&str]) -> ImportResolver<impl Fn(&Path) -> bool> {
        let files: HashSet<PathBuf> = files.iter().map(PathBuf::from).collect();
        ImportResolver::new(move |path: &Path| files.contains(path))
    }

    #[test]
    fn relative_specifiers_resolve_against_the_importer() {
        let resolver = resolver(&["/ws/lib/math.js", "/ws/util.mjs"]);
        let importer = Path::new("/ws/src/main.js");
        assert_eq!(
            resolver.resolve("../lib/math.js", importer),
            Resolution::Local(PathBuf::from("/ws/lib/math.js"))
        );
        assert_eq!(
            resolver.resolve("../lib/./math", importer),
            Resolution::Local(PathBuf::from("/ws/lib/math.js"))
        );
        assert_eq!(
            resolver.resolve("../util", importer),
            Resolution::Local(PathBuf::from("/ws/util.mjs"))
        );
    }

    #[test]
    fn bare_specifiers_are_external() {
        let resolver = resolver(&[]);
        assert_eq!(
            resolver.resolve("lodash", Path::new("/ws/a.js")),
            Resolution::External
        );
    }

    #[test]
    fn dot_prefixed_specifiers_are_local() {
        let resolver = resolver(&["/ws/.config/x.js"]);
        assert_eq!(
            resolver.resolve(".config/x", Path::new("/ws/a.js")),
            Resolution::Local(PathBuf::from("/ws/.config/x.js"))
        );
        assert_eq!(
            resolver.resolve(".hidden.js", Path::new("/ws/a.js")),
            Resolution::Missing(PathBuf::from("/ws/.hidden.js"))
        );
    }

    #[test]
    fn missing_targets_keep_the_normalized_path() {
        let resolver = resolver(&[]);
        assert_eq!(
            resolver.resolve("./nope.js", Path::new("/ws/a.js")),
            Resolution::Missing(PathBuf::from("/ws/nope.js"))
        );
    }

    #[test]
    fn exports_include_specifiers_and_default() {
        let source = SourceFile::new(
            SourceId(0),
            "/ws/a.js".into(),
            "let hidden = 1\nexport let a = 1, b = 2\nexport { hidden as shown }\nexport default a".into(),
        );
        let module = parse(&source).expect("parse");
        assert_eq!(extract_exports(&module), vec!["a", "b", "shown", DEFAULT_EXPORT]);
    }

    #[test]
    fn imports_are_recorded_with_their_resolution() {
        let source = SourceFile::new(
            SourceId(0),
            "/ws/main.js".into(),
            "import add, { sub } from './math.js'\nimport x from 'pkg'".into(),
        );
        let module = parse(&source).expect("parse");
        let resolver = resolver(&["/ws/math.js"]);
        let records = extract_imports(&module, Path::new("/ws/main.js"), &resolver);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].resolved(), Some(Path::new("/ws/math.js")));
        assert_eq!(
            records[0].names,
            vec![ImportedName::Default, ImportedName::Named("sub".into())]
        );
        assert_eq!(records[1].resolution, Resolution::External);
    }
}
