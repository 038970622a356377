use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, debug_span, warn};

use crate::ast::{Module, DEFAULT_EXPORT};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::{NameError, ResolveError, SyntaxError, TypeError};
use crate::graph::{DependencyCycle, DependencyGraph};
use crate::imports::{extract_exports, extract_imports, ImportRecord, ImportResolver, Resolution};
use crate::parser::parse;
use crate::resolver::{NameResolver, SuggestionPolicy};
use crate::source::{SourceFile, SourceId};
use crate::typechecker::{InterfaceRegistry, ModuleAnalysis, TypeChecker};
use crate::workspace::Workspace;

#[derive(Debug, Default, Clone)]
pub struct CompileOptions {
    /// Fail the build when a relative import names no workspace module.
    pub reject_missing_imports: bool,
    pub suggestions: SuggestionPolicy,
    /// Replaces (or adds) module text, e.g. unsaved editor buffers.
    pub module_overrides: HashMap<PathBuf, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    Parse,
    Resolve,
    Cycle,
    NameCheck,
    TypeCheck,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::Parse => "parse",
            BuildPhase::Resolve => "resolve",
            BuildPhase::Cycle => "cycle",
            BuildPhase::NameCheck => "name check",
            BuildPhase::TypeCheck => "type check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BuildError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("import cycle: {}", describe_cycle(.0))]
    Cycle(DependencyCycle<PathBuf>),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl BuildError {
    pub fn phase(&self) -> BuildPhase {
        match self {
            BuildError::Syntax(_) => BuildPhase::Parse,
            BuildError::Resolve(_) => BuildPhase::Resolve,
            BuildError::Cycle(_) => BuildPhase::Cycle,
            BuildError::Name(_) => BuildPhase::NameCheck,
            BuildError::Type(_) => BuildPhase::TypeCheck,
        }
    }
}

fn describe_cycle(cycle: &DependencyCycle<PathBuf>) -> String {
    cycle
        .path
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Why a build stopped. `completed` keeps the analyses of modules that were
/// fully checked before the failure.
#[derive(Debug, Clone, Error)]
#[error("{phase} failed: {error}")]
pub struct BuildFailure {
    pub phase: BuildPhase,
    pub module: Option<PathBuf>,
    pub error: BuildError,
    pub completed: BTreeMap<PathBuf, ModuleAnalysis>,
    diagnostics: Vec<Diagnostic>,
}

impl BuildFailure {
    /// One diagnostic per affected file.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Machine-readable form: phase, module, the structured error and the
    /// rendered diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "phase": self.phase,
            "module": self.module,
            "message": self.error.to_string(),
            "error": self.error,
            "diagnostics": self.diagnostics,
        })
    }
}

pub struct Compilation {
    /// Modules in dependency order.
    pub order: Vec<PathBuf>,
    pub modules: BTreeMap<PathBuf, ModuleAnalysis>,
    pub interfaces: InterfaceRegistry,
}

struct ParsedModule {
    ast: Module,
    imports: Vec<ImportRecord>,
}

pub struct Compiler {
    diagnostics: Diagnostics,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            options,
        }
    }

    /// Diagnostics of the most recent build.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn build(&mut self, workspace: &Workspace) -> Result<Compilation, BuildFailure> {
        self.diagnostics.clear();
        let span = debug_span!("build", modules = workspace.len());
        let _guard = span.enter();

        let result = Build::new(&self.options, workspace).run();
        match &result {
            Ok(compilation) => debug!(modules = compilation.order.len(), "build finished"),
            Err(failure) => {
                warn!(phase = %failure.phase, module = ?failure.module, "build failed");
                self.diagnostics.extend(failure.diagnostics().iter().cloned());
            }
        }
        result
    }
}

/// State of one build. Dropped when the build ends.
struct Build<'a> {
    options: &'a CompileOptions,
    workspace: &'a Workspace,
    modules: BTreeMap<PathBuf, ParsedModule>,
    completed: BTreeMap<PathBuf, ModuleAnalysis>,
}

impl<'a> Build<'a> {
    fn new(options: &'a CompileOptions, workspace: &'a Workspace) -> Self {
        Self {
            options,
            workspace,
            modules: BTreeMap::new(),
            completed: BTreeMap::new(),
        }
    }

    fn run(mut self) -> Result<Compilation, BuildFailure> {
        self.parse_sources()?;
        self.check_missing_imports()?;
        let order = self.dependency_order()?;

        let exports: BTreeMap<PathBuf, Vec<String>> = self
            .modules
            .iter()
            .map(|(path, module)| (path.clone(), extract_exports(&module.ast)))
            .collect();
        let mut registry = InterfaceRegistry::default();

        for path in &order {
            let Some(module) = self.modules.get(path) else {
                continue;
            };
            let span = debug_span!("module", path = %path.display());
            let _guard = span.enter();

            debug!("namecheck");
            let names = NameResolver::new(&exports, &module.imports, self.options.suggestions)
                .resolve_module(&module.ast);
            if let Err(error) = names {
                return Err(self.fail(Some(path.clone()), error.into()));
            }

            debug!("typecheck");
            let analysis = match TypeChecker::new(&registry, &module.imports)
                .check_module(path, &module.ast)
            {
                Ok(analysis) => analysis,
                Err(error) => return Err(self.fail(Some(path.clone()), error.into())),
            };

            registry.publish(path.clone(), analysis.interface.clone());
            self.completed.insert(path.clone(), analysis);
        }

        Ok(Compilation {
            order,
            modules: self.completed,
            interfaces: registry,
        })
    }

    fn parse_sources(&mut self) -> Result<(), BuildFailure> {
        let mut sources: BTreeMap<PathBuf, String> = self
            .workspace
            .iter()
            .map(|(path, contents)| (path.clone(), contents.to_string()))
            .collect();
        for (path, contents) in &self.options.module_overrides {
            sources.insert(path.clone(), contents.clone());
        }

        let resolver = ImportResolver::new(|candidate: &Path| sources.contains_key(candidate));
        for (index, (path, contents)) in sources.iter().enumerate() {
            let source = SourceFile::new(SourceId(index as u32), path.clone(), contents.clone());
            let ast = match parse(&source) {
                Ok(ast) => ast,
                Err(error) => return Err(self.fail(Some(path.clone()), error.into())),
            };
            let imports = extract_imports(&ast, path, &resolver);
            debug!(path = %path.display(), imports = imports.len(), "parsed");
            self.modules
                .insert(path.clone(), ParsedModule { ast, imports });
        }
        Ok(())
    }

    fn check_missing_imports(&self) -> Result<(), BuildFailure> {
        if !self.options.reject_missing_imports {
            return Ok(());
        }
        for (path, module) in &self.modules {
            for record in &module.imports {
                if let Resolution::Missing(resolved) = &record.resolution {
                    let error = ResolveError::MissingModule {
                        import: record.node,
                        specifier: record.specifier.clone(),
                        resolved: resolved.clone(),
                    };
                    return Err(self.fail(Some(path.clone()), error.into()));
                }
            }
        }
        Ok(())
    }

    fn dependency_order(&self) -> Result<Vec<PathBuf>, BuildFailure> {
        let mut graph = DependencyGraph::new();
        for (path, module) in &self.modules {
            graph.add_node(path.clone());
            for record in &module.imports {
                if let Some(target) = record.resolved() {
                    graph.add_dependency(path.clone(), target.to_path_buf());
                }
            }
        }
        graph.sort().map_err(|cycle| {
            let first = cycle.path.first().cloned();
            self.fail(first, BuildError::Cycle(cycle))
        })
    }

    fn fail(&self, module: Option<PathBuf>, error: BuildError) -> BuildFailure {
        let diagnostics = self.diagnostics_for(module.as_deref(), &error);
        BuildFailure {
            phase: error.phase(),
            module,
            error,
            completed: self.completed.clone(),
            diagnostics,
        }
    }

    fn diagnostics_for(&self, module: Option<&Path>, error: &BuildError) -> Vec<Diagnostic> {
        let path = module.map(Path::to_path_buf);
        match error {
            BuildError::Syntax(error) => {
                vec![Diagnostic::error(error.message.clone(), path, Some(error.span))]
            }
            BuildError::Resolve(error) => {
                vec![Diagnostic::error(error.to_string(), path, Some(error.node().span))]
            }
            BuildError::Cycle(cycle) => self.cycle_diagnostics(cycle),
            BuildError::Name(error) => {
                let mut diagnostic =
                    Diagnostic::error(error.to_string(), path, Some(error.node().span));
                for note in name_error_notes(error) {
                    diagnostic = diagnostic.with_note(note);
                }
                vec![diagnostic]
            }
            BuildError::Type(error) => {
                vec![Diagnostic::error(error.to_string(), path, Some(error.node().span))]
            }
        }
    }

    /// One diagnostic per module of the cycle, placed at the import that
    /// continues the cycle.
    fn cycle_diagnostics(&self, cycle: &DependencyCycle<PathBuf>) -> Vec<Diagnostic> {
        let chain = cycle
            .path
            .iter()
            .map(|path| self.workspace.display_path(path))
            .collect::<Vec<_>>()
            .join(" -> ");

        cycle
            .path
            .windows(2)
            .map(|pair| {
                let (from, to) = (&pair[0], &pair[1]);
                let span = self.modules.get(from).and_then(|module| {
                    module
                        .imports
                        .iter()
                        .find(|record| record.resolved() == Some(to.as_path()))
                        .map(|record| record.node.span)
                });
                Diagnostic::error(format!("import cycle: {chain}"), Some(from.clone()), span)
            })
            .collect()
    }
}

fn name_error_notes(error: &NameError) -> Vec<String> {
    match error {
        NameError::UndefinedVariable { suggestions, .. } => match suggestions.as_slice() {
            [] => Vec::new(),
            [single] => vec![format!("did you mean `{single}`?")],
            many => vec![format!("did you mean one of: {}?", many.join(", "))],
        },
        NameError::DuplicateDeclaration { name, first, .. } => {
            vec![format!("`{name}` was first declared at {}", first.span)]
        }
        NameError::NameNotExported {
            available_exports, ..
        } => {
            if available_exports.is_empty() {
                vec!["the module exports nothing".to_string()]
            } else {
                let names: Vec<&str> = available_exports
                    .iter()
                    .map(|name| if name == DEFAULT_EXPORT { "default" } else { name })
                    .collect();
                vec![format!("available exports: {}", names.join(", "))]
            }
        }
        NameError::Unsupported { .. } => Vec::new(),
    }
}
