mod env;
mod infer;
mod types;
mod unify;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use crate::ast::{
    ImportDeclaration, Module, NodeId, NodeRef, Statement, StatementKind, VariableDeclaration,
    DEFAULT_EXPORT,
};
use crate::errors::TypeError;
use crate::imports::ImportRecord;

pub use env::{instantiate, Environment};
pub use types::{join_types, Type, TypeVar};
pub use unify::{Substitution, UnifyError};

type Result<T> = std::result::Result<T, TypeError>;

/// Exported names of one module and their (usually generalized) types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModuleInterface {
    exports: BTreeMap<String, Type>,
}

impl ModuleInterface {
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.exports.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Type) {
        self.exports.insert(name.into(), ty);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.exports.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

/// Interfaces published so far in one build, keyed by module path. Entries
/// are only ever added.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct InterfaceRegistry {
    interfaces: BTreeMap<PathBuf, ModuleInterface>,
}

impl InterfaceRegistry {
    pub fn publish(&mut self, path: PathBuf, interface: ModuleInterface) {
        self.interfaces.entry(path).or_insert(interface);
    }

    pub fn get(&self, path: &Path) -> Option<&ModuleInterface> {
        self.interfaces.get(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeEntry {
    pub node: NodeRef,
    pub ty: Type,
}

/// Inferred types of one module's expressions, identifiers and declarations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeTable {
    entries: BTreeMap<NodeId, TypeEntry>,
}

impl TypeTable {
    /// The innermost recorded node covering a one-based position.
    pub fn type_at(&self, line: usize, column: usize) -> Option<&TypeEntry> {
        self.entries
            .values()
            .filter(|entry| entry.node.span.contains(line, column))
            .min_by_key(|entry| (entry.node.span.extent(), entry.node.id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ModuleAnalysis {
    pub path: PathBuf,
    /// Top-level bindings in declaration order.
    pub declarations: Vec<(String, Type)>,
    pub interface: ModuleInterface,
    pub types: TypeTable,
}

/// One module's inference session. Created per module and consumed by
/// [`TypeChecker::check_module`], so type variables never leak between modules.
pub struct TypeChecker<'a> {
    registry: &'a InterfaceRegistry,
    imports: &'a [ImportRecord],
    subst: Substitution,
    env: Environment,
    recorded: Vec<(NodeRef, Type)>,
    declarations: Vec<(String, Type)>,
    interface: ModuleInterface,
}

impl<'a> TypeChecker<'a> {
    pub fn new(registry: &'a InterfaceRegistry, imports: &'a [ImportRecord]) -> Self {
        Self {
            registry,
            imports,
            subst: Substitution::new(),
            env: Environment::new(),
            recorded: Vec::new(),
            declarations: Vec::new(),
            interface: ModuleInterface::default(),
        }
    }

    pub fn check_module(mut self, path: &Path, module: &Module) -> Result<ModuleAnalysis> {
        for statement in &module.statements {
            self.check_statement(statement)?;
        }

        let types = self.finish_types();
        debug!(
            path = %path.display(),
            exports = self.interface.len(),
            recorded = types.len(),
            "module typed"
        );
        Ok(ModuleAnalysis {
            path: path.to_path_buf(),
            declarations: self.declarations,
            interface: self.interface,
            types,
        })
    }

    fn check_statement(&mut self, statement: &Statement) -> Result<()> {
        match &statement.kind {
            StatementKind::Variable(declaration) => {
                self.check_declaration(declaration)?;
                Ok(())
            }
            StatementKind::ExportNamed(export) => {
                if export.source.is_some() {
                    return Err(TypeError::unsupported(
                        statement.node_ref(),
                        "re-exports cannot be type checked",
                    ));
                }
                if let Some(declaration) = &export.declaration {
                    let (name, scheme) = self.check_declaration(declaration)?;
                    self.interface.insert(name, scheme);
                }
                for specifier in &export.specifiers {
                    let ty = self.env.get(&specifier.local.name).cloned().ok_or_else(|| {
                        TypeError::unsupported(
                            specifier.local.node_ref(),
                            format!("`{}` has no type", specifier.local.name),
                        )
                    })?;
                    self.record(specifier.local.node_ref(), ty.clone());
                    self.interface.insert(specifier.exported.name.clone(), ty);
                }
                Ok(())
            }
            StatementKind::ExportDefault(expression) => {
                let ty = self.infer_expression(expression)?;
                let scheme = self.env.generalize(&self.subst, &ty);
                self.env.set(DEFAULT_EXPORT, scheme.clone());
                self.interface.insert(DEFAULT_EXPORT, scheme);
                Ok(())
            }
            StatementKind::Import(import) => self.check_import(statement, import),
            _ => Err(TypeError::unsupported(
                statement.node_ref(),
                "only declarations, imports and exports can be type checked at the top level",
            )),
        }
    }

    /// Infers a single-declarator binding, returning its name and scheme.
    fn check_declaration(&mut self, declaration: &VariableDeclaration) -> Result<(String, Type)> {
        let [declarator] = declaration.declarators.as_slice() else {
            return Err(TypeError::unsupported(
                declaration.node_ref(),
                "declarations must introduce exactly one binding",
            ));
        };
        let identifier = declarator.target.as_identifier().ok_or_else(|| {
            TypeError::unsupported(
                declarator.target.node_ref(),
                "destructuring declarations cannot be type checked",
            )
        })?;
        let init = declarator.init.as_ref().ok_or_else(|| {
            TypeError::unsupported(declarator.node_ref(), "declarations need an initializer")
        })?;

        let name = identifier.name.clone();
        let self_var = self.subst.fresh_var();
        self.env.set(name.clone(), self_var.clone());

        let ty = self.infer_expression(init)?;
        if let Err(error) = self.subst.unify(&self_var, &ty) {
            return Err(match error {
                UnifyError::InfiniteType { ty, .. } => TypeError::InfiniteType {
                    node: declarator.node_ref(),
                    ty,
                },
                _ => TypeError::Mismatch {
                    node: declarator.node_ref(),
                    expected: self.subst.apply(&self_var),
                    actual: self.subst.apply(&ty),
                },
            });
        }

        self.env.remove(&name);
        let scheme = self.env.generalize(&self.subst, &self_var);
        trace!(name = %name, ty = %scheme, "generalized");
        self.env.set(name.clone(), scheme.clone());
        self.record(identifier.node_ref(), scheme.clone());
        self.declarations.push((name.clone(), scheme.clone()));
        Ok((name, scheme))
    }

    fn check_import(&mut self, statement: &Statement, import: &ImportDeclaration) -> Result<()> {
        let interface = self
            .imports
            .iter()
            .find(|record| record.statement == statement.id)
            .and_then(|record| record.resolved())
            .and_then(|path| self.registry.get(path))
            .ok_or_else(|| TypeError::MissingInterface {
                node: statement.node_ref(),
                module_specifier: import.source.clone(),
                name: None,
            })?;

        for specifier in &import.specifiers {
            let key = specifier.imported.export_key().ok_or_else(|| {
                TypeError::unsupported(
                    specifier.node_ref(),
                    "namespace imports cannot be type checked",
                )
            })?;
            let ty = interface
                .get(key)
                .cloned()
                .ok_or_else(|| TypeError::MissingInterface {
                    node: specifier.node_ref(),
                    module_specifier: import.source.clone(),
                    name: Some(specifier.imported.to_string()),
                })?;
            self.record(specifier.local.node_ref(), ty.clone());
            self.env.set(specifier.local.name.clone(), ty);
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, node: NodeRef, ty: Type) {
        self.recorded.push((node, ty));
    }

    fn finish_types(&mut self) -> TypeTable {
        let mut entries = BTreeMap::new();
        for (node, ty) in self.recorded.drain(..) {
            let ty = self.subst.apply(&ty);
            entries.insert(node.id, TypeEntry { node, ty });
        }
        TypeTable { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::source::{SourceFile, SourceId};

    fn analyze(contents: &str) -> Result<ModuleAnalysis> {
        let source = SourceFile::new(SourceId(0), "/ws/a.js".into(), contents.to_string());
        let module = parse(&source).expect("parse");
        let registry = InterfaceRegistry::default();
        TypeChecker::new(&registry, &[]).check_module(Path::new("/ws/a.js"), &module)
    }

    fn declared(analysis: &ModuleAnalysis, name: &str) -> String {
        analysis
            .declarations
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, ty)| ty.to_string())
            .unwrap_or_else(|| panic!("`{name}` was not declared"))
    }

    #[test]
    fn identity_is_polymorphic() {
        let analysis = analyze("let id = x => x\nlet n = id(1)\nlet s = id('a')").expect("typed");
        assert_eq!(declared(&analysis, "id"), "forall 'a. ('a) -> 'a");
        assert_eq!(declared(&analysis, "n"), "number");
        assert_eq!(declared(&analysis, "s"), "string");
    }

    #[test]
    fn self_recursion_through_prebinding() {
        let analysis =
            analyze("let factorial = n => n <= 1 ? 1 : n * factorial(n - 1)").expect("typed");
        assert_eq!(declared(&analysis, "factorial"), "(number) -> number");
    }

    #[test]
    fn default_exports_are_generalized() {
        let analysis = analyze("export default (a, b) => a").expect("typed");
        let ty = analysis.interface.get(DEFAULT_EXPORT).expect("default export");
        assert_eq!(ty.to_string(), "forall 'a 'b. ('a, 'b) -> 'a");
    }

    #[test]
    fn export_lists_publish_current_bindings() {
        let analysis = analyze("let one = 1\nexport { one as uno }").expect("typed");
        assert_eq!(analysis.interface.get("uno"), Some(&Type::Number));
        assert_eq!(analysis.interface.get("one"), None);
    }

    #[test]
    fn hover_picks_the_innermost_node() {
        let analysis = analyze("let double = x => x * 2").expect("typed");
        // column 19 is the `x` in `x * 2`
        let entry = analysis.types.type_at(1, 19).expect("entry");
        assert_eq!(entry.ty, Type::Number);
        assert_eq!(entry.node.span.column, 19);
        let outer = analysis.types.type_at(1, 5).expect("declaration");
        assert_eq!(outer.ty.to_string(), "(number) -> number");
    }

    #[test]
    fn multiple_declarators_are_unsupported() {
        let error = analyze("let a = 1, b = 2").expect_err("should fail");
        assert!(matches!(error, TypeError::Unsupported { .. }), "found {error:?}");
    }

    #[test]
    fn missing_interfaces_are_reported() {
        let error = analyze("import x from './b.js'").expect_err("should fail");
        assert!(matches!(error, TypeError::MissingInterface { .. }), "found {error:?}");
    }
}
