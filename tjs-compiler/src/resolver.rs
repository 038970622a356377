use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::trace;

use crate::ast::{
    ArrowBody, Expression, ExpressionKind, Identifier, ImportDeclaration, ImportedName, Module,
    NodeRef, Pattern, PatternKind, Statement, StatementKind, VariableDeclaration, DEFAULT_EXPORT,
};
use crate::errors::NameError;
use crate::imports::ImportRecord;

type Result<T> = std::result::Result<T, NameError>;

/// How "did you mean" candidates are chosen for undefined names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionPolicy {
    pub max_distance: usize,
    pub limit: usize,
}

impl Default for SuggestionPolicy {
    fn default() -> Self {
        Self {
            max_distance: 2,
            limit: 5,
        }
    }
}

/// Checks that every referenced name is declared, that no name is declared
/// twice across nested scopes, and that imported names are exported by their
/// source module. Stops at the first error.
pub struct NameResolver<'a> {
    scopes: Vec<HashMap<String, NodeRef>>,
    /// Export keys of this module, so each one is exported once.
    exported: HashMap<String, NodeRef>,
    exports: &'a BTreeMap<PathBuf, Vec<String>>,
    imports: &'a [ImportRecord],
    suggestions: SuggestionPolicy,
}

impl<'a> NameResolver<'a> {
    pub fn new(
        exports: &'a BTreeMap<PathBuf, Vec<String>>,
        imports: &'a [ImportRecord],
        suggestions: SuggestionPolicy,
    ) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            exported: HashMap::new(),
            exports,
            imports,
            suggestions,
        }
    }

    pub fn resolve_module(mut self, module: &Module) -> Result<()> {
        for statement in &module.statements {
            self.resolve_statement(statement)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, statement: &Statement) -> Result<()> {
        match &statement.kind {
            StatementKind::Variable(declaration) => self.resolve_declaration(declaration),
            StatementKind::ExportNamed(export) => {
                if export.source.is_some() {
                    return Err(NameError::Unsupported {
                        node: statement.node_ref(),
                    });
                }
                if let Some(declaration) = &export.declaration {
                    self.resolve_declaration(declaration)?;
                    for identifier in declaration.declared_names() {
                        self.export(&identifier.name, identifier.node_ref())?;
                    }
                }
                for specifier in &export.specifiers {
                    self.reference(&specifier.local.name, specifier.local.node_ref())?;
                    self.export(&specifier.exported.name, specifier.exported.node_ref())?;
                }
                Ok(())
            }
            StatementKind::ExportDefault(expression) => {
                self.resolve_expression(expression)?;
                self.export(DEFAULT_EXPORT, statement.node_ref())
            }
            StatementKind::Import(import) => self.resolve_import(statement, import),
            StatementKind::Block(statements) => {
                for inner in statements {
                    self.resolve_statement(inner)?;
                }
                Ok(())
            }
            StatementKind::Return(argument) => match argument {
                Some(expression) => self.resolve_expression(expression),
                None => Ok(()),
            },
            StatementKind::Expression(expression) => self.resolve_expression(expression),
            StatementKind::ExportAll(_) | StatementKind::If(_) | StatementKind::Function(_) => {
                Err(NameError::Unsupported {
                    node: statement.node_ref(),
                })
            }
        }
    }

    fn resolve_declaration(&mut self, declaration: &VariableDeclaration) -> Result<()> {
        for declarator in &declaration.declarators {
            // declared before its initializer so recursive arrows can refer to it
            self.declare_pattern(&declarator.target)?;
            if let Some(init) = &declarator.init {
                self.resolve_expression(init)?;
            }
        }
        Ok(())
    }

    fn declare_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        match &pattern.kind {
            PatternKind::Identifier(identifier) => self.declare_identifier(identifier),
            PatternKind::Object(properties) => {
                for property in properties {
                    let identifier = property.value.as_identifier().ok_or(NameError::Unsupported {
                        node: property.value.node_ref(),
                    })?;
                    self.declare_identifier(identifier)?;
                }
                Ok(())
            }
            PatternKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    let identifier = element.as_identifier().ok_or(NameError::Unsupported {
                        node: element.node_ref(),
                    })?;
                    self.declare_identifier(identifier)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_import(&mut self, statement: &Statement, import: &ImportDeclaration) -> Result<()> {
        let available = self
            .imports
            .iter()
            .find(|record| record.statement == statement.id)
            .and_then(|record| record.resolved())
            .and_then(|path| self.exports.get(path));

        for specifier in &import.specifiers {
            if let Some(key) = specifier.imported.export_key() {
                let exported = available
                    .map(|names| names.iter().any(|name| name == key))
                    .unwrap_or(false);
                if !exported {
                    return Err(NameError::NameNotExported {
                        import: statement.node_ref(),
                        specifier: specifier.node_ref(),
                        module_specifier: import.source.clone(),
                        imported: specifier.imported.clone(),
                        available_exports: available.cloned().unwrap_or_default(),
                    });
                }
            } else {
                debug_assert_eq!(specifier.imported, ImportedName::Namespace);
            }
            self.declare_identifier(&specifier.local)?;
        }
        Ok(())
    }

    fn resolve_expression(&mut self, expression: &Expression) -> Result<()> {
        match &expression.kind {
            ExpressionKind::Identifier(name) => self.reference(name, expression.node_ref()),
            ExpressionKind::Literal(_) => Ok(()),
            ExpressionKind::Unary(unary) => self.resolve_expression(&unary.operand),
            ExpressionKind::Binary(binary) => {
                self.resolve_expression(&binary.left)?;
                self.resolve_expression(&binary.right)
            }
            ExpressionKind::Logical(logical) => {
                self.resolve_expression(&logical.left)?;
                self.resolve_expression(&logical.right)
            }
            ExpressionKind::Conditional(conditional) => {
                self.resolve_expression(&conditional.test)?;
                self.resolve_expression(&conditional.consequent)?;
                self.resolve_expression(&conditional.alternate)
            }
            ExpressionKind::Call(call) => {
                self.resolve_expression(&call.callee)?;
                for argument in &call.arguments {
                    self.resolve_expression(argument)?;
                }
                Ok(())
            }
            ExpressionKind::Arrow(arrow) => {
                self.push_scope();
                let result = self.resolve_arrow(&arrow.params, &arrow.body);
                self.pop_scope();
                result
            }
            ExpressionKind::Object(properties) => {
                for property in properties {
                    self.resolve_expression(&property.value)?;
                }
                Ok(())
            }
            ExpressionKind::Array(elements) => {
                for element in elements {
                    self.resolve_expression(element)?;
                }
                Ok(())
            }
            ExpressionKind::Member(_) | ExpressionKind::Assignment(_) => {
                Err(NameError::Unsupported {
                    node: expression.node_ref(),
                })
            }
        }
    }

    fn resolve_arrow(&mut self, params: &[Pattern], body: &ArrowBody) -> Result<()> {
        for param in params {
            let identifier = param.as_identifier().ok_or(NameError::Unsupported {
                node: param.node_ref(),
            })?;
            self.declare_identifier(identifier)?;
        }
        match body {
            ArrowBody::Expression(expression) => self.resolve_expression(expression),
            ArrowBody::Block(statements) => {
                for statement in statements {
                    self.resolve_statement(statement)?;
                }
                Ok(())
            }
        }
    }

    fn declare_identifier(&mut self, identifier: &Identifier) -> Result<()> {
        self.declare(&identifier.name, identifier.node_ref())
    }

    fn declare(&mut self, name: &str, node: NodeRef) -> Result<()> {
        if let Some(first) = self.lookup(name) {
            return Err(NameError::DuplicateDeclaration {
                name: name.to_string(),
                first: *first,
                second: node,
            });
        }
        trace!(name, "declare");
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), node);
        }
        Ok(())
    }

    fn export(&mut self, key: &str, node: NodeRef) -> Result<()> {
        if let Some(first) = self.exported.get(key) {
            let name = if key == DEFAULT_EXPORT { "default" } else { key };
            return Err(NameError::DuplicateDeclaration {
                name: name.to_string(),
                first: *first,
                second: node,
            });
        }
        self.exported.insert(key.to_string(), node);
        Ok(())
    }

    fn reference(&self, name: &str, node: NodeRef) -> Result<()> {
        if self.lookup(name).is_some() {
            return Ok(());
        }
        Err(NameError::UndefinedVariable {
            name: name.to_string(),
            node,
            suggestions: self.suggest(name),
        })
    }

    fn lookup(&self, name: &str) -> Option<&NodeRef> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn suggest(&self, name: &str) -> Vec<String> {
        let in_scope = self
            .scopes
            .iter()
            .flat_map(|scope| scope.keys().map(String::as_str));
        let mut suggestions = tjs_support::search(name, in_scope, self.suggestions.max_distance);
        suggestions.truncate(self.suggestions.limit);
        suggestions
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
}
