mod ast;
mod compiler;
mod diagnostics;
mod errors;
mod graph;
mod imports;
mod lexer;
mod parser;
mod resolver;
mod source;
mod typechecker;
mod workspace;

pub use crate::ast::{
    ArrowBody, ArrowFunction, AssignmentExpression, BinaryExpression, BinaryOperator,
    CallExpression, ConditionalExpression, DeclarationKind, ExportAllDeclaration,
    ExportNamedDeclaration, ExportSpecifier, Expression, ExpressionKind, FunctionDeclaration,
    Identifier, IfStatement, ImportDeclaration, ImportSpecifier, ImportedName, Literal,
    LogicalExpression, LogicalOperator, MemberExpression, MemberProperty, Module, NodeId,
    NodeKind, NodeRef, Pattern, PatternKind, Property, PropertyPattern, SourceSpan, Statement,
    StatementKind, UnaryExpression, UnaryOperator, VariableDeclaration, VariableDeclarator,
    DEFAULT_EXPORT,
};
pub use crate::compiler::{BuildError, BuildFailure, BuildPhase, Compilation, CompileOptions, Compiler};
pub use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use crate::errors::{NameError, OperandSide, ResolveError, SyntaxError, TypeError};
pub use crate::graph::{topological_sort, DependencyCycle, DependencyGraph};
pub use crate::imports::{extract_exports, extract_imports, ImportRecord, ImportResolver, Resolution};
pub use crate::lexer::{Keyword, Lexer, Token, TokenKind};
pub use crate::parser::{parse, Parser};
pub use crate::resolver::{NameResolver, SuggestionPolicy};
pub use crate::source::{source_line, SourceFile, SourceId};
pub use crate::typechecker::{
    instantiate, join_types, Environment, InterfaceRegistry, ModuleAnalysis, ModuleInterface,
    Substitution, Type, TypeChecker, TypeEntry, TypeTable, TypeVar, UnifyError,
};
pub use crate::workspace::{is_source_file, Workspace, SOURCE_EXTENSIONS};
