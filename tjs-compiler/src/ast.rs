use std::fmt;

use serde::Serialize;

/// Reserved export key used for `export default` and default imports.
pub const DEFAULT_EXPORT: &str = "__default__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    pub fn single_point(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    pub fn union(a: &Self, b: &Self) -> Self {
        if a.line == 0 {
            return *b;
        }
        if b.line == 0 {
            return *a;
        }

        let (start_line, start_column) =
            if (a.line < b.line) || (a.line == b.line && a.column <= b.column) {
                (a.line, a.column)
            } else {
                (b.line, b.column)
            };

        let (end_line, end_column) = if (a.end_line > b.end_line)
            || (a.end_line == b.end_line && a.end_column >= b.end_column)
        {
            (a.end_line, a.end_column)
        } else {
            (b.end_line, b.end_column)
        };

        Self::new(start_line, start_column, end_line, end_column)
    }

    /// True when the one-based `line`/`column` falls inside the span.
    pub fn contains(&self, line: usize, column: usize) -> bool {
        if line < self.line || line > self.end_line {
            return false;
        }
        if line == self.line && column < self.column {
            return false;
        }
        if line == self.end_line && column > self.end_column {
            return false;
        }
        true
    }

    /// Rough size used to pick the innermost of several covering spans.
    pub fn extent(&self) -> (usize, usize) {
        let lines = self.end_line.saturating_sub(self.line);
        let columns = if lines == 0 {
            self.end_column.saturating_sub(self.column)
        } else {
            self.end_column
        };
        (lines, columns)
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self {
            line: 0,
            column: 0,
            end_line: 0,
            end_column: 0,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identity of a node, unique within one parsed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Syntactic node kinds, named after their ESTree counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Identifier,
    Literal,
    UnaryExpression,
    BinaryExpression,
    LogicalExpression,
    ConditionalExpression,
    CallExpression,
    ArrowFunctionExpression,
    ObjectExpression,
    ArrayExpression,
    MemberExpression,
    AssignmentExpression,
    VariableDeclaration,
    VariableDeclarator,
    ObjectPattern,
    ArrayPattern,
    ExportNamedDeclaration,
    ExportDefaultDeclaration,
    ExportAllDeclaration,
    ExportSpecifier,
    ImportDeclaration,
    ImportSpecifier,
    ImportDefaultSpecifier,
    ImportNamespaceSpecifier,
    BlockStatement,
    ReturnStatement,
    ExpressionStatement,
    IfStatement,
    FunctionDeclaration,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A reference to a node carried by errors and type tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: SourceSpan,
}

impl NodeRef {
    pub fn new(id: NodeId, kind: NodeKind, span: SourceSpan) -> Self {
        Self { id, kind, span }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub statements: Vec<Statement>,
}

impl Module {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn imports(&self) -> impl Iterator<Item = (&Statement, &ImportDeclaration)> {
        self.statements
            .iter()
            .filter_map(|statement| match &statement.kind {
                StatementKind::Import(import) => Some((statement, import)),
                _ => None,
            })
    }
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: NodeId,
    pub span: SourceSpan,
    pub kind: StatementKind,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Variable(VariableDeclaration),
    ExportNamed(ExportNamedDeclaration),
    ExportDefault(Expression),
    ExportAll(ExportAllDeclaration),
    Import(ImportDeclaration),
    Block(Vec<Statement>),
    Return(Option<Expression>),
    Expression(Expression),
    If(IfStatement),
    Function(FunctionDeclaration),
}

impl Statement {
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            StatementKind::Variable(_) => NodeKind::VariableDeclaration,
            StatementKind::ExportNamed(_) => NodeKind::ExportNamedDeclaration,
            StatementKind::ExportDefault(_) => NodeKind::ExportDefaultDeclaration,
            StatementKind::ExportAll(_) => NodeKind::ExportAllDeclaration,
            StatementKind::Import(_) => NodeKind::ImportDeclaration,
            StatementKind::Block(_) => NodeKind::BlockStatement,
            StatementKind::Return(_) => NodeKind::ReturnStatement,
            StatementKind::Expression(_) => NodeKind::ExpressionStatement,
            StatementKind::If(_) => NodeKind::IfStatement,
            StatementKind::Function(_) => NodeKind::FunctionDeclaration,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, self.node_kind(), self.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub span: SourceSpan,
    pub kind: DeclarationKind,
    pub declarators: Vec<VariableDeclarator>,
}

impl VariableDeclaration {
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, NodeKind::VariableDeclaration, self.span)
    }

    /// Names introduced by every declarator, in source order.
    pub fn declared_names(&self) -> Vec<&Identifier> {
        let mut names = Vec::new();
        for declarator in &self.declarators {
            declarator.target.collect_identifiers(&mut names);
        }
        names
    }
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: NodeId,
    pub span: SourceSpan,
    pub target: Pattern,
    pub init: Option<Expression>,
}

impl VariableDeclarator {
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, NodeKind::VariableDeclarator, self.span)
    }
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub id: NodeId,
    pub name: String,
    pub span: SourceSpan,
}

impl Identifier {
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, NodeKind::Identifier, self.span)
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: NodeId,
    pub span: SourceSpan,
    pub kind: PatternKind,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Identifier(Identifier),
    Object(Vec<PropertyPattern>),
    Array(Vec<Option<Pattern>>),
}

#[derive(Debug, Clone)]
pub struct PropertyPattern {
    pub key: Identifier,
    pub value: Pattern,
}

impl Pattern {
    pub fn node_kind(&self) -> NodeKind {
        match self.kind {
            PatternKind::Identifier(_) => NodeKind::Identifier,
            PatternKind::Object(_) => NodeKind::ObjectPattern,
            PatternKind::Array(_) => NodeKind::ArrayPattern,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, self.node_kind(), self.span)
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match &self.kind {
            PatternKind::Identifier(identifier) => Some(identifier),
            _ => None,
        }
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a Identifier>) {
        match &self.kind {
            PatternKind::Identifier(identifier) => names.push(identifier),
            PatternKind::Object(properties) => {
                for property in properties {
                    property.value.collect_identifiers(names);
                }
            }
            PatternKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    element.collect_identifiers(names);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportNamedDeclaration {
    pub declaration: Option<VariableDeclaration>,
    pub specifiers: Vec<ExportSpecifier>,
    /// Present for re-exports such as `export { a } from "./a.js"`.
    pub source: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportSpecifier {
    pub id: NodeId,
    pub span: SourceSpan,
    pub local: Identifier,
    pub exported: Identifier,
}

#[derive(Debug, Clone)]
pub struct ExportAllDeclaration {
    pub source: String,
    pub source_span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    pub source: String,
    pub source_span: SourceSpan,
    pub specifiers: Vec<ImportSpecifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ImportedName {
    Default,
    Named(String),
    Namespace,
}

impl ImportedName {
    /// The key this import looks up in the source module's export list.
    pub fn export_key(&self) -> Option<&str> {
        match self {
            ImportedName::Default => Some(DEFAULT_EXPORT),
            ImportedName::Named(name) => Some(name),
            ImportedName::Namespace => None,
        }
    }
}

impl fmt::Display for ImportedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportedName::Default => f.write_str("default"),
            ImportedName::Named(name) => f.write_str(name),
            ImportedName::Namespace => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSpecifier {
    pub id: NodeId,
    pub span: SourceSpan,
    pub local: Identifier,
    pub imported: ImportedName,
}

impl ImportSpecifier {
    pub fn node_ref(&self) -> NodeRef {
        let kind = match self.imported {
            ImportedName::Default => NodeKind::ImportDefaultSpecifier,
            ImportedName::Named(_) => NodeKind::ImportSpecifier,
            ImportedName::Namespace => NodeKind::ImportNamespaceSpecifier,
        };
        NodeRef::new(self.id, kind, self.span)
    }
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
}

#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: Identifier,
    pub params: Vec<Pattern>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub id: NodeId,
    pub span: SourceSpan,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Identifier(String),
    Literal(Literal),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Conditional(ConditionalExpression),
    Call(CallExpression),
    Arrow(ArrowFunction),
    Object(Vec<Property>),
    Array(Vec<Expression>),
    Member(MemberExpression),
    Assignment(AssignmentExpression),
}

impl Expression {
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            ExpressionKind::Identifier(_) => NodeKind::Identifier,
            ExpressionKind::Literal(_) => NodeKind::Literal,
            ExpressionKind::Unary(_) => NodeKind::UnaryExpression,
            ExpressionKind::Binary(_) => NodeKind::BinaryExpression,
            ExpressionKind::Logical(_) => NodeKind::LogicalExpression,
            ExpressionKind::Conditional(_) => NodeKind::ConditionalExpression,
            ExpressionKind::Call(_) => NodeKind::CallExpression,
            ExpressionKind::Arrow(_) => NodeKind::ArrowFunctionExpression,
            ExpressionKind::Object(_) => NodeKind::ObjectExpression,
            ExpressionKind::Array(_) => NodeKind::ArrayExpression,
            ExpressionKind::Member(_) => NodeKind::MemberExpression,
            ExpressionKind::Assignment(_) => NodeKind::AssignmentExpression,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.id, self.node_kind(), self.span)
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    BigInt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "typeof")]
    Typeof,
    #[serde(rename = "void")]
    Void,
    #[serde(rename = "delete")]
    Delete,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Not => "!",
            UnaryOperator::Typeof => "typeof",
            UnaryOperator::Void => "void",
            UnaryOperator::Delete => "delete",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Remainder,
    #[serde(rename = "**")]
    Exponent,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "<<")]
    ShiftLeft,
    #[serde(rename = ">>")]
    ShiftRight,
    #[serde(rename = ">>>")]
    UnsignedShiftRight,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "===")]
    StrictEqual,
    #[serde(rename = "!==")]
    StrictNotEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "instanceof")]
    InstanceOf,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Exponent => "**",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::UnsignedShiftRight => ">>>",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::In => "in",
            BinaryOperator::InstanceOf => "instanceof",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOperator {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "??")]
    Coalesce,
}

impl LogicalOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
            LogicalOperator::Coalesce => "??",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone)]
pub struct LogicalExpression {
    pub operator: LogicalOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct ArrowFunction {
    pub params: Vec<Pattern>,
    pub body: ArrowBody,
}

#[derive(Debug, Clone)]
pub enum ArrowBody {
    Expression(Box<Expression>),
    Block(Vec<Statement>),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub key_span: SourceSpan,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: MemberProperty,
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    pub operator: String,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_contains_respects_inclusive_end() {
        let span = SourceSpan::new(2, 5, 2, 9);
        assert!(span.contains(2, 5));
        assert!(span.contains(2, 9));
        assert!(!span.contains(2, 10));
        assert!(!span.contains(1, 7));
    }

    #[test]
    fn union_covers_both_spans() {
        let a = SourceSpan::new(1, 4, 1, 6);
        let b = SourceSpan::new(3, 1, 3, 2);
        assert_eq!(SourceSpan::union(&a, &b), SourceSpan::new(1, 4, 3, 2));
        assert_eq!(SourceSpan::union(&SourceSpan::default(), &b), b);
    }
}
