use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tjs_support::ordinal;

use crate::ast::{BinaryOperator, ImportedName, NodeRef, SourceSpan, UnaryOperator};
use crate::typechecker::{join_types, Type};

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: SourceSpan,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolveError {
    #[error("cannot find module '{specifier}' (looked for {})", .resolved.display())]
    MissingModule {
        import: NodeRef,
        specifier: String,
        resolved: PathBuf,
    },
}

impl ResolveError {
    pub fn node(&self) -> &NodeRef {
        match self {
            ResolveError::MissingModule { import, .. } => import,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NameError {
    #[error("`{name}` is not defined")]
    UndefinedVariable {
        name: String,
        node: NodeRef,
        suggestions: Vec<String>,
    },
    #[error("`{name}` is already declared at {}", .first.span)]
    DuplicateDeclaration {
        name: String,
        first: NodeRef,
        second: NodeRef,
    },
    #[error("{}", not_exported_message(.module_specifier, .imported))]
    NameNotExported {
        import: NodeRef,
        specifier: NodeRef,
        module_specifier: String,
        imported: ImportedName,
        available_exports: Vec<String>,
    },
    #[error("unsupported syntax: {}", .node.kind)]
    Unsupported { node: NodeRef },
}

impl NameError {
    /// The node the error should be reported at.
    pub fn node(&self) -> &NodeRef {
        match self {
            NameError::UndefinedVariable { node, .. } => node,
            NameError::DuplicateDeclaration { second, .. } => second,
            NameError::NameNotExported { specifier, .. } => specifier,
            NameError::Unsupported { node } => node,
        }
    }
}

fn not_exported_message(module_specifier: &str, imported: &ImportedName) -> String {
    match imported {
        ImportedName::Default => format!("'{module_specifier}' has no default export"),
        other => format!("'{module_specifier}' does not export `{other}`"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandSide {
    Left,
    Right,
}

impl fmt::Display for OperandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandSide::Left => f.write_str("left"),
            OperandSide::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeError {
    #[error(
        "`{operator}` expects both operands to share one of {}, found {left} and {right}",
        join_types(.allowed)
    )]
    BinaryMismatch {
        node: NodeRef,
        operator: BinaryOperator,
        left: Type,
        right: Type,
        allowed: Vec<Type>,
    },
    #[error(
        "`{operator}` cannot take {found} as its {side} operand, expected {}",
        join_types(.allowed)
    )]
    BinaryUnsupportedType {
        node: NodeRef,
        operator: String,
        side: OperandSide,
        found: Type,
        allowed: Vec<Type>,
    },
    #[error("`{operator}` cannot be applied to {found}, expected {}", join_types(.allowed))]
    UnaryUnsupportedType {
        node: NodeRef,
        operator: UnaryOperator,
        found: Type,
        allowed: Vec<Type>,
    },
    #[error(
        "{} expects {expected} argument{}, but {actual} {} given",
        callee_label(.fn_name),
        plural(.expected),
        was_or_were(.actual)
    )]
    ArityMismatch {
        node: NodeRef,
        fn_name: Option<String>,
        expected: usize,
        actual: usize,
    },
    #[error(
        "{} argument to {} should be {expected}, found {actual}",
        argument_position(.param_index),
        callee_label(.fn_name)
    )]
    ParamMismatch {
        node: NodeRef,
        argument: NodeRef,
        fn_name: Option<String>,
        param_index: usize,
        expected: Type,
        actual: Type,
    },
    #[error("expected {expected}, found {actual}")]
    Mismatch {
        node: NodeRef,
        expected: Type,
        actual: Type,
    },
    #[error("cannot construct the infinite type {ty}")]
    InfiniteType { node: NodeRef, ty: Type },
    #[error("cannot call a value of type {callee}")]
    NotCallable { node: NodeRef, callee: Type },
    #[error("{}", missing_interface_message(.module_specifier, .name))]
    MissingInterface {
        node: NodeRef,
        module_specifier: String,
        name: Option<String>,
    },
    #[error("type inference does not support {}: {reason}", .node.kind)]
    Unsupported { node: NodeRef, reason: String },
}

impl TypeError {
    pub fn unsupported(node: NodeRef, reason: impl Into<String>) -> Self {
        TypeError::Unsupported {
            node,
            reason: reason.into(),
        }
    }

    /// The node the error should be reported at.
    pub fn node(&self) -> &NodeRef {
        match self {
            TypeError::BinaryMismatch { node, .. }
            | TypeError::BinaryUnsupportedType { node, .. }
            | TypeError::UnaryUnsupportedType { node, .. }
            | TypeError::ArityMismatch { node, .. }
            | TypeError::Mismatch { node, .. }
            | TypeError::InfiniteType { node, .. }
            | TypeError::NotCallable { node, .. }
            | TypeError::MissingInterface { node, .. }
            | TypeError::Unsupported { node, .. } => node,
            TypeError::ParamMismatch { argument, .. } => argument,
        }
    }
}

fn callee_label(fn_name: &Option<String>) -> String {
    match fn_name {
        Some(name) => format!("`{name}`"),
        None => "function".to_string(),
    }
}

fn argument_position(index: &usize) -> String {
    ordinal(index + 1)
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 {
        ""
    } else {
        "s"
    }
}

fn was_or_were(count: &usize) -> &'static str {
    if *count == 1 {
        "was"
    } else {
        "were"
    }
}

fn missing_interface_message(module_specifier: &str, name: &Option<String>) -> String {
    match name {
        Some(name) => format!("no type is known for `{name}` exported by '{module_specifier}'"),
        None => format!("no type information is available for '{module_specifier}'"),
    }
}
