use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub u32);

/// A monotype, or a `Scheme` quantifying some of its variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Number,
    String,
    Boolean,
    Null,
    Function(Vec<Type>, Box<Type>),
    Var(TypeVar),
    Scheme(Vec<TypeVar>, Box<Type>),
}

impl Type {
    pub fn function(params: Vec<Type>, result: Type) -> Self {
        Type::Function(params, Box::new(result))
    }

    /// Free variables in order of first appearance.
    pub fn free_type_vars(&self) -> Vec<TypeVar> {
        let mut vars = Vec::new();
        self.collect_free_vars(&[], &mut vars);
        vars
    }

    fn collect_free_vars(&self, bound: &[TypeVar], vars: &mut Vec<TypeVar>) {
        match self {
            Type::Var(var) => {
                if !bound.contains(var) && !vars.contains(var) {
                    vars.push(*var);
                }
            }
            Type::Function(params, result) => {
                for param in params {
                    param.collect_free_vars(bound, vars);
                }
                result.collect_free_vars(bound, vars);
            }
            Type::Scheme(quantified, body) => {
                let mut inner = bound.to_vec();
                inner.extend(quantified.iter().copied());
                body.collect_free_vars(&inner, vars);
            }
            Type::Number | Type::String | Type::Boolean | Type::Null => {}
        }
    }

    pub fn occurs(&self, var: TypeVar) -> bool {
        match self {
            Type::Var(other) => *other == var,
            Type::Function(params, result) => {
                params.iter().any(|param| param.occurs(var)) || result.occurs(var)
            }
            Type::Scheme(quantified, body) => !quantified.contains(&var) && body.occurs(var),
            Type::Number | Type::String | Type::Boolean | Type::Null => false,
        }
    }

    /// Renders the type with variables renamed `'a`, `'b`, ... in order of
    /// appearance, so equal types print identically whatever their ids.
    pub fn describe(&self) -> String {
        let mut names = HashMap::new();
        let mut output = String::new();
        self.write_normalized(&mut names, &mut output);
        output
    }

    fn write_normalized(&self, names: &mut HashMap<TypeVar, String>, output: &mut String) {
        match self {
            Type::Number => output.push_str("number"),
            Type::String => output.push_str("string"),
            Type::Boolean => output.push_str("boolean"),
            Type::Null => output.push_str("null"),
            Type::Var(var) => {
                let name = variable_name(names, *var);
                output.push_str(&name);
            }
            Type::Function(params, result) => {
                output.push('(');
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        output.push_str(", ");
                    }
                    param.write_normalized(names, output);
                }
                output.push_str(") -> ");
                result.write_normalized(names, output);
            }
            Type::Scheme(quantified, body) => {
                if quantified.is_empty() {
                    body.write_normalized(names, output);
                    return;
                }
                output.push_str("forall");
                for var in quantified {
                    output.push(' ');
                    let name = variable_name(names, *var);
                    output.push_str(&name);
                }
                output.push_str(". ");
                body.write_normalized(names, output);
            }
        }
    }
}

fn variable_name(names: &mut HashMap<TypeVar, String>, var: TypeVar) -> String {
    let next = names.len();
    names
        .entry(var)
        .or_insert_with(|| {
            if next < 26 {
                format!("'{}", (b'a' + next as u8) as char)
            } else {
                format!("'t{next}")
            }
        })
        .clone()
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.describe())
    }
}

/// Joins several types for messages, e.g. `number, string or boolean`.
pub fn join_types(types: &[Type]) -> String {
    match types {
        [] => String::new(),
        [single] => single.to_string(),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(Type::to_string).collect();
            format!("{} or {}", head.join(", "), last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renames_variables_in_order() {
        let ty = Type::function(vec![Type::Var(TypeVar(7)), Type::Var(TypeVar(3))], Type::Var(TypeVar(7)));
        assert_eq!(ty.to_string(), "('a, 'b) -> 'a");
    }

    #[test]
    fn schemes_show_quantifiers() {
        let identity = Type::Scheme(
            vec![TypeVar(4)],
            Box::new(Type::function(vec![Type::Var(TypeVar(4))], Type::Var(TypeVar(4)))),
        );
        assert_eq!(identity.to_string(), "forall 'a. ('a) -> 'a");
        assert!(identity.free_type_vars().is_empty());
    }

    #[test]
    fn free_vars_skip_bound_variables() {
        let scheme = Type::Scheme(
            vec![TypeVar(1)],
            Box::new(Type::function(vec![Type::Var(TypeVar(1))], Type::Var(TypeVar(2)))),
        );
        assert_eq!(scheme.free_type_vars(), vec![TypeVar(2)]);
        assert!(scheme.occurs(TypeVar(2)));
        assert!(!scheme.occurs(TypeVar(1)));
    }

    #[test]
    fn join_types_lists_alternatives() {
        assert_eq!(join_types(&[Type::Number]), "number");
        assert_eq!(
            join_types(&[Type::Number, Type::String, Type::Boolean]),
            "number, string or boolean"
        );
    }
}
