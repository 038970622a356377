use std::collections::HashMap;

use super::types::{Type, TypeVar};
use super::unify::Substitution;

/// Lexically nested bindings from names to types or schemes.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<HashMap<String, Type>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Writes into the innermost frame.
    pub fn set(&mut self, name: impl Into<String>, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), ty);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Type> {
        self.frames.last_mut().and_then(|frame| frame.remove(name))
    }

    /// Looks a name up from the outermost frame inward. The name checker has
    /// already rejected shadowing, so at most one frame holds a given name.
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.frames.iter().find_map(|frame| frame.get(name))
    }

    fn free_type_vars(&self, subst: &Substitution) -> Vec<TypeVar> {
        let mut vars = Vec::new();
        for ty in self.frames.iter().flat_map(|frame| frame.values()) {
            for var in subst.apply(ty).free_type_vars() {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
        }
        vars
    }

    /// Quantifies the variables of `ty` that are not free in the environment.
    pub fn generalize(&self, subst: &Substitution, ty: &Type) -> Type {
        let ty = subst.apply(ty);
        let env_vars = self.free_type_vars(subst);
        let quantified: Vec<TypeVar> = ty
            .free_type_vars()
            .into_iter()
            .filter(|var| !env_vars.contains(var))
            .collect();
        if quantified.is_empty() {
            ty
        } else {
            Type::Scheme(quantified, Box::new(ty))
        }
    }
}

/// Replaces a scheme's quantified variables with fresh ones. Monotypes are
/// returned unchanged.
pub fn instantiate(subst: &mut Substitution, ty: &Type) -> Type {
    match ty {
        Type::Scheme(quantified, body) => {
            let fresh: HashMap<TypeVar, Type> = quantified
                .iter()
                .map(|var| (*var, subst.fresh_var()))
                .collect();
            replace_vars(body, &fresh)
        }
        other => other.clone(),
    }
}

fn replace_vars(ty: &Type, mapping: &HashMap<TypeVar, Type>) -> Type {
    match ty {
        Type::Var(var) => mapping.get(var).cloned().unwrap_or_else(|| ty.clone()),
        Type::Function(params, result) => Type::Function(
            params.iter().map(|param| replace_vars(param, mapping)).collect(),
            Box::new(replace_vars(result, mapping)),
        ),
        Type::Scheme(quantified, body) => {
            let inner: HashMap<TypeVar, Type> = mapping
                .iter()
                .filter(|(var, _)| !quantified.contains(var))
                .map(|(var, ty)| (*var, ty.clone()))
                .collect();
            Type::Scheme(quantified.clone(), Box::new(replace_vars(body, &inner)))
        }
        Type::Number | Type::String | Type::Boolean | Type::Null => ty.clone(),
    }
}
