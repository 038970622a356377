use thiserror::Error;

use super::types::{Type, TypeVar};

/// Bindings from type variables to types. Variable ids index into the arena,
/// so allocating a fresh variable and reserving its slot are the same step.
#[derive(Debug, Default, Clone)]
pub struct Substitution {
    slots: Vec<Option<Type>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnifyError {
    #[error("cannot unify {left} with {right}")]
    Mismatch { left: Type, right: Type },
    #[error("function arity {left} does not match {right}")]
    Arity { left: usize, right: usize },
    #[error("parameter {index} mismatch: {left} vs {right}")]
    Parameter {
        index: usize,
        left: Type,
        right: Type,
    },
    #[error("return type mismatch: {left} vs {right}")]
    Return { left: Type, right: Type },
    #[error("infinite type: {var:?} occurs in {ty}")]
    InfiniteType { var: TypeVar, ty: Type },
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_var(&mut self) -> Type {
        let var = TypeVar(self.slots.len() as u32);
        self.slots.push(None);
        Type::Var(var)
    }

    pub fn lookup(&self, var: TypeVar) -> Option<&Type> {
        self.slots.get(var.0 as usize).and_then(Option::as_ref)
    }

    fn bind(&mut self, var: TypeVar, ty: Type) {
        let index = var.0 as usize;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(ty);
    }

    /// Follows variable bindings at the top level only.
    pub fn resolve(&self, ty: &Type) -> Type {
        let mut current = ty;
        while let Type::Var(var) = current {
            match self.lookup(*var) {
                Some(bound) => current = bound,
                None => break,
            }
        }
        current.clone()
    }

    /// Replaces every bound variable, recursively.
    pub fn apply(&self, ty: &Type) -> Type {
        self.apply_with_bound(ty, &[])
    }

    fn apply_with_bound(&self, ty: &Type, bound: &[TypeVar]) -> Type {
        match ty {
            Type::Var(var) if bound.contains(var) => ty.clone(),
            Type::Var(var) => match self.lookup(*var) {
                Some(target) => self.apply_with_bound(target, bound),
                None => ty.clone(),
            },
            Type::Function(params, result) => Type::Function(
                params
                    .iter()
                    .map(|param| self.apply_with_bound(param, bound))
                    .collect(),
                Box::new(self.apply_with_bound(result, bound)),
            ),
            Type::Scheme(quantified, body) => {
                let mut inner = bound.to_vec();
                inner.extend(quantified.iter().copied());
                Type::Scheme(
                    quantified.clone(),
                    Box::new(self.apply_with_bound(body, &inner)),
                )
            }
            Type::Number | Type::String | Type::Boolean | Type::Null => ty.clone(),
        }
    }

    /// Makes `left` and `right` equal, extending the substitution. Bindings
    /// made before a failure are kept.
    pub fn unify(&mut self, left: &Type, right: &Type) -> Result<(), UnifyError> {
        let left = self.resolve(left);
        let right = self.resolve(right);

        match (&left, &right) {
            (Type::Var(a), Type::Var(b)) if a == b => Ok(()),
            (Type::Var(var), other) | (other, Type::Var(var)) => self.bind_var(*var, other),
            (Type::Number, Type::Number)
            | (Type::String, Type::String)
            | (Type::Boolean, Type::Boolean)
            | (Type::Null, Type::Null) => Ok(()),
            (Type::Function(left_params, left_result), Type::Function(right_params, right_result)) => {
                if left_params.len() != right_params.len() {
                    return Err(UnifyError::Arity {
                        left: left_params.len(),
                        right: right_params.len(),
                    });
                }
                for (index, (a, b)) in left_params.iter().zip(right_params).enumerate() {
                    if let Err(error) = self.unify(a, b) {
                        if let UnifyError::InfiniteType { .. } = error {
                            return Err(error);
                        }
                        return Err(UnifyError::Parameter {
                            index,
                            left: self.apply(a),
                            right: self.apply(b),
                        });
                    }
                }
                self.unify(left_result, right_result).map_err(|error| match error {
                    UnifyError::InfiniteType { .. } => error,
                    _ => UnifyError::Return {
                        left: self.apply(left_result),
                        right: self.apply(right_result),
                    },
                })
            }
            _ => Err(UnifyError::Mismatch {
                left: self.apply(&left),
                right: self.apply(&right),
            }),
        }
    }

    fn bind_var(&mut self, var: TypeVar, ty: &Type) -> Result<(), UnifyError> {
        let ty = self.apply(ty);
        if ty.occurs(var) {
            return Err(UnifyError::InfiniteType { var, ty });
        }
        self.bind(var, ty);
        Ok(())
    }
}
