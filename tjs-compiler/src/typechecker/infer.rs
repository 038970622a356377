use crate::ast::{
    ArrowBody, ArrowFunction, BinaryExpression, BinaryOperator, CallExpression,
    ConditionalExpression, Expression, ExpressionKind, Literal, LogicalExpression,
    LogicalOperator, UnaryExpression, UnaryOperator,
};
use crate::errors::{OperandSide, TypeError};

use super::env::instantiate;
use super::types::Type;
use super::unify::UnifyError;
use super::{Result, TypeChecker};

enum BinaryClass {
    /// Operands share a number type, the result is number.
    Arithmetic,
    /// Operands share a number type, the result is boolean.
    Comparison,
    /// Operands share any type, the result is boolean.
    Equality,
}

fn classify(operator: BinaryOperator) -> Option<BinaryClass> {
    use BinaryOperator::*;
    match operator {
        Add | Subtract | Multiply | Divide | Remainder | Exponent | BitOr | BitAnd | BitXor
        | ShiftLeft | ShiftRight | UnsignedShiftRight => Some(BinaryClass::Arithmetic),
        Less | Greater | LessEqual | GreaterEqual => Some(BinaryClass::Comparison),
        Equal | NotEqual | StrictEqual | StrictNotEqual => Some(BinaryClass::Equality),
        In | InstanceOf => None,
    }
}

impl<'a> TypeChecker<'a> {
    pub(super) fn infer_expression(&mut self, expression: &Expression) -> Result<Type> {
        let ty = match &expression.kind {
            ExpressionKind::Identifier(name) => {
                let binding = self.env.get(name).cloned().ok_or_else(|| {
                    TypeError::unsupported(expression.node_ref(), format!("`{name}` is unbound"))
                })?;
                instantiate(&mut self.subst, &binding)
            }
            ExpressionKind::Literal(literal) => match literal {
                Literal::Number(_) => Type::Number,
                Literal::String(_) => Type::String,
                Literal::Boolean(_) => Type::Boolean,
                Literal::Null => Type::Null,
                Literal::BigInt(_) => {
                    return Err(TypeError::unsupported(
                        expression.node_ref(),
                        "bigint literals have no type",
                    ))
                }
            },
            ExpressionKind::Unary(unary) => self.infer_unary(expression, unary)?,
            ExpressionKind::Binary(binary) => self.infer_binary(expression, binary)?,
            ExpressionKind::Logical(logical) => self.infer_logical(expression, logical)?,
            ExpressionKind::Conditional(conditional) => self.infer_conditional(conditional)?,
            ExpressionKind::Arrow(arrow) => self.infer_arrow(expression, arrow)?,
            ExpressionKind::Call(call) => self.infer_call(expression, call)?,
            ExpressionKind::Object(_) => {
                return Err(TypeError::unsupported(
                    expression.node_ref(),
                    "object literals have no type",
                ))
            }
            ExpressionKind::Array(_) => {
                return Err(TypeError::unsupported(
                    expression.node_ref(),
                    "array literals have no type",
                ))
            }
            ExpressionKind::Member(_) | ExpressionKind::Assignment(_) => {
                return Err(TypeError::unsupported(
                    expression.node_ref(),
                    "expression cannot be type checked",
                ))
            }
        };

        self.record(expression.node_ref(), ty.clone());
        Ok(ty)
    }

    fn infer_unary(&mut self, expression: &Expression, unary: &UnaryExpression) -> Result<Type> {
        let expected = match unary.operator {
            UnaryOperator::Minus | UnaryOperator::Plus | UnaryOperator::BitNot => Type::Number,
            UnaryOperator::Not => Type::Boolean,
            UnaryOperator::Typeof | UnaryOperator::Void | UnaryOperator::Delete => {
                return Err(TypeError::unsupported(
                    expression.node_ref(),
                    format!("`{}` cannot be type checked", unary.operator),
                ))
            }
        };

        let operand = self.infer_expression(&unary.operand)?;
        if self.subst.unify(&operand, &expected).is_err() {
            return Err(TypeError::UnaryUnsupportedType {
                node: expression.node_ref(),
                operator: unary.operator,
                found: self.subst.apply(&operand),
                allowed: vec![expected],
            });
        }
        Ok(expected)
    }

    fn infer_binary(&mut self, expression: &Expression, binary: &BinaryExpression) -> Result<Type> {
        let class = classify(binary.operator).ok_or_else(|| {
            TypeError::unsupported(
                expression.node_ref(),
                format!("`{}` cannot be type checked", binary.operator),
            )
        })?;

        let left = self.infer_expression(&binary.left)?;
        let right = self.infer_expression(&binary.right)?;

        let allowed = match class {
            BinaryClass::Equality => vec![Type::Number, Type::String, Type::Boolean],
            BinaryClass::Arithmetic | BinaryClass::Comparison => vec![Type::Number],
        };
        if self.subst.unify(&left, &right).is_err() {
            return Err(TypeError::BinaryMismatch {
                node: expression.node_ref(),
                operator: binary.operator,
                left: self.subst.apply(&left),
                right: self.subst.apply(&right),
                allowed,
            });
        }

        match class {
            BinaryClass::Equality => Ok(Type::Boolean),
            BinaryClass::Arithmetic | BinaryClass::Comparison => {
                if self.subst.unify(&left, &Type::Number).is_err() {
                    return Err(TypeError::BinaryUnsupportedType {
                        node: expression.node_ref(),
                        operator: binary.operator.to_string(),
                        side: OperandSide::Left,
                        found: self.subst.apply(&left),
                        allowed,
                    });
                }
                Ok(match class {
                    BinaryClass::Comparison => Type::Boolean,
                    _ => Type::Number,
                })
            }
        }
    }

    fn infer_logical(
        &mut self,
        expression: &Expression,
        logical: &LogicalExpression,
    ) -> Result<Type> {
        if logical.operator == LogicalOperator::Coalesce {
            return Err(TypeError::unsupported(
                expression.node_ref(),
                "`??` cannot be type checked",
            ));
        }

        for (side, operand) in [
            (OperandSide::Left, &logical.left),
            (OperandSide::Right, &logical.right),
        ] {
            let ty = self.infer_expression(operand)?;
            if self.subst.unify(&ty, &Type::Boolean).is_err() {
                return Err(TypeError::BinaryUnsupportedType {
                    node: expression.node_ref(),
                    operator: logical.operator.to_string(),
                    side,
                    found: self.subst.apply(&ty),
                    allowed: vec![Type::Boolean],
                });
            }
        }
        Ok(Type::Boolean)
    }

    fn infer_conditional(&mut self, conditional: &ConditionalExpression) -> Result<Type> {
        let test = self.infer_expression(&conditional.test)?;
        if self.subst.unify(&test, &Type::Boolean).is_err() {
            return Err(TypeError::Mismatch {
                node: conditional.test.node_ref(),
                expected: Type::Boolean,
                actual: self.subst.apply(&test),
            });
        }

        let consequent = self.infer_expression(&conditional.consequent)?;
        let alternate = self.infer_expression(&conditional.alternate)?;
        if self.subst.unify(&consequent, &alternate).is_err() {
            return Err(TypeError::Mismatch {
                node: conditional.alternate.node_ref(),
                expected: self.subst.apply(&consequent),
                actual: self.subst.apply(&alternate),
            });
        }
        Ok(self.subst.apply(&consequent))
    }

    fn infer_arrow(&mut self, expression: &Expression, arrow: &ArrowFunction) -> Result<Type> {
        self.env.push();
        let result = self.infer_arrow_body(expression, arrow);
        self.env.pop();
        result
    }

    fn infer_arrow_body(&mut self, expression: &Expression, arrow: &ArrowFunction) -> Result<Type> {
        let mut params = Vec::with_capacity(arrow.params.len());
        for param in &arrow.params {
            let identifier = param.as_identifier().ok_or_else(|| {
                TypeError::unsupported(param.node_ref(), "parameters must be plain identifiers")
            })?;
            let ty = self.subst.fresh_var();
            self.env.set(identifier.name.clone(), ty.clone());
            self.record(identifier.node_ref(), ty.clone());
            params.push(ty);
        }

        let body = match &arrow.body {
            ArrowBody::Expression(body) => self.infer_expression(body)?,
            ArrowBody::Block(_) => {
                return Err(TypeError::unsupported(
                    expression.node_ref(),
                    "block-bodied arrow functions cannot be type checked",
                ))
            }
        };

        let params = params.iter().map(|param| self.subst.apply(param)).collect();
        Ok(Type::function(params, self.subst.apply(&body)))
    }

    fn infer_call(&mut self, expression: &Expression, call: &CallExpression) -> Result<Type> {
        let callee = self.infer_expression(&call.callee)?;
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.infer_expression(argument)?);
        }

        let result = self.subst.fresh_var();
        let expected = Type::function(arguments, result.clone());
        let fn_name = call.callee.as_identifier().map(str::to_string);

        match self.subst.unify(&callee, &expected) {
            Ok(()) => Ok(self.subst.apply(&result)),
            Err(UnifyError::Arity { left, right }) => Err(TypeError::ArityMismatch {
                node: expression.node_ref(),
                fn_name,
                expected: left,
                actual: right,
            }),
            Err(UnifyError::Parameter { index, left, right }) => {
                let argument = call
                    .arguments
                    .get(index)
                    .map(Expression::node_ref)
                    .unwrap_or_else(|| expression.node_ref());
                Err(TypeError::ParamMismatch {
                    node: expression.node_ref(),
                    argument,
                    fn_name,
                    param_index: index,
                    expected: left,
                    actual: right,
                })
            }
            Err(UnifyError::InfiniteType { ty, .. }) => Err(TypeError::InfiniteType {
                node: expression.node_ref(),
                ty,
            }),
            Err(UnifyError::Mismatch { .. }) | Err(UnifyError::Return { .. }) => {
                Err(TypeError::NotCallable {
                    node: expression.node_ref(),
                    callee: self.subst.apply(&callee),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::super::{InterfaceRegistry, ModuleAnalysis};
    use super::*;
    use crate::parser::parse;
    use crate::source::{SourceFile, SourceId};

    fn analyze(contents: &str) -> Result<ModuleAnalysis> {
        let source = SourceFile::new(SourceId(0), "/ws/a.js".into(), contents.to_string());
        let module = parse(&source).expect("parse");
        let registry = InterfaceRegistry::default();
        TypeChecker::new(&registry, &[]).check_module(Path::new("/ws/a.js"), &module)
    }

    #[test]
    fn arithmetic_on_mixed_operands_is_a_mismatch() {
        let error = analyze("let a = 1 + 'x'").expect_err("should fail");
        let TypeError::BinaryMismatch { left, right, operator, .. } = error else {
            panic!("expected binary mismatch, found {error:?}");
        };
        assert_eq!(operator, BinaryOperator::Add);
        assert_eq!((left, right), (Type::Number, Type::String));
    }

    #[test]
    fn arithmetic_on_strings_is_unsupported() {
        let error = analyze("let a = 'x' * 'y'").expect_err("should fail");
        assert!(
            matches!(
                error,
                TypeError::BinaryUnsupportedType { side: OperandSide::Left, found: Type::String, .. }
            ),
            "found {error:?}"
        );
    }

    #[test]
    fn equality_accepts_matching_strings() {
        let analysis = analyze("let same = 'a' === 'b'").expect("typed");
        assert_eq!(analysis.declarations[0].1, Type::Boolean);
    }

    #[test]
    fn logical_operands_must_be_boolean() {
        let error = analyze("let a = true && 1").expect_err("should fail");
        assert!(
            matches!(
                error,
                TypeError::BinaryUnsupportedType { side: OperandSide::Right, found: Type::Number, .. }
            ),
            "found {error:?}"
        );
    }

    #[test]
    fn arity_mismatch_names_the_callee() {
        let error = analyze("let add = (a, b) => a + b\nlet three = add(1)").expect_err("should fail");
        assert_eq!(
            error,
            TypeError::ArityMismatch {
                node: *error.node(),
                fn_name: Some("add".into()),
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn parameter_mismatch_points_at_the_argument() {
        let error = analyze("let add = (a, b) => a + b\nlet x = add(1, 'two')").expect_err("should fail");
        let TypeError::ParamMismatch { argument, param_index, expected, actual, .. } = error else {
            panic!("expected parameter mismatch, found {error:?}");
        };
        assert_eq!(param_index, 1);
        assert_eq!((expected, actual), (Type::Number, Type::String));
        assert_eq!(argument.span.column, 16);
    }

    #[test]
    fn calling_a_number_is_not_callable() {
        let error = analyze("let n = 1\nlet x = n(2)").expect_err("should fail");
        assert!(
            matches!(error, TypeError::NotCallable { callee: Type::Number, .. }),
            "found {error:?}"
        );
    }

    #[test]
    fn self_application_is_an_infinite_type() {
        let error = analyze("let omega = x => x(x)").expect_err("should fail");
        assert!(matches!(error, TypeError::InfiniteType { .. }), "found {error:?}");
    }

    #[test]
    fn conditional_branches_must_agree() {
        let error = analyze("let pick = c => c ? 1 : 'one'").expect_err("should fail");
        assert!(
            matches!(
                error,
                TypeError::Mismatch { expected: Type::Number, actual: Type::String, .. }
            ),
            "found {error:?}"
        );
    }

    #[test]
    fn block_bodies_are_unsupported() {
        let error = analyze("let f = x => { return x }").expect_err("should fail");
        assert!(matches!(error, TypeError::Unsupported { .. }), "found {error:?}");
    }

    #[test]
    fn higher_order_functions_infer() {
        let analysis = analyze("let apply = (f, x) => f(x)\nlet inc = n => n + 1\nlet four = apply(inc, 3)")
            .expect("typed");
        assert_eq!(
            analysis.declarations[0].1.to_string(),
            "forall 'a 'b. (('a) -> 'b, 'a) -> 'b"
        );
        assert_eq!(analysis.declarations[2].1, Type::Number);
    }
}
