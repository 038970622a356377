use std::path::PathBuf;

use tjs_compiler::{
    BinaryOperator, BuildError, BuildFailure, BuildPhase, Compilation, CompileOptions, Compiler,
    OperandSide, Type, TypeError, Workspace,
};

fn build(contents: &str) -> Result<Compilation, BuildFailure> {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/main.js", contents);
    Compiler::new(CompileOptions::default()).build(&workspace)
}

fn type_error(contents: &str) -> TypeError {
    match build(contents) {
        Ok(_) => panic!("expected a type error for {contents:?}"),
        Err(failure) => match failure.error {
            BuildError::Type(error) => {
                assert_eq!(failure.phase, BuildPhase::TypeCheck);
                error
            }
            other => panic!("expected a type error, found {other:?}"),
        },
    }
}

fn declared_types(contents: &str) -> Vec<(String, String)> {
    let compilation = build(contents).unwrap_or_else(|failure| panic!("{failure}"));
    compilation.modules[&PathBuf::from("/ws/main.js")]
        .declarations
        .iter()
        .map(|(name, ty)| (name.clone(), ty.to_string()))
        .collect()
}

#[test]
fn identity_is_generalized_and_instantiated_per_use() {
    let declared = declared_types("let id = x => x\nlet a = id(1)\nlet b = id('s')\nlet c = id(id)");
    assert_eq!(
        declared,
        vec![
            ("id".to_string(), "forall 'a. ('a) -> 'a".to_string()),
            ("a".to_string(), "number".to_string()),
            ("b".to_string(), "string".to_string()),
            ("c".to_string(), "forall 'a. ('a) -> 'a".to_string()),
        ]
    );
}

#[test]
fn factorial_infers_number_to_number() {
    let declared = declared_types("let factorial = n => n <= 1 ? 1 : n * factorial(n - 1)");
    assert_eq!(
        declared,
        vec![("factorial".to_string(), "(number) -> number".to_string())]
    );
}

#[test]
fn curried_functions_keep_their_shape() {
    let declared = declared_types("let konst = a => b => a\nlet five = konst(5)('ignored')");
    assert_eq!(declared[0].1, "forall 'a 'b. ('a) -> ('b) -> 'a");
    assert_eq!(declared[1].1, "number");
}

#[test]
fn binary_operator_errors() {
    let error = type_error("let a = 1 - 'one'");
    assert!(
        matches!(
            error,
            TypeError::BinaryMismatch {
                operator: BinaryOperator::Subtract,
                left: Type::Number,
                right: Type::String,
                ..
            }
        ),
        "found {error:?}"
    );

    let error = type_error("let a = true < false");
    assert!(
        matches!(
            error,
            TypeError::BinaryUnsupportedType {
                side: OperandSide::Left,
                found: Type::Boolean,
                ..
            }
        ),
        "found {error:?}"
    );

    let error = type_error("let a = 1 === 'one'");
    let TypeError::BinaryMismatch { allowed, .. } = error else {
        panic!("expected binary mismatch, found {error:?}");
    };
    assert_eq!(allowed, vec![Type::Number, Type::String, Type::Boolean]);
}

#[test]
fn unary_operator_errors() {
    let error = type_error("let a = -'one'");
    assert_eq!(error.to_string(), "`-` cannot be applied to string, expected number");

    let error = type_error("let a = !1");
    assert!(
        matches!(error, TypeError::UnaryUnsupportedType { found: Type::Number, .. }),
        "found {error:?}"
    );
}

#[test]
fn arity_mismatch_reports_both_counts() {
    let error = type_error("let add = (a, b) => a + b\nlet x = add(1, 2, 3)");
    assert_eq!(error.to_string(), "`add` expects 2 arguments, but 3 were given");
}

#[test]
fn argument_errors_are_reported_at_the_argument() {
    let error = type_error("let neg = n => -n\nlet x = neg('one')");
    let TypeError::ParamMismatch {
        param_index,
        argument,
        ..
    } = &error
    else {
        panic!("expected parameter mismatch, found {error:?}");
    };
    assert_eq!(*param_index, 0);
    assert_eq!((argument.span.line, argument.span.column), (2, 13));
    assert_eq!(error.node().span, argument.span);
}

#[test]
fn coverage_errors_name_the_construct() {
    for (source, reason) in [
        ("let a = typeof 1", "`typeof` cannot be type checked"),
        ("let a = 1 ?? 2", "`??` cannot be type checked"),
        ("let a = 10n", "bigint literals have no type"),
        ("let a = [1, 2]", "array literals have no type"),
    ] {
        let error = type_error(source);
        let TypeError::Unsupported { reason: found, .. } = &error else {
            panic!("{source}: expected unsupported, found {error:?}");
        };
        assert_eq!(found, reason, "{source}");
    }
}

#[test]
fn recursion_through_a_mismatched_self_reference_fails() {
    let error = type_error("let loop = x => loop");
    assert!(matches!(error, TypeError::InfiniteType { .. }), "found {error:?}");
}

#[test]
fn string_arithmetic_is_rejected_but_comparisons_type_check() {
    let error = type_error("let a = 'a' - 'b'");
    assert!(
        matches!(
            error,
            TypeError::BinaryUnsupportedType {
                side: OperandSide::Left,
                found: Type::String,
                ..
            }
        ),
        "found {error:?}"
    );

    let declared = declared_types("let less = 1 < 2\nlet same = 'a' === 'b'");
    assert_eq!(declared[0].1, "boolean");
    assert_eq!(declared[1].1, "boolean");
}
