use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tjs_compiler::{
    extract_imports, parse, ImportResolver, NameError, NameResolver, NodeKind, SourceFile,
    SourceId, SuggestionPolicy,
};

fn resolve_with(
    contents: &str,
    exports: &BTreeMap<PathBuf, Vec<String>>,
    policy: SuggestionPolicy,
) -> Result<(), NameError> {
    let path = Path::new("/ws/main.js");
    let source = SourceFile::new(SourceId(0), path.to_path_buf(), contents.to_string());
    let module = parse(&source).expect("parse");
    let resolver = ImportResolver::new(|candidate: &Path| exports.contains_key(candidate));
    let imports = extract_imports(&module, path, &resolver);
    NameResolver::new(exports, &imports, policy).resolve_module(&module)
}

fn resolve(contents: &str) -> Result<(), NameError> {
    resolve_with(contents, &BTreeMap::new(), SuggestionPolicy::default())
}

#[test]
fn accepts_well_scoped_programs() {
    let source = r#"
let base = 10
let scale = (value, factor) => value * factor + base
let apply = f => f(base)
export let result = apply(v => scale(v, 2))
export { scale as scaled }
export default result
"#;
    resolve(source).expect("should resolve");
}

#[test]
fn redeclaring_at_top_level_is_rejected() {
    let error = resolve("let a = 1\nlet a = 2").expect_err("should fail");
    assert!(
        matches!(error, NameError::DuplicateDeclaration { ref name, .. } if name == "a"),
        "found {error:?}"
    );
}

#[test]
fn each_export_name_is_used_once() {
    let error = resolve("export default 1\nexport default 2").expect_err("should fail");
    let NameError::DuplicateDeclaration { name, first, second } = error else {
        panic!("expected duplicate declaration, found {error:?}");
    };
    assert_eq!(name, "default");
    assert_eq!(first.span.line, 1);
    assert_eq!(second.span.line, 2);

    let error = resolve("let a = 1\nlet b = 2\nexport { a as shared, b as shared }")
        .expect_err("should fail");
    assert!(
        matches!(error, NameError::DuplicateDeclaration { ref name, .. } if name == "shared"),
        "found {error:?}"
    );

    let error = resolve("let a = 1\nexport { a as default }\nexport default a")
        .expect_err("should fail");
    assert!(
        matches!(error, NameError::DuplicateDeclaration { ref name, .. } if name == "default"),
        "found {error:?}"
    );
}

#[test]
fn parameters_cannot_shadow_outer_parameters() {
    let error = resolve("let f = x => y => x => y").expect_err("should fail");
    let NameError::DuplicateDeclaration { first, second, .. } = error else {
        panic!("expected duplicate declaration, found {error:?}");
    };
    assert_eq!(first.span.column, 9);
    assert_eq!(second.span.column, 19);
}

#[test]
fn sibling_arrows_may_reuse_parameter_names() {
    resolve("let f = x => x\nlet g = x => x").expect("should resolve");
}

#[test]
fn undefined_names_without_close_matches_have_no_suggestions() {
    let error = resolve("let apple = 1\nlet b = zebra").expect_err("should fail");
    let NameError::UndefinedVariable {
        name, suggestions, ..
    } = error
    else {
        panic!("expected undefined variable, found {error:?}");
    };
    assert_eq!(name, "zebra");
    assert!(suggestions.is_empty(), "found {suggestions:?}");
}

#[test]
fn suggestions_are_ordered_and_limited() {
    let source = "let ab = 1\nlet ac = 1\nlet ad = 1\nlet ae = 1\nlet af = 1\nlet ag = 1\nlet x = aa";
    let error = resolve(source).expect_err("should fail");
    let NameError::UndefinedVariable { suggestions, .. } = error else {
        panic!("expected undefined variable, found {error:?}");
    };
    assert_eq!(suggestions, vec!["ab", "ac", "ad", "ae", "af"]);

    let narrow = SuggestionPolicy {
        max_distance: 1,
        limit: 2,
    };
    let error = resolve_with(source, &BTreeMap::new(), narrow).expect_err("should fail");
    let NameError::UndefinedVariable { suggestions, .. } = error else {
        panic!("expected undefined variable, found {error:?}");
    };
    assert_eq!(suggestions, vec!["ab", "ac"]);
}

#[test]
fn suggestions_only_include_names_in_scope() {
    let error = resolve("let f = value => value\nlet g = valeu").expect_err("should fail");
    let NameError::UndefinedVariable { suggestions, .. } = error else {
        panic!("expected undefined variable, found {error:?}");
    };
    assert!(suggestions.is_empty(), "found {suggestions:?}");
}

#[test]
fn imports_must_name_exports() {
    let mut exports = BTreeMap::new();
    exports.insert(PathBuf::from("/ws/lib.js"), vec!["add".to_string()]);

    resolve_with(
        "import { add } from './lib.js'\nlet two = add(1, 1)",
        &exports,
        SuggestionPolicy::default(),
    )
    .expect("named import should resolve");

    let error = resolve_with(
        "import lib from './lib.js'",
        &exports,
        SuggestionPolicy::default(),
    )
    .expect_err("default import should fail");
    let NameError::NameNotExported {
        module_specifier,
        specifier,
        ..
    } = error
    else {
        panic!("expected missing export, found {error:?}");
    };
    assert_eq!(module_specifier, "./lib.js");
    assert_eq!(specifier.kind, NodeKind::ImportDefaultSpecifier);
}

#[test]
fn namespace_imports_always_bind() {
    resolve("import * as ns from './anything.js'\nlet same = ns").expect("should resolve");
}

#[test]
fn imported_names_cannot_be_redeclared() {
    let mut exports = BTreeMap::new();
    exports.insert(PathBuf::from("/ws/lib.js"), vec!["add".to_string()]);
    let error = resolve_with(
        "import { add } from './lib.js'\nlet add = 1",
        &exports,
        SuggestionPolicy::default(),
    )
    .expect_err("should fail");
    assert!(
        matches!(error, NameError::DuplicateDeclaration { .. }),
        "found {error:?}"
    );
}

#[test]
fn unsupported_statements_are_reported() {
    for source in ["if (a) {}", "function f() {}", "export * from './x.js'", "let a = 1\na = 2"] {
        let error = resolve(source).expect_err("should fail");
        assert!(
            matches!(error, NameError::Unsupported { .. }),
            "{source}: found {error:?}"
        );
    }
}

#[test]
fn nested_destructuring_is_unsupported() {
    let error = resolve("let { a: { b } } = { a: { b: 1 } }").expect_err("should fail");
    let NameError::Unsupported { node } = error else {
        panic!("expected unsupported, found {error:?}");
    };
    assert_eq!(node.kind, NodeKind::ObjectPattern);
}
