use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::tempdir;
use tjs_compiler::{
    BuildError, BuildPhase, CompileOptions, Compiler, NameError, ResolveError, Type, Workspace,
};

#[test]
fn imported_functions_are_checked_in_dependency_order() -> Result<()> {
    let dir = tempdir()?;
    // `main.js` sorts before `math/add.js`, so only the dependency order
    // makes the interface available in time
    fs::create_dir(dir.path().join("math"))?;
    fs::write(
        dir.path().join("math").join("add.js"),
        "export let add = (a, b) => a + b\n",
    )?;
    fs::write(
        dir.path().join("main.js"),
        "import { add } from './math/add'\nexport let three = add(1, 2)\n",
    )?;

    let workspace = Workspace::discover(dir.path())?;
    let root = workspace.root().map(PathBuf::from).expect("root");
    let compilation = Compiler::new(CompileOptions::default())
        .build(&workspace)
        .map_err(|failure| anyhow::anyhow!("{failure}"))?;

    assert_eq!(
        compilation.order,
        vec![root.join("math").join("add.js"), root.join("main.js")]
    );
    let main = &compilation.modules[&root.join("main.js")];
    assert_eq!(main.interface.get("three"), Some(&Type::Number));
    let math = compilation
        .interfaces
        .get(&root.join("math").join("add.js"))
        .expect("published interface");
    assert_eq!(
        math.get("add").map(Type::to_string),
        Some("(number, number) -> number".to_string())
    );
    Ok(())
}

#[test]
fn default_exports_flow_across_modules() -> Result<()> {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/id.js", "export default x => x\n");
    workspace.insert(
        "/ws/main.js",
        "import identity from './id.js'\nlet word = identity('hi')\nlet flag = identity(true)\n",
    );

    let compilation = Compiler::new(CompileOptions::default())
        .build(&workspace)
        .map_err(|failure| anyhow::anyhow!("{failure}"))?;
    let main = &compilation.modules[&PathBuf::from("/ws/main.js")];
    let declared: Vec<(String, String)> = main
        .declarations
        .iter()
        .map(|(name, ty)| (name.clone(), ty.to_string()))
        .collect();
    assert_eq!(
        declared,
        vec![
            ("word".to_string(), "string".to_string()),
            ("flag".to_string(), "boolean".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn import_cycles_fail_with_the_cycle_path() {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/a.js", "import { b } from './b.js'\nexport let a = 1\n");
    workspace.insert("/ws/b.js", "import { a } from './a.js'\nexport let b = 2\n");

    let failure = match Compiler::new(CompileOptions::default()).build(&workspace) {
        Ok(_) => panic!("expected a cycle failure"),
        Err(failure) => failure,
    };
    assert_eq!(failure.phase, BuildPhase::Cycle);
    let BuildError::Cycle(cycle) = &failure.error else {
        panic!("expected cycle error, found {:?}", failure.error);
    };
    assert_eq!(
        cycle.path,
        vec![
            PathBuf::from("/ws/a.js"),
            PathBuf::from("/ws/b.js"),
            PathBuf::from("/ws/a.js"),
        ]
    );

    let diagnostics = failure.diagnostics();
    assert_eq!(diagnostics.len(), 2, "expected one diagnostic per module");
    for diagnostic in diagnostics {
        assert_eq!(diagnostic.message, "import cycle: a.js -> b.js -> a.js");
        assert_eq!(diagnostic.span.map(|span| span.line), Some(1));
    }
}

#[test]
fn missing_exports_list_what_is_available() {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/lib.js", "export let add = (a, b) => a + b\nexport default add\n");
    workspace.insert("/ws/main.js", "import { sub } from './lib.js'\n");

    let mut compiler = Compiler::new(CompileOptions::default());
    let failure = match compiler.build(&workspace) {
        Ok(_) => panic!("expected a name check failure"),
        Err(failure) => failure,
    };
    assert_eq!(failure.phase, BuildPhase::NameCheck);
    assert_eq!(failure.module, Some(PathBuf::from("/ws/main.js")));
    let BuildError::Name(NameError::NameNotExported {
        available_exports, ..
    }) = &failure.error
    else {
        panic!("expected missing export, found {:?}", failure.error);
    };
    assert_eq!(available_exports, &vec!["add".to_string(), "__default__".to_string()]);

    // modules checked before the failure stay available
    assert!(failure.completed.contains_key(&PathBuf::from("/ws/lib.js")));

    let notes = &compiler.diagnostics().entries()[0].notes;
    assert_eq!(notes, &vec!["available exports: add, default".to_string()]);
}

#[test]
fn missing_modules_are_rejected_when_requested() {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/main.js", "import { x } from './nowhere.js'\n");

    let options = CompileOptions {
        reject_missing_imports: true,
        ..CompileOptions::default()
    };
    let failure = match Compiler::new(options).build(&workspace) {
        Ok(_) => panic!("expected a resolve failure"),
        Err(failure) => failure,
    };
    assert_eq!(failure.phase, BuildPhase::Resolve);
    assert!(
        matches!(
            &failure.error,
            BuildError::Resolve(ResolveError::MissingModule { resolved, .. })
                if resolved == &PathBuf::from("/ws/nowhere.js")
        ),
        "found {:?}",
        failure.error
    );
}

#[test]
fn missing_modules_fall_through_to_name_checking_by_default() {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/main.js", "import { x } from './nowhere.js'\n");

    let failure = match Compiler::new(CompileOptions::default()).build(&workspace) {
        Ok(_) => panic!("expected a name check failure"),
        Err(failure) => failure,
    };
    assert_eq!(failure.phase, BuildPhase::NameCheck);
    assert!(
        matches!(
            &failure.error,
            BuildError::Name(NameError::NameNotExported { available_exports, .. })
                if available_exports.is_empty()
        ),
        "found {:?}",
        failure.error
    );
}

#[test]
fn overrides_replace_workspace_text() -> Result<()> {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/main.js", "let broken = \n");

    let mut options = CompileOptions::default();
    options
        .module_overrides
        .insert(PathBuf::from("/ws/main.js"), "let fixed = 1\n".to_string());
    let compilation = Compiler::new(options)
        .build(&workspace)
        .map_err(|failure| anyhow::anyhow!("{failure}"))?;
    let main = &compilation.modules[&PathBuf::from("/ws/main.js")];
    assert_eq!(main.declarations, vec![("fixed".to_string(), Type::Number)]);
    Ok(())
}

#[test]
fn syntax_errors_stop_the_build() {
    let mut workspace = Workspace::with_root("/ws");
    workspace.insert("/ws/main.js", "let a = (1 +\n");

    let failure = match Compiler::new(CompileOptions::default()).build(&workspace) {
        Ok(_) => panic!("expected a parse failure"),
        Err(failure) => failure,
    };
    assert_eq!(failure.phase, BuildPhase::Parse);
    let json = failure.to_json();
    assert_eq!(json["phase"], "parse");
    assert_eq!(json["error"]["kind"], "syntax");
}
