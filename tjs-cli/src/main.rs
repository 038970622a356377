use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tjs_compiler::{
    source_line, BuildFailure, Compilation, CompileOptions, Compiler, Diagnostic, DiagnosticLevel,
    Workspace,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "tjs",
    version,
    about = "Check tjs workspaces for scope and type errors.",
    long_about = "Discover every .js/.mjs module under a directory, order them by their imports, \
                  and run name resolution and type inference on each."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print compiler tracing output on stderr (filter with RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Check a workspace and report the first error.
    Check(CheckArgs),
    /// Check a workspace and print the inferred types of every module.
    Types(CheckArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Workspace directory (defaults to the current directory).
    #[arg(value_name = "DIR")]
    root: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Let imports of missing modules through to name checking.
    #[arg(long)]
    allow_missing_imports: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check(args) => run_check(&args),
        Command::Types(args) => run_types(&args),
    }
}

fn init_tracing(verbose: bool) {
    if !verbose {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tjs_compiler=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_workspace(root: Option<&Path>) -> Result<Workspace> {
    let root = match root {
        Some(path) => path.to_path_buf(),
        None => env::current_dir().context("failed to read the current directory")?,
    };
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    Workspace::discover(&root)
        .with_context(|| format!("failed to load workspace {}", root.display()))
}

fn compile(args: &CheckArgs) -> Result<(Workspace, Result<Compilation, BuildFailure>)> {
    let workspace = load_workspace(args.root.as_deref())?;
    let options = CompileOptions {
        reject_missing_imports: !args.allow_missing_imports,
        ..CompileOptions::default()
    };
    let result = Compiler::new(options).build(&workspace);
    Ok((workspace, result))
}

fn run_check(args: &CheckArgs) -> Result<()> {
    let (workspace, result) = compile(args)?;
    let compilation = match result {
        Ok(compilation) => compilation,
        Err(failure) => return report_failure(&workspace, &failure, args.format),
    };

    match args.format {
        OutputFormat::Text => {
            println!("checked {} module(s)", compilation.order.len());
        }
        OutputFormat::Json => {
            let order: Vec<String> = compilation
                .order
                .iter()
                .map(|path| workspace.display_path(path))
                .collect();
            println!("{}", json!({ "status": "ok", "order": order }));
        }
    }
    Ok(())
}

fn run_types(args: &CheckArgs) -> Result<()> {
    let (workspace, result) = compile(args)?;
    let compilation = match result {
        Ok(compilation) => compilation,
        Err(failure) => return report_failure(&workspace, &failure, args.format),
    };

    match args.format {
        OutputFormat::Text => {
            for path in &compilation.order {
                let Some(analysis) = compilation.modules.get(path) else {
                    continue;
                };
                println!("{}", workspace.display_path(path));
                for (name, ty) in &analysis.declarations {
                    println!("  let {name}: {ty}");
                }
                for (name, ty) in analysis.interface.iter() {
                    println!("  export {}: {ty}", export_label(name));
                }
            }
        }
        OutputFormat::Json => {
            let modules: Vec<_> = compilation
                .order
                .iter()
                .filter_map(|path| compilation.modules.get(path))
                .map(|analysis| {
                    let declarations: serde_json::Map<String, serde_json::Value> = analysis
                        .declarations
                        .iter()
                        .map(|(name, ty)| (name.clone(), json!(ty)))
                        .collect();
                    json!({
                        "module": workspace.display_path(&analysis.path),
                        "declarations": declarations,
                        "exports": analysis.interface,
                    })
                })
                .collect();
            println!("{}", json!({ "status": "ok", "modules": modules }));
        }
    }
    Ok(())
}

fn export_label(name: &str) -> &str {
    if name == tjs_compiler::DEFAULT_EXPORT {
        "default"
    } else {
        name
    }
}

fn report_failure(workspace: &Workspace, failure: &BuildFailure, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            eprintln!("Diagnostics:");
            if failure.diagnostics().is_empty() {
                eprintln!("  - error: {}", failure.error);
            }
            for diagnostic in failure.diagnostics() {
                print_diagnostic(workspace, diagnostic);
            }
        }
        OutputFormat::Json => println!("{}", failure.to_json()),
    }
    bail!("{} failed", failure.phase)
}

fn print_diagnostic(workspace: &Workspace, diagnostic: &Diagnostic) {
    let (level_label, level_marker) = match diagnostic.level {
        DiagnosticLevel::Error => ("error", "  -"),
        DiagnosticLevel::Warning => ("warning", "  ~"),
    };
    eprintln!("{} {}: {}", level_marker, level_label, diagnostic.message);

    if let (Some(path), Some(span)) = (diagnostic.path.as_deref(), diagnostic.span) {
        eprintln!(
            "     --> {}:{}:{}",
            workspace.display_path(path),
            span.line,
            span.column
        );

        let raw_line = workspace
            .source(path)
            .and_then(|contents| source_line(contents, span.line));
        if let Some(raw_line) = raw_line {
            let display_line = raw_line.replace('\t', "    ");
            eprintln!("      {}", display_line);

            let mut caret_line = String::from("      ");
            for ch in raw_line.chars().take(span.column.saturating_sub(1)) {
                match ch {
                    '\t' => caret_line.push_str("    "),
                    _ => caret_line.push(' '),
                }
            }

            let highlight_len = if span.end_line == span.line {
                span.end_column
                    .saturating_sub(span.column)
                    .saturating_add(1)
            } else {
                display_line
                    .chars()
                    .count()
                    .saturating_sub(span.column.saturating_sub(1))
            };
            caret_line.push_str(&"^".repeat(highlight_len.max(1)));
            eprintln!("{}", caret_line);
        }
    }

    for note in &diagnostic.notes {
        eprintln!("     = note: {note}");
    }
}
