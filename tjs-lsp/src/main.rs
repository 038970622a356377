use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tjs_compiler::{
    is_source_file, source_line, BuildPhase, CompileOptions, Compiler,
    Diagnostic as CompilerDiagnostic, DiagnosticLevel, ModuleAnalysis, NodeKind, SourceSpan,
    Workspace,
};
use tokio::{
    sync::Mutex,
    task,
    time::{sleep, Duration},
};
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{
    Diagnostic as LspDiagnostic, DiagnosticSeverity, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams, Hover,
    HoverContents, HoverParams, HoverProviderCapability, InitializeParams, InitializeResult,
    InitializedParams, MarkupContent, MarkupKind, MessageType, Position, Range,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, Url,
};
use tower_lsp::{async_trait, Client, LanguageServer, LspService, Server};

const COMPILE_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
struct DocumentState {
    path: PathBuf,
    text: String,
    version: i32,
}

#[derive(Debug, Clone)]
struct PendingCompile {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct ServerState {
    /// Workspace folders; each one is built as its own workspace.
    roots: Vec<PathBuf>,
    documents: HashMap<Url, DocumentState>,
    next_task_id: u64,
    pending: Option<PendingCompile>,
    /// Files that received diagnostics from the last finished build.
    published: HashSet<PathBuf>,
    analyses: BTreeMap<PathBuf, ModuleAnalysis>,
}

impl ServerState {
    /// Without workspace folders, the directories of the open modules.
    fn workspace_roots(&self) -> Vec<PathBuf> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        outermost_roots(
            self.documents
                .values()
                .filter(|doc| is_source_file(&doc.path))
                .filter_map(|doc| doc.path.parent().map(Path::to_path_buf))
                .collect(),
        )
    }

    /// Open module buffers that live below `root`.
    fn module_overrides(&self, root: &Path) -> HashMap<PathBuf, String> {
        self.documents
            .values()
            .filter(|doc| is_source_file(&doc.path) && doc.path.starts_with(root))
            .map(|doc| (doc.path.clone(), doc.text.clone()))
            .collect()
    }
}

#[derive(Default)]
struct BuildOutput {
    analyses: BTreeMap<PathBuf, ModuleAnalysis>,
    diagnostics: BTreeMap<PathBuf, Vec<LspDiagnostic>>,
    summary: String,
}

impl BuildOutput {
    fn merge(&mut self, other: BuildOutput) {
        self.analyses.extend(other.analyses);
        for (path, entries) in other.diagnostics {
            self.diagnostics.entry(path).or_default().extend(entries);
        }
        if !self.summary.is_empty() {
            self.summary.push_str("; ");
        }
        self.summary.push_str(&other.summary);
    }
}

/// One workspace build: its root and the open buffers inside it.
type RootBuild = (PathBuf, HashMap<PathBuf, String>);

#[derive(Clone)]
struct TjsLanguageServer {
    client: Client,
    state: Arc<Mutex<ServerState>>,
}

impl TjsLanguageServer {
    fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(ServerState::default())),
        }
    }

    async fn schedule_compile(&self) {
        let (token, task_id) = {
            let mut state = self.state.lock().await;
            let task_id = state.next_task_id;
            state.next_task_id = state.next_task_id.saturating_add(1);
            if let Some(pending) = state.pending.take() {
                pending.token.cancel();
            }
            let token = CancellationToken::new();
            state.pending = Some(PendingCompile {
                id: task_id,
                token: token.clone(),
            });
            (token, task_id)
        };

        let server = self.clone();
        task::spawn_local(async move {
            sleep(COMPILE_DEBOUNCE).await;
            if token.is_cancelled() {
                return;
            }
            server.run_compile_task(task_id, token).await;
        });
    }

    async fn run_compile_task(&self, task_id: u64, token: CancellationToken) {
        {
            let state = self.state.lock().await;
            let current = state
                .pending
                .as_ref()
                .map(|pending| pending.id == task_id)
                .unwrap_or(false);
            if !current {
                return;
            }
        }

        if let Err(err) = self.compile_and_publish(task_id, Some(&token)).await {
            self.client
                .log_message(MessageType::ERROR, format!("compile:error task={task_id}: {err}"))
                .await;
        }

        let mut state = self.state.lock().await;
        if state
            .pending
            .as_ref()
            .map(|pending| pending.id == task_id)
            .unwrap_or(false)
        {
            state.pending = None;
        }
    }

    async fn compile_and_publish(
        &self,
        task_id: u64,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let builds: Vec<RootBuild> = {
            let state = self.state.lock().await;
            state
                .workspace_roots()
                .into_iter()
                .map(|root| {
                    let overrides = state.module_overrides(&root);
                    (root, overrides)
                })
                .collect()
        };
        if builds.is_empty() {
            return Ok(());
        }

        let roots = builds
            .iter()
            .map(|(root, _)| root.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.client
            .log_message(
                MessageType::LOG,
                format!("compile:start roots={roots} task={task_id}"),
            )
            .await;

        let Some(output) = self.blocking_compile(builds, cancel).await? else {
            self.client
                .log_message(MessageType::LOG, format!("compile:cancelled task={task_id}"))
                .await;
            return Ok(());
        };

        let BuildOutput {
            analyses,
            diagnostics,
            summary,
        } = output;

        let stale = {
            let mut state = self.state.lock().await;
            state.analyses = analyses;
            let stale = stale_paths(&state.published, &diagnostics);
            state.published = diagnostics.keys().cloned().collect();
            stale
        };

        for (path, entries) in diagnostics {
            let Ok(url) = Url::from_file_path(&path) else {
                continue;
            };
            self.client.publish_diagnostics(url, entries, None).await;
        }
        for path in stale {
            let Ok(url) = Url::from_file_path(&path) else {
                continue;
            };
            self.client.publish_diagnostics(url, Vec::new(), None).await;
        }

        self.client
            .log_message(
                MessageType::LOG,
                format!("compile:finish task={task_id} {summary}"),
            )
            .await;
        Ok(())
    }

    async fn blocking_compile(
        &self,
        builds: Vec<RootBuild>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<BuildOutput>> {
        let cancel_clone = cancel.cloned();
        task::spawn_blocking(move || TjsLanguageServer::run_compile_roots(builds, cancel_clone))
            .await?
    }

    fn run_compile_roots(
        builds: Vec<RootBuild>,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<BuildOutput>> {
        let mut merged = BuildOutput::default();
        for (root, overrides) in builds {
            let Some(output) = Self::run_compile_sync(&root, overrides, cancel.clone())? else {
                return Ok(None);
            };
            merged.merge(output);
        }
        Ok(Some(merged))
    }

    fn run_compile_sync(
        root: &Path,
        overrides: HashMap<PathBuf, String>,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<BuildOutput>> {
        if Self::cancellation_requested(cancel.as_ref()) {
            return Ok(None);
        }

        let workspace = Workspace::discover(root)?;
        let options = CompileOptions {
            module_overrides: overrides,
            ..CompileOptions::default()
        };
        let result = Compiler::new(options).build(&workspace);

        if Self::cancellation_requested(cancel.as_ref()) {
            return Ok(None);
        }

        let output = match result {
            Ok(compilation) => BuildOutput {
                summary: format!(
                    "root={} status=ok modules={}",
                    root.display(),
                    compilation.order.len()
                ),
                analyses: compilation.modules,
                diagnostics: BTreeMap::new(),
            },
            Err(failure) => BuildOutput {
                summary: format!("root={} status=failed phase={}", root.display(), failure.phase),
                diagnostics: group_diagnostics(failure.diagnostics(), failure.phase),
                analyses: failure.completed,
            },
        };
        Ok(Some(output))
    }

    async fn upsert_document(&self, uri: &Url, text: String, version: i32) -> Result<()> {
        let raw_path = uri
            .to_file_path()
            .map_err(|_| anyhow!("unsupported URI scheme for document: {uri}"))?;
        let path = raw_path.canonicalize().unwrap_or(raw_path);

        let mut state = self.state.lock().await;
        state
            .documents
            .insert(uri.clone(), DocumentState { path, text, version });
        Ok(())
    }

    async fn remove_document(&self, uri: &Url) {
        let mut state = self.state.lock().await;
        state.documents.remove(uri);
    }

    #[inline]
    fn cancellation_requested(token: Option<&CancellationToken>) -> bool {
        token.map_or(false, |t| t.is_cancelled())
    }
}

/// Every workspace folder, or the root URI when the client sends no folders.
fn roots_from_params(params: &InitializeParams) -> Vec<PathBuf> {
    let mut uris: Vec<Url> = params
        .workspace_folders
        .iter()
        .flatten()
        .map(|folder| folder.uri.clone())
        .collect();
    if uris.is_empty() {
        #[allow(deprecated)]
        let root_uri = params.root_uri.clone();
        uris.extend(root_uri);
    }
    outermost_roots(
        uris.iter()
            .filter_map(|uri| uri.to_file_path().ok())
            .map(|path| path.canonicalize().unwrap_or(path))
            .collect(),
    )
}

/// Sorted roots without duplicates or folders nested in another root, so no
/// module is built twice.
fn outermost_roots(mut roots: Vec<PathBuf>) -> Vec<PathBuf> {
    roots.sort();
    let mut kept: Vec<PathBuf> = Vec::new();
    for root in roots {
        if !kept.iter().any(|outer| root.starts_with(outer)) {
            kept.push(root);
        }
    }
    kept
}

/// Files that had diagnostics after the previous build and have none now.
fn stale_paths(
    previous: &HashSet<PathBuf>,
    current: &BTreeMap<PathBuf, Vec<LspDiagnostic>>,
) -> Vec<PathBuf> {
    let mut stale: Vec<PathBuf> = previous
        .iter()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();
    stale.sort();
    stale
}

/// Buckets compiler diagnostics by file. Diagnostics without a path are
/// dropped since there is no document to attach them to.
fn group_diagnostics(
    diagnostics: &[CompilerDiagnostic],
    phase: BuildPhase,
) -> BTreeMap<PathBuf, Vec<LspDiagnostic>> {
    let mut grouped: BTreeMap<PathBuf, Vec<LspDiagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        if let Some(path) = &diagnostic.path {
            grouped
                .entry(path.clone())
                .or_default()
                .push(convert_diagnostic(diagnostic, phase));
        }
    }
    grouped
}

fn range_from_span(span: &SourceSpan) -> Range {
    let start_line = span.line.saturating_sub(1) as u32;
    let start_col = span.column.saturating_sub(1) as u32;
    let mut end_line = span.end_line.saturating_sub(1) as u32;
    // spans are inclusive, LSP ranges are not
    let mut end_col = span.end_column as u32;

    if end_line < start_line || (end_line == start_line && end_col <= start_col) {
        end_line = start_line;
        end_col = start_col.saturating_add(1);
    }

    Range {
        start: Position {
            line: start_line,
            character: start_col,
        },
        end: Position {
            line: end_line,
            character: end_col,
        },
    }
}

fn convert_diagnostic(diagnostic: &CompilerDiagnostic, phase: BuildPhase) -> LspDiagnostic {
    let range = diagnostic
        .span
        .as_ref()
        .map(range_from_span)
        .unwrap_or_default();

    let severity = match diagnostic.level {
        DiagnosticLevel::Error => Some(DiagnosticSeverity::ERROR),
        DiagnosticLevel::Warning => Some(DiagnosticSeverity::WARNING),
    };

    let mut message = diagnostic.message.clone();
    for note in &diagnostic.notes {
        message.push_str("\nnote: ");
        message.push_str(note);
    }

    LspDiagnostic {
        range,
        severity,
        code: None,
        code_description: None,
        source: Some("tjs-compiler".into()),
        message,
        related_information: None,
        tags: None,
        data: Some(json!({ "phase": phase })),
    }
}

/// Text covered by a single-line span, used to label identifier hovers.
fn text_in_span<'a>(text: &'a str, span: &SourceSpan) -> Option<&'a str> {
    if span.line != span.end_line {
        return None;
    }
    let line = source_line(text, span.line)?;
    let start = line.char_indices().nth(span.column.checked_sub(1)?)?.0;
    let end = line
        .char_indices()
        .nth(span.end_column)
        .map(|(offset, _)| offset)
        .unwrap_or(line.len());
    line.get(start..end)
}

fn hover_text(analysis: &ModuleAnalysis, text: &str, position: &Position) -> Option<(String, Range)> {
    let line = position.line as usize + 1;
    let column = position.character as usize + 1;
    let entry = analysis.types.type_at(line, column)?;
    let value = match entry.node.kind {
        NodeKind::Identifier => match text_in_span(text, &entry.node.span) {
            Some(name) => format!("{name}: {}", entry.ty),
            None => entry.ty.to_string(),
        },
        _ => entry.ty.to_string(),
    };
    Some((value, range_from_span(&entry.node.span)))
}

fn position_to_offset(text: &str, position: &Position) -> Option<usize> {
    let mut line_start = 0usize;
    for _ in 0..position.line {
        line_start += text[line_start..].find('\n')? + 1;
    }
    let line_end = text[line_start..]
        .find('\n')
        .map(|offset| line_start + offset)
        .unwrap_or(text.len());
    let line_str = &text[line_start..line_end];
    let character = position.character as usize;

    let mut char_count = 0usize;
    for (byte_idx, _) in line_str.char_indices() {
        if char_count == character {
            return Some(line_start + byte_idx);
        }
        char_count += 1;
    }
    if char_count == character {
        return Some(line_end);
    }
    None
}

fn apply_content_change(text: &mut String, range: Option<Range>, new_text: &str) -> Result<()> {
    match range {
        None => {
            text.clear();
            text.push_str(new_text);
            Ok(())
        }
        Some(range) => {
            let start = position_to_offset(text, &range.start)
                .ok_or_else(|| anyhow!("invalid start position in change range"))?;
            let end = position_to_offset(text, &range.end)
                .ok_or_else(|| anyhow!("invalid end position in change range"))?;

            if end < start {
                anyhow::bail!("change range end precedes start");
            }

            text.replace_range(start..end, new_text);
            Ok(())
        }
    }
}

#[async_trait]
impl LanguageServer for TjsLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        {
            let mut state = self.state.lock().await;
            state.roots = roots_from_params(&params);
        }

        let capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            ..Default::default()
        };

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "tjs-lsp".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            capabilities,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let roots = self.state.lock().await.roots.clone();
        let message = if roots.is_empty() {
            "tjs language server initialized without a workspace root".to_string()
        } else {
            let roots: Vec<String> = roots.iter().map(|root| root.display().to_string()).collect();
            format!("tjs language server initialized roots={}", roots.join(","))
        };
        self.client.log_message(MessageType::INFO, message).await;
        self.schedule_compile().await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(pending) = state.pending.take() {
            pending.token.cancel();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let text = params.text_document.text;

        if let Err(err) = self.upsert_document(&uri, text, version).await {
            self.client
                .log_message(MessageType::ERROR, format!("failed to open {uri}: {err}"))
                .await;
            return;
        }
        self.schedule_compile().await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let DidChangeTextDocumentParams {
            text_document,
            content_changes,
        } = params;
        let uri = text_document.uri;
        let version = text_document.version;

        let mut error_message = None;
        {
            let mut state = self.state.lock().await;
            if let Some(doc) = state.documents.get_mut(&uri) {
                for change in content_changes {
                    if let Err(err) =
                        apply_content_change(&mut doc.text, change.range, &change.text)
                    {
                        error_message = Some(format!("failed to apply change for {uri}: {err}"));
                        break;
                    }
                }
                if error_message.is_none() {
                    doc.version = version;
                }
            } else {
                error_message = Some(format!("received change for unknown document {uri}"));
            }
        }

        if let Some(message) = error_message {
            self.client.log_message(MessageType::ERROR, message).await;
            return;
        }

        self.schedule_compile().await;
    }

    async fn did_save(&self, _: DidSaveTextDocumentParams) {
        self.schedule_compile().await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.remove_document(&params.text_document.uri).await;
        // the file on disk takes over from the buffer
        self.schedule_compile().await;
    }

    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let state = self.state.lock().await;
        let Some(doc) = state.documents.get(&uri) else {
            return Ok(None);
        };
        let Some(analysis) = state.analyses.get(&doc.path) else {
            return Ok(None);
        };
        let Some((value, range)) = hover_text(analysis, &doc.text, &position) else {
            return Ok(None);
        };

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::PlainText,
                value,
            }),
            range: Some(range),
        }))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(TjsLanguageServer::new);
    let server = Server::new(stdin, stdout, socket);
    let local = task::LocalSet::new();
    local
        .run_until(async move {
            server.serve(service).await;
        })
        .await;

    Ok(())
}
