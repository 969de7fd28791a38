//! In-process typeset engine adapter.
//!
//! The engine itself (a TeX build running in a worker) sits behind
//! [`EngineBackend`]; this module owns the message protocol around it:
//! write the source file, set the entry file, request a compile, receive a
//! [`EngineReport`]. Compiles run on a dedicated worker thread since the
//! backend is CPU-bound and synchronous. Failure messages are derived from
//! the engine log here and nowhere else.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::compiler::{CompileError, DocumentCompiler, OutputFormat, RenderedDocument};
use crate::models::ResumeSnapshot;

/// Entry file inside the engine's virtual filesystem.
const ENTRY_FILE: &str = "resume.tex";
/// Bound on one compile round trip through the worker.
const COMPILE_TIMEOUT: Duration = Duration::from_secs(60);
const COMMAND_BUFFER: usize = 16;

// ─────────────────────────────────────────────
// Protocol
// ─────────────────────────────────────────────

/// Commands accepted by an engine worker.
#[derive(Debug)]
pub enum EngineCommand {
    WriteSource { path: String, contents: String },
    SetEntry { path: String },
    Compile { reply: oneshot::Sender<EngineReport> },
    Shutdown,
}

/// Worker's answer to [`EngineCommand::Compile`]. Status zero with an
/// artifact is success; anything else is judged by the log.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub status: i32,
    pub log: String,
    pub artifact: Option<Bytes>,
}

/// Synchronous engine surface, implemented by the real engine binding and by
/// scripted fakes in tests.
pub trait EngineBackend: Send + 'static {
    fn write_source(&mut self, path: &str, contents: &str);
    fn set_entry(&mut self, path: &str);
    fn compile(&mut self) -> EngineReport;
}

/// Renders a snapshot into typeset source. The template layer lives outside
/// this crate; the preview pipeline only needs the seam.
pub trait SourceTemplate: Send + Sync {
    fn render_source(&self, snapshot: &ResumeSnapshot) -> String;
}

// ─────────────────────────────────────────────
// Worker
// ─────────────────────────────────────────────

/// Runs a backend on its own thread, serving commands until `Shutdown`
/// arrives or every sender is dropped.
pub fn spawn_engine_worker<B: EngineBackend>(mut backend: B) -> mpsc::Sender<EngineCommand> {
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    std::thread::spawn(move || {
        while let Some(command) = rx.blocking_recv() {
            match command {
                EngineCommand::WriteSource { path, contents } => {
                    trace!(%path, bytes = contents.len(), "engine write");
                    backend.write_source(&path, &contents);
                }
                EngineCommand::SetEntry { path } => backend.set_entry(&path),
                EngineCommand::Compile { reply } => {
                    let report = backend.compile();
                    if reply.send(report).is_err() {
                        // Requester timed out or went away; nothing to deliver to.
                        debug!("discarding engine report, requester gone");
                    }
                }
                EngineCommand::Shutdown => break,
            }
        }
        debug!("typeset worker stopped");
    });
    tx
}

// ─────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────

pub struct TypesetEngine {
    commands: mpsc::Sender<EngineCommand>,
    template: Arc<dyn SourceTemplate>,
}

impl TypesetEngine {
    pub fn new(commands: mpsc::Sender<EngineCommand>, template: Arc<dyn SourceTemplate>) -> Self {
        Self { commands, template }
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(EngineCommand::Shutdown).await;
    }

    async fn send(&self, command: EngineCommand) -> Result<(), CompileError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CompileError::Engine("typeset worker is gone".to_string()))
    }
}

#[async_trait]
impl DocumentCompiler for TypesetEngine {
    async fn compile(
        &self,
        snapshot: &ResumeSnapshot,
        format: OutputFormat,
    ) -> Result<RenderedDocument, CompileError> {
        let source = self.template.render_source(snapshot);

        // Source output needs no engine round trip: the source is the artifact.
        if format == OutputFormat::Source {
            return Ok(RenderedDocument::new(format, Bytes::from(source)));
        }

        self.send(EngineCommand::WriteSource {
            path: ENTRY_FILE.to_string(),
            contents: source,
        })
        .await?;
        self.send(EngineCommand::SetEntry {
            path: ENTRY_FILE.to_string(),
        })
        .await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Compile { reply: reply_tx }).await?;

        let report = match tokio::time::timeout(COMPILE_TIMEOUT, reply_rx).await {
            Ok(Ok(report)) => report,
            Ok(Err(_)) => {
                return Err(CompileError::Engine(
                    "typeset worker dropped the compile".to_string(),
                ))
            }
            Err(_) => return Err(CompileError::Timeout(COMPILE_TIMEOUT)),
        };

        debug!(
            status = report.status,
            log_bytes = report.log.len(),
            "engine compile finished"
        );

        match report.artifact {
            Some(bytes) if report.status == 0 && !bytes.is_empty() => {
                Ok(RenderedDocument::new(format, bytes))
            }
            _ => Err(CompileError::Rejected(extract_error_message(&report.log))),
        }
    }
}

// ─────────────────────────────────────────────
// Log parsing
// ─────────────────────────────────────────────

/// Pulls a displayable failure out of an engine log. TeX logs are verbose;
/// the error proper is the first line starting with `!`, and the two lines
/// after it usually carry the offending input.
pub fn extract_error_message(log: &str) -> String {
    if log.is_empty() {
        return "typesetting failed (no log available)".to_string();
    }

    let lines: Vec<&str> = log.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with('!') {
            let mut picked = vec![*line];
            picked.extend(lines[i + 1..].iter().take(2).copied());
            return picked.join("\n");
        }
    }

    if let Some(line) = line_number_hint(log) {
        return format!("typesetting error near line {line}, check your syntax");
    }

    "typesetting failed, check your syntax".to_string()
}

/// First `l.<digits>` reference in the log, if any.
fn line_number_hint(log: &str) -> Option<u32> {
    let mut rest = log;
    while let Some(idx) = rest.find("l.") {
        let digits: String = rest[idx + 2..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(number) = digits.parse() {
            return Some(number);
        }
        rest = &rest[idx + 2..];
    }
    None
}
