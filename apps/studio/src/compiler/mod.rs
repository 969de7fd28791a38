//! Compiler boundary: the seam between preview coordination and whatever
//! actually renders documents. Two adapters live behind [`DocumentCompiler`]:
//! the remote render service ([`remote`]) and the in-process typeset engine
//! ([`typeset`]). Everything upstream of this module reasons only in terms of
//! [`CompileError`] variants, never adapter-specific strings.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ResumeSnapshot;

pub mod remote;
pub mod typeset;

pub use remote::RemoteCompiler;
pub use typeset::{
    spawn_engine_worker, EngineBackend, EngineCommand, EngineReport, SourceTemplate,
    TypesetEngine,
};

// ─────────────────────────────────────────────
// Data models
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Typeset page artifact, the primary preview format.
    Pdf,
    /// The document source itself, used for exports and degraded previews.
    Source,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Source => "tex",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Source => "source",
        })
    }
}

/// A finished artifact as returned by a compiler adapter.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub format: OutputFormat,
    pub bytes: Bytes,
    pub produced_at: DateTime<Utc>,
}

impl RenderedDocument {
    pub fn new(format: OutputFormat, bytes: Bytes) -> Self {
        Self {
            format,
            bytes,
            produced_at: Utc::now(),
        }
    }
}

/// Failure taxonomy shared by all adapters. The retry policy keys off these
/// variants, and [`CompileError::RendererUnavailable`] is the one case
/// eligible for degradation to source output.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("a compile for this document is already in progress")]
    Busy,
    #[error("render service is at capacity")]
    Overloaded,
    #[error("pdf rendering is unavailable: {0}")]
    RendererUnavailable(String),
    #[error("document was rejected: {0}")]
    Rejected(String),
    #[error("compile timed out after {0:?}")]
    Timeout(Duration),
    #[error("render service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("render service returned an empty document")]
    EmptyArtifact,
    #[error("typeset engine failure: {0}")]
    Engine(String),
}

impl CompileError {
    /// Transient failures are load signals worth retrying once; everything
    /// else settles the request as failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CompileError::Busy | CompileError::Overloaded)
    }

    /// True only for renderer loss, the one failure that may substitute a
    /// source-format artifact for the requested one.
    pub fn is_degradable(&self) -> bool {
        matches!(self, CompileError::RendererUnavailable(_))
    }
}

// ─────────────────────────────────────────────
// Adapter trait
// ─────────────────────────────────────────────

/// One compile, one artifact. Implementations bound their own call duration
/// and surface expiry as [`CompileError::Timeout`]; callers never wrap an
/// extra timer around this.
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(
        &self,
        snapshot: &ResumeSnapshot,
        format: OutputFormat,
    ) -> Result<RenderedDocument, CompileError>;
}
