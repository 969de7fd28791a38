//! The renderer-facing boundary: what the coordinator tells the UI.

use std::time::Duration;

use crate::compiler::RenderedDocument;
use crate::fingerprint::Fingerprint;

/// One settled preview the UI should display.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub document: RenderedDocument,
    pub fingerprint: Fingerprint,
    /// Served from the result cache without a compile.
    pub from_cache: bool,
    /// Source-format stand-in produced because the PDF renderer was
    /// unavailable.
    pub degraded: bool,
}

/// Updates delivered across the boundary. Superseded requests produce no
/// update at all: cancellation is silent.
#[derive(Debug, Clone)]
pub enum PreviewUpdate {
    Ready(PreviewFrame),
    /// Informational only: a transient failure was absorbed and one retry is
    /// scheduled. Sinks may show a status line or ignore it.
    Retrying { delay: Duration, message: String },
    Failed { message: String },
}

/// Receives preview outcomes on the UI side.
///
/// Calls arrive from the session task in settle order and may come in quick
/// succession; implementations must treat each update as a full replacement
/// of the previous one (latest wins) and must not block or schedule work of
/// their own.
pub trait PreviewSink: Send {
    fn on_preview(&mut self, update: PreviewUpdate);
}
