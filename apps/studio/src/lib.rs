//! Resume studio core: live preview coordination and document export.
//!
//! The crate wires an edit session to a document compiler. [`preview`] owns
//! the debounce/dedup/retry state machine, [`compiler`] abstracts the render
//! backends behind one trait, [`cache`] keeps recently compiled artifacts
//! warm, and [`export`] reuses the same pieces for one-shot downloads.

pub mod cache;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod export;
pub mod fingerprint;
pub mod models;
pub mod preview;

pub use cache::ResultCache;
pub use compiler::{
    CompileError, DocumentCompiler, OutputFormat, RemoteCompiler, RenderedDocument, TypesetEngine,
};
pub use config::{Config, PreviewConfig};
pub use errors::PreviewError;
pub use export::{export_document, suggested_filename, ExportOutcome};
pub use fingerprint::{fingerprint, Fingerprint};
pub use models::ResumeSnapshot;
pub use preview::{
    PreviewCoordinator, PreviewEvent, PreviewFrame, PreviewHandle, PreviewSink, PreviewUpdate,
};
