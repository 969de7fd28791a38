use thiserror::Error;

/// Errors surfaced at the preview session boundary. Compile failures are not
/// errors here: they settle the request and reach the sink as updates.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview session is closed")]
    SessionClosed,
}
