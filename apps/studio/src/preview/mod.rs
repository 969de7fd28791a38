// Live preview pipeline: debounce, dedup, dispatch, retry, deliver.

pub mod coordinator;
pub mod render;
pub mod retry;

pub use coordinator::{PreviewCoordinator, PreviewEvent, PreviewHandle};
pub use render::{PreviewFrame, PreviewSink, PreviewUpdate};
pub use retry::{RetryDecision, RetryPolicy};
