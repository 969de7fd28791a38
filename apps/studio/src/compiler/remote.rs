//! Client for the remote render service, the primary compile path.
//!
//! One endpoint, one request shape: `POST {base}/generate-resume` with the
//! full snapshot as `formData` plus the requested output format. Status codes
//! carry the load signals (429 busy, 503 at capacity); structured error
//! bodies carry everything else, including the explicit renderer-unavailable
//! code that gates source-format degradation. No caller ever inspects
//! response text to decide behavior.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compiler::{CompileError, DocumentCompiler, OutputFormat, RenderedDocument};
use crate::models::ResumeSnapshot;

const RENDER_ENDPOINT: &str = "/generate-resume";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Error code the service reports when the PDF backend itself is gone.
/// The only failure that may degrade a compile to source output.
pub const RENDERER_UNAVAILABLE_CODE: &str = "RENDERER_UNAVAILABLE";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    form_data: &'a ResumeSnapshot,
    format: OutputFormat,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    code: String,
    message: String,
}

#[derive(Clone)]
pub struct RemoteCompiler {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteCompiler {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, RENDER_ENDPOINT)
    }

    /// Probes the service with a minimal source-format compile. Used at
    /// startup for a friendly failure, never on the preview path.
    pub async fn is_available(&self) -> bool {
        let probe = ResumeSnapshot::default();
        let body = RenderRequest {
            form_data: &probe,
            format: OutputFormat::Source,
        };
        let request = self
            .client
            .post(self.endpoint())
            .timeout(PROBE_TIMEOUT)
            .json(&body);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(%error, "render service probe failed");
                false
            }
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> CompileError {
        if error.is_timeout() {
            CompileError::Timeout(self.timeout)
        } else {
            CompileError::Transport(error)
        }
    }
}

#[async_trait]
impl DocumentCompiler for RemoteCompiler {
    async fn compile(
        &self,
        snapshot: &ResumeSnapshot,
        format: OutputFormat,
    ) -> Result<RenderedDocument, CompileError> {
        let body = RenderRequest {
            form_data: snapshot,
            format,
        };
        debug!(%format, "dispatching compile to render service");

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            warn!("render service reports a compile already in progress");
            return Err(CompileError::Busy);
        }
        if status.as_u16() == 503 {
            warn!("render service is at capacity");
            return Err(CompileError::Overloaded);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        if bytes.is_empty() {
            return Err(CompileError::EmptyArtifact);
        }

        debug!(%format, bytes = bytes.len(), "render service returned artifact");
        Ok(RenderedDocument::new(format, bytes))
    }
}

/// Maps a non-success body onto the error taxonomy. Renderer loss arrives as
/// a discrete code; message text is display material only.
fn classify_failure(status: u16, body: &str) -> CompileError {
    match serde_json::from_str::<ServiceError>(body) {
        Ok(parsed) if parsed.error.code == RENDERER_UNAVAILABLE_CODE => {
            CompileError::RendererUnavailable(parsed.error.message)
        }
        Ok(parsed) => CompileError::Rejected(parsed.error.message),
        Err(_) if body.trim().is_empty() => {
            CompileError::Rejected(format!("render service returned status {status}"))
        }
        Err(_) => CompileError::Rejected(body.to_string()),
    }
}
