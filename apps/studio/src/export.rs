//! One-shot document export.
//!
//! Exports run outside the preview session: no debounce, no sink, the caller
//! awaits the artifact directly. They still share the result cache and the
//! transient-failure retry policy with the live preview path, so a document
//! that just previewed exports without touching the render service.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::compiler::{CompileError, DocumentCompiler, OutputFormat, RenderedDocument};
use crate::fingerprint::fingerprint;
use crate::models::ResumeSnapshot;
use crate::preview::retry::{RetryDecision, RetryPolicy};

/// A finished export. `degraded` is set when the primary format could not be
/// produced and the caller opted into the source fallback.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub document: RenderedDocument,
    pub degraded: bool,
}

/// Compiles `snapshot` to `format`, retrying transient render failures per
/// `policy`. PDF exports read and populate the shared cache; source exports
/// always compile fresh since they are cheap and never cached.
///
/// With `degrade` set, a fatal renderer-unavailable failure on a PDF export
/// falls back to a source export instead of erroring.
pub async fn export_document(
    compiler: &dyn DocumentCompiler,
    cache: &ResultCache,
    policy: &RetryPolicy,
    snapshot: &ResumeSnapshot,
    format: OutputFormat,
    degrade: bool,
) -> Result<ExportOutcome, CompileError> {
    let fp = fingerprint(snapshot);
    if format == OutputFormat::Pdf {
        if let Some(document) = cache.lookup(&fp, format) {
            debug!(fingerprint = %fp, "export served from cache");
            return Ok(ExportOutcome {
                document,
                degraded: false,
            });
        }
    }

    let mut attempt = 0;
    loop {
        match compiler.compile(snapshot, format).await {
            Ok(document) => {
                if format == OutputFormat::Pdf {
                    cache.put(fp, document.clone());
                }
                info!(fingerprint = %fp, %format, attempt, "export compile settled");
                return Ok(ExportOutcome {
                    document,
                    degraded: false,
                });
            }
            Err(error) => match policy.decide(&error, attempt) {
                RetryDecision::After(delay) => {
                    warn!(
                        %error,
                        delay_ms = delay.as_millis() as u64,
                        "transient export failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Fatal => {
                    if degrade && format == OutputFormat::Pdf && error.is_degradable() {
                        warn!(%error, "renderer unavailable, exporting source instead");
                        let document = compiler.compile(snapshot, OutputFormat::Source).await?;
                        return Ok(ExportOutcome {
                            document,
                            degraded: true,
                        });
                    }
                    return Err(error);
                }
            },
        }
    }
}

/// Download-style filename for an exported document, derived from the
/// candidate name on the resume.
pub fn suggested_filename(snapshot: &ResumeSnapshot, format: OutputFormat) -> String {
    let stem: String = snapshot
        .name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    if stem.is_empty() {
        format!("resume.{}", format.extension())
    } else {
        format!("resume_{stem}.{}", format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{Duration, Instant};

    enum Step {
        Ok,
        Busy,
        RendererUnavailable,
    }

    struct ScriptedCompiler {
        steps: Mutex<VecDeque<Step>>,
        dispatches: AtomicUsize,
    }

    impl ScriptedCompiler {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                dispatches: AtomicUsize::new(0),
            }
        }

        fn dispatches(&self) -> usize {
            self.dispatches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentCompiler for ScriptedCompiler {
        async fn compile(
            &self,
            snapshot: &ResumeSnapshot,
            format: OutputFormat,
        ) -> Result<RenderedDocument, CompileError> {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            match self.steps.lock().unwrap().pop_front().unwrap_or(Step::Ok) {
                Step::Ok => Ok(RenderedDocument::new(
                    format,
                    Bytes::from(format!("artifact:{}:{}", snapshot.name, format)),
                )),
                Step::Busy => Err(CompileError::Busy),
                Step::RendererUnavailable => {
                    Err(CompileError::RendererUnavailable("pdf backend offline".to_string()))
                }
            }
        }
    }

    fn make_cache() -> ResultCache {
        ResultCache::new(Duration::from_secs(300), 8)
    }

    fn snapshot(name: &str) -> ResumeSnapshot {
        let mut snapshot = ResumeSnapshot::default();
        snapshot.name = name.to_string();
        snapshot
    }

    #[tokio::test]
    async fn test_pdf_export_round_trips_through_cache() {
        let compiler = ScriptedCompiler::new(vec![Step::Ok]);
        let cache = make_cache();
        let policy = RetryPolicy::default();
        let doc = snapshot("Ada");

        let first = export_document(&compiler, &cache, &policy, &doc, OutputFormat::Pdf, false)
            .await
            .unwrap();
        assert_eq!(compiler.dispatches(), 1);
        assert!(!first.degraded);
        assert_eq!(cache.len(), 1);

        let second = export_document(&compiler, &cache, &policy, &doc, OutputFormat::Pdf, false)
            .await
            .unwrap();
        assert_eq!(compiler.dispatches(), 1, "second export reads the cache");
        assert_eq!(second.document.bytes, first.document.bytes);
    }

    #[tokio::test]
    async fn test_source_export_bypasses_the_cache() {
        let compiler = ScriptedCompiler::new(vec![Step::Ok, Step::Ok]);
        let cache = make_cache();
        let policy = RetryPolicy::default();
        let doc = snapshot("Ada");

        export_document(&compiler, &cache, &policy, &doc, OutputFormat::Source, false)
            .await
            .unwrap();
        export_document(&compiler, &cache, &policy, &doc, OutputFormat::Source, false)
            .await
            .unwrap();

        assert_eq!(compiler.dispatches(), 2, "source exports always compile");
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_export_retries_and_succeeds() {
        let compiler = ScriptedCompiler::new(vec![Step::Busy, Step::Ok]);
        let cache = make_cache();
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let outcome = export_document(
            &compiler,
            &cache,
            &policy,
            &snapshot("Ada"),
            OutputFormat::Pdf,
            false,
        )
        .await
        .unwrap();

        assert_eq!(compiler.dispatches(), 2);
        assert!(!outcome.degraded);
        assert!(started.elapsed() >= Duration::from_secs(2), "retry waited out the delay");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_applies_to_exports() {
        let compiler = ScriptedCompiler::new(vec![Step::Busy, Step::Busy]);
        let cache = make_cache();
        let policy = RetryPolicy::default();

        let error = export_document(
            &compiler,
            &cache,
            &policy,
            &snapshot("Ada"),
            OutputFormat::Pdf,
            false,
        )
        .await
        .unwrap_err();

        assert_eq!(compiler.dispatches(), 2, "one original, one retry");
        assert!(matches!(error, CompileError::Busy));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_renderer_unavailable_export_degrades() {
        let compiler = ScriptedCompiler::new(vec![Step::RendererUnavailable, Step::Ok]);
        let cache = make_cache();
        let policy = RetryPolicy::default();

        let outcome = export_document(
            &compiler,
            &cache,
            &policy,
            &snapshot("Ada"),
            OutputFormat::Pdf,
            true,
        )
        .await
        .unwrap();

        assert_eq!(compiler.dispatches(), 2);
        assert!(outcome.degraded);
        assert_eq!(outcome.document.format, OutputFormat::Source);
        assert!(cache.is_empty(), "degraded artifacts are not cached");
    }

    #[tokio::test]
    async fn test_degradation_disabled_propagates_the_error() {
        let compiler = ScriptedCompiler::new(vec![Step::RendererUnavailable]);
        let cache = make_cache();
        let policy = RetryPolicy::default();

        let error = export_document(
            &compiler,
            &cache,
            &policy,
            &snapshot("Ada"),
            OutputFormat::Pdf,
            false,
        )
        .await
        .unwrap_err();

        assert_eq!(compiler.dispatches(), 1);
        assert!(matches!(error, CompileError::RendererUnavailable(_)));
    }

    #[tokio::test]
    async fn test_exported_artifact_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ScriptedCompiler::new(vec![Step::Ok]);
        let cache = make_cache();
        let policy = RetryPolicy::default();
        let doc = snapshot("Ada Lovelace");

        let outcome = export_document(&compiler, &cache, &policy, &doc, OutputFormat::Pdf, false)
            .await
            .unwrap();
        let path = dir
            .path()
            .join(suggested_filename(&doc, outcome.document.format));
        tokio::fs::write(&path, &outcome.document.bytes).await.unwrap();

        let read_back = tokio::fs::read(&path).await.unwrap();
        assert_eq!(read_back.as_slice(), outcome.document.bytes.as_ref());
        assert!(path.to_str().unwrap().ends_with("resume_Ada_Lovelace.pdf"));
    }

    #[test]
    fn test_suggested_filename_sanitizes_whitespace() {
        assert_eq!(
            suggested_filename(&snapshot("Ada   Lovelace Jr"), OutputFormat::Pdf),
            "resume_Ada_Lovelace_Jr.pdf"
        );
        assert_eq!(
            suggested_filename(&snapshot(""), OutputFormat::Source),
            "resume.tex"
        );
        assert_eq!(
            suggested_filename(&snapshot("Grace Hopper"), OutputFormat::Source),
            "resume_Grace_Hopper.tex"
        );
    }
}
