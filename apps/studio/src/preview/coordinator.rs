//! Preview coordination state machine.
//!
//! One coordinator owns one edit session. UI-side producers push
//! [`PreviewEvent`]s through a [`PreviewHandle`]; the session task debounces
//! them, deduplicates against the last settled fingerprint and the in-flight
//! request, keeps at most one compile outstanding, absorbs transient render
//! failures with a single scheduled retry, and reports settled outcomes to
//! the [`PreviewSink`]. Superseded work is cancelled and its result
//! discarded; it never reaches the sink or the cache.
//!
//! Per content event:
//!   event → Debouncing (restarted by every event)
//!         → fingerprint recheck → cache lookup → dispatch → AwaitingCompile
//!         → settled (success | failure) → Idle
//! Transient failures detour through RetryWait and re-enter Debouncing with
//! the retained snapshot, so retries, reorders and ordinary edits all share
//! one cancellation path.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::cache::ResultCache;
use crate::compiler::{CompileError, DocumentCompiler, OutputFormat, RenderedDocument};
use crate::config::PreviewConfig;
use crate::errors::PreviewError;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::models::ResumeSnapshot;
use crate::preview::render::{PreviewFrame, PreviewSink, PreviewUpdate};
use crate::preview::retry::{RetryDecision, RetryPolicy};

const EVENT_BUFFER: usize = 64;
const OUTCOME_BUFFER: usize = 4;

// ─────────────────────────────────────────────
// Public surface
// ─────────────────────────────────────────────

/// Inbound edit-session events. Every variant carries the full snapshot;
/// the coordinator never diffs, it re-fingerprints.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    /// Any content-affecting change (field edits, formatting, template).
    ContentChanged(ResumeSnapshot),
    /// Section reorder. Invalidates every cached artifact before the normal
    /// debounce path runs.
    OrderChanged(ResumeSnapshot),
}

/// Cloneable producer half handed to the UI.
#[derive(Clone)]
pub struct PreviewHandle {
    events: mpsc::Sender<PreviewEvent>,
}

impl PreviewHandle {
    pub async fn content_changed(&self, snapshot: ResumeSnapshot) -> Result<(), PreviewError> {
        self.send(PreviewEvent::ContentChanged(snapshot)).await
    }

    pub async fn order_changed(&self, snapshot: ResumeSnapshot) -> Result<(), PreviewError> {
        self.send(PreviewEvent::OrderChanged(snapshot)).await
    }

    async fn send(&self, event: PreviewEvent) -> Result<(), PreviewError> {
        self.events
            .send(event)
            .await
            .map_err(|_| PreviewError::SessionClosed)
    }
}

/// Owner of the session task.
pub struct PreviewCoordinator {
    events: mpsc::Sender<PreviewEvent>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl PreviewCoordinator {
    /// Starts a session. The cache handle may be shared with other sessions
    /// and with renderer-side readers.
    pub fn spawn(
        config: PreviewConfig,
        compiler: Arc<dyn DocumentCompiler>,
        cache: ResultCache,
        sink: Box<dyn PreviewSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(OUTCOME_BUFFER);
        let stop = CancellationToken::new();
        let session = SessionTask {
            config,
            retry: config.retry_policy(),
            compiler,
            cache,
            sink,
            events: events_rx,
            outcomes_tx,
            outcomes: outcomes_rx,
            stop: stop.clone(),
            phase: Phase::Idle,
            last_settled: None,
        };
        let task = tokio::spawn(session.run());
        Self {
            events: events_tx,
            stop,
            task,
        }
    }

    pub fn handle(&self) -> PreviewHandle {
        PreviewHandle {
            events: self.events.clone(),
        }
    }

    /// Ends the session and waits for the task to exit. In-flight compile
    /// work is cancelled, not awaited.
    pub async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

// ─────────────────────────────────────────────
// Session task
// ─────────────────────────────────────────────

enum Phase {
    Idle,
    Debouncing(DebounceState),
    AwaitingCompile(PendingRequest),
    RetryWait(RetryState),
}

impl Phase {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Phase::Debouncing(state) => Some(state.deadline),
            Phase::RetryWait(state) => Some(state.deadline),
            Phase::Idle | Phase::AwaitingCompile(_) => None,
        }
    }
}

struct DebounceState {
    deadline: Instant,
    snapshot: Arc<ResumeSnapshot>,
    /// Zero for fresh edits; carried over by retry re-entry so the budget
    /// survives the shared debounce path.
    attempt: u32,
}

struct PendingRequest {
    id: Uuid,
    fingerprint: Fingerprint,
    snapshot: Arc<ResumeSnapshot>,
    cancel: CancellationToken,
    started_at: Instant,
    attempt: u32,
    degraded: bool,
}

struct RetryState {
    deadline: Instant,
    snapshot: Arc<ResumeSnapshot>,
    /// Attempt index the next dispatch will carry.
    attempt: u32,
}

struct CompileOutcome {
    request: Uuid,
    result: Result<RenderedDocument, CompileError>,
}

struct SessionTask {
    config: PreviewConfig,
    retry: RetryPolicy,
    compiler: Arc<dyn DocumentCompiler>,
    cache: ResultCache,
    sink: Box<dyn PreviewSink>,
    events: mpsc::Receiver<PreviewEvent>,
    outcomes_tx: mpsc::Sender<CompileOutcome>,
    outcomes: mpsc::Receiver<CompileOutcome>,
    stop: CancellationToken,
    phase: Phase,
    last_settled: Option<Fingerprint>,
}

impl SessionTask {
    async fn run(mut self) {
        debug!(
            debounce_ms = self.config.debounce.as_millis() as u64,
            "preview session started"
        );
        loop {
            let deadline = self.phase.deadline();
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => break,

                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break, // every producer handle dropped
                },

                outcome = self.outcomes.recv() => {
                    if let Some(outcome) = outcome {
                        self.handle_outcome(outcome);
                    }
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_deadline();
                }
            }
        }
        if let Phase::AwaitingCompile(pending) = &self.phase {
            pending.cancel.cancel();
        }
        debug!("preview session ended");
    }

    fn handle_event(&mut self, event: PreviewEvent) {
        match event {
            PreviewEvent::ContentChanged(snapshot) => self.on_content(Arc::new(snapshot)),
            PreviewEvent::OrderChanged(snapshot) => {
                // Reordering changes what every cached artifact would render
                // as, so nothing previously produced can be trusted.
                self.cache.invalidate_all();
                self.last_settled = None;
                debug!("section order changed, cache and settle marker reset");
                self.on_content(Arc::new(snapshot));
            }
        }
    }

    fn on_content(&mut self, snapshot: Arc<ResumeSnapshot>) {
        let fp = fingerprint(&snapshot);

        if let Phase::AwaitingCompile(pending) = &self.phase {
            if pending.fingerprint == fp {
                trace!(fingerprint = %fp, "event matches in-flight compile, suppressed");
                return;
            }
            debug!(
                superseded = %pending.id,
                fingerprint = %fp,
                "edit supersedes in-flight compile"
            );
            pending.cancel.cancel();
        }

        // Every event restarts the quiet period. A pending retry is simply
        // replaced: the stale snapshot must never outlive a newer edit.
        self.phase = Phase::Debouncing(DebounceState {
            deadline: Instant::now() + self.config.debounce,
            snapshot,
            attempt: 0,
        });
    }

    fn handle_deadline(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Debouncing(state) => {
                let fp = fingerprint(&state.snapshot);
                if self.last_settled == Some(fp) {
                    trace!(
                        fingerprint = %fp,
                        "debounce settled on already-settled content, suppressed"
                    );
                    return;
                }
                self.dispatch(state.snapshot, fp, state.attempt, false);
            }
            Phase::RetryWait(state) => {
                debug!(attempt = state.attempt, "retry timer fired, re-entering debounce");
                self.phase = Phase::Debouncing(DebounceState {
                    deadline: Instant::now() + self.config.debounce,
                    snapshot: state.snapshot,
                    attempt: state.attempt,
                });
            }
            // No deadline exists in these phases; put the state back.
            other => self.phase = other,
        }
    }

    fn dispatch(&mut self, snapshot: Arc<ResumeSnapshot>, fp: Fingerprint, attempt: u32, degraded: bool) {
        let format = if degraded {
            OutputFormat::Source
        } else {
            OutputFormat::Pdf
        };

        if !degraded {
            if let Some(document) = self.cache.lookup(&fp, format) {
                debug!(fingerprint = %fp, "serving preview from cache");
                self.last_settled = Some(fp);
                self.sink.on_preview(PreviewUpdate::Ready(PreviewFrame {
                    document,
                    fingerprint: fp,
                    from_cache: true,
                    degraded: false,
                }));
                return;
            }
        }

        let pending = PendingRequest {
            id: Uuid::new_v4(),
            fingerprint: fp,
            snapshot: Arc::clone(&snapshot),
            cancel: CancellationToken::new(),
            started_at: Instant::now(),
            attempt,
            degraded,
        };
        debug!(
            request = %pending.id,
            fingerprint = %fp,
            %format,
            attempt,
            "dispatching compile"
        );

        let compiler = Arc::clone(&self.compiler);
        let outcomes = self.outcomes_tx.clone();
        let token = pending.cancel.clone();
        let id = pending.id;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(request = %id, "compile superseded, result abandoned");
                }
                result = compiler.compile(&snapshot, format) => {
                    let _ = outcomes.send(CompileOutcome { request: id, result }).await;
                }
            }
        });

        self.phase = Phase::AwaitingCompile(pending);
    }

    fn handle_outcome(&mut self, outcome: CompileOutcome) {
        let pending = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitingCompile(pending) if pending.id == outcome.request => pending,
            other => {
                // Completion of a request that was superseded after its
                // result was already queued. Drop it on the floor.
                self.phase = other;
                trace!(request = %outcome.request, "stale compile outcome discarded");
                return;
            }
        };

        match outcome.result {
            Ok(document) => self.settle_success(pending, document),
            Err(error) => self.settle_failure(pending, error),
        }
    }

    fn settle_success(&mut self, pending: PendingRequest, document: RenderedDocument) {
        info!(
            request = %pending.id,
            fingerprint = %pending.fingerprint,
            elapsed_ms = pending.started_at.elapsed().as_millis() as u64,
            degraded = pending.degraded,
            "preview compile settled"
        );
        // Degraded stand-ins are not cached: the next content change should
        // try the primary format again.
        if !pending.degraded {
            self.cache.put(pending.fingerprint, document.clone());
        }
        self.last_settled = Some(pending.fingerprint);
        self.sink.on_preview(PreviewUpdate::Ready(PreviewFrame {
            document,
            fingerprint: pending.fingerprint,
            from_cache: false,
            degraded: pending.degraded,
        }));
    }

    fn settle_failure(&mut self, pending: PendingRequest, error: CompileError) {
        match self.retry.decide(&error, pending.attempt) {
            RetryDecision::After(delay) => {
                warn!(
                    request = %pending.id,
                    %error,
                    delay_ms = delay.as_millis() as u64,
                    "transient compile failure, retry scheduled"
                );
                self.sink.on_preview(PreviewUpdate::Retrying {
                    delay,
                    message: error.to_string(),
                });
                self.phase = Phase::RetryWait(RetryState {
                    deadline: Instant::now() + delay,
                    snapshot: pending.snapshot,
                    attempt: pending.attempt + 1,
                });
            }
            RetryDecision::Fatal => {
                if self.config.degrade_to_source && !pending.degraded && error.is_degradable() {
                    warn!(
                        request = %pending.id,
                        %error,
                        "renderer unavailable, degrading preview to source output"
                    );
                    self.dispatch(pending.snapshot, pending.fingerprint, pending.attempt, true);
                    return;
                }
                warn!(request = %pending.id, %error, "preview compile failed");
                self.last_settled = None;
                self.sink.on_preview(PreviewUpdate::Failed {
                    message: error.to_string(),
                });
            }
        }
    }
}
