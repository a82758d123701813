/*!
 * The chunk dispatcher: fans chunks out across the primary pool under bounded
 * concurrency, validates and sanitizes every response, escalates failures to
 * the fallback pool with bounded retries, and merges the results into an
 * ordered, complete per-line mapping.
 *
 * Per-chunk state machine:
 * queued -> primary attempt(s) -> accepted
 *        -> rejected/transport  -> fallback rounds -> accepted
 *                                                  -> exhausted -> unresolved
 *
 * A chunk reaches exactly one terminal state; an unresolved chunk keeps its
 * source text, so the session never loses a line and never blocks forever.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::app_config::{Tone, TranslationSettings};
use crate::errors::AppError;
use crate::pool::{Endpoint, EndpointPool};
use crate::progress::{ProgressEvent, ProgressSender};
use crate::providers::ChunkRequest;
use crate::session::{
    ChunkSnapshot, LineOutcome, ResolutionState, SessionOutcome, SessionReport, SessionSnapshot,
    SessionStats,
};

use super::chunker::{chunkify, Chunk, Line};
use super::{sanitizer, validator};

/// Tunables for one dispatch run
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Lines per chunk
    pub chunk_size: usize,
    /// Fallback rounds before a chunk is declared unresolved
    pub retry_rounds: usize,
    /// Hard cap on total calls for one chunk; bounds pure transport-error
    /// loops, which do not consume retry rounds
    pub max_attempts_per_chunk: usize,
    /// Base delay between fallback rounds in milliseconds
    pub retry_backoff_ms: u64,
    /// Requested register
    pub tone: Tone,
    /// Use extended CJK ranges for residual-script detection
    pub strict_script_check: bool,
}

impl From<&TranslationSettings> for DispatchOptions {
    fn from(settings: &TranslationSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            retry_rounds: settings.retry_rounds,
            max_attempts_per_chunk: settings.max_attempts_per_chunk,
            retry_backoff_ms: settings.retry_backoff_ms,
            tone: settings.tone,
            strict_script_check: settings.strict_script_check,
        }
    }
}

/// Session-level cancellation signal.
///
/// In-flight calls are allowed to finish but their results are discarded;
/// no new attempts are scheduled once the flag is observed.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one endpoint attempt for one chunk
enum Attempt {
    Accepted(Vec<String>),
    Rejected,
    Transport,
}

/// Terminal result of one chunk
struct ChunkResult {
    chunk: Chunk,
    state: ResolutionState,
    lines: Vec<String>,
    endpoint: Option<String>,
}

struct RunCounters {
    resolved: AtomicUsize,
    unresolved: AtomicUsize,
    in_flight: AtomicUsize,
}

/// Orchestrates chunk translation across a primary and a fallback pool.
///
/// The dispatcher exclusively owns chunk scheduling state and the merged
/// result mapping for the duration of one run; pools own only their
/// concurrency-limiting resource.
pub struct Dispatcher {
    primary: Arc<EndpointPool>,
    fallback: Arc<EndpointPool>,
    name_map: Arc<BTreeMap<String, String>>,
    options: DispatchOptions,
    progress: ProgressSender,
    cancel: CancelHandle,
    rr_primary: AtomicUsize,
    rr_fallback: AtomicUsize,
}

impl Dispatcher {
    /// Create a dispatcher over the two pools
    pub fn new(
        primary: Arc<EndpointPool>,
        fallback: Arc<EndpointPool>,
        name_map: BTreeMap<String, String>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            primary,
            fallback,
            name_map: Arc::new(name_map),
            options,
            progress: ProgressSender::disabled(),
            cancel: CancelHandle::default(),
            rr_primary: AtomicUsize::new(0),
            rr_fallback: AtomicUsize::new(0),
        }
    }

    /// Attach a progress event sender
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    /// Handle the caller can use to cancel the run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Translate all lines, optionally resuming from a prior snapshot.
    ///
    /// The returned outcomes are ordered by line index regardless of chunk
    /// completion order, and every input line appears exactly once.
    pub async fn run(
        &self,
        lines: &[Line],
        resume: Option<&SessionSnapshot>,
    ) -> Result<SessionReport, AppError> {
        let started_at = Utc::now();

        if lines.is_empty() {
            return Ok(self.report(Vec::new(), started_at, SessionOutcome::Completed));
        }

        let chunks = chunkify(lines, self.options.chunk_size)?;
        let total_chunks = chunks.len();
        info!(
            "Dispatching {} lines as {} chunks (chunk_size={})",
            lines.len(),
            total_chunks,
            self.options.chunk_size
        );

        let counters = RunCounters {
            resolved: AtomicUsize::new(0),
            unresolved: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        };

        // Restore chunks already resolved by a prior run
        let snapshot = resume.filter(|s| s.matches(lines.len(), self.options.chunk_size));
        let mut results: Vec<ChunkResult> = Vec::with_capacity(total_chunks);
        let mut pending: Vec<Chunk> = Vec::new();
        for chunk in chunks {
            match snapshot.and_then(|s| s.resolved_lines(chunk.start_index)) {
                Some(restored) if restored.lines.len() == chunk.len() => {
                    counters.resolved.fetch_add(1, Ordering::SeqCst);
                    self.emit_chunk_event(&chunk, ResolutionState::Resolved, None, &counters);
                    results.push(ChunkResult {
                        lines: restored.lines.clone(),
                        state: ResolutionState::Resolved,
                        endpoint: None,
                        chunk,
                    });
                }
                _ => pending.push(chunk),
            }
        }
        if !results.is_empty() {
            info!("Restored {} resolved chunks from snapshot", results.len());
        }

        // Fan out, bounded by the primary pool's summed concurrency ceiling
        let parallelism = self.primary.total_capacity().max(1);
        let dispatched: Vec<Result<ChunkResult, AppError>> = stream::iter(pending)
            .map(|chunk| self.resolve_chunk(chunk, &counters))
            .buffer_unordered(parallelism)
            .collect()
            .await;

        for result in dispatched {
            results.push(result?);
        }

        let outcome = if self.canceled() {
            SessionOutcome::Canceled
        } else {
            SessionOutcome::Completed
        };
        self.progress.send(ProgressEvent::SessionFinished {
            outcome,
            resolved: counters.resolved.load(Ordering::SeqCst),
            unresolved: counters.unresolved.load(Ordering::SeqCst),
        });

        Ok(self.report(results, started_at, outcome))
    }

    /// Drive one chunk to its terminal state and account for it
    async fn resolve_chunk(
        &self,
        chunk: Chunk,
        counters: &RunCounters,
    ) -> Result<ChunkResult, AppError> {
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = self.resolve_chunk_inner(&chunk).await;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        let result = match outcome? {
            Some((lines, endpoint)) => {
                counters.resolved.fetch_add(1, Ordering::SeqCst);
                ChunkResult {
                    state: ResolutionState::Resolved,
                    lines,
                    endpoint,
                    chunk,
                }
            }
            None => {
                counters.unresolved.fetch_add(1, Ordering::SeqCst);
                warn!("Chunk {} unresolved, keeping source text", chunk);
                ChunkResult {
                    state: ResolutionState::Unresolved,
                    lines: chunk.lines.iter().map(|l| l.text.clone()).collect(),
                    endpoint: None,
                    chunk,
                }
            }
        };

        self.emit_chunk_event(&result.chunk, result.state, result.endpoint.as_deref(), counters);
        Ok(result)
    }

    /// The per-chunk state machine: primary pass, then fallback rounds.
    ///
    /// Returns `Ok(Some(...))` when an accepted, sanitized result exists,
    /// `Ok(None)` when attempts are exhausted or cancellation was observed,
    /// and `Err` only for session-fatal conditions.
    async fn resolve_chunk_inner(
        &self,
        chunk: &Chunk,
    ) -> Result<Option<(Vec<String>, Option<String>)>, AppError> {
        // Blank chunks resolve locally: empty input maps to empty output
        // without invoking translation
        if chunk.is_all_blank() {
            return Ok(Some((vec![String::new(); chunk.len()], None)));
        }

        let request = ChunkRequest {
            chunk: chunk.clone(),
            name_map: self.name_map.clone(),
            tone: self.options.tone,
        };
        let mut attempts = 0usize;

        // Primary pass: one rotated walk over usable primary identities
        let primaries = self.primary.usable();
        if primaries.is_empty() {
            return Err(AppError::PoolExhausted {
                role: self.primary.role.display_name().to_string(),
            });
        }
        let offset = self.rr_primary.fetch_add(1, Ordering::SeqCst);
        for i in 0..primaries.len() {
            if self.canceled() {
                return Ok(None);
            }
            if attempts >= self.options.max_attempts_per_chunk {
                break;
            }
            let endpoint = &primaries[(offset + i) % primaries.len()];
            if endpoint.is_disabled() {
                continue;
            }
            attempts += 1;
            match self.attempt(&self.primary, endpoint, &request).await {
                Attempt::Accepted(lines) => {
                    if self.canceled() {
                        return Ok(None);
                    }
                    return Ok(Some((lines, Some(endpoint.name.clone()))));
                }
                Attempt::Rejected => {}
                Attempt::Transport => {}
            }
        }
        if self.primary.is_exhausted() {
            return Err(AppError::PoolExhausted {
                role: self.primary.role.display_name().to_string(),
            });
        }

        // Fallback rounds. A round only consumes the retry ceiling when it
        // saw a content rejection; pure transport-error passes are bounded
        // by the overall attempt ceiling instead.
        let mut rounds = 0usize;
        while rounds < self.options.retry_rounds
            && attempts < self.options.max_attempts_per_chunk
            && !self.canceled()
        {
            let fallbacks = self.fallback.usable();
            if fallbacks.is_empty() {
                if self.fallback.is_empty() {
                    break;
                }
                return Err(AppError::PoolExhausted {
                    role: self.fallback.role.display_name().to_string(),
                });
            }

            let offset = self.rr_fallback.fetch_add(1, Ordering::SeqCst);
            let mut saw_rejection = false;
            for i in 0..fallbacks.len() {
                if self.canceled() || attempts >= self.options.max_attempts_per_chunk {
                    break;
                }
                let endpoint = &fallbacks[(offset + i) % fallbacks.len()];
                if endpoint.is_disabled() {
                    continue;
                }
                attempts += 1;
                match self.attempt(&self.fallback, endpoint, &request).await {
                    Attempt::Accepted(lines) => {
                        if self.canceled() {
                            return Ok(None);
                        }
                        return Ok(Some((lines, Some(endpoint.name.clone()))));
                    }
                    Attempt::Rejected => saw_rejection = true,
                    Attempt::Transport => {}
                }
            }

            if saw_rejection {
                rounds += 1;
            }
            if self.fallback.is_exhausted() {
                return Err(AppError::PoolExhausted {
                    role: self.fallback.role.display_name().to_string(),
                });
            }

            if rounds < self.options.retry_rounds
                && attempts < self.options.max_attempts_per_chunk
                && !self.canceled()
            {
                let delay = self.options.retry_backoff_ms << rounds.min(4);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Ok(None)
    }

    /// One call to one endpoint, with validation and sanitization
    async fn attempt(
        &self,
        pool: &EndpointPool,
        endpoint: &Endpoint,
        request: &ChunkRequest,
    ) -> Attempt {
        let chunk = &request.chunk;
        match pool.call(endpoint, request).await {
            Ok(raw) => {
                let sources = chunk.source_texts();
                match validator::validate(&raw, &sources, self.options.strict_script_check) {
                    Ok(lines) => {
                        endpoint.record_content_outcome(true);
                        debug!("Chunk {} accepted by {}", chunk, endpoint.name);
                        Attempt::Accepted(sanitizer::sanitize(&lines, &sources, &self.name_map))
                    }
                    Err(reason) => {
                        endpoint.record_content_outcome(false);
                        warn!(
                            "Chunk {} rejected by {}: {}",
                            chunk,
                            endpoint.name,
                            reason.as_str()
                        );
                        Attempt::Rejected
                    }
                }
            }
            Err(error) => {
                warn!("Chunk {} transport error on {}: {}", chunk, endpoint.name, error);
                Attempt::Transport
            }
        }
    }

    fn emit_chunk_event(
        &self,
        chunk: &Chunk,
        state: ResolutionState,
        endpoint: Option<&str>,
        counters: &RunCounters,
    ) {
        self.progress.send(ProgressEvent::ChunkFinished {
            start_index: chunk.start_index,
            end_index: chunk.end_index,
            state,
            endpoint: endpoint.map(|e| e.to_string()),
            resolved: counters.resolved.load(Ordering::SeqCst),
            unresolved: counters.unresolved.load(Ordering::SeqCst),
            in_flight: counters.in_flight.load(Ordering::SeqCst),
        });
    }

    /// Merge chunk results into the ordered session report
    fn report(
        &self,
        mut results: Vec<ChunkResult>,
        started_at: chrono::DateTime<Utc>,
        outcome: SessionOutcome,
    ) -> SessionReport {
        // Chunks complete out of order under concurrency; the mapping is
        // always rebuilt in index order
        results.sort_by_key(|r| r.chunk.start_index);

        let mut outcomes = Vec::new();
        let mut chunk_snapshots = Vec::with_capacity(results.len());
        let mut resolved_chunks = 0;
        let mut unresolved_chunks = 0;

        for result in &results {
            match result.state {
                ResolutionState::Resolved => resolved_chunks += 1,
                ResolutionState::Unresolved => unresolved_chunks += 1,
            }
            let mut snapshot_lines = Vec::with_capacity(result.chunk.len());
            for (i, line) in result.chunk.lines.iter().enumerate() {
                let translated = match result.state {
                    ResolutionState::Resolved => {
                        if line.text.trim().is_empty() {
                            String::new()
                        } else {
                            result.lines.get(i).cloned().unwrap_or_default()
                        }
                    }
                    ResolutionState::Unresolved => line.text.clone(),
                };
                snapshot_lines.push(translated.clone());
                outcomes.push(LineOutcome {
                    index: line.index,
                    source_text: line.text.clone(),
                    translated_text: translated,
                    state: result.state,
                });
            }
            chunk_snapshots.push(ChunkSnapshot {
                start_index: result.chunk.start_index,
                end_index: result.chunk.end_index,
                state: result.state,
                lines: snapshot_lines,
            });
        }

        let mut endpoints = self.primary.endpoint_stats();
        endpoints.extend(self.fallback.endpoint_stats());

        SessionReport {
            stats: SessionStats {
                total_lines: outcomes.len(),
                total_chunks: results.len(),
                resolved_chunks,
                unresolved_chunks,
                started_at,
                finished_at: Utc::now(),
                endpoints,
            },
            snapshot: SessionSnapshot {
                version: SessionSnapshot::VERSION,
                chunk_size: self.options.chunk_size,
                total_lines: outcomes.len(),
                chunks: chunk_snapshots,
            },
            outcomes,
            outcome,
        }
    }
}
