/*!
 * Session-level models: per-line outcomes, run statistics, and the
 * serializable snapshot used to resume an interrupted session.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::app_config::PoolRole;
use crate::errors::AppError;

/// Terminal state of a chunk (and of each of its lines)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    /// An accepted, sanitized result was merged
    Resolved,
    /// All attempts exhausted; source text retained as the output
    Unresolved,
}

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// Every chunk reached a terminal state through dispatch
    Completed,
    /// Cancellation was observed; remaining chunks reported unresolved
    Canceled,
}

/// Final per-line result, ordered by line index in the session report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    /// 1-based line index
    pub index: usize,
    /// Original source text
    pub source_text: String,
    /// Translated text, or the source text when unresolved
    pub translated_text: String,
    /// Terminal state of the owning chunk
    pub state: ResolutionState,
}

/// Counter snapshot for one endpoint identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStats {
    /// Endpoint identity
    pub name: String,
    /// Pool role
    pub role: PoolRole,
    /// Calls issued
    pub calls: u64,
    /// Responses accepted by the validator
    pub accepted: u64,
    /// Responses rejected by the validator
    pub rejected: u64,
    /// Transport-level failures, timeouts included
    pub transport_errors: u64,
    /// Mean call latency in milliseconds
    pub mean_latency_ms: u64,
    /// Whether the identity was disabled during the run
    pub disabled: bool,
}

/// Aggregate statistics for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Total input lines
    pub total_lines: usize,
    /// Total chunks dispatched or restored
    pub total_chunks: usize,
    /// Chunks that resolved
    pub resolved_chunks: usize,
    /// Chunks that exhausted their attempts
    pub unresolved_chunks: usize,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Run end time
    pub finished_at: DateTime<Utc>,
    /// Per-endpoint counters
    pub endpoints: Vec<EndpointStats>,
}

impl SessionStats {
    /// Fraction of chunks that resolved, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.resolved_chunks as f64 / self.total_chunks as f64) * 100.0
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Human-readable summary for logs and the CLI footer
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Translation statistics:".to_string(),
            format!("- Lines: {}", self.total_lines),
            format!(
                "- Chunks: {} ({} resolved, {} unresolved)",
                self.total_chunks, self.resolved_chunks, self.unresolved_chunks
            ),
            format!("- Success rate: {:.1}%", self.success_rate()),
            format!(
                "- Duration: {:.2}s",
                self.duration().num_milliseconds() as f64 / 1000.0
            ),
        ];
        for endpoint in &self.endpoints {
            lines.push(format!(
                "- {} [{}]: {} calls, {} accepted, {} rejected, {} transport errors, {} ms mean{}",
                endpoint.name,
                endpoint.role,
                endpoint.calls,
                endpoint.accepted,
                endpoint.rejected,
                endpoint.transport_errors,
                endpoint.mean_latency_ms,
                if endpoint.disabled { " (disabled)" } else { "" },
            ));
        }
        lines.join("\n")
    }
}

/// Snapshot of one chunk's terminal state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSnapshot {
    /// 1-based start index of the chunk
    pub start_index: usize,
    /// 1-based inclusive end index
    pub end_index: usize,
    /// Terminal state
    pub state: ResolutionState,
    /// Result lines (translations, or source text when unresolved)
    pub lines: Vec<String>,
}

/// Serializable per-chunk resolution state, sufficient to resume a session
/// without re-querying already-resolved chunks.
///
/// Chunking is deterministic, so a snapshot taken with the same chunk size
/// over the same input keys cleanly by `start_index`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Snapshot format version
    pub version: u32,
    /// Chunk size the session was chunked with
    pub chunk_size: usize,
    /// Total input lines
    pub total_lines: usize,
    /// Per-chunk terminal states, in index order
    pub chunks: Vec<ChunkSnapshot>,
}

impl SessionSnapshot {
    /// Current snapshot format version
    pub const VERSION: u32 = 1;

    /// Whether this snapshot can seed a run over the given input shape
    pub fn matches(&self, total_lines: usize, chunk_size: usize) -> bool {
        self.version == Self::VERSION
            && self.total_lines == total_lines
            && self.chunk_size == chunk_size
    }

    /// Resolved chunk result for a start index, if present
    pub fn resolved_lines(&self, start_index: usize) -> Option<&ChunkSnapshot> {
        self.chunks
            .iter()
            .find(|c| c.start_index == start_index && c.state == ResolutionState::Resolved)
    }

    /// Write the snapshot as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::File(format!("snapshot encode failed: {}", e)))?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Load a snapshot from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::File(format!("snapshot decode failed: {}", e)))
    }
}

/// Everything the dispatcher hands back for one run
#[derive(Debug)]
pub struct SessionReport {
    /// Per-line outcomes, ordered by line index
    pub outcomes: Vec<LineOutcome>,
    /// Aggregate statistics
    pub stats: SessionStats,
    /// Snapshot of per-chunk terminal states for resume
    pub snapshot: SessionSnapshot,
    /// Completed or canceled
    pub outcome: SessionOutcome,
}
