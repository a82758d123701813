/*!
 * # subfall
 *
 * A Rust library for translating subtitle files through multiple redundant
 * LLM endpoints, tolerating partial and transient failures of any single
 * endpoint.
 *
 * ## Features
 *
 * - Splits subtitle lines into fixed-size chunks with stable index ranges
 * - Fans chunks out across a primary endpoint pool under bounded concurrency
 * - Validates every response against a strict output contract (JSON array,
 *   exact count, no residual source-script characters)
 * - Escalates failed chunks to a fallback pool with bounded retry rounds
 * - Never loses a line: exhausted chunks keep their source text, flagged
 *   unresolved
 * - Resumable sessions via a serializable per-chunk snapshot
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing and writing
 * - `translation`: the chunked translation pipeline:
 *   - `translation::chunker`: chunk splitting
 *   - `translation::validator`: response contract validation
 *   - `translation::sanitizer`: normalization of accepted responses
 *   - `translation::dispatcher`: the orchestration state machine
 * - `pool`: endpoint pools with per-endpoint concurrency ceilings
 * - `providers`: endpoint transports (Gemini, mock)
 * - `session`: per-line outcomes, statistics, resume snapshots
 * - `progress`: event stream from dispatcher to observer
 * - `app_controller`: main application controller
 * - `errors`: custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod pool;
pub mod progress;
pub mod providers;
pub mod session;
pub mod subtitle_processor;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, PoolRole, Tone};
pub use app_controller::Controller;
pub use errors::{AppError, ConfigError, RejectionReason, TransportError};
pub use progress::{ProgressEvent, ProgressSender};
pub use session::{LineOutcome, ResolutionState, SessionOutcome, SessionReport, SessionSnapshot};
pub use subtitle_processor::{SubtitleCollection, SubtitleEntry};
pub use translation::{CancelHandle, Dispatcher};
