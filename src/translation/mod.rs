/*!
 * Chunked translation pipeline.
 *
 * This module contains the core of the application, split into several
 * submodules:
 *
 * - `chunker`: splitting the line sequence into fixed-size chunks
 * - `validator`: response contract validation and rejection classification
 * - `sanitizer`: normalization of accepted responses
 * - `prompts`: system and per-chunk prompt construction
 * - `dispatcher`: the orchestration state machine over the endpoint pools
 */

// Re-export main types for easier usage
pub use self::chunker::{chunkify, Chunk, Line};
pub use self::dispatcher::{CancelHandle, DispatchOptions, Dispatcher};

// Submodules
pub mod chunker;
pub mod dispatcher;
pub mod prompts;
pub mod sanitizer;
pub mod validator;
