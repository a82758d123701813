/*!
 * Transport implementations for translation endpoints.
 *
 * This module contains the transport seam the endpoint pools call through:
 * - Gemini: Google Generative Language REST API
 * - Mock: scripted in-process transport used by tests
 */

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::Tone;
use crate::errors::TransportError;
use crate::translation::chunker::Chunk;

/// One chunk-translation request as handed to a transport
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// The chunk to translate
    pub chunk: Chunk,
    /// Proper-noun substitution table, shared across the session
    pub name_map: Arc<BTreeMap<String, String>>,
    /// Requested register
    pub tone: Tone,
}

/// Common trait for all endpoint transports.
///
/// A transport performs exactly one call and reports transport-level failures
/// through `TransportError`. It returns the raw response text untouched;
/// content validation happens downstream and never here.
#[async_trait]
pub trait ChunkTranslator: Send + Sync + Debug {
    /// Issue one translation call for one chunk
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<String, TransportError>;
}

pub mod gemini;
pub mod mock;
