/*!
 * Mock transport for tests.
 *
 * Provides a scripted in-process `ChunkTranslator` so dispatcher and pool
 * behavior can be exercised without any external API calls. Each instance
 * tracks call counts and the high-water mark of concurrent in-flight calls.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::TransportError;

use super::{ChunkRequest, ChunkTranslator};

/// One scripted reply, consumed in order
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this raw response text
    Respond(String),
    /// Fail with this transport error
    Fail(TransportError),
}

type ReplyFn = dyn Fn(&ChunkRequest) -> Result<String, TransportError> + Send + Sync;

/// Scripted transport. Replies are served from the script first; once the
/// script is exhausted the default behavior answers every further call.
pub struct MockTranslator {
    script: Mutex<VecDeque<MockReply>>,
    default: Box<ReplyFn>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl std::fmt::Debug for MockTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTranslator")
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish()
    }
}

/// Encode lines as the JSON array the validator expects
pub fn json_array(lines: &[String]) -> String {
    serde_json::to_string(lines).unwrap_or_else(|_| "[]".to_string())
}

impl MockTranslator {
    fn with_default(default: Box<ReplyFn>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default,
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Transport that "translates" every line by prefixing it, preserving
    /// empty lines as empty
    pub fn translating_with(prefix: &str) -> Self {
        let prefix = prefix.to_string();
        Self::with_default(Box::new(move |request| {
            let lines: Vec<String> = request
                .chunk
                .lines
                .iter()
                .map(|l| {
                    if l.text.trim().is_empty() {
                        String::new()
                    } else {
                        format!("{}{}", prefix, l.text)
                    }
                })
                .collect();
            Ok(json_array(&lines))
        }))
    }

    /// Transport that always fails with the given error
    pub fn always_failing(error: TransportError) -> Self {
        Self::with_default(Box::new(move |_| Err(error.clone())))
    }

    /// Transport that always answers with one line too many, triggering a
    /// wrong-count rejection downstream
    pub fn always_wrong_count() -> Self {
        Self::with_default(Box::new(|request| {
            let lines: Vec<String> = (0..request.chunk.len() + 1)
                .map(|i| format!("extra {}", i))
                .collect();
            Ok(json_array(&lines))
        }))
    }

    /// Transport that always answers with text that is not JSON
    pub fn always_invalid_format() -> Self {
        Self::with_default(Box::new(|_| Ok("I cannot translate that.".to_string())))
    }

    /// Queue scripted replies to serve before the default behavior kicks in
    pub fn scripted(self, replies: Vec<MockReply>) -> Self {
        *self.script.lock() = replies.into();
        self
    }

    /// Hold each call open for the given duration, making concurrency
    /// observable
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Total calls served
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at the same time
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkTranslator for MockTranslator {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().pop_front();
        let result = match scripted {
            Some(MockReply::Respond(text)) => Ok(text),
            Some(MockReply::Fail(error)) => Err(error),
            None => (self.default)(request),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
