/*!
 * Progress notification stream from the dispatcher to an observer.
 *
 * Events carry only primitive counts and enums; no UI types cross this
 * boundary, and a slow or absent observer can never block scheduling (the
 * channel is unbounded and send failures are ignored).
 */

use tokio::sync::mpsc;

use crate::session::{ResolutionState, SessionOutcome};

/// One progress notification
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A chunk reached a terminal state
    ChunkFinished {
        /// 1-based start index of the chunk
        start_index: usize,
        /// 1-based inclusive end index
        end_index: usize,
        /// Terminal state
        state: ResolutionState,
        /// Endpoint that produced the accepted result, if any
        endpoint: Option<String>,
        /// Chunks resolved so far
        resolved: usize,
        /// Chunks unresolved so far
        unresolved: usize,
        /// Chunks currently being attempted
        in_flight: usize,
    },
    /// The session reached its terminal state
    SessionFinished {
        /// Completed or canceled
        outcome: SessionOutcome,
        /// Final resolved chunk count
        resolved: usize,
        /// Final unresolved chunk count
        unresolved: usize,
    },
}

/// Fire-and-forget sender handed to the dispatcher
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender that drops every event (no observer attached)
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a connected sender/receiver pair
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Emit an event; a dropped receiver is not an error
    pub fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
