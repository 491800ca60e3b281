//! Playback event log.
//!
//! Sessions report lifecycle milestones on an [`EventBus`]: live listeners
//! get them over a `tokio::sync::broadcast` channel, and a bounded history
//! keeps the latest ones around for late readers and tests.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::error::FailureKind;
use crate::ids::SessionId;
use crate::media::{FrameRate, TargetSize};
use crate::state::PlaybackState;

/// Events kept in history when no explicit size is given.
pub const DEFAULT_HISTORY: usize = 128;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    StreamProbed {
        width: u32,
        height: u32,
        frame_rate: Option<FrameRate>,
    },
    DecodeStarted {
        target: TargetSize,
        frame_size: usize,
    },
    DecoderExited {
        code: Option<i32>,
        terminated: bool,
        frames: u64,
    },
    TrailingBytesDropped {
        bytes: usize,
    },
    SessionFailed {
        kind: FailureKind,
        message: String,
    },
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::StreamProbed { .. } => "stream_probed",
            Self::DecodeStarted { .. } => "decode_started",
            Self::DecoderExited { .. } => "decoder_exited",
            Self::TrailingBytesDropped { .. } => "trailing_bytes_dropped",
            Self::SessionFailed { .. } => "session_failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Position in the bus's emission order, starting at 1.
    pub seq: u64,
    pub at: DateTime<Utc>,
    /// Decode run the event belongs to; `None` before the first start.
    pub session: Option<SessionId>,
    pub payload: EventPayload,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

pub struct EventBus {
    tx: broadcast::Sender<Event>,
    next_seq: AtomicU64,
    history: Mutex<VecDeque<Event>>,
    history_len: usize,
}

impl EventBus {
    /// `capacity` bounds the broadcast backlog per subscriber; `history_len`
    /// bounds the retained history.
    pub fn new(capacity: usize, history_len: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_seq: AtomicU64::new(1),
            history: Mutex::new(VecDeque::with_capacity(history_len)),
            history_len,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Record an event and hand it to every live subscriber.
    pub fn broadcast(&self, session: Option<SessionId>, payload: EventPayload) -> u64 {
        let event = Event {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            at: Utc::now(),
            session,
            payload,
        };
        let seq = event.seq;

        if self.history_len > 0 {
            let mut history = self.history.lock();
            if history.len() == self.history_len {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // Nobody listening is fine.
        let _ = self.tx.send(event);
        seq
    }

    /// Up to `n` events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.history.lock().iter().rev().take(n).cloned().collect()
    }

    /// Retained events of one decode run, in emission order.
    pub fn history_for(&self, session: SessionId) -> Vec<Event> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.session == Some(session))
            .cloned()
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256, DEFAULT_HISTORY)
    }
}
