//! Streaming decode sessions.
//!
//! A [`Decoder`] starts one decode run and hands back a [`DecodeSession`]:
//! a bounded stream of raw byte chunks followed by exactly one
//! [`DecodeExit`]. The producing side ([`DecodeProducer`]) lives in whatever
//! task drives the decoder process.
//!
//! The chunk channel is bounded. When the consumer falls behind, the
//! producer's `send` parks, the producer stops reading the pipe, and the OS
//! pipe buffer applies backpressure to the decoder process itself.

pub mod ffmpeg;

pub use self::ffmpeg::FfmpegDecoder;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fp_core::{PixelFormat, TargetSize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// How a decode run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeExit {
    /// Process exit code, `None` when killed by a signal or unknown.
    pub code: Option<i32>,
    /// Whether the run ended because it was asked to terminate.
    pub terminated: bool,
}

impl DecodeExit {
    /// A normal exit with the given code.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            terminated: false,
        }
    }

    /// An exit caused by termination.
    pub fn terminated(code: Option<i32>) -> Self {
        Self {
            code,
            terminated: true,
        }
    }

    /// True for a natural exit with status 0.
    pub fn success(&self) -> bool {
        !self.terminated && self.code == Some(0)
    }
}

/// One item from a [`DecodeSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Raw output bytes, in stream order.
    Chunk(Bytes),
    /// The run ended. Always the last event.
    Exited(DecodeExit),
}

/// Consumer half of a decode run.
///
/// Dropping the session cancels the run.
#[derive(Debug)]
pub struct DecodeSession {
    label: String,
    chunks: mpsc::Receiver<Bytes>,
    exit: Option<oneshot::Receiver<DecodeExit>>,
    cancel: CancellationToken,
    exited: Option<DecodeExit>,
}

/// Producer half of a decode run.
#[derive(Debug)]
pub struct DecodeProducer {
    chunks: mpsc::Sender<Bytes>,
    exit: oneshot::Sender<DecodeExit>,
    cancel: CancellationToken,
}

impl DecodeSession {
    /// Create a connected session/producer pair holding at most `capacity`
    /// undelivered chunks.
    pub fn channel(label: impl Into<String>, capacity: usize) -> (DecodeSession, DecodeProducer) {
        let (chunk_tx, chunk_rx) = mpsc::channel(capacity.max(1));
        let (exit_tx, exit_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let session = DecodeSession {
            label: label.into(),
            chunks: chunk_rx,
            exit: Some(exit_rx),
            cancel: cancel.clone(),
            exited: None,
        };
        let producer = DecodeProducer {
            chunks: chunk_tx,
            exit: exit_tx,
            cancel,
        };
        (session, producer)
    }

    /// Label used in logs (usually the source path).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The exit status, once [`DecodeEvent::Exited`] has been returned.
    pub fn exit_status(&self) -> Option<DecodeExit> {
        self.exited
    }

    /// Next chunk or the exit notification.
    ///
    /// Returns every chunk the producer sent, then `Exited` once, then `None`.
    /// Cancel safe.
    pub async fn next_event(&mut self) -> Option<DecodeEvent> {
        if let Some(chunk) = self.chunks.recv().await {
            return Some(DecodeEvent::Chunk(chunk));
        }
        let exit_rx = self.exit.as_mut()?;
        let exit = match exit_rx.await {
            Ok(exit) => exit,
            // Producer vanished without reporting: treat as an unknown exit.
            Err(_) => DecodeExit {
                code: None,
                terminated: self.cancel.is_cancelled(),
            },
        };
        self.exit = None;
        self.exited = Some(exit);
        Some(DecodeEvent::Exited(exit))
    }

    /// Stop the run and wait up to `grace` for it to report its exit.
    ///
    /// Undelivered chunks are discarded. If the run already exited, its
    /// recorded status is returned unchanged.
    pub async fn terminate(mut self, grace: Duration) -> DecodeExit {
        if let Some(exit) = self.exited {
            return exit;
        }
        self.cancel.cancel();
        // Closing the receiver unparks a producer blocked on a full channel.
        self.chunks.close();
        while self.chunks.try_recv().is_ok() {}

        let Some(exit_rx) = self.exit.take() else {
            return DecodeExit::terminated(None);
        };
        let exit = match tokio::time::timeout(grace, exit_rx).await {
            Ok(Ok(exit)) => exit,
            Ok(Err(_)) => DecodeExit::terminated(None),
            Err(_) => {
                tracing::warn!(
                    "Decoder for {} did not exit within {:?}; abandoning it",
                    self.label,
                    grace
                );
                DecodeExit::terminated(None)
            }
        };
        self.exited = Some(exit);
        exit
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl DecodeProducer {
    /// Deliver a chunk, waiting while the channel is full.
    ///
    /// Returns `false` once the consumer is gone or the run was cancelled;
    /// the caller should stop producing.
    pub async fn send(&self, chunk: Bytes) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.chunks.send(chunk) => sent.is_ok(),
        }
    }

    /// Token cancelled when the consumer asks the run to stop.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report the exit. Closes the chunk stream first, so the consumer sees
    /// every chunk before the exit.
    pub fn finish(self, exit: DecodeExit) {
        let DecodeProducer { chunks, exit: exit_tx, .. } = self;
        drop(chunks);
        let _ = exit_tx.send(exit);
    }
}

/// Starts decode runs that emit raw frames of a fixed size.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Human-readable name identifying this decoder implementation.
    fn name(&self) -> &'static str;

    /// Start decoding `path`, scaled to exactly `target`, in `format`.
    ///
    /// Fails only if the run cannot be started; failures after that are
    /// reported through [`DecodeEvent::Exited`].
    async fn spawn(
        &self,
        path: &Path,
        target: TargetSize,
        format: PixelFormat,
    ) -> fp_core::Result<DecodeSession>;
}
