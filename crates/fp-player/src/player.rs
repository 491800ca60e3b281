//! Player actor.
//!
//! [`Player::spawn`] moves a [`PlaybackSession`] onto its own task and
//! returns a [`PlayerHandle`]. The task waits on commands and decoder output
//! at the same time, so a resize is acted on between two chunks rather than
//! after the stream ends.

use std::path::PathBuf;

use fp_core::{Error, PlaybackState, Result, TargetSize, Viewport};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::session::{PlaybackSession, SessionStats};
use crate::sink::FrameSink;

/// Commands queued for the player task.
const COMMAND_CAPACITY: usize = 32;

enum Command {
    Start {
        path: PathBuf,
        viewport: Viewport,
        reply: oneshot::Sender<Result<TargetSize>>,
    },
    Resize {
        viewport: Viewport,
        reply: oneshot::Sender<Result<TargetSize>>,
    },
    Stop {
        reply: oneshot::Sender<SessionStats>,
    },
    Shutdown,
}

/// Owns a session on a background task.
pub struct Player<S> {
    session: PlaybackSession<S>,
    commands: mpsc::Receiver<Command>,
    /// A command pulled off the queue while coalescing resizes.
    deferred: Option<Command>,
}

impl<S: FrameSink + 'static> Player<S> {
    /// Spawn the player task. It runs until [`PlayerHandle::shutdown`] or
    /// until every handle is dropped.
    pub fn spawn(session: PlaybackSession<S>) -> PlayerHandle<S> {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let state = session.subscribe_state();
        let player = Player {
            session,
            commands: rx,
            deferred: None,
        };
        let task = tokio::spawn(player.run());
        PlayerHandle {
            commands: tx,
            state,
            task,
        }
    }

    async fn run(mut self) -> PlaybackSession<S> {
        tracing::debug!("Player started");

        loop {
            if let Some(cmd) = self.deferred.take() {
                if !self.handle_command(cmd).await {
                    break;
                }
                continue;
            }

            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },

                Some(event) = self.session.recv(), if self.session.is_live() => {
                    if let Err(e) = self.session.handle_output(event) {
                        // Already recorded as the session's Failed state.
                        tracing::debug!("Playback ended with error: {e}");
                    }
                }
            }
        }

        self.session.stop().await;
        tracing::debug!("Player stopped");
        self.session
    }

    /// Returns `false` when the player should exit.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Start {
                path,
                viewport,
                reply,
            } => {
                let result = self.session.start(&path, viewport).await;
                let _ = reply.send(result);
            }
            Command::Resize { viewport, reply } => self.resize(viewport, reply).await,
            Command::Stop { reply } => {
                self.session.stop().await;
                let _ = reply.send(self.session.stats());
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Apply the newest of all queued resizes. Superseded requests get the
    /// outcome of the one that was applied.
    async fn resize(
        &mut self,
        mut viewport: Viewport,
        mut reply: oneshot::Sender<Result<TargetSize>>,
    ) {
        let mut superseded = Vec::new();
        while let Ok(next) = self.commands.try_recv() {
            match next {
                Command::Resize {
                    viewport: newer,
                    reply: newer_reply,
                } => {
                    superseded.push(std::mem::replace(&mut reply, newer_reply));
                    viewport = newer;
                }
                other => {
                    self.deferred = Some(other);
                    break;
                }
            }
        }
        if !superseded.is_empty() {
            tracing::debug!("Coalesced {} resize request(s) into {viewport}", superseded.len());
        }

        let result = self.session.resize(viewport).await;
        for early in superseded {
            let shared = match &result {
                Ok(target) => Ok(*target),
                Err(e) => Err(Error::Validation(format!("coalesced resize failed: {e}"))),
            };
            let _ = early.send(shared);
        }
        let _ = reply.send(result);
    }
}

/// Handle to a running [`Player`].
pub struct PlayerHandle<S> {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PlaybackState>,
    task: JoinHandle<PlaybackSession<S>>,
}

impl<S> PlayerHandle<S> {
    /// Start (or restart) playback of `path` within `viewport`.
    pub async fn start(&self, path: impl Into<PathBuf>, viewport: Viewport) -> Result<TargetSize> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Start {
            path: path.into(),
            viewport,
            reply,
        })
        .await?;
        rx.await.map_err(|_| gone())?
    }

    /// Restart the current source at a new viewport.
    pub async fn resize(&self, viewport: Viewport) -> Result<TargetSize> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Resize { viewport, reply }).await?;
        rx.await.map_err(|_| gone())?
    }

    /// Stop playback. Returns the counters of the run that was stopped.
    pub async fn stop(&self) -> Result<SessionStats> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Stop { reply }).await?;
        rx.await.map_err(|_| gone())
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// A receiver for observing state changes.
    pub fn watch_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `pred`, and return that state.
    pub async fn wait_for(&self, pred: impl FnMut(&PlaybackState) -> bool) -> Result<PlaybackState> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(pred).await.map_err(|_| gone())?;
        Ok(state.clone())
    }

    /// Stop playback, end the player task and hand back the session.
    pub async fn shutdown(self) -> Result<PlaybackSession<S>> {
        // A send error means the task already exited; join it regardless.
        let _ = self.commands.send(Command::Shutdown).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("player task failed: {e}")))
    }

    async fn request(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).await.map_err(|_| gone())
    }
}

fn gone() -> Error {
    Error::Internal("player task has stopped".into())
}
