//! Playback session state machine.
//!
//! A [`PlaybackSession`] owns at most one live decode run at a time: the
//! [`DecodeSession`] producing raw bytes, the [`FrameAssembler`] slicing them
//! into frames, and the [`FrameSink`] receiving those frames.
//!
//! ```text
//! Idle -> Probing -> Starting -> Streaming -> Stopping -> Idle
//!            \           \           \
//!             +-----------+-----------+---> Failed
//! ```
//!
//! Restarting (a new `start`, or `resize`) tears the live run down
//! completely, waiting for the decoder to exit, before the next one is
//! probed. Nothing from the old run reaches the sink after that point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fp_av::{DecodeEvent, DecodeExit, DecodeSession, Decoder, StreamProbe};
use fp_core::config::PlaybackConfig;
use fp_core::events::{EventBus, EventPayload};
use fp_core::{
    Error, Failure, MediaInfo, PixelFormat, PlaybackState, Result, SessionId, TargetSize,
    Viewport,
};
use fp_frame::{fit_within, FrameAssembler};
use tokio::sync::watch;

use crate::sink::FrameSink;

/// Pixel format requested from the decoder.
const FORMAT: PixelFormat = PixelFormat::Rgba;

/// Counters for one decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered to the sink.
    pub frames: u64,
    /// Raw bytes received from the decoder.
    pub bytes_received: u64,
    /// Bytes at end of stream that did not form a complete frame.
    pub trailing_bytes_dropped: usize,
}

/// What a call to [`PlaybackSession::handle_output`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A chunk was consumed; this many frames went to the sink.
    Frames(usize),
    /// The decoder exited cleanly. The session is idle again.
    Finished(SessionStats),
}

/// The live half of a session, present only while streaming.
struct LiveRun {
    decode: DecodeSession,
    assembler: FrameAssembler,
    target: TargetSize,
    stats: SessionStats,
}

/// Drives probe → fit → decode → assemble → sink for one source at a time.
pub struct PlaybackSession<S> {
    probe: Arc<dyn StreamProbe>,
    decoder: Arc<dyn Decoder>,
    sink: S,
    config: PlaybackConfig,
    events: Arc<EventBus>,
    state: watch::Sender<PlaybackState>,
    session_id: Option<SessionId>,
    source: Option<PathBuf>,
    media: Option<MediaInfo>,
    live: Option<LiveRun>,
    last_stats: SessionStats,
}

impl<S: FrameSink> PlaybackSession<S> {
    pub fn new(
        probe: Arc<dyn StreamProbe>,
        decoder: Arc<dyn Decoder>,
        sink: S,
        config: PlaybackConfig,
    ) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            probe,
            decoder,
            sink,
            config,
            events: Arc::new(EventBus::default()),
            state,
            session_id: None,
            source: None,
            media: None,
            live: None,
            last_stats: SessionStats::default(),
        }
    }

    /// Publish events on a shared bus instead of a private one.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    // ---- Accessors ----

    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Identifier of the current (or most recent) start.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Source of the most recent start.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Probe result of the most recent successful probe.
    pub fn media(&self) -> Option<&MediaInfo> {
        self.media.as_ref()
    }

    /// Output size of the live run.
    pub fn target(&self) -> Option<TargetSize> {
        self.live.as_ref().map(|run| run.target)
    }

    /// True while a decoder is running.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Counters of the live run, or of the last finished one.
    pub fn stats(&self) -> SessionStats {
        self.live
            .as_ref()
            .map(|run| run.stats)
            .unwrap_or(self.last_stats)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // ---- Lifecycle ----

    /// Start playing `path` scaled to fit `viewport`.
    ///
    /// Any live run is stopped first, and its exit awaited. On failure the
    /// session is left in [`PlaybackState::Failed`] and the error returned.
    pub async fn start(&mut self, path: &Path, viewport: Viewport) -> Result<TargetSize> {
        if self.live.is_some() {
            self.teardown().await;
        }

        self.session_id = Some(SessionId::new());
        self.source = Some(path.to_path_buf());
        self.media = None;

        match self.try_start(path, viewport).await {
            Ok(target) => Ok(target),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Restart the current source at a new viewport.
    ///
    /// Fails with [`Error::Validation`] if nothing has been started yet.
    pub async fn resize(&mut self, viewport: Viewport) -> Result<TargetSize> {
        let Some(path) = self.source.clone() else {
            return Err(Error::Validation(
                "resize requested before any source was started".into(),
            ));
        };
        tracing::info!("Viewport changed to {viewport}; restarting {}", path.display());
        self.start(&path, viewport).await
    }

    /// Stop the live run, if any, and return to idle.
    ///
    /// Idempotent: with nothing running this does nothing and returns `None`.
    pub async fn stop(&mut self) -> Option<DecodeExit> {
        let exit = self.teardown().await?;
        self.transition(PlaybackState::Idle);
        Some(exit)
    }

    async fn try_start(&mut self, path: &Path, viewport: Viewport) -> Result<TargetSize> {
        self.transition(PlaybackState::Probing);

        let timeout = self.config.probe_timeout();
        let info = tokio::time::timeout(timeout, self.probe.probe(path))
            .await
            .map_err(|_| Error::Probe(format!("probe timed out after {timeout:?}")))??;
        self.events.broadcast(
            self.session_id,
            EventPayload::StreamProbed {
                width: info.width,
                height: info.height,
                frame_rate: info.frame_rate,
            },
        );

        let target = fit_within(info.width, info.height, viewport);
        self.media = Some(info);
        let target = target.validate()?;
        self.transition(PlaybackState::Starting);

        let assembler = FrameAssembler::for_target(target, FORMAT)?;
        let decode = self.decoder.spawn(path, target, FORMAT).await?;

        self.sink.configure(target);
        self.events.broadcast(
            self.session_id,
            EventPayload::DecodeStarted {
                target,
                frame_size: assembler.frame_size(),
            },
        );
        self.live = Some(LiveRun {
            decode,
            assembler,
            target,
            stats: SessionStats::default(),
        });
        self.transition(PlaybackState::Streaming);
        Ok(target)
    }

    /// Terminate the live run and discard its buffered bytes, without
    /// settling on a final state.
    async fn teardown(&mut self) -> Option<DecodeExit> {
        let run = self.live.take()?;
        self.transition(PlaybackState::Stopping);

        let LiveRun {
            decode,
            assembler,
            stats,
            ..
        } = run;
        let discarded = assembler.buffered_len();
        drop(assembler);

        let exit = decode.terminate(self.config.stop_timeout()).await;
        tracing::info!(
            session = ?self.session_id,
            code = ?exit.code,
            frames = stats.frames,
            discarded,
            "Decoder stopped"
        );
        self.events.broadcast(
            self.session_id,
            EventPayload::DecoderExited {
                code: exit.code,
                terminated: exit.terminated,
                frames: stats.frames,
            },
        );
        self.last_stats = stats;
        Some(exit)
    }

    // ---- Streaming ----

    /// Wait for the next decoder output.
    ///
    /// Returns `None` immediately when no run is live. Cancel safe, so it
    /// can sit in a `select!` next to other work.
    pub async fn recv(&mut self) -> Option<DecodeEvent> {
        let run = self.live.as_mut()?;
        run.decode.next_event().await
    }

    /// Feed one decoder output through the assembler into the sink.
    ///
    /// Returns [`Error::Decode`] once, when the decoder exits unsuccessfully;
    /// the session is then failed.
    pub fn handle_output(&mut self, event: DecodeEvent) -> Result<Progress> {
        match event {
            DecodeEvent::Chunk(chunk) => {
                let Some(run) = self.live.as_mut() else {
                    return Ok(Progress::Frames(0));
                };
                run.stats.bytes_received += chunk.len() as u64;

                let sink = &mut self.sink;
                let mut rendered = 0;
                for frame in run.assembler.push(&chunk) {
                    sink.render(&frame, run.target);
                    rendered += 1;
                }
                run.stats.frames += rendered as u64;
                if rendered > 0 {
                    tracing::trace!("Rendered {rendered} frame(s), {} total", run.stats.frames);
                }
                Ok(Progress::Frames(rendered))
            }
            DecodeEvent::Exited(exit) => self.finish(exit),
        }
    }

    /// Receive and handle one output. `None` when nothing is live.
    pub async fn pump_once(&mut self) -> Option<Result<Progress>> {
        let event = self.recv().await?;
        Some(self.handle_output(event))
    }

    /// Stream the live run until the decoder exits.
    pub async fn run_to_end(&mut self) -> Result<SessionStats> {
        if self.live.is_none() {
            return Err(Error::Validation("no decode run is active".into()));
        }
        loop {
            match self.pump_once().await {
                Some(Ok(Progress::Finished(stats))) => return Ok(stats),
                Some(Ok(Progress::Frames(_))) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(self.last_stats),
            }
        }
    }

    fn finish(&mut self, exit: DecodeExit) -> Result<Progress> {
        let Some(run) = self.live.take() else {
            return Ok(Progress::Finished(self.last_stats));
        };
        let mut stats = run.stats;

        let trailing = run.assembler.finish();
        stats.trailing_bytes_dropped = trailing;
        if trailing > 0 {
            tracing::warn!(
                "Dropping {trailing} trailing byte(s) of {}: not a complete frame",
                run.decode.label()
            );
            self.events.broadcast(
                self.session_id,
                EventPayload::TrailingBytesDropped { bytes: trailing },
            );
        }

        tracing::info!(
            session = ?self.session_id,
            code = ?exit.code,
            frames = stats.frames,
            "Decoder exited"
        );
        self.events.broadcast(
            self.session_id,
            EventPayload::DecoderExited {
                code: exit.code,
                terminated: exit.terminated,
                frames: stats.frames,
            },
        );
        self.last_stats = stats;

        if exit.success() {
            self.transition(PlaybackState::Idle);
            return Ok(Progress::Finished(stats));
        }

        let message = if exit.terminated {
            format!("decoder for {} was terminated", run.decode.label())
        } else {
            format!("decoder for {} failed", run.decode.label())
        };
        let err = Error::decode(exit.code, message);
        self.fail(&err);
        Err(err)
    }

    // ---- State ----

    fn fail(&mut self, err: &Error) {
        tracing::error!("Playback failed: {err}");
        let failure = Failure::from(err);
        self.events.broadcast(
            self.session_id,
            EventPayload::SessionFailed {
                kind: failure.kind,
                message: failure.message.clone(),
            },
        );
        self.transition(PlaybackState::Failed(failure));
    }

    fn transition(&mut self, to: PlaybackState) {
        let from = self.state.send_replace(to.clone());
        if from == to {
            return;
        }
        tracing::debug!("Playback state {from} -> {to}");
        self.events.broadcast(self.session_id, EventPayload::StateChanged { from, to });
    }
}
