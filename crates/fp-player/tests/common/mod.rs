//! Shared fakes for playback tests.
//!
//! [`FakeProbe`] returns fixed dimensions, [`ScriptedDecoder`] produces a
//! scripted byte stream per spawn, and [`RecordingSink`] keeps every frame it
//! is handed. Each decoder run fills its frames with a distinct byte (run 1
//! writes `1`, run 2 writes `2`, ...) so tests can tell runs apart.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use fp_av::{DecodeExit, DecodeSession, Decoder, StreamProbe};
use fp_core::config::PlaybackConfig;
use fp_core::{MediaInfo, PixelFormat, TargetSize};
use fp_frame::Frame;
use fp_player::{FrameSink, PlaybackSession};

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

pub struct FakeProbe {
    result: Result<(u32, u32), String>,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            result: Ok((width, height)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StreamProbe for FakeProbe {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> fp_core::Result<MediaInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok((width, height)) => Ok(MediaInfo {
                file_path: path.to_path_buf(),
                width: *width,
                height: *height,
                frame_rate: None,
                packet_count: None,
            }),
            Err(message) => Err(fp_core::Error::Probe(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Ending {
    /// Exit on its own with this code after the scripted bytes.
    Exit(i32),
    /// Keep producing frames until terminated.
    Endless,
}

#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub frames: usize,
    pub extra_bytes: usize,
    pub chunk_len: usize,
    pub ending: Ending,
}

impl Script {
    pub fn finite(frames: usize, extra_bytes: usize, exit_code: i32) -> Self {
        Self {
            frames,
            extra_bytes,
            chunk_len: 7,
            ending: Ending::Exit(exit_code),
        }
    }

    pub fn endless() -> Self {
        Self {
            frames: 0,
            extra_bytes: 0,
            chunk_len: 7,
            ending: Ending::Endless,
        }
    }
}

pub struct ScriptedDecoder {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    pub spawns: AtomicUsize,
    pub terminations: Arc<AtomicUsize>,
    pub targets: Mutex<Vec<TargetSize>>,
}

impl ScriptedDecoder {
    /// Every run follows `script`.
    pub fn new(script: Script) -> Arc<Self> {
        Self::sequence(Vec::new(), script)
    }

    /// Runs follow `scripts` in order, then `fallback`.
    pub fn sequence(scripts: Vec<Script>, fallback: Script) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            fallback,
            spawns: AtomicUsize::new(0),
            terminations: Arc::new(AtomicUsize::new(0)),
            targets: Mutex::new(Vec::new()),
        })
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn termination_count(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decoder for ScriptedDecoder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn spawn(
        &self,
        _path: &Path,
        target: TargetSize,
        format: PixelFormat,
    ) -> fp_core::Result<DecodeSession> {
        let run = self.spawns.fetch_add(1, Ordering::SeqCst) + 1;
        self.targets.lock().unwrap().push(target);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        let frame_size = target.frame_size(format);
        let fill = run as u8;
        let terminations = self.terminations.clone();
        let (session, producer) = DecodeSession::channel(format!("run-{run}"), 4);

        tokio::spawn(async move {
            match script.ending {
                Ending::Exit(code) => {
                    let data = vec![fill; frame_size * script.frames + script.extra_bytes];
                    for chunk in data.chunks(script.chunk_len.max(1)) {
                        if !producer.send(Bytes::copy_from_slice(chunk)).await {
                            break;
                        }
                    }
                    if producer.is_cancelled() {
                        terminations.fetch_add(1, Ordering::SeqCst);
                        producer.finish(DecodeExit::terminated(None));
                    } else {
                        producer.finish(DecodeExit::with_code(code));
                    }
                }
                Ending::Endless => {
                    let chunk = Bytes::from(vec![fill; script.chunk_len.max(1)]);
                    while producer.send(chunk.clone()).await {}
                    terminations.fetch_add(1, Ordering::SeqCst);
                    producer.finish(DecodeExit::terminated(Some(255)));
                }
            }
        });

        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub sequence: u64,
    pub fill: u8,
    pub len: usize,
    pub size: TargetSize,
}

/// Records frames into shared storage, so tests can inspect it while the
/// sink itself lives inside a player task.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub frames: Arc<Mutex<Vec<Rendered>>>,
    pub configured: Arc<Mutex<Vec<TargetSize>>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<Rendered> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn configured(&self) -> Vec<TargetSize> {
        self.configured.lock().unwrap().clone()
    }
}

impl FrameSink for RecordingSink {
    fn configure(&mut self, target: TargetSize) {
        self.configured.lock().unwrap().push(target);
    }

    fn render(&mut self, frame: &Frame, size: TargetSize) {
        let data = frame.data();
        assert!(
            data.iter().all(|b| *b == data[0]),
            "frame {} mixes bytes from different runs",
            frame.sequence()
        );
        self.frames.lock().unwrap().push(Rendered {
            sequence: frame.sequence(),
            fill: data[0],
            len: data.len(),
            size,
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn session(
    probe: Arc<FakeProbe>,
    decoder: Arc<ScriptedDecoder>,
    sink: RecordingSink,
) -> PlaybackSession<RecordingSink> {
    let config = PlaybackConfig {
        stop_timeout_ms: 1000,
        ..PlaybackConfig::default()
    };
    PlaybackSession::new(probe, decoder, sink, config)
}
