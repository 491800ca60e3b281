//! FFmpeg-based [`Decoder`] implementation.
//!
//! Runs `ffmpeg -i <file> -f rawvideo -pix_fmt rgba -vf scale=W:H -` and
//! streams its stdout into a [`DecodeSession`]. Stderr is forwarded to the
//! log under the `ffmpeg` target at debug level.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use bytes::BytesMut;
use fp_core::config::PlaybackConfig;
use fp_core::{PixelFormat, TargetSize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;

use super::{DecodeExit, DecodeProducer, DecodeSession, Decoder};
use crate::command::ToolCommand;
use crate::tools::{Tool, ToolRegistry};

/// A decoder backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_path: PathBuf,
    read_chunk_size: usize,
    max_pending_chunks: usize,
}

impl FfmpegDecoder {
    /// Create a decoder using the given ffmpeg path and default buffering.
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        let defaults = PlaybackConfig::default();
        Self {
            ffmpeg_path,
            read_chunk_size: defaults.read_chunk_size,
            max_pending_chunks: defaults.max_pending_chunks,
        }
    }

    /// Create a decoder from a discovered registry and playback settings.
    pub fn from_registry(tools: &ToolRegistry, playback: &PlaybackConfig) -> fp_core::Result<Self> {
        Ok(Self::new(tools.require(Tool::Ffmpeg)?.path.clone()).with_buffering(playback))
    }

    /// Apply read size and read-ahead limits from `playback`.
    pub fn with_buffering(mut self, playback: &PlaybackConfig) -> Self {
        self.read_chunk_size = playback.read_chunk_size.max(1);
        self.max_pending_chunks = playback.max_pending_chunks.max(1);
        self
    }

    fn command(&self, path: &Path, target: TargetSize, format: PixelFormat) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(["-hide_banner", "-nostdin", "-i"]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd.args(["-f", "rawvideo", "-pix_fmt", format.ffmpeg_name()]);
        cmd.arg("-vf");
        cmd.arg(format!("scale={}:{}", target.width, target.height));
        cmd.arg("-");
        cmd
    }
}

#[async_trait]
impl Decoder for FfmpegDecoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn spawn(
        &self,
        path: &Path,
        target: TargetSize,
        format: PixelFormat,
    ) -> fp_core::Result<DecodeSession> {
        let target = target.validate()?;
        let cmd = self.command(path, target, format);
        tracing::debug!("Running {cmd}");

        let mut child = cmd.spawn_streaming()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| fp_core::Error::tool("ffmpeg", "stdout was not captured"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let label = path.display().to_string();
        let (session, producer) = DecodeSession::channel(label.clone(), self.max_pending_chunks);
        tokio::spawn(drive(child, stdout, producer, self.read_chunk_size, label));

        tracing::info!(
            "Started ffmpeg for {} at {} ({} bytes/frame)",
            path.display(),
            target,
            target.frame_size(format)
        );
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Process driver
// ---------------------------------------------------------------------------

/// Own the child process for the whole run: pump stdout into the session,
/// then reap the process and report how it ended.
async fn drive<R>(
    mut child: Child,
    stdout: R,
    producer: DecodeProducer,
    chunk_size: usize,
    label: String,
) where
    R: AsyncRead + Unpin,
{
    let cancel = producer.cancellation();

    let pumped = tokio::select! {
        res = pump(stdout, &producer, chunk_size) => Some(res),
        _ = cancel.cancelled() => None,
    };

    if let Some(Err(e)) = &pumped {
        tracing::warn!("Reading ffmpeg output for {label} failed: {e}");
    }

    // EOF does not imply the process is gone; it may still be flushing
    // stderr. Either way wait for it, unless a stop arrives first.
    let exit = if pumped.is_some() {
        tokio::select! {
            status = child.wait() => exit_from_wait(status, false, &label),
            _ = cancel.cancelled() => kill(&mut child, &label).await,
        }
    } else {
        kill(&mut child, &label).await
    };

    match exit.code {
        Some(0) if !exit.terminated => tracing::debug!("ffmpeg for {label} exited cleanly"),
        _ if exit.terminated => tracing::debug!("ffmpeg for {label} terminated"),
        Some(code) => tracing::warn!("ffmpeg for {label} exited with code {code}"),
        None => tracing::warn!("ffmpeg for {label} was killed by a signal"),
    }

    producer.finish(exit);
}

/// Copy stdout into the session in chunks of at most `chunk_size` bytes.
///
/// Stops at EOF or when the session stops accepting chunks.
async fn pump<R>(mut stdout: R, producer: &DecodeProducer, chunk_size: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = BytesMut::with_capacity(chunk_size);
        let n = stdout.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if !producer.send(buf.freeze()).await {
            return Ok(());
        }
    }
}

async fn kill(child: &mut Child, label: &str) -> DecodeExit {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Kill for ffmpeg ({label}) failed: {e}");
    }
    exit_from_wait(child.wait().await, true, label)
}

fn exit_from_wait(
    status: std::io::Result<ExitStatus>,
    terminated: bool,
    label: &str,
) -> DecodeExit {
    match status {
        Ok(status) => DecodeExit {
            code: status.code(),
            terminated,
        },
        Err(e) => {
            tracing::warn!("Waiting for ffmpeg ({label}) failed: {e}");
            DecodeExit {
                code: None,
                terminated,
            }
        }
    }
}

/// Log stderr line by line until EOF.
///
/// Lines are raw bytes; metadata and paths need not be UTF-8. The pipe must
/// stay open until EOF: ffmpeg dies of SIGPIPE writing to a closed stderr.
async fn forward_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end();
                if !text.is_empty() {
                    tracing::debug!(target: "ffmpeg", "{text}");
                }
            }
            Err(e) => {
                tracing::debug!("Reading ffmpeg stderr failed: {e}");
                break;
            }
        }
    }
}
