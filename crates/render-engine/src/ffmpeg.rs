//! `ffmpeg` subprocess encoder.
//!
//! ```text
//! push_video ─▶ [bounded chan] ─▶ writer task ─▶ stdin  (rawvideo rgba)  ─┐
//! push_audio ─▶ [chan] ─▶ writer task ─▶ tcp://127.0.0.1:N (f32le)   ─────┤ ffmpeg
//!                                                                         │
//! EncoderEvent ◀── supervisor task ◀── stdout (fragmented container) ◀────┘
//! ```
//!
//! The supervisor owns the child process. It batches stdout into one
//! `Data` event per chunk interval, and reports `Stopped` or `Error` once
//! the process exits. Fragmented output is required because the container
//! is streamed through a pipe and can never be seeked back into.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use reelsmith_common::{ReelError, ReelResult};
use reelsmith_project_model::ExportFormat;

use crate::encoder::{CodecCandidate, EncoderEvent, StreamDescription, StreamEncoder};

/// Frames buffered ahead of ffmpeg before `push_video` waits.
const VIDEO_QUEUE_FRAMES: usize = 16;

/// How long ffmpeg gets to connect to the audio socket.
const AUDIO_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Parse the table printed by `ffmpeg -encoders` into encoder names.
pub fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            (flags.len() == 6).then(|| name.to_string())
        })
        .collect()
}

fn audio_bitrate(codec: &str) -> &'static str {
    match codec {
        "aac" => "192k",
        _ => "128k",
    }
}

/// ffmpeg arguments for streaming `desc`, with audio read from `audio_port`.
pub fn build_args(desc: &StreamDescription, audio_port: u16) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", desc.width, desc.height),
        "-framerate".into(),
        desc.fps.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-f".into(),
        "f32le".into(),
        "-ar".into(),
        desc.audio.sample_rate.to_string(),
        "-ac".into(),
        desc.audio.channels.to_string(),
        "-i".into(),
        format!("tcp://127.0.0.1:{audio_port}"),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "1:a".into(),
        "-c:v".into(),
        desc.codec.video_codec.into(),
        "-b:v".into(),
        desc.bitrate.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        desc.codec.audio_codec.into(),
        "-b:a".into(),
        audio_bitrate(desc.codec.audio_codec).into(),
    ];

    if desc.codec.format == ExportFormat::Mp4 {
        args.push("-movflags".into());
        args.push("frag_keyframe+empty_moov+default_base_moof".into());
    }

    args.extend(["-f".to_string(), desc.codec.muxer.to_string(), "pipe:1".to_string()]);
    args
}

struct RunningEncoder {
    video_tx: Option<mpsc::Sender<Vec<u8>>>,
    audio_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    kill_tx: Option<oneshot::Sender<()>>,
    writers: Vec<JoinHandle<()>>,
    supervisor: JoinHandle<()>,
    frames_pushed: u64,
}

/// Encoder backed by an `ffmpeg` child process.
pub struct FfmpegEncoder {
    binary: String,
    available: HashSet<String>,
    description: Option<StreamDescription>,
    running: Option<RunningEncoder>,
}

impl FfmpegEncoder {
    /// Query `binary` for its encoders. A missing binary yields an encoder
    /// that supports nothing.
    pub async fn probe(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        let available = match Command::new(&binary)
            .args(["-hide_banner", "-encoders"])
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                parse_encoder_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!(binary = %binary, status = %output.status, "ffmpeg encoder probe failed");
                HashSet::new()
            }
            Err(e) => {
                warn!(binary = %binary, error = %e, "ffmpeg not found");
                HashSet::new()
            }
        };
        debug!(binary = %binary, encoders = available.len(), "Probed ffmpeg encoders");
        Self::with_encoders(binary, available)
    }

    /// Encoder with a known encoder set, skipping the probe.
    pub fn with_encoders(binary: impl Into<String>, available: HashSet<String>) -> Self {
        Self {
            binary: binary.into(),
            available,
            description: None,
            running: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.available.is_empty()
    }

    pub fn available_encoders(&self) -> &HashSet<String> {
        &self.available
    }

    fn running_mut(&mut self) -> ReelResult<&mut RunningEncoder> {
        self.running
            .as_mut()
            .ok_or_else(|| ReelError::encoder("ffmpeg encoder is not running"))
    }
}

async fn write_stream<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(buf) = rx.recv().await {
        if let Err(e) = writer.write_all(&buf).await {
            debug!(error = %e, "ffmpeg video input closed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_audio(listener: TcpListener, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    let mut socket = match tokio::time::timeout(AUDIO_CONNECT_TIMEOUT, listener.accept()).await {
        Ok(Ok((socket, _))) => socket,
        Ok(Err(e)) => {
            warn!(error = %e, "ffmpeg audio connection failed");
            return;
        }
        Err(_) => {
            warn!("ffmpeg never connected to the audio input");
            return;
        }
    };
    while let Some(buf) = rx.recv().await {
        if let Err(e) = socket.write_all(&buf).await {
            debug!(error = %e, "ffmpeg audio input closed");
            return;
        }
    }
    let _ = socket.shutdown().await;
}

async fn read_to_string<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut out = String::new();
    if let Err(e) = reader.read_to_string(&mut out).await {
        out.push_str(&format!("<failed to read ffmpeg stderr: {e}>"));
    }
    out
}

/// Own the child until it exits or is killed, forwarding its output.
async fn supervise(
    mut child: Child,
    mut stdout: ChildStdout,
    stderr_task: JoinHandle<String>,
    mut kill_rx: oneshot::Receiver<()>,
    events: mpsc::Sender<EncoderEvent>,
    chunk_interval: Duration,
) {
    let mut ticker = tokio::time::interval(chunk_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut pending = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        tokio::select! {
            _ = &mut kill_rx => {
                let _ = child.kill().await;
                debug!("ffmpeg killed");
                return;
            }
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    let _ = child.kill().await;
                    let _ = events.send(EncoderEvent::Error(format!("reading ffmpeg output: {e}"))).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                if !pending.is_empty()
                    && events.send(EncoderEvent::Data(std::mem::take(&mut pending))).await.is_err()
                {
                    // Nobody is listening any more.
                    let _ = child.kill().await;
                    return;
                }
            }
        }
    }

    if !pending.is_empty() {
        let _ = events.send(EncoderEvent::Data(pending)).await;
    }

    let status = child.wait().await;
    let stderr = stderr_task.await.unwrap_or_default();
    let event = match status {
        Ok(status) if status.success() => {
            info!("ffmpeg finished");
            EncoderEvent::Stopped
        }
        Ok(status) => EncoderEvent::Error(format!("ffmpeg exited with {status}: {}", stderr.trim())),
        Err(e) => EncoderEvent::Error(format!("waiting on ffmpeg: {e}")),
    };
    let _ = events.send(event).await;
}

#[async_trait]
impl StreamEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn supports(&self, candidate: &CodecCandidate) -> bool {
        candidate.supported_by(&self.available)
    }

    async fn prime(&mut self, description: &StreamDescription) -> ReelResult<()> {
        if !self.supports(&description.codec) {
            return Err(ReelError::unsupported(format!(
                "{} cannot encode {}/{}",
                self.binary, description.codec.video_codec, description.codec.audio_codec
            )));
        }
        if description.width % 2 != 0 || description.height % 2 != 0 {
            return Err(ReelError::encoder(format!(
                "frame size {}x{} must be even for yuv420p",
                description.width, description.height
            )));
        }
        self.description = Some(description.clone());
        Ok(())
    }

    async fn start(&mut self, chunk_interval: Duration) -> ReelResult<mpsc::Receiver<EncoderEvent>> {
        let desc = self
            .description
            .clone()
            .ok_or_else(|| ReelError::encoder("ffmpeg encoder started before priming"))?;
        if self
            .running
            .as_ref()
            .is_some_and(|running| !running.supervisor.is_finished())
        {
            return Err(ReelError::encoder("ffmpeg encoder already running"));
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let audio_port = listener.local_addr()?.port();
        let args = build_args(&desc, audio_port);
        debug!(args = ?args, "Starting ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReelError::encoder(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encoder("Failed to capture ffmpeg stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::encoder("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::encoder("Failed to capture ffmpeg stderr"))?;

        info!(
            pid = child.id(),
            video_codec = desc.codec.video_codec,
            audio_codec = desc.codec.audio_codec,
            width = desc.width,
            height = desc.height,
            fps = desc.fps,
            "ffmpeg process started"
        );

        let (video_tx, video_rx) = mpsc::channel(VIDEO_QUEUE_FRAMES);
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(64);
        let (kill_tx, kill_rx) = oneshot::channel();

        let writers = vec![
            tokio::spawn(write_stream(stdin, video_rx)),
            tokio::spawn(write_audio(listener, audio_rx)),
        ];
        let stderr_task = tokio::spawn(read_to_string(stderr));
        let supervisor = tokio::spawn(supervise(child, stdout, stderr_task, kill_rx, event_tx, chunk_interval));

        self.running = Some(RunningEncoder {
            video_tx: Some(video_tx),
            audio_tx: Some(audio_tx),
            kill_tx: Some(kill_tx),
            writers,
            supervisor,
            frames_pushed: 0,
        });
        Ok(event_rx)
    }

    async fn push_video(&mut self, frame: &RgbaImage, pts_secs: f64) -> ReelResult<()> {
        let expected = self
            .description
            .as_ref()
            .map(|d| (d.width, d.height))
            .unwrap_or_default();
        if frame.dimensions() != expected {
            return Err(ReelError::encoder(format!(
                "frame is {:?}, stream is {:?}",
                frame.dimensions(),
                expected
            )));
        }

        let running = self.running_mut()?;
        let tx = running
            .video_tx
            .as_ref()
            .ok_or_else(|| ReelError::encoder("video input already closed"))?;
        tx.send(frame.as_raw().clone())
            .await
            .map_err(|_| ReelError::encoder("ffmpeg stopped accepting video"))?;
        running.frames_pushed += 1;
        tracing::trace!(pts_secs, frames = running.frames_pushed, "Frame queued");
        Ok(())
    }

    async fn push_audio(&mut self, samples: &[f32]) -> ReelResult<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let running = self.running_mut()?;
        let tx = running
            .audio_tx
            .as_ref()
            .ok_or_else(|| ReelError::encoder("audio input already closed"))?;
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        tx.send(bytes)
            .map_err(|_| ReelError::encoder("ffmpeg stopped accepting audio"))
    }

    async fn stop(&mut self) -> ReelResult<()> {
        let running = self.running_mut()?;
        // Closing both inputs lets ffmpeg drain and exit on its own.
        running.video_tx.take();
        running.audio_tx.take();
        debug!(frames = running.frames_pushed, "ffmpeg inputs closed");
        Ok(())
    }

    async fn abort(&mut self) {
        if let Some(mut running) = self.running.take() {
            if let Some(kill) = running.kill_tx.take() {
                let _ = kill.send(());
            }
            for writer in &running.writers {
                writer.abort();
            }
            let _ = running.supervisor.await;
            warn!(frames = running.frames_pushed, "ffmpeg encoder aborted");
        }
    }
}
