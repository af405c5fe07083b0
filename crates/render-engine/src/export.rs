//! Export session: drives playback, the compositor, and the encoder in
//! lock-step to produce one video file.
//!
//! # State machine
//!
//! ```text
//! Idle ─run─▶ Arming ─▶ Recording ─▶ Finalizing ─▶ Completed
//!               │           │            │    └──▶ Failed (empty capture)
//!               └───────────┴────────────┴──▶ Cancelled | Failed
//! ```
//!
//! The audio source is the time base. Each pacing tick reads the playback
//! position and renders every frame whose timestamp it has passed, so frame
//! `k` always shows the timeline at exactly `k / fps` no matter how late the
//! tick fired. Every terminal state restores the monitor gain, pauses the
//! source, and leaves no encoder running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use reelsmith_common::{ClockMode, DriftMeasurement, EncoderTiming, ReelError, ReelResult};
use reelsmith_project_model::RenderSettings;

use crate::effects::RenderMode;
use crate::encoder::{negotiate_codec, CodecCandidate, EncoderEvent, StreamDescription, StreamEncoder};
use crate::stage::Stage;

/// Poll interval while waiting for the encoder to finish.
const FINALIZE_POLL: Duration = Duration::from_millis(100);

/// Audio/video drift worth a warning at the end of recording.
const DRIFT_WARN_MS: f64 = 250.0;

/// Lifecycle of an export session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Arming,
    Recording,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Arming | Self::Recording | Self::Finalizing)
    }
}

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    /// Progress in percent, `[0, 100]`.
    pub percent: f64,

    /// Timeline position reached.
    pub position_secs: f64,

    /// Frames handed to the encoder so far.
    pub frames_encoded: u64,

    /// Frames the finished file will contain.
    pub total_frames: u64,

    pub state: ExportState,
}

/// Progress callback for export sessions.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The finished file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// `<filename>.<extension>`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub codec: CodecCandidate,
}

/// Why an export failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportFailure {
    #[error("No available encoder supports the negotiated codec")]
    EncoderUnavailable,

    #[error("The encoder produced no output")]
    EmptyCapture,

    #[error("Playback could not start: {0}")]
    PlaybackRejected(String),

    #[error("Encoder failure: {0}")]
    Encoder(String),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed(ExportArtifact),
    Cancelled,
    Failed(ExportFailure),
}

/// Why a phase stopped early.
enum Interrupt {
    Cancelled,
    Failed(ExportFailure),
}

type Phase<T> = Result<T, Interrupt>;

fn encoder_failure(err: ReelError) -> Interrupt {
    Interrupt::Failed(ExportFailure::Encoder(err.to_string()))
}

/// One export run against a [`Stage`].
pub struct ExportSession<E: StreamEncoder> {
    encoder: E,
    timing: EncoderTiming,
    state: ExportState,
    cancel: CancelHandle,
    progress_cb: Option<ProgressCallback>,
    /// Encoder output in arrival order.
    chunks: Vec<Vec<u8>>,
    frames_encoded: u64,
    total_frames: u64,
}

impl<E: StreamEncoder> ExportSession<E> {
    pub fn new(encoder: E, timing: EncoderTiming) -> Self {
        Self {
            encoder,
            timing,
            state: ExportState::Idle,
            cancel: CancelHandle::new(),
            progress_cb: None,
            chunks: Vec::new(),
            frames_encoded: 0,
            total_frames: 0,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_cb = Some(callback);
        self
    }

    /// Handle that cancels this session from anywhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Return a finished session to `Idle`. Returns false while a run is
    /// still in progress.
    pub fn reset(&mut self) -> bool {
        if self.state.is_active() {
            return false;
        }
        self.state = ExportState::Idle;
        self.cancel.clear();
        self.chunks.clear();
        self.frames_encoded = 0;
        self.total_frames = 0;
        true
    }

    /// Export the stage's scene.
    ///
    /// Errors only when the session cannot start: it is not idle, the
    /// settings are unusable, or the source is not routed to a capture tap.
    /// Everything after that is reported through the [`ExportOutcome`].
    pub async fn run(&mut self, settings: &RenderSettings, stage: &mut Stage<'_>) -> ReelResult<ExportOutcome> {
        if self.state != ExportState::Idle {
            return Err(ReelError::render(format!(
                "export session is {:?}, not Idle",
                self.state
            )));
        }
        if settings.fps == 0 {
            return Err(ReelError::config("export fps must be positive"));
        }
        if stage.router.attached_source() != Some(stage.source.id()) || !stage.router.has_capture_tap() {
            return Err(ReelError::playback(
                "audio source is not attached to the router's capture tap",
            ));
        }

        let duration = stage.scene.duration_secs.max(0.0);
        self.chunks.clear();
        self.frames_encoded = 0;
        self.total_frames = settings.total_frames(duration);
        info!(
            filename = %settings.filename,
            fps = settings.fps,
            bitrate = settings.bitrate,
            format = ?settings.format,
            duration_secs = duration,
            total_frames = self.total_frames,
            "Starting export"
        );

        let outcome = match self.drive(settings, stage, duration).await {
            Ok(artifact) => ExportOutcome::Completed(artifact),
            Err(interrupt) => self.interrupt(interrupt).await,
        };

        stage.router.set_monitor_gain(1.0);
        stage.source.pause();
        stage.clock.set_mode(ClockMode::Paused, Instant::now());

        let (state, percent) = match &outcome {
            ExportOutcome::Completed(artifact) => {
                info!(
                    file = %artifact.file_name,
                    bytes = artifact.bytes.len(),
                    frames = self.frames_encoded,
                    "Export completed"
                );
                (ExportState::Completed, 100.0)
            }
            ExportOutcome::Cancelled => (ExportState::Cancelled, self.percent(stage.clock.authoritative(), duration)),
            ExportOutcome::Failed(_) => (ExportState::Failed, self.percent(stage.clock.authoritative(), duration)),
        };
        self.state = state;
        self.report(percent, stage.clock.authoritative());
        Ok(outcome)
    }

    async fn drive(&mut self, settings: &RenderSettings, stage: &mut Stage<'_>, duration: f64) -> Phase<ExportArtifact> {
        let codec = self.arm(settings, stage).await?;
        let events = self.record(settings, stage, duration).await?;
        self.finalize(events, settings, stage, codec).await
    }

    /// Negotiate, prime, mute the monitor, and warm the asset cache.
    async fn arm(&mut self, settings: &RenderSettings, stage: &mut Stage<'_>) -> Phase<CodecCandidate> {
        self.set_state(ExportState::Arming);

        let codec = negotiate_codec(settings.format, |c| self.encoder.supports(c));
        let (width, height) = stage.compositor.dimensions();
        let description = StreamDescription {
            width,
            height,
            fps: settings.fps,
            audio: stage.router.format().unwrap_or_else(|| stage.source.format()),
            bitrate: settings.bitrate,
            codec: codec.clone(),
        };
        debug!(
            encoder = self.encoder.name(),
            video_codec = codec.video_codec,
            audio_codec = codec.audio_codec,
            "Priming encoder"
        );
        self.encoder.prime(&description).await.map_err(|e| match e {
            ReelError::Unsupported { .. } => Interrupt::Failed(ExportFailure::EncoderUnavailable),
            other => encoder_failure(other),
        })?;

        stage.router.set_monitor_gain(0.0);
        stage.compositor.reset_effects();
        stage.compositor.preload(stage.scene).await;
        self.check_cancel()?;

        tokio::time::sleep(Duration::from_millis(self.timing.start_grace_ms)).await;
        self.check_cancel()?;
        Ok(codec)
    }

    /// Play the timeline from zero, feeding frames and audio to the encoder.
    async fn record(
        &mut self,
        settings: &RenderSettings,
        stage: &mut Stage<'_>,
        duration: f64,
    ) -> Phase<mpsc::Receiver<EncoderEvent>> {
        let mut events = self
            .encoder
            .start(Duration::from_millis(self.timing.chunk_interval_ms.max(1)))
            .await
            .map_err(encoder_failure)?;
        self.set_state(ExportState::Recording);

        let now = Instant::now();
        stage.clock.set_duration(duration);
        stage.clock.reset(now);
        stage.clock.set_mode(ClockMode::Rendering, now);
        stage.source.seek(0.0);
        stage.source.take_played_samples();
        if let Some(tap) = stage.router.capture_tap_mut() {
            tap.clear();
        }

        if let Err(e) = stage.source.play().await {
            warn!(error = %e, "Playback rejected; aborting export");
            return Err(Interrupt::Failed(ExportFailure::PlaybackRejected(e.to_string())));
        }
        self.check_cancel()?;

        let tick_hz = f64::from(settings.fps) * self.timing.pacing_factor.max(1.0);
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / tick_hz));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let started = Instant::now();
        let mut next_frame = 0u64;
        let position = loop {
            ticker.tick().await;
            self.check_cancel()?;
            self.drain_events(&mut events)?;

            let position = stage.sync_clock(Instant::now()).min(duration);
            stage.route_played_audio();
            self.push_captured_audio(stage).await?;

            while next_frame < self.total_frames && settings.frame_time(next_frame) <= position {
                self.push_frame(settings, stage, next_frame).await?;
                next_frame += 1;
            }
            self.report(self.percent(position, duration).min(99.9), position);

            if position >= duration || stage.source.ended() {
                break position;
            }
        };

        // Whatever the source played last, plus any frames the final tick
        // did not reach.
        stage.route_played_audio();
        self.push_captured_audio(stage).await?;
        while next_frame < self.total_frames {
            self.check_cancel()?;
            self.push_frame(settings, stage, next_frame).await?;
            next_frame += 1;
        }

        let drift = DriftMeasurement::from_secs(position, started.elapsed().as_secs_f64());
        if drift.exceeds_threshold_ms(DRIFT_WARN_MS) {
            warn!(drift_ms = drift.drift_ms(), "Playback drifted from wall clock during export");
        } else {
            debug!(drift_ms = drift.drift_ms(), frames = self.frames_encoded, "Recording finished");
        }
        Ok(events)
    }

    /// Stop the encoder and collect its trailing output.
    async fn finalize(
        &mut self,
        mut events: mpsc::Receiver<EncoderEvent>,
        settings: &RenderSettings,
        stage: &mut Stage<'_>,
        codec: CodecCandidate,
    ) -> Phase<ExportArtifact> {
        self.set_state(ExportState::Finalizing);
        stage.source.pause();
        self.encoder.stop().await.map_err(encoder_failure)?;

        let grace = Duration::from_millis(self.timing.finalize_grace_ms);
        let limit = Duration::from_millis(self.timing.stop_timeout_ms).max(grace);
        let started = Instant::now();
        let mut warned = false;
        loop {
            self.check_cancel()?;
            match tokio::time::timeout(FINALIZE_POLL, events.recv()).await {
                Ok(Some(EncoderEvent::Data(bytes))) => self.collect(bytes),
                Ok(Some(EncoderEvent::Stopped)) | Ok(None) => break,
                Ok(Some(EncoderEvent::Error(msg))) => return Err(Interrupt::Failed(ExportFailure::Encoder(msg))),
                Err(_) => {}
            }

            let waited = started.elapsed();
            if !warned && waited >= grace {
                warn!(waited_ms = waited.as_millis() as u64, "Encoder still finalizing");
                warned = true;
            }
            if waited >= limit {
                warn!("Encoder never reported stop; keeping the output collected so far");
                drop(events);
                self.encoder.abort().await;
                break;
            }
        }

        let bytes = self.chunks.concat();
        self.chunks.clear();
        if bytes.is_empty() {
            return Err(Interrupt::Failed(ExportFailure::EmptyCapture));
        }
        Ok(ExportArtifact {
            file_name: format!("{}.{}", settings.filename, codec.extension),
            bytes,
            codec,
        })
    }

    /// Tear down after a cancel or failure. The event receiver has already
    /// been dropped with the phase that owned it.
    async fn interrupt(&mut self, interrupt: Interrupt) -> ExportOutcome {
        self.encoder.abort().await;
        self.chunks.clear();
        match interrupt {
            Interrupt::Cancelled => {
                info!(frames = self.frames_encoded, "Export cancelled");
                ExportOutcome::Cancelled
            }
            Interrupt::Failed(failure) => {
                warn!(error = %failure, "Export failed");
                ExportOutcome::Failed(failure)
            }
        }
    }

    async fn push_frame(&mut self, settings: &RenderSettings, stage: &mut Stage<'_>, index: u64) -> Phase<()> {
        let pts = settings.frame_time(index);
        let frame = stage.compositor.render(pts, stage.scene, RenderMode::Export);
        self.encoder.push_video(frame, pts).await.map_err(encoder_failure)?;
        self.frames_encoded += 1;
        Ok(())
    }

    async fn push_captured_audio(&mut self, stage: &mut Stage<'_>) -> Phase<()> {
        let samples = stage
            .router
            .capture_tap_mut()
            .map(|tap| tap.drain())
            .unwrap_or_default();
        if !samples.is_empty() {
            self.encoder.push_audio(&samples).await.map_err(encoder_failure)?;
        }
        Ok(())
    }

    /// Move everything the encoder has emitted so far into the buffer.
    fn drain_events(&mut self, events: &mut mpsc::Receiver<EncoderEvent>) -> Phase<()> {
        loop {
            match events.try_recv() {
                Ok(EncoderEvent::Data(bytes)) => self.collect(bytes),
                Ok(EncoderEvent::Error(msg)) => return Err(Interrupt::Failed(ExportFailure::Encoder(msg))),
                Ok(EncoderEvent::Stopped) | Err(TryRecvError::Disconnected) => {
                    return Err(Interrupt::Failed(ExportFailure::Encoder(
                        "encoder stopped before the stream ended".to_string(),
                    )));
                }
                Err(TryRecvError::Empty) => return Ok(()),
            }
        }
    }

    fn collect(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.chunks.push(bytes);
        }
    }

    fn check_cancel(&self) -> Phase<()> {
        if self.cancel.is_cancelled() {
            Err(Interrupt::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&mut self, state: ExportState) {
        debug!(from = ?self.state, to = ?state, "Export state change");
        self.state = state;
    }

    fn percent(&self, position: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return 0.0;
        }
        (position / duration * 100.0).clamp(0.0, 100.0)
    }

    fn report(&self, percent: f64, position_secs: f64) {
        if let Some(cb) = &self.progress_cb {
            cb(ExportProgress {
                percent,
                position_secs,
                frames_encoded: self.frames_encoded,
                total_frames: self.total_frames,
                state: self.state,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(ExportState::Completed.is_terminal());
        assert!(ExportState::Failed.is_terminal());
        assert!(!ExportState::Recording.is_terminal());
        assert!(ExportState::Finalizing.is_active());
        assert!(!ExportState::Idle.is_active());
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.clear();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            ExportFailure::PlaybackRejected("blocked".into()).to_string(),
            "Playback could not start: blocked"
        );
        assert_eq!(ExportFailure::EmptyCapture.to_string(), "The encoder produced no output");
    }
}
