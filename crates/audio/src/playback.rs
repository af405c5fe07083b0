//! Playback sources: the authoritative time base of a timeline.

use std::path::Path;

use async_trait::async_trait;
use tokio::time::Instant;

use reelsmith_common::{ReelError, ReelResult};

use crate::decoder::decode_file;
use crate::pcm::{AudioFormat, PcmBuffer};

/// A seekable audio source whose position is the ground truth for the
/// timeline.
#[async_trait]
pub trait PlaybackSource: Send {
    /// Stable identity; the router rebuilds its graph when it changes.
    fn id(&self) -> &str;

    fn duration_secs(&self) -> f64;

    fn format(&self) -> AudioFormat;

    /// Start or resume playback. May be rejected by the device or policy.
    async fn play(&mut self) -> ReelResult<()>;

    fn pause(&mut self);

    fn seek(&mut self, position_secs: f64);

    /// Current playback position in seconds.
    fn position_secs(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Whether playback reached the end of the track.
    fn ended(&self) -> bool;

    /// Interleaved samples played since the previous call.
    fn take_played_samples(&mut self) -> Vec<f32>;
}

/// A fully decoded track played against the monotonic clock.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    id: String,
    pcm: PcmBuffer,
    /// Position when playback last started or the track was seeked.
    base_secs: f64,
    started_at: Option<Instant>,
    /// First frame not yet handed out by `take_played_samples`.
    delivered_frame: usize,
}

impl DecodedTrack {
    pub fn new(id: impl Into<String>, pcm: PcmBuffer) -> Self {
        Self {
            id: id.into(),
            pcm,
            base_secs: 0.0,
            started_at: None,
            delivered_frame: 0,
        }
    }

    /// Decode `path` and wrap it; the path doubles as the source id.
    pub fn open(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let pcm = decode_file(path)?;
        Ok(Self::new(path.display().to_string(), pcm))
    }

    pub fn pcm(&self) -> &PcmBuffer {
        &self.pcm
    }
}

#[async_trait]
impl PlaybackSource for DecodedTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn duration_secs(&self) -> f64 {
        self.pcm.duration_secs()
    }

    fn format(&self) -> AudioFormat {
        self.pcm.format
    }

    async fn play(&mut self) -> ReelResult<()> {
        if self.pcm.frames() == 0 {
            return Err(ReelError::playback(format!("{} has no audio", self.id)));
        }
        if self.started_at.is_none() {
            if self.ended() {
                self.base_secs = 0.0;
                self.delivered_frame = 0;
            }
            self.started_at = Some(Instant::now());
            tracing::debug!(id = %self.id, position_secs = self.base_secs, "Playback started");
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.started_at.is_some() {
            self.base_secs = self.position_secs();
            self.started_at = None;
        }
    }

    fn seek(&mut self, position_secs: f64) {
        let clamped = position_secs.clamp(0.0, self.duration_secs());
        self.base_secs = clamped;
        self.delivered_frame = self.pcm.format.frame_at(clamped);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn position_secs(&self) -> f64 {
        let elapsed = self
            .started_at
            .map(|at| at.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.base_secs + elapsed).min(self.duration_secs())
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some() && !self.ended()
    }

    fn ended(&self) -> bool {
        self.position_secs() >= self.duration_secs()
    }

    fn take_played_samples(&mut self) -> Vec<f32> {
        let end = self.pcm.format.frame_at(self.position_secs());
        let samples = self.pcm.frame_range(self.delivered_frame, end).to_vec();
        self.delivered_frame = end.max(self.delivered_frame);
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn track(secs: f64) -> DecodedTrack {
        DecodedTrack::new("test", PcmBuffer::silence(AudioFormat::new(1000, 2), secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_clock() {
        let mut t = track(2.0);
        assert_eq!(t.position_secs(), 0.0);
        t.play().await.unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!((t.position_secs() - 0.5).abs() < 1e-6);

        t.pause();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!((t.position_secs() - 0.5).abs() < 1e-6);
        assert!(!t.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_played_samples_are_contiguous() {
        let mut t = track(1.0);
        t.play().await.unwrap();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(t.take_played_samples().len(), 500);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(t.take_played_samples().len(), 200);
        assert!(t.take_played_samples().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ends_at_duration() {
        let mut t = track(1.0);
        t.play().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(t.ended());
        assert_eq!(t.position_secs(), 1.0);
        assert_eq!(t.take_played_samples().len(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_skips_unplayed_audio() {
        let mut t = track(4.0);
        t.seek(3.0);
        t.play().await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(t.take_played_samples().len(), 200);
    }

    #[tokio::test]
    async fn test_empty_track_rejects_play() {
        let mut t = track(0.0);
        assert!(t.play().await.is_err());
    }
}
