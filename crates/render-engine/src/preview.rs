//! Interactive preview playback.
//!
//! The audio source reports its position a few times per second. Between
//! reports the [`TimelineClock`](reelsmith_common::TimelineClock)
//! extrapolates, so each display refresh gets a smooth position.

use std::time::Duration;

use image::RgbaImage;
use tokio::time::Instant;
use tracing::debug;

use reelsmith_common::{ClockMode, PreviewConfig, ReelResult};

use crate::effects::RenderMode;
use crate::stage::Stage;

/// Plays a scene with its audio and draws preview frames on demand.
pub struct PreviewPlayer<'a> {
    stage: Stage<'a>,
    update_period: Duration,
    next_update: Option<Instant>,
    finished: bool,
}

impl<'a> PreviewPlayer<'a> {
    pub fn new(mut stage: Stage<'a>, config: &PreviewConfig) -> Self {
        stage.attach_source();
        stage.router.set_monitor_gain(1.0);
        let duration = stage.scene.duration_secs;
        stage.clock.set_duration(duration);

        let hz = if config.time_update_hz > 0.0 { config.time_update_hz } else { 4.0 };
        Self {
            stage,
            update_period: Duration::from_secs_f64(1.0 / hz),
            next_update: None,
            finished: false,
        }
    }

    /// Start or resume playback.
    pub async fn play(&mut self, now: Instant) -> ReelResult<()> {
        if self.finished {
            self.seek(0.0, now);
        }
        self.stage.source.play().await?;
        self.stage.router.set_monitor_gain(1.0);
        self.stage.sync_clock(now);
        self.stage.clock.set_mode(ClockMode::Playing, now);
        self.next_update = Some(now + self.update_period);
        debug!(position_secs = self.stage.clock.authoritative(), "Preview playing");
        Ok(())
    }

    pub fn pause(&mut self, now: Instant) {
        self.stage.source.pause();
        self.on_time_update(now);
        self.stage.clock.set_mode(ClockMode::Paused, now);
        self.next_update = None;
    }

    pub fn seek(&mut self, position_secs: f64, now: Instant) {
        self.stage.source.seek(position_secs);
        // Samples before the seek point were never heard.
        self.stage.source.take_played_samples();
        let position = self.stage.source.position_secs();
        self.stage.clock.seek(position, now);
        self.finished = false;
    }

    /// Handle a position report from the audio source.
    pub fn on_time_update(&mut self, now: Instant) {
        self.stage.sync_clock(now);
        self.stage.route_played_audio();
        if let Some(tap) = self.stage.router.capture_tap_mut() {
            tap.clear();
        }
    }

    /// Draw the frame for a display refresh at `now`.
    pub fn frame(&mut self, now: Instant) -> &RgbaImage {
        if let Some(due) = self.next_update {
            if now >= due {
                self.on_time_update(now);
                self.next_update = Some(now + self.update_period);
            }
        }

        if self.stage.clock.mode() == ClockMode::Playing && self.stage.source.ended() {
            self.stage.sync_clock(now);
            self.stage.route_played_audio();
            self.stage.source.pause();
            self.stage.clock.set_mode(ClockMode::Paused, now);
            self.next_update = None;
            self.finished = true;
            debug!("Preview reached the end");
        }

        let position = self.stage.clock.tick(now);
        self.stage
            .compositor
            .render(position, self.stage.scene, RenderMode::Preview)
    }

    /// Position of the most recent frame.
    pub fn position(&self) -> f64 {
        self.stage.clock.position()
    }

    pub fn is_playing(&self) -> bool {
        self.stage.clock.mode() == ClockMode::Playing
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_stage(self) -> Stage<'a> {
        self.stage
    }
}
