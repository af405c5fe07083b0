//! The collaborators a playback run borrows.
//!
//! Export and preview both drive the same compositor, router, source, and
//! clock. A [`Stage`] holds exclusive borrows of all of them, so only one
//! run can use them at a time.

use reelsmith_audio::{AudioRouter, PlaybackSource};
use reelsmith_common::TimelineClock;
use tokio::time::Instant;

use crate::compositor::{FrameCompositor, Scene};

pub struct Stage<'a> {
    pub compositor: &'a mut FrameCompositor,
    pub router: &'a mut AudioRouter,
    pub source: &'a mut dyn PlaybackSource,
    pub clock: &'a mut TimelineClock,
    pub scene: &'a Scene,
}

impl<'a> Stage<'a> {
    pub fn new(
        compositor: &'a mut FrameCompositor,
        router: &'a mut AudioRouter,
        source: &'a mut dyn PlaybackSource,
        clock: &'a mut TimelineClock,
        scene: &'a Scene,
    ) -> Self {
        Self {
            compositor,
            router,
            source,
            clock,
            scene,
        }
    }

    /// Attach the source to the router if it is not already.
    pub fn attach_source(&mut self) {
        self.router.attach(self.source.id(), self.source.format());
    }

    /// Route audio the source played since the last call.
    pub fn route_played_audio(&mut self) {
        let samples = self.source.take_played_samples();
        self.router.route(&samples);
    }

    /// Feed the source position to the clock as the authoritative time.
    pub fn sync_clock(&mut self, now: Instant) -> f64 {
        let position = self.source.position_secs();
        self.clock.update_authoritative(position, now);
        position
    }
}
