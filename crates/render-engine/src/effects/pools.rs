//! Persistent particle state for the stateful generators.
//!
//! Positions and sizes are stored in frame pixels. Every pool is owned by
//! one [`EffectStack`](super::EffectStack) and survives across frames until
//! the stack is reset.

use rand::rngs::StdRng;
use rand::Rng;

/// A vertical film scratch that lives for a number of frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scratch {
    pub x: f32,
    /// Frames left before the scratch is retired.
    pub life: u32,
}

impl Scratch {
    pub fn spawn(rng: &mut StdRng, width: f32) -> Self {
        Self {
            x: rng.gen::<f32>() * width,
            life: 8 + (rng.gen::<f32>() * 15.0) as u32,
        }
    }
}

/// A persistent projector line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CinemaLine {
    pub x: f32,
    /// Stroke width at 1080p.
    pub width: f32,
}

impl CinemaLine {
    pub fn spawn(rng: &mut StdRng, frame_width: f32) -> Self {
        Self {
            x: rng.gen::<f32>() * frame_width,
            width: 0.5 + rng.gen::<f32>(),
        }
    }
}

/// A rising spark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ember {
    pub x: f32,
    pub y: f32,
    /// Radius in pixels.
    pub size: f32,
    /// Upward speed in pixels per second.
    pub speed: f32,
}

impl Ember {
    /// Spawn just below the bottom edge.
    pub fn spawn(rng: &mut StdRng, width: f32, height: f32, scale: f32) -> Self {
        Self {
            x: rng.gen::<f32>() * width,
            y: height + 10.0,
            size: (1.0 + rng.gen::<f32>() * 3.0) * scale,
            speed: (40.0 + rng.gen::<f32>() * 80.0) * scale,
        }
    }
}

/// A falling dust streak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DustStreak {
    pub x: f32,
    /// Top of the streak.
    pub y: f32,
    pub length: f32,
    /// Downward speed in pixels per second.
    pub speed: f32,
}

impl DustStreak {
    /// Spawn just above the top edge.
    pub fn spawn(rng: &mut StdRng, width: f32, scale: f32) -> Self {
        let length = (30.0 + rng.gen::<f32>() * 90.0) * scale;
        Self {
            x: rng.gen::<f32>() * width,
            y: -length,
            length,
            speed: (60.0 + rng.gen::<f32>() * 140.0) * scale,
        }
    }
}

/// All generator state, one pool per stateful effect kind.
#[derive(Debug, Clone, Default)]
pub struct EffectPools {
    pub old_film_scratches: Vec<Scratch>,
    pub dust_scratches: Vec<Scratch>,
    pub cinema_lines: Vec<CinemaLine>,
    pub embers: Vec<Ember>,
    pub vertical_dust: Vec<DustStreak>,
}

impl EffectPools {
    pub fn is_empty(&self) -> bool {
        self.old_film_scratches.is_empty()
            && self.dust_scratches.is_empty()
            && self.cinema_lines.is_empty()
            && self.embers.is_empty()
            && self.vertical_dust.is_empty()
    }
}
