//! Reelsmith Processing Core
//!
//! Timeline math shared by the preview and export paths:
//! - **Ken Burns:** Segment lookup, pan/zoom motion, and crossfade weights
//!   for the background image sequence
//! - **Typewriter:** Caption word wrapping and progressive reveal
//!
//! This crate is pure computation: no I/O, no rasterization.
//! All inputs are data; all outputs are data.

pub mod ken_burns;
pub mod typewriter;

pub use ken_burns::{LayerPlan, Motion, PanDirection, SegmentPlacement, SlideshowTiming};
pub use typewriter::{reveal_count, reveal_lines, wrap_words, TypewriterLayout};
