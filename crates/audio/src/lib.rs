//! Reelsmith Audio
//!
//! The single audio track that drives a Reelsmith timeline:
//! - **Decoder:** Symphonia-backed decoding into interleaved `f32` PCM
//! - **Playback:** The [`PlaybackSource`] seam and an in-memory [`DecodedTrack`]
//! - **Router:** One source fanned out to a monitor sink and an isolated
//!   capture tap, each behind its own gain stage

pub mod decoder;
pub mod pcm;
pub mod playback;
pub mod router;

pub use decoder::{decode_file, DecodeError};
pub use pcm::{AudioFormat, PcmBuffer};
pub use playback::{DecodedTrack, PlaybackSource};
pub use router::{AudioRouter, CaptureTap, GainNode, MonitorSink, NullMonitor};
