//! Reelsmith Render Engine
//!
//! Draws slideshow frames and drives the stream encoder that turns them
//! into a video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! images ──────┐
//!              ├── Ken Burns layer (pan/zoom/crossfade)
//! timeline ────┘         │
//!                        ├── Effect stack (grain, embers, jitter, ...)
//! overlays ──────────────┘         │
//!                                  ├── Caption layer (typewriter)
//! captions ────────────────────────┘         │
//!                                            ▼
//!                                     raster frame ──┐
//!                                                    ├── StreamEncoder ──▶ output.mp4
//! audio ── AudioRouter ── capture tap ───────────────┘
//! ```
//!
//! The [`ExportSession`] paces this pipeline from the audio position, so
//! every frame lands at its exact timestamp no matter how loaded the host is.

pub mod caption_layer;
pub mod compositor;
pub mod effects;
pub mod encoder;
pub mod export;
pub mod ffmpeg;
pub mod image_cache;
pub mod preview;
pub mod raster;
pub mod stage;

pub use compositor::{FrameCompositor, Scene};
pub use effects::{EffectStack, FrameContext, FrameOffset, RenderMode};
pub use encoder::{negotiate_codec, CodecCandidate, EncoderEvent, StreamDescription, StreamEncoder};
pub use export::*;
pub use ffmpeg::FfmpegEncoder;
pub use preview::PreviewPlayer;
pub use stage::Stage;
