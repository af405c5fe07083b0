//! Reelsmith Project Model
//!
//! Defines the core data contracts for Reelsmith projects:
//! - **Project:** Asset lists, slideshow and caption styling, effect slots
//! - **Captions:** Timed caption cues and the caption file parser
//! - **Effects:** The effect enumeration and ordered effect slots
//! - **Settings:** Immutable per-export render settings and quality presets
//!
//! Asset paths are stored relative to the project directory so a project
//! can be moved or archived as a unit.

pub mod caption;
pub mod color;
pub mod effect;
pub mod project;
pub mod settings;

pub use caption::*;
pub use color::*;
pub use effect::*;
pub use project::*;
pub use settings::*;
