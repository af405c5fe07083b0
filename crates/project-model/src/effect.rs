//! Visual effect selection.

use serde::{Deserialize, Serialize};

/// Procedural effect applied on top of the background layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    None,
    FilmGrain,
    OldFilm,
    FireEmbers,
    VhsGlitch,
    DustScratches,
    Vignette,
    CrtLines,
    #[serde(rename = "sepia_70s")]
    Sepia70s,
    CinemaLines,
    LightLeaks,
    FrameJitter,
    DamagedNegative,
    Technicolor,
    VerticalDust,
}

impl EffectKind {
    /// Every effect, in menu order.
    pub const ALL: [EffectKind; 15] = [
        EffectKind::None,
        EffectKind::FilmGrain,
        EffectKind::OldFilm,
        EffectKind::FireEmbers,
        EffectKind::VhsGlitch,
        EffectKind::DustScratches,
        EffectKind::Vignette,
        EffectKind::CrtLines,
        EffectKind::Sepia70s,
        EffectKind::CinemaLines,
        EffectKind::LightLeaks,
        EffectKind::FrameJitter,
        EffectKind::DamagedNegative,
        EffectKind::Technicolor,
        EffectKind::VerticalDust,
    ];

    /// Stable identifier used in project files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::None => "none",
            EffectKind::FilmGrain => "film_grain",
            EffectKind::OldFilm => "old_film",
            EffectKind::FireEmbers => "fire_embers",
            EffectKind::VhsGlitch => "vhs_glitch",
            EffectKind::DustScratches => "dust_scratches",
            EffectKind::Vignette => "vignette",
            EffectKind::CrtLines => "crt_lines",
            EffectKind::Sepia70s => "sepia_70s",
            EffectKind::CinemaLines => "cinema_lines",
            EffectKind::LightLeaks => "light_leaks",
            EffectKind::FrameJitter => "frame_jitter",
            EffectKind::DamagedNegative => "damaged_negative",
            EffectKind::Technicolor => "technicolor",
            EffectKind::VerticalDust => "vertical_dust",
        }
    }

    /// Parse an identifier; hyphens are accepted in place of underscores.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One position in the ordered effect stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSlot {
    pub kind: EffectKind,

    /// Effect strength in `[0.0, 1.0]`.
    pub strength: f32,
}

impl EffectSlot {
    pub fn new(kind: EffectKind, strength: f32) -> Self {
        Self {
            kind,
            strength: strength.clamp(0.0, 1.0),
        }
    }

    /// Whether this slot leaves the frame untouched.
    pub fn is_identity(&self) -> bool {
        self.kind == EffectKind::None || self.strength <= 0.0
    }
}

/// The three-slot configuration new projects start with.
pub fn default_effect_slots() -> Vec<EffectSlot> {
    vec![
        EffectSlot::new(EffectKind::FilmGrain, 0.4),
        EffectSlot::new(EffectKind::None, 0.5),
        EffectSlot::new(EffectKind::None, 0.5),
    ]
}
