//! Procedural effect stack.
//!
//! Each [`EffectSlot`] runs one generator over the frame in slot order.
//! Generators draw with the frame's RNG, keep their particles in
//! [`EffectPools`], and size everything relative to a 1080-pixel-high frame.
//! Particle counts and pool caps come from the [`EffectBudget`] profile for
//! the current [`RenderMode`].

mod cosmetic;
mod film;
mod glitch;
mod light;
pub mod pools;

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use reelsmith_common::{EffectBudget, EffectProfile};
use reelsmith_project_model::{EffectKind, EffectSlot};

pub use cosmetic::CosmeticFilter;
pub use pools::EffectPools;

/// Reference frame height effect sizes are expressed at.
const REFERENCE_HEIGHT: f32 = 1080.0;

/// Who the frame is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Interactive playback: dense effects, cosmetic filters on.
    #[default]
    Preview,
    /// Encoder output: export budget, preview-only steps skipped.
    Export,
}

impl RenderMode {
    pub fn is_export(self) -> bool {
        self == Self::Export
    }
}

/// Timing of the frame being drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub position_secs: f64,
    /// Seconds since the previous frame.
    pub dt_secs: f64,
    pub mode: RenderMode,
}

/// Offset applied to every draw after the effect pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameOffset {
    pub dx: f32,
    pub dy: f32,
}

/// Everything one generator needs to draw a single slot.
pub(crate) struct EffectPass<'a> {
    pub surface: &'a mut RgbaImage,
    pub rng: &'a mut StdRng,
    pub profile: EffectProfile,
    pub ctx: FrameContext,
    pub strength: f32,
    /// Frame height over the reference height.
    pub scale: f32,
    pub offset: FrameOffset,
}

impl EffectPass<'_> {
    pub fn width(&self) -> f32 {
        self.surface.width() as f32
    }

    pub fn height(&self) -> f32 {
        self.surface.height() as f32
    }

    /// Uniform sample in `[0, 1)`.
    pub fn rand(&mut self) -> f32 {
        self.rng.gen()
    }

    pub fn dt(&self) -> f32 {
        self.ctx.dt_secs as f32
    }

    pub fn time(&self) -> f32 {
        self.ctx.position_secs as f32
    }
}

/// Ordered, stateful effect generators.
pub struct EffectStack {
    rng: StdRng,
    budget: EffectBudget,
    pools: EffectPools,
}

impl EffectStack {
    pub fn new(budget: EffectBudget) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            budget,
            pools: EffectPools::default(),
        }
    }

    /// Deterministic stack for reproducible output.
    pub fn with_seed(budget: EffectBudget, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            budget,
            pools: EffectPools::default(),
        }
    }

    pub fn budget(&self) -> &EffectBudget {
        &self.budget
    }

    pub fn pools(&self) -> &EffectPools {
        &self.pools
    }

    /// Drop all particle state.
    pub fn reset(&mut self) {
        self.pools = EffectPools::default();
    }

    /// Run `slots` over `surface` in order.
    ///
    /// Returns the accumulated jitter offset so later layers can follow it.
    pub fn apply(&mut self, surface: &mut RgbaImage, slots: &[EffectSlot], ctx: &FrameContext) -> FrameOffset {
        let profile = match ctx.mode {
            RenderMode::Preview => self.budget.preview,
            RenderMode::Export => self.budget.export,
        };
        let scale = surface.height() as f32 / REFERENCE_HEIGHT;
        let Self { rng, pools, .. } = self;

        let mut offset = FrameOffset::default();
        for slot in slots.iter().filter(|s| !s.is_identity()) {
            let mut pass = EffectPass {
                surface: &mut *surface,
                rng: &mut *rng,
                profile,
                ctx: *ctx,
                strength: slot.strength,
                scale,
                offset,
            };

            match slot.kind {
                EffectKind::None => {}
                EffectKind::FilmGrain => film::grain(&mut pass),
                EffectKind::OldFilm => film::old_film(&mut pass, &mut pools.old_film_scratches),
                EffectKind::DustScratches => film::dust_scratches(&mut pass, &mut pools.dust_scratches),
                EffectKind::DamagedNegative => film::damaged_negative(&mut pass),
                EffectKind::CinemaLines => film::cinema_lines(&mut pass, &mut pools.cinema_lines),
                EffectKind::VerticalDust => film::vertical_dust(&mut pass, &mut pools.vertical_dust),
                EffectKind::Sepia70s => light::sepia(&mut pass),
                EffectKind::Technicolor => light::technicolor(&mut pass),
                EffectKind::Vignette => light::vignette(&mut pass),
                EffectKind::LightLeaks => light::light_leaks(&mut pass),
                EffectKind::CrtLines => light::crt_lines(&mut pass),
                EffectKind::FireEmbers => light::fire_embers(&mut pass, &mut pools.embers),
                EffectKind::FrameJitter => glitch::frame_jitter(&mut pass),
                EffectKind::VhsGlitch => glitch::vhs_glitch(&mut pass),
            }
            offset = pass.offset;
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    fn frame() -> RgbaImage {
        RgbaImage::from_fn(64, 36, |x, y| Rgba([(x * 4) as u8, (y * 7) as u8, 90, 255]))
    }

    fn ctx(position_secs: f64, mode: RenderMode) -> FrameContext {
        FrameContext {
            position_secs,
            dt_secs: 1.0 / 30.0,
            mode,
        }
    }

    #[test]
    fn test_none_and_zero_strength_are_identity() {
        let mut stack = EffectStack::with_seed(EffectBudget::default(), 1);
        let mut surface = frame();
        let before = surface.clone();
        let slots: Vec<EffectSlot> = EffectKind::ALL.iter().map(|k| EffectSlot::new(*k, 0.0)).collect();
        let offset = stack.apply(&mut surface, &slots, &ctx(1.0, RenderMode::Preview));
        assert_eq!(surface, before);
        assert_eq!(offset, FrameOffset::default());
        assert!(stack.pools().is_empty());
    }

    #[test]
    fn test_same_seed_same_frames() {
        let slots = [
            EffectSlot::new(EffectKind::OldFilm, 0.8),
            EffectSlot::new(EffectKind::FireEmbers, 1.0),
            EffectSlot::new(EffectKind::FrameJitter, 0.5),
        ];
        let mut a = EffectStack::with_seed(EffectBudget::default(), 42);
        let mut b = EffectStack::with_seed(EffectBudget::default(), 42);
        for i in 0..5 {
            let (mut fa, mut fb) = (frame(), frame());
            let c = ctx(f64::from(i) / 30.0, RenderMode::Export);
            assert_eq!(a.apply(&mut fa, &slots, &c), b.apply(&mut fb, &slots, &c));
            assert_eq!(fa, fb);
        }
    }

    #[test]
    fn test_pools_respect_budget() {
        let budget = EffectBudget::default();
        let mut stack = EffectStack::with_seed(budget.clone(), 7);
        let slots = [
            EffectSlot::new(EffectKind::CinemaLines, 1.0),
            EffectSlot::new(EffectKind::FireEmbers, 1.0),
            EffectSlot::new(EffectKind::OldFilm, 1.0),
        ];
        for i in 0..200 {
            stack.apply(&mut frame(), &slots, &ctx(f64::from(i) / 60.0, RenderMode::Preview));
        }
        assert_eq!(stack.pools().cinema_lines.len(), budget.preview.cinema_line_cap);
        assert_eq!(stack.pools().embers.len(), budget.preview.ember_cap);
        assert!(stack.pools().old_film_scratches.len() <= budget.preview.scratch_cap);

        // Export caps are lower; pools shrink on the next export frame.
        stack.apply(&mut frame(), &slots, &ctx(4.0, RenderMode::Export));
        assert_eq!(stack.pools().cinema_lines.len(), budget.export.cinema_line_cap);
        assert!(stack.pools().embers.len() <= budget.export.ember_cap);

        stack.reset();
        assert!(stack.pools().is_empty());
    }

    #[test]
    fn test_vignette_darkens_corners_only() {
        let mut stack = EffectStack::with_seed(EffectBudget::default(), 3);
        let mut surface = RgbaImage::from_pixel(192, 108, Rgba([200, 200, 200, 255]));
        stack.apply(
            &mut surface,
            &[EffectSlot::new(EffectKind::Vignette, 1.0)],
            &ctx(0.0, RenderMode::Preview),
        );
        assert_eq!(surface.get_pixel(96, 54).0[0], 200);
        assert!(surface.get_pixel(0, 0).0[0] < 150);
    }

    proptest! {
        #[test]
        fn prop_jitter_is_bounded(seed in any::<u64>(), strength in 0.01f32..=1.0) {
            let budget = EffectBudget::default();
            let mut stack = EffectStack::with_seed(budget.clone(), seed);
            let mut surface = RgbaImage::new(16, 1080);
            let offset = stack.apply(
                &mut surface,
                &[EffectSlot::new(EffectKind::FrameJitter, strength)],
                &ctx(0.5, RenderMode::Preview),
            );
            let bound = budget.preview.jitter_px / 2.0 * strength + 1e-4;
            prop_assert!(offset.dx.abs() <= bound);
            prop_assert!(offset.dy.abs() <= bound);
        }
    }
}
