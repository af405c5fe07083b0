//! Frame displacement looks.

use crate::raster;

use super::EffectPass;

/// Shake everything drawn after this slot.
pub(crate) fn frame_jitter(pass: &mut EffectPass<'_>) {
    let amplitude = pass.profile.jitter_px * pass.scale * pass.strength;
    pass.offset.dx += (pass.rand() - 0.5) * amplitude;
    pass.offset.dy += (pass.rand() - 0.5) * amplitude;
}

/// Horizontal tear bands plus a red/blue channel split.
pub(crate) fn vhs_glitch(pass: &mut EffectPass<'_>) {
    let h = pass.height();
    let s = pass.strength;

    for _ in 0..pass.profile.glitch_bands {
        if pass.rand() < 0.5 {
            continue;
        }
        let band = ((4.0 + pass.rand() * 36.0) * pass.scale).max(1.0);
        let y = pass.rand() * h;
        let magnitude = (10.0 + pass.rand() * 30.0) * pass.scale * s;
        let shift = if pass.rand() < 0.5 { -magnitude } else { magnitude };
        raster::shift_rows(pass.surface, y as u32, band as u32, shift.round() as i32);
    }

    let split = (3.0 * pass.scale * s).round() as u32;
    raster::channel_split(pass.surface, split.max(1), s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{FrameContext, FrameOffset, RenderMode};
    use image::{Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use reelsmith_common::EffectProfile;

    #[test]
    fn test_jitter_accumulates() {
        let mut surface = RgbaImage::new(4, 1080);
        let mut rng = StdRng::seed_from_u64(11);
        let mut pass = EffectPass {
            surface: &mut surface,
            rng: &mut rng,
            profile: EffectProfile::export(),
            ctx: FrameContext {
                position_secs: 0.0,
                dt_secs: 0.0,
                mode: RenderMode::Export,
            },
            strength: 1.0,
            scale: 1.0,
            offset: FrameOffset { dx: 100.0, dy: -100.0 },
        };
        frame_jitter(&mut pass);
        assert!((pass.offset.dx - 100.0).abs() <= 1.0);
        assert!((pass.offset.dy + 100.0).abs() <= 1.0);
    }

    #[test]
    fn test_vhs_glitch_keeps_frame_opaque() {
        let mut surface = RgbaImage::from_fn(32, 32, |x, _| Rgba([(x * 8) as u8, 0, 255 - (x * 8) as u8, 255]));
        let mut rng = StdRng::seed_from_u64(2);
        let mut pass = EffectPass {
            surface: &mut surface,
            rng: &mut rng,
            profile: EffectProfile::preview(),
            ctx: FrameContext {
                position_secs: 0.0,
                dt_secs: 0.0,
                mode: RenderMode::Preview,
            },
            strength: 1.0,
            scale: 1.0,
            offset: FrameOffset::default(),
        };
        vhs_glitch(&mut pass);
        assert!(surface.pixels().all(|p| p.0[3] == 255));
    }
}
