//! Tints, lens looks, and light particles.

use crate::raster::{self, BlendMode, ColorMatrix, FilterOp};

use super::pools::Ember;
use super::EffectPass;

const SEPIA_TINT: [u8; 3] = [0xfb, 0xe9, 0xd0];
const LEAK_ORANGE: [u8; 3] = [255, 120, 0];
const EMBER_ORANGE: [u8; 3] = [255, 100, 0];
const BLACK: [u8; 3] = [0, 0, 0];

pub(crate) fn sepia(pass: &mut EffectPass<'_>) {
    let (w, h) = (pass.width(), pass.height());
    raster::fill_rect(pass.surface, 0.0, 0.0, w, h, SEPIA_TINT, 0.3 * pass.strength, BlendMode::Multiply);
}

pub(crate) fn technicolor(pass: &mut EffectPass<'_>) {
    let s = pass.strength;
    ColorMatrix::chain(&[FilterOp::Saturate(1.0 + 0.6 * s), FilterOp::Contrast(1.0 + 0.2 * s)])
        .apply(pass.surface, 1.0);
}

pub(crate) fn vignette(pass: &mut EffectPass<'_>) {
    let (w, h) = (pass.width(), pass.height());
    raster::radial_gradient(
        pass.surface,
        w / 2.0 + pass.offset.dx,
        h / 2.0 + pass.offset.dy,
        0.4 * w,
        0.8 * w,
        BLACK,
        0.0,
        0.85 * pass.strength,
        BlendMode::Normal,
    );
}

pub(crate) fn light_leaks(pass: &mut EffectPass<'_>) {
    let (w, h) = (pass.width(), pass.height());
    let t = pass.time();
    let cx = ((0.5 * t).sin() + 1.0) / 2.0 * w + pass.offset.dx;
    let cy = ((0.3 * t).cos() + 1.0) / 2.0 * h + pass.offset.dy;
    raster::radial_gradient(
        pass.surface,
        cx,
        cy,
        0.0,
        0.7 * w,
        LEAK_ORANGE,
        0.3 * pass.strength,
        0.0,
        BlendMode::Screen,
    );
}

pub(crate) fn crt_lines(pass: &mut EffectPass<'_>) {
    let (w, h) = (pass.width(), pass.height());
    let step = ((pass.profile.scanline_step as f32 * pass.scale).round() as usize).max(1);
    let alpha = 0.15 * pass.strength;
    let dy = pass.offset.dy;
    for y in (0..h as usize).step_by(step) {
        raster::fill_rect(pass.surface, 0.0, y as f32 + dy, w, 1.0, BLACK, alpha, BlendMode::Normal);
    }
}

/// Sparks rising from below the frame, one new spark per frame until the
/// pool is full.
pub(crate) fn fire_embers(pass: &mut EffectPass<'_>, embers: &mut Vec<Ember>) {
    let (w, h) = (pass.width(), pass.height());
    let cap = pass.profile.ember_cap;
    embers.truncate(cap);
    if embers.len() < cap {
        let ember = Ember::spawn(pass.rng, w, h, pass.scale);
        embers.push(ember);
    }

    let (t, dt) = (pass.time(), pass.dt());
    let alpha = 0.6 * pass.strength;
    let (dx, dy) = (pass.offset.dx, pass.offset.dy);
    for (i, ember) in embers.iter_mut().enumerate() {
        ember.y -= ember.speed * dt;
        ember.x += (t + i as f32).sin() * 0.3 * dt * 60.0 * pass.scale;
        if ember.y < -10.0 {
            *ember = Ember::spawn(pass.rng, w, h, pass.scale);
        }
        raster::fill_circle(pass.surface, ember.x + dx, ember.y + dy, ember.size, EMBER_ORANGE, alpha, BlendMode::Add);
    }
}
