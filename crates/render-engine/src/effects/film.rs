//! Film-stock looks: grain, specks, scratches, projector lines.

use crate::raster::{self, BlendMode};

use super::pools::{CinemaLine, DustStreak, Scratch};
use super::EffectPass;

const GRAIN_GREY: [u8; 3] = [0x88, 0x88, 0x88];
const BLACK: [u8; 3] = [0, 0, 0];
const WHITE: [u8; 3] = [255, 255, 255];
const SCRATCH_COLOR: [u8; 3] = [20, 20, 20];
const DUST_COLOR: [u8; 3] = [200, 200, 200];

pub(crate) fn grain(pass: &mut EffectPass<'_>) {
    let (w, h) = (pass.width(), pass.height());
    let max_size = pass.profile.grain_max_size * pass.scale;
    let alpha = 0.12 * pass.strength;
    let export = pass.ctx.mode.is_export();

    for _ in 0..pass.profile.grain_particles {
        let x = pass.rand() * w;
        let y = pass.rand() * h;
        let size = if export { max_size } else { pass.rand() * max_size };
        raster::fill_rect(pass.surface, x, y, size, size, GRAIN_GREY, alpha, BlendMode::Normal);
    }
}

/// Spawn, draw, and age a scratch pool.
fn scratches(pass: &mut EffectPass<'_>, pool: &mut Vec<Scratch>) {
    let (w, h) = (pass.width(), pass.height());
    let cap = pass.profile.scratch_cap;
    pool.truncate(cap);
    if pool.len() < cap && pass.rand() < 0.08 {
        let scratch = Scratch::spawn(pass.rng, w);
        pool.push(scratch);
    }

    let alpha = 0.15 * pass.strength;
    let width = pass.scale.max(1.0);
    let (dx, dy) = (pass.offset.dx, pass.offset.dy);
    for scratch in pool.iter_mut() {
        let wobble = (pass.rand() - 0.5) * 1.5 * pass.scale;
        raster::draw_vertical_line(
            pass.surface,
            scratch.x + dx,
            dy,
            scratch.x + wobble + dx,
            h + dy,
            width,
            SCRATCH_COLOR,
            alpha,
            BlendMode::Normal,
        );
        scratch.life = scratch.life.saturating_sub(1);
    }
    pool.retain(|s| s.life > 0);
}

pub(crate) fn old_film(pass: &mut EffectPass<'_>, pool: &mut Vec<Scratch>) {
    let (w, h) = (pass.width(), pass.height());
    let s = pass.strength;

    if pass.rand() > 0.85 {
        let color = if pass.rand() > 0.5 { WHITE } else { BLACK };
        let alpha = pass.rand() * 0.1 * s;
        raster::fill_rect(pass.surface, 0.0, 0.0, w, h, color, alpha, BlendMode::Normal);
    }

    let (dx, dy) = (pass.offset.dx, pass.offset.dy);
    for _ in 0..pass.profile.film_specks {
        if pass.rand() < 0.2 {
            let x = pass.rand() * w + dx;
            let y = pass.rand() * h + dy;
            let radius = pass.rand() * 3.0 * pass.scale;
            raster::fill_circle(pass.surface, x, y, radius, BLACK, 0.3 * s, BlendMode::Normal);
        }
    }

    scratches(pass, pool);
}

pub(crate) fn dust_scratches(pass: &mut EffectPass<'_>, pool: &mut Vec<Scratch>) {
    let (w, h) = (pass.width(), pass.height());
    let s = pass.strength;
    let (dx, dy) = (pass.offset.dx, pass.offset.dy);

    for _ in 0..pass.profile.film_specks {
        if pass.rand() < 0.3 {
            let color = if pass.rand() > 0.5 { WHITE } else { BLACK };
            let x = pass.rand() * w + dx;
            let y = pass.rand() * h + dy;
            let radius = (0.5 + pass.rand() * 2.0) * pass.scale;
            raster::fill_circle(pass.surface, x, y, radius, color, 0.4 * s, BlendMode::Normal);
        }
    }

    scratches(pass, pool);
}

pub(crate) fn damaged_negative(pass: &mut EffectPass<'_>) {
    let (w, h) = (pass.width(), pass.height());
    let s = pass.strength;

    if pass.rand() < 0.4 {
        let color = if pass.rand() > 0.5 { WHITE } else { BLACK };
        let alpha = pass.rand() * 0.25 * s;
        raster::fill_rect(pass.surface, 0.0, 0.0, w, h, color, alpha, BlendMode::Normal);
    }

    let (dx, dy) = (pass.offset.dx, pass.offset.dy);
    for _ in 0..3 {
        if pass.rand() < 0.3 {
            let x = pass.rand() * w + dx;
            let y = pass.rand() * h + dy;
            let radius = (20.0 + pass.rand() * 60.0) * pass.scale;
            raster::invert_circle(pass.surface, x, y, radius, 0.6 * s);
        }
    }
}

pub(crate) fn cinema_lines(pass: &mut EffectPass<'_>, lines: &mut Vec<CinemaLine>) {
    let (w, h) = (pass.width(), pass.height());
    let cap = pass.profile.cinema_line_cap;
    lines.truncate(cap);
    if lines.len() < cap {
        let line = CinemaLine::spawn(pass.rng, w);
        lines.push(line);
    }

    let alpha = 0.2 * pass.strength;
    let (dx, dy) = (pass.offset.dx, pass.offset.dy);
    for line in lines.iter_mut() {
        if pass.rand() < 0.01 {
            line.x = pass.rand() * w;
        }
        if pass.rand() < 0.2 {
            continue;
        }
        raster::fill_rect(
            pass.surface,
            line.x + dx,
            dy,
            line.width * pass.scale,
            h,
            BLACK,
            alpha,
            BlendMode::Normal,
        );
    }
}

pub(crate) fn vertical_dust(pass: &mut EffectPass<'_>, streaks: &mut Vec<DustStreak>) {
    let (w, h) = (pass.width(), pass.height());
    let cap = pass.profile.vertical_dust_cap;
    streaks.truncate(cap);
    if streaks.len() < cap && pass.rand() < 0.1 {
        let streak = DustStreak::spawn(pass.rng, w, pass.scale);
        streaks.push(streak);
    }

    let dt = pass.dt();
    let alpha = 0.25 * pass.strength;
    let width = pass.scale.max(1.0);
    let (dx, dy) = (pass.offset.dx, pass.offset.dy);
    for streak in streaks.iter_mut() {
        streak.y += streak.speed * dt;
        raster::draw_vertical_line(
            pass.surface,
            streak.x + dx,
            streak.y + dy,
            streak.x + dx,
            streak.y + streak.length + dy,
            width,
            DUST_COLOR,
            alpha,
            BlendMode::Normal,
        );
    }
    streaks.retain(|s| s.y < h);
}
