//! Caption text drawing.
//!
//! Layout and the typewriter reveal come from
//! [`reelsmith_processing_core::typewriter`]; this module measures text with
//! the loaded font and rasterizes the outline and fill passes.

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, warn};

use reelsmith_processing_core::{reveal_count, reveal_lines, wrap_words, TypewriterLayout};
use reelsmith_project_model::{active_caption, Caption, CaptionStyle, Rgba8};

use crate::effects::FrameOffset;

#[derive(Debug, Clone, PartialEq)]
struct WrapKey {
    cue_id: u32,
    text: String,
    max_width: u32,
    font_px_bits: u32,
}

/// Draws the active caption cue.
#[derive(Default)]
pub struct CaptionLayer {
    font: Option<FontArc>,
    font_path: Option<PathBuf>,
    wrapped: Option<(WrapKey, Vec<String>)>,
    /// Whether skipping an active cue for lack of a font was reported.
    missing_font_reported: bool,
}

fn opaque(color: Rgba8) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

impl CaptionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already-parsed font.
    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            ..Self::default()
        }
    }

    /// Load the font at `path` if it differs from the current one.
    ///
    /// A missing or unreadable font leaves the layer without a font, which
    /// skips caption drawing until a usable one is set.
    pub fn set_font_path(&mut self, path: Option<&Path>) {
        if self.font_path.as_deref() == path {
            return;
        }
        self.font_path = path.map(Path::to_path_buf);
        self.wrapped = None;
        self.missing_font_reported = false;
        self.font = path.and_then(|p| match std::fs::read(p) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    debug!(path = %p.display(), "Caption font loaded");
                    Some(font)
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "Caption font is not a valid font file");
                    None
                }
            },
            Err(e) => {
                warn!(path = %p.display(), error = %e, "Caption font could not be read");
                None
            }
        });
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw the cue active at `position_secs`, revealed up to that instant.
    pub fn draw(
        &mut self,
        surface: &mut RgbaImage,
        captions: &[Caption],
        style: &CaptionStyle,
        position_secs: f64,
        offset: FrameOffset,
    ) {
        let Some(cue) = active_caption(captions, position_secs) else {
            return;
        };
        let Some(font) = self.font.as_ref() else {
            if !self.missing_font_reported {
                warn!(cue = cue.id, "No caption font loaded; captions are not drawn");
                self.missing_font_reported = true;
            }
            return;
        };

        let layout = TypewriterLayout::for_frame(
            surface.width(),
            surface.height(),
            style.font_size,
            style.outline_width,
            style.vertical_anchor,
        );
        if layout.font_px <= 0.0 {
            return;
        }
        let scale = PxScale::from(layout.font_px);

        let key = WrapKey {
            cue_id: cue.id,
            text: cue.text.clone(),
            max_width: layout.max_width as u32,
            font_px_bits: layout.font_px.to_bits(),
        };
        let cached = self
            .wrapped
            .as_ref()
            .filter(|(k, _)| *k == key)
            .map(|(_, lines)| lines.clone());
        let lines = match cached {
            Some(lines) => lines,
            None => {
                let lines = wrap_words(&cue.text, layout.max_width, |s| text_size(scale, font, s).0 as f32);
                self.wrapped = Some((key, lines.clone()));
                lines
            }
        };

        let total_chars =
            lines.iter().map(|l| l.chars().count()).sum::<usize>() + lines.len().saturating_sub(1);
        let count = reveal_count(total_chars, position_secs - cue.start_secs, cue.duration_secs());
        let visible = reveal_lines(&lines, count);

        let scaled = font.as_scaled(scale);
        let glyph_height = scaled.ascent() - scaled.descent();
        let fill = opaque(style.fill_color());
        let outline = opaque(style.outline_color());
        let radius = if layout.outline_px > 0.0 {
            ((layout.outline_px / 2.0).round() as i32).max(1)
        } else {
            0
        };

        let centers = layout.line_centers(lines.len());
        for ((full, shown), center_y) in lines.iter().zip(&visible).zip(centers) {
            if shown.is_empty() {
                continue;
            }
            // Position from the full line so the text does not slide while typing.
            let width = text_size(scale, font, full).0 as f32;
            let x = (layout.center_x - width / 2.0 + offset.dx).round() as i32;
            let y = (center_y - glyph_height / 2.0 + offset.dy).round() as i32;

            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if (ox, oy) != (0, 0) && ox * ox + oy * oy <= radius * radius {
                        draw_text_mut(surface, outline, x + ox, y + oy, scale, font, shown);
                    }
                }
            }
            draw_text_mut(surface, fill, x, y, scale, font, shown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsmith_project_model::parse_captions;

    #[test]
    fn test_missing_font_skips_layer() {
        let mut layer = CaptionLayer::new();
        layer.set_font_path(Some(Path::new("/nonexistent/reelsmith/font.ttf")));
        assert!(!layer.has_font());

        let captions = parse_captions("1\n00:00:00,000 --> 00:00:05,000\nHello there\n");
        let mut surface = RgbaImage::from_pixel(64, 36, Rgba([0, 0, 0, 255]));
        let before = surface.clone();
        layer.draw(&mut surface, &captions, &CaptionStyle::default(), 2.0, FrameOffset::default());
        assert_eq!(surface, before);
    }

    const BACKGROUND: Rgba<u8> = Rgba([100, 100, 100, 255]);

    fn fixture_layer() -> CaptionLayer {
        let mut layer = CaptionLayer::new();
        layer.set_font_path(Some(Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/DejaVuSans.ttf"
        ))));
        assert!(layer.has_font());
        layer
    }

    fn draw_at(layer: &mut CaptionLayer, captions: &[Caption], style: &CaptionStyle, at: f64) -> RgbaImage {
        let mut surface = RgbaImage::from_pixel(640, 360, BACKGROUND);
        layer.draw(&mut surface, captions, style, at, FrameOffset::default());
        surface
    }

    fn changed_pixels(surface: &RgbaImage) -> usize {
        surface.pixels().filter(|p| **p != BACKGROUND).count()
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of changed pixels.
    fn changed_bounds(surface: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        surface
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != BACKGROUND)
            .fold(None, |acc, (x, y, _)| match acc {
                None => Some((x, y, x, y)),
                Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
            })
    }

    fn count_matching(surface: &RgbaImage, pred: impl Fn(&Rgba<u8>) -> bool) -> usize {
        surface.pixels().filter(|p| pred(p)).count()
    }

    fn is_bright(p: &Rgba<u8>) -> bool {
        p.0[..3].iter().all(|&c| c >= 230)
    }

    fn is_dark(p: &Rgba<u8>) -> bool {
        p.0[..3].iter().all(|&c| c <= 25)
    }

    #[test]
    fn test_active_caption_draws_fill_over_outline() {
        let captions = parse_captions("1\n00:00:00,000 --> 00:00:05,000\nHello there\n");
        let mut layer = fixture_layer();

        let drawn = draw_at(&mut layer, &captions, &CaptionStyle::default(), 3.0);
        assert!(count_matching(&drawn, is_bright) > 0, "white fill missing");
        assert!(count_matching(&drawn, is_dark) > 0, "black outline missing");

        let bare = CaptionStyle {
            outline_width: 0.0,
            ..CaptionStyle::default()
        };
        let unoutlined = draw_at(&mut layer, &captions, &bare, 3.0);
        assert!(count_matching(&unoutlined, is_bright) > 0);
        assert_eq!(count_matching(&unoutlined, is_dark), 0);
        assert!(changed_pixels(&drawn) > changed_pixels(&unoutlined));

        // Outside the cue nothing is drawn.
        assert_eq!(changed_pixels(&draw_at(&mut layer, &captions, &CaptionStyle::default(), 6.0)), 0);
    }

    #[test]
    fn test_reveal_grows_visible_text() {
        let captions = parse_captions("1\n00:00:00,000 --> 00:00:10,000\nSlowly typed words\n");
        let mut layer = fixture_layer();
        let style = CaptionStyle::default();

        let start = changed_pixels(&draw_at(&mut layer, &captions, &style, 0.0));
        let early = changed_pixels(&draw_at(&mut layer, &captions, &style, 0.4));
        let late = changed_pixels(&draw_at(&mut layer, &captions, &style, 0.9));
        let full = changed_pixels(&draw_at(&mut layer, &captions, &style, 2.0));

        assert_eq!(start, 0);
        assert!(early > 0);
        assert!(late > early);
        assert!(full > late);
        // Fully revealed after the reveal window.
        assert_eq!(full, changed_pixels(&draw_at(&mut layer, &captions, &style, 9.0)));
    }

    #[test]
    fn test_long_caption_wraps_within_frame_share() {
        let long = "the quick brown fox jumps over the lazy dog and keeps running \
                    far across the wide green field until the sun goes down";
        let captions = parse_captions(&format!(
            "1\n00:00:00,000 --> 00:00:05,000\n{long}\n\n2\n00:00:05,000 --> 00:00:10,000\nfox\n"
        ));
        let mut layer = fixture_layer();
        let style = CaptionStyle::default();

        let wrapped = draw_at(&mut layer, &captions, &style, 4.0);
        let (x0, y0, x1, y1) = changed_bounds(&wrapped).unwrap();
        // 0.85 of 640 px, plus outline and antialiasing slack.
        assert!(x1 - x0 <= 544 + 8, "line width {} exceeds the wrap width", x1 - x0);

        let single = draw_at(&mut layer, &captions, &style, 9.0);
        let (_, sy0, _, sy1) = changed_bounds(&single).unwrap();
        assert!(
            (y1 - y0) as f32 > 2.0 * (sy1 - sy0) as f32,
            "expected several lines, block is {} px tall",
            y1 - y0
        );
    }

    #[test]
    fn test_invalid_font_bytes_are_rejected() {
        let path = std::env::temp_dir().join(format!("reelsmith_font_{}.ttf", std::process::id()));
        std::fs::write(&path, b"not a font").unwrap();
        let mut layer = CaptionLayer::new();
        layer.set_font_path(Some(&path));
        assert!(!layer.has_font());
        std::fs::remove_file(&path).ok();
    }
}
