//! 2D raster primitives on RGBA frames.
//!
//! Frames are opaque: every primitive blends a color into the existing
//! pixel and leaves the alpha channel at 255. Coordinates are in pixels and
//! shapes are clipped to the frame.

use image::{Rgba, RgbaImage};

/// How a source color combines with the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Source over.
    Normal,
    /// Darkens: `src × dst`.
    Multiply,
    /// Lightens: `1 − (1 − src)(1 − dst)`.
    Screen,
    /// Additive: `dst + src × alpha`.
    Add,
}

#[inline]
fn blend_channel(dst: f32, src: f32, alpha: f32, mode: BlendMode) -> f32 {
    let out = match mode {
        BlendMode::Normal => dst + (src - dst) * alpha,
        BlendMode::Multiply => dst + (src * dst / 255.0 - dst) * alpha,
        BlendMode::Screen => {
            let screened = 255.0 - (255.0 - src) * (255.0 - dst) / 255.0;
            dst + (screened - dst) * alpha
        }
        BlendMode::Add => dst + src * alpha,
    };
    out.clamp(0.0, 255.0)
}

/// Blend `color` into one pixel with coverage `alpha` in `[0, 1]`.
#[inline]
pub fn blend_pixel(px: &mut Rgba<u8>, color: [u8; 3], alpha: f32, mode: BlendMode) {
    if alpha <= 0.0 {
        return;
    }
    let a = alpha.min(1.0);
    for c in 0..3 {
        px.0[c] = blend_channel(f32::from(px.0[c]), f32::from(color[c]), a, mode).round() as u8;
    }
    px.0[3] = 255;
}

/// Fill the whole frame with an opaque color.
pub fn clear(img: &mut RgbaImage, color: [u8; 3]) {
    for px in img.pixels_mut() {
        *px = Rgba([color[0], color[1], color[2], 255]);
    }
}

/// Pixel span `[start, end)` covered by `[pos, pos + len)`, clipped to `limit`.
fn span(pos: f32, len: f32, limit: u32) -> Option<(u32, u32)> {
    let start = pos.floor();
    let end = (pos + len).ceil().max(start + 1.0);
    let start = start.max(0.0);
    let end = end.min(limit as f32);
    (end > start).then(|| (start as u32, end as u32))
}

/// Axis-aligned rectangle.
#[allow(clippy::too_many_arguments)]
pub fn fill_rect(
    img: &mut RgbaImage,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    color: [u8; 3],
    alpha: f32,
    mode: BlendMode,
) {
    let Some((x0, x1)) = span(x, w, img.width()) else {
        return;
    };
    let Some((y0, y1)) = span(y, h, img.height()) else {
        return;
    };
    for py in y0..y1 {
        for px in x0..x1 {
            blend_pixel(img.get_pixel_mut(px, py), color, alpha, mode);
        }
    }
}

/// Filled disc.
pub fn fill_circle(
    img: &mut RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
    color: [u8; 3],
    alpha: f32,
    mode: BlendMode,
) {
    if radius <= 0.0 {
        return;
    }
    let reach = radius + 0.5;
    let Some((x0, x1)) = span(cx - reach, reach * 2.0, img.width()) else {
        return;
    };
    let Some((y0, y1)) = span(cy - reach, reach * 2.0, img.height()) else {
        return;
    };
    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            // One pixel of soft edge.
            let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
            if coverage > 0.0 {
                blend_pixel(img.get_pixel_mut(px, py), color, alpha * coverage, mode);
            }
        }
    }
}

/// Near-vertical line from `(x_top, y_top)` to `(x_bottom, y_bottom)`.
#[allow(clippy::too_many_arguments)]
pub fn draw_vertical_line(
    img: &mut RgbaImage,
    x_top: f32,
    y_top: f32,
    x_bottom: f32,
    y_bottom: f32,
    width: f32,
    color: [u8; 3],
    alpha: f32,
    mode: BlendMode,
) {
    let Some((y0, y1)) = span(y_top, y_bottom - y_top, img.height()) else {
        return;
    };
    let run = (y_bottom - y_top).max(1.0);
    let half = width.max(1.0) / 2.0;
    for py in y0..y1 {
        let t = (py as f32 + 0.5 - y_top) / run;
        let x = x_top + (x_bottom - x_top) * t;
        if let Some((x0, x1)) = span(x - half, half * 2.0, img.width()) {
            for px in x0..x1 {
                blend_pixel(img.get_pixel_mut(px, py), color, alpha, mode);
            }
        }
    }
}

/// Radial gradient of one color whose alpha goes from `alpha_inner` at
/// `r_inner` to `alpha_outer` at `r_outer`, covering the whole frame.
#[allow(clippy::too_many_arguments)]
pub fn radial_gradient(
    img: &mut RgbaImage,
    cx: f32,
    cy: f32,
    r_inner: f32,
    r_outer: f32,
    color: [u8; 3],
    alpha_inner: f32,
    alpha_outer: f32,
    mode: BlendMode,
) {
    let band = (r_outer - r_inner).max(f32::EPSILON);
    for (px, py, pixel) in img.enumerate_pixels_mut() {
        let dx = px as f32 + 0.5 - cx;
        let dy = py as f32 + 0.5 - cy;
        let t = (((dx * dx + dy * dy).sqrt() - r_inner) / band).clamp(0.0, 1.0);
        let alpha = alpha_inner + (alpha_outer - alpha_inner) * t;
        blend_pixel(pixel, color, alpha, mode);
    }
}

/// Blend `src` onto `dst` at an offset, weighting by the source alpha and
/// `opacity`.
pub fn blend_image(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    opacity: f32,
    offset_x: i64,
    offset_y: i64,
    mode: BlendMode,
) {
    if opacity <= 0.0 {
        return;
    }
    let (dw, dh) = (i64::from(dst.width()), i64::from(dst.height()));
    for (sx, sy, spx) in src.enumerate_pixels() {
        if spx.0[3] == 0 {
            continue;
        }
        let x = i64::from(sx) + offset_x;
        let y = i64::from(sy) + offset_y;
        if x < 0 || y < 0 || x >= dw || y >= dh {
            continue;
        }
        let alpha = f32::from(spx.0[3]) / 255.0 * opacity;
        blend_pixel(
            dst.get_pixel_mut(x as u32, y as u32),
            [spx.0[0], spx.0[1], spx.0[2]],
            alpha,
            mode,
        );
    }
}

/// Blend the inverse of the frame into a disc.
pub fn invert_circle(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, alpha: f32) {
    let Some((x0, x1)) = span(cx - radius, radius * 2.0, img.width()) else {
        return;
    };
    let Some((y0, y1)) = span(cy - radius, radius * 2.0, img.height()) else {
        return;
    };
    let r2 = radius * radius;
    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                let pixel = img.get_pixel_mut(px, py);
                let inverse = [255 - pixel.0[0], 255 - pixel.0[1], 255 - pixel.0[2]];
                blend_pixel(pixel, inverse, alpha, BlendMode::Normal);
            }
        }
    }
}

/// Shift rows `[y, y + h)` horizontally by `dx`, wrapping around.
pub fn shift_rows(img: &mut RgbaImage, y: u32, h: u32, dx: i32) {
    let width = img.width() as usize;
    if width == 0 || dx == 0 {
        return;
    }
    let shift = dx.rem_euclid(width as i32) as usize;
    let stride = width * 4;
    let y1 = (y + h).min(img.height());
    let raw: &mut [u8] = img;
    for row in y.min(y1)..y1 {
        let start = row as usize * stride;
        raw[start..start + stride].rotate_right(shift * 4);
    }
}

/// Offset the red channel left and the blue channel right by `px` pixels,
/// blended at `alpha`.
pub fn channel_split(img: &mut RgbaImage, px: u32, alpha: f32) {
    if px == 0 || alpha <= 0.0 {
        return;
    }
    let source = img.clone();
    let (w, h) = img.dimensions();
    let a = alpha.min(1.0);
    for y in 0..h {
        for x in 0..w {
            let red = source.get_pixel((x + px).min(w - 1), y).0[0];
            let blue = source.get_pixel(x.saturating_sub(px), y).0[2];
            let pixel = img.get_pixel_mut(x, y);
            pixel.0[0] = (f32::from(pixel.0[0]) + (f32::from(red) - f32::from(pixel.0[0])) * a).round() as u8;
            pixel.0[2] = (f32::from(pixel.0[2]) + (f32::from(blue) - f32::from(pixel.0[2])) * a).round() as u8;
        }
    }
}

/// One step of a CSS-style color filter chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    Sepia(f32),
    HueRotate(f32),
}

/// Affine color transform in 0..1 space: `out = M × rgb + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    m: [[f32; 4]; 3],
}

impl ColorMatrix {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    fn linear(rows: [[f32; 3]; 3], offset: f32) -> Self {
        let mut m = [[0.0; 4]; 3];
        for (r, row) in rows.iter().enumerate() {
            m[r][..3].copy_from_slice(row);
            m[r][3] = offset;
        }
        Self { m }
    }

    pub fn from_op(op: FilterOp) -> Self {
        match op {
            FilterOp::Brightness(b) => Self::linear([[b, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, b]], 0.0),
            FilterOp::Contrast(c) => {
                Self::linear([[c, 0.0, 0.0], [0.0, c, 0.0], [0.0, 0.0, c]], 0.5 - 0.5 * c)
            }
            FilterOp::Saturate(s) => Self::linear(
                [
                    [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
                    [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
                    [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
                ],
                0.0,
            ),
            FilterOp::Sepia(amount) => {
                let k = 1.0 - amount.clamp(0.0, 1.0);
                Self::linear(
                    [
                        [0.393 + 0.607 * k, 0.769 - 0.769 * k, 0.189 - 0.189 * k],
                        [0.349 - 0.349 * k, 0.686 + 0.314 * k, 0.168 - 0.168 * k],
                        [0.272 - 0.272 * k, 0.534 - 0.534 * k, 0.131 + 0.869 * k],
                    ],
                    0.0,
                )
            }
            FilterOp::HueRotate(deg) => {
                let (sin, cos) = deg.to_radians().sin_cos();
                Self::linear(
                    [
                        [
                            0.213 + cos * 0.787 - sin * 0.213,
                            0.715 - cos * 0.715 - sin * 0.715,
                            0.072 - cos * 0.072 + sin * 0.928,
                        ],
                        [
                            0.213 - cos * 0.213 + sin * 0.143,
                            0.715 + cos * 0.285 + sin * 0.140,
                            0.072 - cos * 0.072 - sin * 0.283,
                        ],
                        [
                            0.213 - cos * 0.213 - sin * 0.787,
                            0.715 - cos * 0.715 + sin * 0.715,
                            0.072 + cos * 0.928 + sin * 0.072,
                        ],
                    ],
                    0.0,
                )
            }
        }
    }

    /// Compose a chain; ops apply in order.
    pub fn chain(ops: &[FilterOp]) -> Self {
        ops.iter()
            .fold(Self::IDENTITY, |acc, op| Self::from_op(*op).after(&acc))
    }

    /// `self ∘ first`: apply `first`, then `self`.
    fn after(&self, first: &Self) -> Self {
        let mut m = [[0.0; 4]; 3];
        for r in 0..3 {
            for c in 0..4 {
                let mut v: f32 = (0..3).map(|k| self.m[r][k] * first.m[k][c]).sum();
                if c == 3 {
                    v += self.m[r][3];
                }
                m[r][c] = v;
            }
        }
        Self { m }
    }

    /// Apply to every pixel, mixing the result in at `amount`.
    pub fn apply(&self, img: &mut RgbaImage, amount: f32) {
        if amount <= 0.0 || *self == Self::IDENTITY {
            return;
        }
        let a = amount.min(1.0);
        for pixel in img.pixels_mut() {
            let rgb = [
                f32::from(pixel.0[0]) / 255.0,
                f32::from(pixel.0[1]) / 255.0,
                f32::from(pixel.0[2]) / 255.0,
            ];
            for (r, row) in self.m.iter().enumerate() {
                let v = (row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2] + row[3]).clamp(0.0, 1.0);
                let mixed = rgb[r] + (v - rgb[r]) * a;
                pixel.0[r] = (mixed * 255.0).round() as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba([v, v, v, 255]))
    }

    #[test]
    fn test_blend_modes() {
        let mut px = Rgba([100, 100, 100, 255]);
        blend_pixel(&mut px, [200, 0, 255], 1.0, BlendMode::Normal);
        assert_eq!(px.0, [200, 0, 255, 255]);

        let mut px = Rgba([128, 128, 128, 255]);
        blend_pixel(&mut px, [255, 0, 128], 1.0, BlendMode::Multiply);
        assert_eq!(px.0, [128, 0, 64, 255]);

        let mut px = Rgba([0, 128, 255, 255]);
        blend_pixel(&mut px, [128, 128, 0], 1.0, BlendMode::Screen);
        assert_eq!(px.0, [128, 192, 255, 255]);

        let mut px = Rgba([200, 10, 0, 255]);
        blend_pixel(&mut px, [100, 100, 0], 0.5, BlendMode::Add);
        assert_eq!(px.0, [250, 60, 0, 255]);
    }

    #[test]
    fn test_zero_alpha_is_identity() {
        let mut img = grey(90);
        let before = img.clone();
        fill_rect(&mut img, 0.0, 0.0, 8.0, 8.0, [255, 0, 0], 0.0, BlendMode::Normal);
        assert_eq!(img, before);
    }

    #[test]
    fn test_rect_is_clipped() {
        let mut img = grey(0);
        fill_rect(&mut img, -4.0, 6.0, 6.0, 10.0, [255, 255, 255], 1.0, BlendMode::Normal);
        assert_eq!(img.get_pixel(0, 6).0[0], 255);
        assert_eq!(img.get_pixel(1, 7).0[0], 255);
        assert_eq!(img.get_pixel(2, 7).0[0], 0);
        assert_eq!(img.get_pixel(0, 5).0[0], 0);
    }

    #[test]
    fn test_circle_covers_center() {
        let mut img = grey(0);
        fill_circle(&mut img, 4.0, 4.0, 2.0, [255, 255, 255], 1.0, BlendMode::Normal);
        assert_eq!(img.get_pixel(4, 4).0[0], 255);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn test_shift_rows_wraps() {
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(3, 0, Rgba([9, 9, 9, 255]));
        shift_rows(&mut img, 0, 1, 1);
        assert_eq!(img.get_pixel(0, 0).0[0], 9);
        assert_eq!(img.get_pixel(3, 0).0[0], 0);
    }

    #[test]
    fn test_blend_image_respects_offset_and_alpha() {
        let mut dst = grey(0);
        let src = RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 255]));
        blend_image(&mut dst, &src, 0.5, 7, 7, BlendMode::Normal);
        assert_eq!(dst.get_pixel(7, 7).0[0], 100);
        assert_eq!(dst.get_pixel(6, 6).0[0], 0);
    }

    #[test]
    fn test_color_matrix_identity_chain() {
        let m = ColorMatrix::chain(&[FilterOp::Saturate(1.0), FilterOp::Brightness(1.0)]);
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([10, 120, 240, 255]));
        m.apply(&mut img, 1.0);
        let px = img.get_pixel(0, 0).0;
        assert!((i32::from(px[0]) - 10).abs() <= 1);
        assert!((i32::from(px[1]) - 120).abs() <= 1);
        assert!((i32::from(px[2]) - 240).abs() <= 1);
    }

    #[test]
    fn test_brightness_then_contrast() {
        let m = ColorMatrix::chain(&[FilterOp::Brightness(0.5), FilterOp::Contrast(2.0)]);
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([204, 204, 204, 255]));
        m.apply(&mut img, 1.0);
        // 0.8 * 0.5 = 0.4, then (0.4 - 0.5) * 2 + 0.5 = 0.3
        assert_eq!(img.get_pixel(0, 0).0[0], 77);
    }
}
