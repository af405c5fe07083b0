//! Per-image color grading for the preview.

use image::RgbaImage;

use crate::raster::{ColorMatrix, FilterOp};

use super::RenderMode;

/// A named color filter drawn over one background image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosmeticFilter {
    pub name: &'static str,
    ops: &'static [FilterOp],
    /// Skipped when rendering for the encoder.
    pub preview_only: bool,
}

const FILTERS: [CosmeticFilter; 5] = [
    CosmeticFilter {
        name: "punchy",
        ops: &[FilterOp::Contrast(1.1), FilterOp::Saturate(1.2), FilterOp::Brightness(1.05)],
        preview_only: true,
    },
    CosmeticFilter {
        name: "moody",
        ops: &[FilterOp::Contrast(1.4), FilterOp::Saturate(0.8), FilterOp::Brightness(0.9)],
        preview_only: true,
    },
    CosmeticFilter {
        name: "warm_sepia",
        ops: &[FilterOp::Sepia(0.3), FilterOp::Contrast(1.1), FilterOp::Brightness(1.1)],
        preview_only: true,
    },
    CosmeticFilter {
        name: "cool_shift",
        ops: &[FilterOp::HueRotate(-15.0), FilterOp::Saturate(1.1)],
        preview_only: true,
    },
    CosmeticFilter {
        name: "none",
        ops: &[],
        preview_only: true,
    },
];

impl CosmeticFilter {
    /// Filter for the image at `index`; the table repeats every five images.
    pub fn for_image(index: usize) -> &'static CosmeticFilter {
        &FILTERS[index % FILTERS.len()]
    }

    pub fn is_active(&self, mode: RenderMode) -> bool {
        !self.ops.is_empty() && !(self.preview_only && mode.is_export())
    }

    /// Grade `layer` in place when active for `mode`.
    pub fn apply(&self, layer: &mut RgbaImage, mode: RenderMode) {
        if self.is_active(mode) {
            ColorMatrix::chain(self.ops).apply(layer, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_table_cycles() {
        assert_eq!(CosmeticFilter::for_image(0).name, "punchy");
        assert_eq!(CosmeticFilter::for_image(4).name, "none");
        assert_eq!(CosmeticFilter::for_image(7), CosmeticFilter::for_image(2));
    }

    #[test]
    fn test_export_skips_filter() {
        let filter = CosmeticFilter::for_image(1);
        let mut layer = RgbaImage::from_pixel(2, 2, Rgba([100, 150, 200, 255]));
        let before = layer.clone();
        filter.apply(&mut layer, RenderMode::Export);
        assert_eq!(layer, before);
        filter.apply(&mut layer, RenderMode::Preview);
        assert_ne!(layer, before);
    }
}
