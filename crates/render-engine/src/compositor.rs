//! Frame compositor: background images, effects, overlays, and captions.
//!
//! Layer order, back to front:
//!
//! 1. black fill
//! 2. Ken Burns image layers (pan/zoom, crossfade, per-image grade)
//! 3. effect stack
//! 4. full-frame overlay images
//! 5. caption text
//!
//! Everything after the effect pass follows the jitter offset the effects
//! return.

use std::collections::HashMap;
use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use reelsmith_common::EffectBudget;
use reelsmith_processing_core::{Motion, SlideshowTiming};
use reelsmith_project_model::{Caption, CaptionStyle, EffectSlot, LoadedProject, SlideshowSettings};

use crate::caption_layer::CaptionLayer;
use crate::effects::{CosmeticFilter, EffectStack, FrameContext, FrameOffset, RenderMode};
use crate::image_cache::ImageCache;
use crate::raster::{self, BlendMode};

/// Reference height the pan distances are expressed at.
const REFERENCE_HEIGHT: f64 = 1080.0;

/// Largest frame step fed to the effect generators, so a seek does not
/// teleport particles.
const MAX_FRAME_STEP_SECS: f64 = 0.25;

/// Everything a frame is drawn from.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub images: Vec<PathBuf>,
    pub overlays: Vec<PathBuf>,
    pub captions: Vec<Caption>,
    pub slideshow: SlideshowSettings,
    pub caption_style: CaptionStyle,
    pub font_path: Option<PathBuf>,
    pub effects: Vec<EffectSlot>,
    /// Timeline length; the audio duration.
    pub duration_secs: f64,
}

impl Scene {
    pub fn from_project(loaded: &LoadedProject, duration_secs: f64) -> Self {
        let project = &loaded.project;
        Self {
            images: loaded.image_paths(),
            overlays: loaded.overlay_paths(),
            captions: loaded.captions.clone(),
            slideshow: project.slideshow.clone(),
            caption_style: project.caption_style.clone(),
            font_path: loaded.font_path(),
            effects: project.effects.clone(),
            duration_secs,
        }
    }

    /// Use `font` for captions when the project named none.
    pub fn with_fallback_font(mut self, font: Option<PathBuf>) -> Self {
        if self.font_path.is_none() {
            self.font_path = font;
        }
        self
    }

    pub fn timing(&self) -> SlideshowTiming {
        SlideshowTiming::from_settings(&self.slideshow, self.images.len(), self.duration_secs)
    }

    fn asset_paths(&self) -> Vec<PathBuf> {
        self.images.iter().chain(&self.overlays).cloned().collect()
    }
}

/// Draws one frame per call into an owned surface.
pub struct FrameCompositor {
    surface: RgbaImage,
    /// Scratch target for warped background images.
    layer: RgbaImage,
    images: ImageCache,
    effects: EffectStack,
    captions: CaptionLayer,
    /// Overlays resized to the frame, keyed by source path.
    overlay_fitted: HashMap<PathBuf, RgbaImage>,
    last_position: Option<f64>,
}

impl FrameCompositor {
    pub fn new(width: u32, height: u32, budget: EffectBudget) -> Self {
        Self::with_effects(width, height, EffectStack::new(budget))
    }

    /// Compositor whose effects are reproducible across runs.
    pub fn with_effect_seed(width: u32, height: u32, budget: EffectBudget, seed: u64) -> Self {
        Self::with_effects(width, height, EffectStack::with_seed(budget, seed))
    }

    fn with_effects(width: u32, height: u32, effects: EffectStack) -> Self {
        Self {
            surface: RgbaImage::new(width, height),
            layer: RgbaImage::new(width, height),
            images: ImageCache::new(),
            effects,
            captions: CaptionLayer::new(),
            overlay_fitted: HashMap::new(),
            last_position: None,
        }
    }

    /// Replace the caption layer, e.g. with one holding a preloaded font.
    pub fn set_caption_layer(&mut self, captions: CaptionLayer) {
        self.captions = captions;
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// The most recently rendered frame.
    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn effects(&self) -> &EffectStack {
        &self.effects
    }

    /// Clear generator state between sessions.
    pub fn reset_effects(&mut self) {
        self.effects.reset();
        self.last_position = None;
    }

    /// Track the scene's assets and start decoding anything new.
    pub fn sync_assets(&mut self, scene: &Scene) {
        let paths = scene.asset_paths();
        if self.images.sync(&paths) {
            self.overlay_fitted.retain(|path, _| scene.overlays.contains(path));
        }
        self.captions.set_font_path(scene.font_path.as_deref());
        self.images.request_pending();
    }

    /// Track the scene's assets and wait until every one is decoded or
    /// has failed.
    pub async fn preload(&mut self, scene: &Scene) {
        self.sync_assets(scene);
        self.images.load_pending().await;
        tracing::debug!(
            ready = self.images.ready_count(),
            failed = self.images.failed_count(),
            "Scene assets preloaded"
        );
    }

    /// Draw the frame at `position_secs`.
    pub fn render(&mut self, position_secs: f64, scene: &Scene, mode: RenderMode) -> &RgbaImage {
        self.images.install_ready();

        let position = position_secs.max(0.0);
        let dt = self
            .last_position
            .map(|last| (position - last).clamp(0.0, MAX_FRAME_STEP_SECS))
            .unwrap_or(0.0);
        self.last_position = Some(position);

        raster::clear(&mut self.surface, [0, 0, 0]);
        self.draw_background(position, scene, mode);

        let ctx = FrameContext {
            position_secs: position,
            dt_secs: dt,
            mode,
        };
        let offset = self.effects.apply(&mut self.surface, &scene.effects, &ctx);

        self.draw_overlays(scene, offset);
        self.captions
            .draw(&mut self.surface, &scene.captions, &scene.caption_style, position, offset);

        &self.surface
    }

    fn draw_background(&mut self, position: f64, scene: &Scene, mode: RenderMode) {
        for plan in scene.timing().layers(position) {
            let Some(image) = scene
                .images
                .get(plan.image_index)
                .and_then(|path| self.images.get(path))
            else {
                continue;
            };

            warp_cover(&mut self.layer, image, &plan.motion);
            CosmeticFilter::for_image(plan.image_index).apply(&mut self.layer, mode);
            // Additive over black: crossfading layers form a weighted sum.
            raster::blend_image(&mut self.surface, &self.layer, plan.opacity as f32, 0, 0, BlendMode::Add);
        }
    }

    fn draw_overlays(&mut self, scene: &Scene, offset: FrameOffset) {
        let (width, height) = self.surface.dimensions();
        let (dx, dy) = (offset.dx.round() as i64, offset.dy.round() as i64);

        for path in &scene.overlays {
            if !self.overlay_fitted.contains_key(path) {
                let Some(source) = self.images.get(path) else {
                    continue;
                };
                let fitted = if source.dimensions() == (width, height) {
                    source.clone()
                } else {
                    imageops::resize(source, width, height, FilterType::Triangle)
                };
                self.overlay_fitted.insert(path.clone(), fitted);
            }
            if let Some(fitted) = self.overlay_fitted.get(path) {
                raster::blend_image(&mut self.surface, fitted, 1.0, dx, dy, BlendMode::Normal);
            }
        }
    }
}

/// Cover-fit `image` to `layer`, then apply the pan/zoom `motion`.
fn warp_cover(layer: &mut RgbaImage, image: &RgbaImage, motion: &Motion) {
    let (w, h) = (layer.width() as f32, layer.height() as f32);
    let (iw, ih) = (image.width() as f32, image.height() as f32);
    if iw == 0.0 || ih == 0.0 {
        return;
    }

    let cover = (w / iw).max(h / ih);
    let zoom = motion.zoom as f32;
    let px_scale = h / REFERENCE_HEIGHT as f32;

    let projection = Projection::scale(cover, cover)
        .and_then(Projection::translate(-iw * cover / 2.0, -ih * cover / 2.0))
        .and_then(Projection::scale(zoom, zoom))
        .and_then(Projection::translate(
            w / 2.0 + motion.pan_x as f32 * px_scale,
            h / 2.0 + motion.pan_y as f32 * px_scale,
        ));

    warp_into(image, &projection, Interpolation::Bilinear, Rgba([0, 0, 0, 0]), layer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsmith_project_model::EffectKind;

    fn temp_png(name: &str, color: [u8; 4]) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("reelsmith_comp_{}_{name}.png", std::process::id()));
        RgbaImage::from_pixel(32, 18, Rgba(color)).save(&path).unwrap();
        path
    }

    fn compositor() -> FrameCompositor {
        FrameCompositor::with_effect_seed(64, 36, EffectBudget::default(), 9)
    }

    fn center(img: &RgbaImage) -> [u8; 4] {
        img.get_pixel(32, 18).0
    }

    /// Bilinear resampling may be off by a unit or two.
    fn assert_near(actual: [u8; 4], expected: [u8; 3]) {
        for c in 0..3 {
            assert!(
                (i32::from(actual[c]) - i32::from(expected[c])).abs() <= 2,
                "{actual:?} != {expected:?}"
            );
        }
    }

    #[test]
    fn test_empty_scene_is_black() {
        let mut comp = compositor();
        let scene = Scene {
            duration_secs: 10.0,
            ..Scene::default()
        };
        let frame = comp.render(3.0, &scene, RenderMode::Preview);
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_fallback_font_draws_captions() {
        let font = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf"));
        let captioned = Scene {
            captions: reelsmith_project_model::parse_captions(
                "1\n00:00:00,000 --> 00:00:05,000\nGood evening\n",
            ),
            duration_secs: 5.0,
            ..Scene::default()
        };
        let lit = |frame: &RgbaImage| frame.pixels().filter(|p| p.0 != [0, 0, 0, 255]).count();

        let mut bare = FrameCompositor::with_effect_seed(320, 180, EffectBudget::default(), 9);
        bare.sync_assets(&captioned);
        assert_eq!(lit(bare.render(3.0, &captioned, RenderMode::Export)), 0);

        let scene = captioned.with_fallback_font(Some(font.clone()));
        assert_eq!(scene.font_path.as_deref(), Some(font.as_path()));
        let mut comp = FrameCompositor::with_effect_seed(320, 180, EffectBudget::default(), 9);
        comp.sync_assets(&scene);
        assert!(lit(comp.render(3.0, &scene, RenderMode::Export)) > 0);

        // A font named by the project is kept.
        let named = Scene {
            font_path: Some(PathBuf::from("project.ttf")),
            ..Scene::default()
        }
        .with_fallback_font(Some(font));
        assert_eq!(named.font_path, Some(PathBuf::from("project.ttf")));
    }

    #[tokio::test]
    async fn test_crossfade_is_weighted_sum() {
        let red = temp_png("red", [255, 0, 0, 255]);
        let blue = temp_png("blue", [0, 0, 255, 255]);
        let scene = Scene {
            images: vec![red.clone(), blue.clone()],
            duration_secs: 10.0,
            ..Scene::default()
        };
        let mut comp = compositor();
        comp.preload(&scene).await;

        assert_near(center(comp.render(2.0, &scene, RenderMode::Export)), [255, 0, 0]);
        assert_near(center(comp.render(4.5, &scene, RenderMode::Export)), [128, 0, 128]);
        assert_near(center(comp.render(6.0, &scene, RenderMode::Export)), [0, 0, 255]);

        std::fs::remove_file(&red).ok();
        std::fs::remove_file(&blue).ok();
    }

    #[tokio::test]
    async fn test_sequence_fades_in() {
        let grey = temp_png("fade", [200, 200, 200, 255]);
        let scene = Scene {
            images: vec![grey.clone()],
            duration_secs: 4.0,
            ..Scene::default()
        };
        let mut comp = compositor();
        comp.preload(&scene).await;

        assert_eq!(center(comp.render(0.0, &scene, RenderMode::Export))[0], 0);
        assert_near(center(comp.render(0.25, &scene, RenderMode::Export)), [100, 100, 100]);
        std::fs::remove_file(&grey).ok();
    }

    #[tokio::test]
    async fn test_cosmetic_filter_is_preview_only() {
        let grey = temp_png("grade", [200, 200, 200, 255]);
        let scene = Scene {
            images: vec![grey.clone()],
            duration_secs: 4.0,
            ..Scene::default()
        };
        let mut comp = compositor();
        comp.preload(&scene).await;

        let exported = center(comp.render(2.0, &scene, RenderMode::Export));
        let previewed = center(comp.render(2.0, &scene, RenderMode::Preview));
        // Image 0 gets the punchy grade, which brightens mid greys.
        assert_near(exported, [200, 200, 200]);
        assert!(previewed[0] > 210);
        std::fs::remove_file(&grey).ok();
    }

    #[tokio::test]
    async fn test_zero_strength_effects_leave_frame_unchanged() {
        let grey = temp_png("identity", [90, 120, 150, 255]);
        let base = Scene {
            images: vec![grey.clone()],
            duration_secs: 4.0,
            ..Scene::default()
        };
        let with_effects = Scene {
            effects: vec![
                EffectSlot::new(EffectKind::FilmGrain, 0.0),
                EffectSlot::new(EffectKind::FrameJitter, 0.0),
                EffectSlot::new(EffectKind::None, 1.0),
            ],
            ..base.clone()
        };

        let mut comp = compositor();
        comp.preload(&base).await;
        let plain = comp.render(1.5, &base, RenderMode::Export).clone();
        let identity = comp.render(1.5, &with_effects, RenderMode::Export).clone();
        assert_eq!(plain, identity);
        std::fs::remove_file(&grey).ok();
    }

    #[tokio::test]
    async fn test_missing_image_skips_layer() {
        let scene = Scene {
            images: vec![PathBuf::from("/nonexistent/reelsmith/a.png")],
            duration_secs: 4.0,
            ..Scene::default()
        };
        let mut comp = compositor();
        comp.preload(&scene).await;
        assert_eq!(comp.images().failed_count(), 1);
        assert!(comp
            .render(2.0, &scene, RenderMode::Export)
            .pixels()
            .all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_overlay_follows_frame() {
        let overlay = temp_png("overlay", [0, 255, 0, 255]);
        let scene = Scene {
            overlays: vec![overlay.clone()],
            duration_secs: 4.0,
            ..Scene::default()
        };
        let mut comp = compositor();
        comp.preload(&scene).await;
        assert_near(center(comp.render(1.0, &scene, RenderMode::Export)), [0, 255, 0]);
        std::fs::remove_file(&overlay).ok();
    }
}
