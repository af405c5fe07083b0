//! Background image sequence: segment lookup, pan/zoom motion, crossfades.
//!
//! # Model
//!
//! The timeline is divided into equal segments, one per image. Each image
//! slowly zooms and pans across its segment. Near the end of a segment the
//! next image fades in over the `transition_secs` window while the current
//! one fades out; the two opacities always sum to one.

use serde::{Deserialize, Serialize};

use reelsmith_project_model::SlideshowSettings;

/// Base zoom added on top of 1.0, per unit intensity.
const ZOOM_BASE: f64 = 0.15;
/// Peak extra zoom reached mid-segment, per unit intensity.
const ZOOM_SWING: f64 = 0.3;
/// Pan amplitude in pixels at 1080p, per unit intensity.
const PAN_PX: f64 = 60.0;

/// Timing inputs for the image sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideshowTiming {
    /// Number of images in the sequence.
    pub image_count: usize,

    /// Timeline length in seconds.
    pub total_duration_secs: f64,

    /// Stretch segments to cover the whole timeline.
    pub auto_stretch: bool,

    /// Segment length when not stretching.
    pub fixed_segment_secs: f64,

    /// Crossfade window at the end of each segment.
    pub transition_secs: f64,

    /// Pan/zoom strength multiplier.
    pub zoom_intensity: f64,
}

/// Where a position falls in the sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlacement {
    /// Index of the primary image.
    pub index: usize,

    /// Index of the image after it, if any.
    pub next: Option<usize>,

    /// Progress through the segment in `[0, 1]`.
    pub progress: f64,

    /// Seconds since the segment started.
    pub time_in_segment: f64,

    /// Seconds until the segment ends.
    pub remaining: f64,
}

/// Pan axis for one image, chosen by its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanDirection {
    Diagonal,
    Horizontal,
    Vertical,
    AntiDiagonal,
}

impl PanDirection {
    pub fn for_index(index: usize) -> Self {
        match index % 4 {
            0 => Self::Diagonal,
            1 => Self::Horizontal,
            2 => Self::Vertical,
            _ => Self::AntiDiagonal,
        }
    }

    /// Per-axis multipliers applied to the pan magnitude.
    pub fn axes(self) -> (f64, f64) {
        match self {
            Self::Diagonal => (1.0, 1.0),
            Self::Horizontal => (1.0, 0.0),
            Self::Vertical => (0.0, 1.0),
            Self::AntiDiagonal => (-1.0, 1.0),
        }
    }
}

/// Transform applied to one cover-fitted image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    /// Scale about the frame center.
    pub zoom: f64,

    /// Offset of the frame center in pixels at 1080p.
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Motion {
    /// Motion for image `index` at segment progress `progress`.
    pub fn at(index: usize, progress: f64, intensity: f64) -> Self {
        let p = progress.clamp(0.0, 1.0);
        let angle = p * std::f64::consts::PI;
        let zoom = 1.0 + ZOOM_BASE * intensity + ZOOM_SWING * intensity * angle.sin();
        let magnitude = angle.cos() * PAN_PX * intensity;
        let (ax, ay) = PanDirection::for_index(index).axes();
        Self {
            zoom,
            pan_x: magnitude * ax,
            pan_y: magnitude * ay,
        }
    }
}

/// One image draw for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPlan {
    pub image_index: usize,
    pub opacity: f64,
    pub motion: Motion,
}

impl SlideshowTiming {
    pub fn from_settings(
        settings: &SlideshowSettings,
        image_count: usize,
        total_duration_secs: f64,
    ) -> Self {
        Self {
            image_count,
            total_duration_secs,
            auto_stretch: settings.auto_stretch,
            fixed_segment_secs: settings.fixed_segment_secs,
            transition_secs: settings.transition_secs,
            zoom_intensity: settings.zoom_intensity,
        }
    }

    /// Length of one segment in seconds (zero when there is nothing to show).
    pub fn segment_duration(&self) -> f64 {
        if self.image_count == 0 {
            return 0.0;
        }
        if self.auto_stretch {
            self.total_duration_secs.max(0.0) / self.image_count as f64
        } else {
            self.fixed_segment_secs.max(0.0)
        }
    }

    /// Seconds covered by the whole sequence.
    pub fn sequence_duration(&self) -> f64 {
        self.segment_duration() * self.image_count as f64
    }

    /// Locate `position_secs` in the sequence.
    ///
    /// Returns `None` when there are no images, the segment length is zero,
    /// or a fixed-length sequence has already run out.
    pub fn locate(&self, position_secs: f64) -> Option<SegmentPlacement> {
        let segment = self.segment_duration();
        if self.image_count == 0 || segment <= 0.0 {
            return None;
        }
        let position = position_secs.max(0.0);
        if !self.auto_stretch && position >= self.sequence_duration() {
            return None;
        }

        let last = self.image_count - 1;
        let index = ((position / segment).floor() as usize).min(last);
        let time_in_segment = (position - index as f64 * segment).clamp(0.0, segment);
        let next = (index < last).then_some(index + 1);

        Some(SegmentPlacement {
            index,
            next,
            progress: time_in_segment / segment,
            time_in_segment,
            remaining: segment - time_in_segment,
        })
    }

    /// Image draws for a frame at `position_secs`, back to front.
    pub fn layers(&self, position_secs: f64) -> Vec<LayerPlan> {
        let Some(placement) = self.locate(position_secs) else {
            return Vec::new();
        };

        let fade = fade_in(position_secs, self.transition_secs);
        let current = |opacity: f64| LayerPlan {
            image_index: placement.index,
            opacity,
            motion: Motion::at(placement.index, placement.progress, self.zoom_intensity),
        };

        match (placement.next, crossfade(placement.remaining, self.transition_secs)) {
            (Some(next), Some((outgoing, incoming))) => {
                let mut plans = Vec::with_capacity(2);
                if outgoing > 0.0 {
                    plans.push(current(outgoing * fade));
                }
                if incoming > 0.0 {
                    plans.push(LayerPlan {
                        image_index: next,
                        opacity: incoming * fade,
                        motion: Motion::at(next, 0.0, self.zoom_intensity),
                    });
                }
                plans
            }
            _ => vec![current(fade)],
        }
    }
}

/// Crossfade weights `(outgoing, incoming)` once `remaining` enters the
/// transition window; `None` outside it.
pub fn crossfade(remaining_secs: f64, window_secs: f64) -> Option<(f64, f64)> {
    if window_secs <= 0.0 || remaining_secs >= window_secs {
        return None;
    }
    let incoming = ((window_secs - remaining_secs) / window_secs).clamp(0.0, 1.0);
    Some((1.0 - incoming, incoming))
}

/// Opacity multiplier ramping up over the first half window of the timeline.
pub fn fade_in(position_secs: f64, window_secs: f64) -> f64 {
    let ramp = window_secs / 2.0;
    if ramp <= 0.0 {
        return 1.0;
    }
    (position_secs / ramp).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn timing(count: usize, total: f64) -> SlideshowTiming {
        SlideshowTiming {
            image_count: count,
            total_duration_secs: total,
            auto_stretch: true,
            fixed_segment_secs: 5.0,
            transition_secs: 1.0,
            zoom_intensity: 1.0,
        }
    }

    #[test]
    fn test_auto_stretch_segments() {
        let t = timing(4, 20.0);
        assert!((t.segment_duration() - 5.0).abs() < 1e-12);

        let placement = t.locate(7.5).unwrap();
        assert_eq!(placement.index, 1);
        assert_eq!(placement.next, Some(2));
        assert!((placement.progress - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_end_of_timeline_stays_on_last_image() {
        let t = timing(4, 20.0);
        let placement = t.locate(20.0).unwrap();
        assert_eq!(placement.index, 3);
        assert_eq!(placement.next, None);
        assert!((placement.progress - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_mode_runs_out() {
        let t = SlideshowTiming {
            auto_stretch: false,
            ..timing(2, 60.0)
        };
        assert!(t.locate(9.99).is_some());
        assert!(t.locate(10.0).is_none());
        assert!(t.layers(30.0).is_empty());
    }

    #[test]
    fn test_no_images_draws_nothing() {
        assert!(timing(0, 10.0).layers(1.0).is_empty());
        assert!(timing(3, 0.0).layers(0.0).is_empty());
    }

    #[test]
    fn test_pan_directions_cycle() {
        assert_eq!(PanDirection::for_index(0), PanDirection::Diagonal);
        assert_eq!(PanDirection::for_index(5), PanDirection::Horizontal);
        assert_eq!(PanDirection::for_index(6), PanDirection::Vertical);
        assert_eq!(PanDirection::for_index(7), PanDirection::AntiDiagonal);
    }

    #[test]
    fn test_motion_curve() {
        let start = Motion::at(0, 0.0, 1.0);
        assert!((start.zoom - 1.15).abs() < 1e-12);
        assert!((start.pan_x - 60.0).abs() < 1e-12);

        let mid = Motion::at(0, 0.5, 1.0);
        assert!((mid.zoom - 1.45).abs() < 1e-12);
        assert!(mid.pan_x.abs() < 1e-9);

        let end = Motion::at(3, 1.0, 1.0);
        assert!((end.pan_x - 60.0).abs() < 1e-9);
        assert!((end.pan_y + 60.0).abs() < 1e-9);

        let still = Motion::at(2, 0.3, 0.0);
        assert_eq!(still.zoom, 1.0);
        assert_eq!(still.pan_y, 0.0);
    }

    #[test]
    fn test_crossfade_midpoint_is_even() {
        let t = timing(2, 10.0);
        let plans = t.layers(4.5);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].image_index, 0);
        assert_eq!(plans[1].image_index, 1);
        assert!((plans[0].opacity - 0.5).abs() < 1e-9);
        assert!((plans[1].opacity - 0.5).abs() < 1e-9);
        // Incoming image starts its own motion from the beginning.
        assert_eq!(plans[1].motion, Motion::at(1, 0.0, 1.0));
    }

    #[test]
    fn test_final_segment_has_no_crossfade() {
        let t = timing(2, 10.0);
        let plans = t.layers(9.8);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].image_index, 1);
        assert_eq!(plans[0].opacity, 1.0);
    }

    #[test]
    fn test_fade_in_at_start() {
        let t = timing(2, 10.0);
        assert_eq!(t.layers(0.0)[0].opacity, 0.0);
        assert!((t.layers(0.25)[0].opacity - 0.5).abs() < 1e-12);
        assert_eq!(t.layers(2.0)[0].opacity, 1.0);
    }

    proptest! {
        #[test]
        fn prop_crossfade_weights_sum_to_one(remaining in 0.0f64..1.0, window in 0.01f64..3.0) {
            if let Some((out, inc)) = crossfade(remaining, window) {
                prop_assert!((out + inc - 1.0).abs() < 1e-12);
                prop_assert!((0.0..=1.0).contains(&out));
                prop_assert!((0.0..=1.0).contains(&inc));
            }
        }

        #[test]
        fn prop_layer_opacity_sums_to_fade(
            count in 1usize..12,
            total in 2.0f64..600.0,
            frac in 0.0f64..1.0,
        ) {
            let t = timing(count, total);
            let position = frac * total;
            let sum: f64 = t.layers(position).iter().map(|l| l.opacity).sum();
            prop_assert!((sum - fade_in(position, t.transition_secs)).abs() < 1e-9);
        }

        #[test]
        fn prop_placement_in_range(count in 1usize..20, total in 0.5f64..600.0, frac in 0.0f64..1.2) {
            let t = timing(count, total);
            let placement = t.locate(frac * total).unwrap();
            prop_assert!(placement.index < count);
            prop_assert!((0.0..=1.0).contains(&placement.progress));
        }
    }
}
