//! Timeline clock and timing utilities for audio/visual synchronization.
//!
//! The audio engine reports its playback position sparsely (a few times per
//! second at best) while frames are drawn much more often. [`TimelineClock`]
//! anchors every authoritative update to the monotonic clock and linearly
//! extrapolates between anchors at 1.0x real time, so the animation stays
//! smooth without drifting from the audio.

use tokio::time::Instant;

/// What is currently driving the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Nothing is advancing; the position is the last authoritative value.
    Paused,
    /// Interactive playback driven by the audio engine.
    Playing,
    /// Offline export driven by the export session.
    Rendering,
}

/// Smoothed playback position bounded to `[0, duration]`.
#[derive(Debug, Clone)]
pub struct TimelineClock {
    duration_secs: f64,
    mode: ClockMode,
    /// Last value reported by the authoritative source.
    authoritative_secs: f64,
    anchor_secs: f64,
    anchor_at: Instant,
    /// Last value handed out by [`tick`](Self::tick).
    emitted_secs: f64,
}

impl TimelineClock {
    /// Create a paused clock at position zero.
    pub fn new(duration_secs: f64, now: Instant) -> Self {
        Self {
            duration_secs: duration_secs.max(0.0),
            mode: ClockMode::Paused,
            authoritative_secs: 0.0,
            anchor_secs: 0.0,
            anchor_at: now,
            emitted_secs: 0.0,
        }
    }

    /// Total timeline duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Change the timeline length, pulling every stored value into range.
    pub fn set_duration(&mut self, duration_secs: f64) {
        self.duration_secs = duration_secs.max(0.0);
        self.authoritative_secs = self.clamp(self.authoritative_secs);
        self.anchor_secs = self.clamp(self.anchor_secs);
        self.emitted_secs = self.clamp(self.emitted_secs);
    }

    /// Current driving mode.
    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Whether [`tick`](Self::tick) extrapolates past the last anchor.
    pub fn is_extrapolating(&self) -> bool {
        matches!(self.mode, ClockMode::Playing | ClockMode::Rendering)
    }

    /// Last authoritative position.
    pub fn authoritative(&self) -> f64 {
        self.authoritative_secs
    }

    /// Last position handed out by [`tick`](Self::tick).
    pub fn position(&self) -> f64 {
        self.emitted_secs
    }

    /// Record a discrete position update from the authoritative source.
    pub fn update_authoritative(&mut self, position_secs: f64, now: Instant) {
        self.authoritative_secs = self.clamp(position_secs);
        self.anchor(now);
        if !self.is_extrapolating() {
            self.emitted_secs = self.authoritative_secs;
        }
    }

    /// Switch driving mode; re-anchors at the last authoritative value.
    pub fn set_mode(&mut self, mode: ClockMode, now: Instant) {
        if self.mode != mode {
            tracing::debug!(from = ?self.mode, to = ?mode, "Timeline clock mode change");
        }
        self.mode = mode;
        self.anchor(now);
        self.emitted_secs = self.authoritative_secs;
    }

    /// Jump to a position. The smoothed value snaps immediately.
    pub fn seek(&mut self, position_secs: f64, now: Instant) {
        self.authoritative_secs = self.clamp(position_secs);
        self.anchor(now);
        self.emitted_secs = self.authoritative_secs;
    }

    /// Seek back to the start of the timeline.
    pub fn reset(&mut self, now: Instant) {
        self.seek(0.0, now);
    }

    /// Smoothed position for a display refresh at `now`.
    ///
    /// While extrapolating the returned value never decreases: an
    /// authoritative update that lands slightly behind the extrapolated
    /// value holds the output until real time catches up.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if !self.is_extrapolating() {
            self.emitted_secs = self.authoritative_secs;
            return self.emitted_secs;
        }

        let elapsed = now.saturating_duration_since(self.anchor_at).as_secs_f64();
        let extrapolated = self.clamp(self.anchor_secs + elapsed);
        self.emitted_secs = extrapolated.max(self.emitted_secs);
        self.emitted_secs
    }

    fn anchor(&mut self, now: Instant) {
        self.anchor_secs = self.authoritative_secs;
        self.anchor_at = now;
    }

    fn clamp(&self, secs: f64) -> f64 {
        if secs.is_nan() {
            return 0.0;
        }
        secs.clamp(0.0, self.duration_secs)
    }
}

/// Drift measurement between two streams.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Timestamp in the reference stream (ns).
    pub reference_ns: u64,
    /// Timestamp in the measured stream (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Build a measurement from two second values.
    pub fn from_secs(reference_secs: f64, measured_secs: f64) -> Self {
        Self {
            reference_ns: secs_to_ns(reference_secs),
            measured_ns: secs_to_ns(measured_secs),
        }
    }

    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Convert seconds to nanoseconds, saturating at zero.
pub fn secs_to_ns(secs: f64) -> u64 {
    (secs.max(0.0) * 1_000_000_000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_paused_clock_does_not_extrapolate() {
        let base = Instant::now();
        let mut clock = TimelineClock::new(10.0, base);
        clock.update_authoritative(2.0, base);
        assert_eq!(clock.tick(at(base, 5.0)), 2.0);
    }

    #[test]
    fn test_playing_clock_extrapolates_between_updates() {
        let base = Instant::now();
        let mut clock = TimelineClock::new(10.0, base);
        clock.set_mode(ClockMode::Playing, base);
        clock.update_authoritative(1.0, base);

        let value = clock.tick(at(base, 0.1));
        assert!((value - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_clock_never_passes_duration() {
        let base = Instant::now();
        let mut clock = TimelineClock::new(3.0, base);
        clock.set_mode(ClockMode::Rendering, base);
        clock.update_authoritative(2.9, base);
        assert_eq!(clock.tick(at(base, 5.0)), 3.0);
    }

    #[test]
    fn test_late_update_holds_until_caught_up() {
        let base = Instant::now();
        let mut clock = TimelineClock::new(10.0, base);
        clock.set_mode(ClockMode::Playing, base);
        clock.update_authoritative(1.0, base);
        assert!((clock.tick(at(base, 0.25)) - 1.25).abs() < 1e-6);

        // Audio reports slightly behind the extrapolation.
        clock.update_authoritative(1.2, at(base, 0.25));
        assert!((clock.tick(at(base, 0.27)) - 1.25).abs() < 1e-6);
        assert!((clock.tick(at(base, 0.35)) - 1.30).abs() < 1e-6);
    }

    #[test]
    fn test_seek_snaps_immediately() {
        let base = Instant::now();
        let mut clock = TimelineClock::new(10.0, base);
        clock.set_mode(ClockMode::Playing, base);
        clock.update_authoritative(8.0, base);
        clock.tick(at(base, 0.5));

        clock.seek(1.0, at(base, 0.5));
        assert_eq!(clock.position(), 1.0);
        assert!((clock.tick(at(base, 0.6)) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_pause_snaps_to_authoritative() {
        let base = Instant::now();
        let mut clock = TimelineClock::new(10.0, base);
        clock.set_mode(ClockMode::Playing, base);
        clock.update_authoritative(4.0, base);
        clock.tick(at(base, 0.2));

        clock.set_mode(ClockMode::Paused, at(base, 0.2));
        assert_eq!(clock.tick(at(base, 3.0)), 4.0);
    }

    #[test]
    fn test_drift_measurement() {
        let drift = DriftMeasurement::from_secs(1.0, 1.05);
        assert_eq!(drift.drift_ns(), 50_000_000);
        assert!((drift.drift_ms() - 50.0).abs() < 1e-6);
        assert!(drift.exceeds_threshold_ms(10.0));
        assert!(!drift.exceeds_threshold_ms(100.0));
    }

    proptest! {
        #[test]
        fn prop_clock_stays_in_range(
            duration in 0.5f64..600.0,
            updates in proptest::collection::vec((-50.0f64..700.0, 0.0f64..2.0), 1..40),
        ) {
            let base = Instant::now();
            let mut clock = TimelineClock::new(duration, base);
            clock.set_mode(ClockMode::Playing, base);
            let mut t = 0.0;
            for (pos, gap) in updates {
                t += gap;
                clock.update_authoritative(pos, at(base, t));
                let value = clock.tick(at(base, t + gap / 2.0));
                prop_assert!(value >= 0.0);
                prop_assert!(value <= duration);
            }
        }

        #[test]
        fn prop_clock_matches_anchor_when_ahead(
            duration in 1.0f64..600.0,
            start in 0.0f64..1.0,
            step in 0.0f64..5.0,
        ) {
            let base = Instant::now();
            let mut clock = TimelineClock::new(duration, base);
            clock.set_mode(ClockMode::Rendering, base);
            let first = start * duration / 2.0;
            clock.update_authoritative(first, base);
            clock.tick(base);

            let next = (first + step).min(duration);
            let when = at(base, step);
            clock.update_authoritative(next, when);
            prop_assert!((clock.tick(when) - next).abs() < 1e-9);
        }

        #[test]
        fn prop_clock_is_monotonic_while_playing(
            gaps in proptest::collection::vec(0.0f64..0.5, 1..50),
            jitter in proptest::collection::vec(-0.1f64..0.1, 1..50),
        ) {
            let base = Instant::now();
            let mut clock = TimelineClock::new(1000.0, base);
            clock.set_mode(ClockMode::Playing, base);
            let mut t = 0.0;
            let mut last = clock.tick(base);
            for (gap, noise) in gaps.iter().zip(jitter.iter().cycle()) {
                t += gap;
                clock.update_authoritative((t + noise).max(0.0), at(base, t));
                let value = clock.tick(at(base, t));
                prop_assert!(value >= last);
                last = value;
            }
        }
    }
}
