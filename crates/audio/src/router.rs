//! Audio routing: one source, two independently gained outputs.
//!
//! ```text
//!                ┌─ monitor gain ─▶ MonitorSink (speakers)
//! source ──────▶ ┤
//!                └─ capture gain ─▶ CaptureTap  (encoder only)
//! ```
//!
//! Muting the monitor never affects what the capture tap receives, so an
//! export can run silently while still recording the full track.

use std::collections::VecDeque;

use crate::pcm::AudioFormat;

/// Live output device. The real device lives outside this crate.
pub trait MonitorSink: Send {
    fn write(&mut self, samples: &[f32], format: AudioFormat);

    /// Drop anything queued for output.
    fn flush(&mut self);
}

/// Monitor sink that discards audio, counting what it was given.
#[derive(Debug, Default)]
pub struct NullMonitor {
    pub samples_written: u64,
    pub peak: f32,
}

impl MonitorSink for NullMonitor {
    fn write(&mut self, samples: &[f32], _format: AudioFormat) {
        self.samples_written += samples.len() as u64;
        self.peak = samples.iter().fold(self.peak, |p, s| p.max(s.abs()));
    }

    fn flush(&mut self) {}
}

/// Gain stage that ramps linearly to a new target across one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainNode {
    current: f32,
    target: f32,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            current: gain,
            target: gain,
        }
    }

    /// Gain the node is heading to.
    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn set_target(&mut self, gain: f32) {
        self.target = gain.max(0.0);
    }

    /// Apply the gain in place; a pending change completes within the block.
    pub fn process(&mut self, samples: &mut [f32], channels: u16) {
        let ch = usize::from(channels.max(1));
        let frames = samples.len() / ch;

        if self.current == self.target || frames == 0 {
            if self.target != 1.0 {
                samples.iter_mut().for_each(|s| *s *= self.target);
            }
            self.current = self.target;
            return;
        }

        let start = self.current;
        let step = (self.target - start) / frames as f32;
        for (i, frame) in samples.chunks_mut(ch).enumerate() {
            let gain = start + step * (i + 1) as f32;
            frame.iter_mut().for_each(|s| *s *= gain);
        }
        self.current = self.target;
    }
}

/// Capture output. Buffers samples until the encoder drains them.
#[derive(Debug)]
pub struct CaptureTap {
    format: AudioFormat,
    buffer: VecDeque<f32>,
    closed: bool,
}

impl CaptureTap {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            buffer: VecDeque::new(),
            closed: false,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn push(&mut self, samples: &[f32]) {
        if !self.closed {
            self.buffer.extend(samples.iter().copied());
        }
    }

    /// Take everything buffered so far.
    pub fn drain(&mut self) -> Vec<f32> {
        self.buffer.drain(..).collect()
    }

    /// Discard buffered audio without delivering it.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

struct RouteGraph {
    source_id: String,
    format: AudioFormat,
    tap: CaptureTap,
}

/// Fans one playback source out to the monitor sink and the capture tap.
pub struct AudioRouter {
    graph: Option<RouteGraph>,
    monitor: Box<dyn MonitorSink>,
    monitor_gain: GainNode,
    capture_gain: GainNode,
    scratch: Vec<f32>,
}

impl AudioRouter {
    pub fn new(monitor: Box<dyn MonitorSink>) -> Self {
        Self {
            graph: None,
            monitor,
            monitor_gain: GainNode::new(1.0),
            capture_gain: GainNode::new(1.0),
            scratch: Vec::new(),
        }
    }

    /// Build the routing graph for a source.
    ///
    /// Attaching the same source again is a no-op. A different source tears
    /// down the previous graph first: its tap is closed and the monitor is
    /// flushed.
    pub fn attach(&mut self, source_id: &str, format: AudioFormat) {
        if let Some(graph) = &self.graph {
            if graph.source_id == source_id {
                return;
            }
        }
        self.detach();

        tracing::debug!(
            source = source_id,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Audio graph attached"
        );
        self.graph = Some(RouteGraph {
            source_id: source_id.to_string(),
            format,
            tap: CaptureTap::new(format),
        });
    }

    pub fn detach(&mut self) {
        if let Some(mut old) = self.graph.take() {
            old.tap.close();
            self.monitor.flush();
            tracing::debug!(source = %old.source_id, "Audio graph detached");
        }
    }

    pub fn attached_source(&self) -> Option<&str> {
        self.graph.as_ref().map(|g| g.source_id.as_str())
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.graph.as_ref().map(|g| g.format)
    }

    /// Push one block of source samples through both paths.
    pub fn route(&mut self, samples: &[f32]) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        if samples.is_empty() {
            return;
        }
        let channels = graph.format.channels;

        self.scratch.clear();
        self.scratch.extend_from_slice(samples);
        self.monitor_gain.process(&mut self.scratch, channels);
        self.monitor.write(&self.scratch, graph.format);

        self.scratch.clear();
        self.scratch.extend_from_slice(samples);
        self.capture_gain.process(&mut self.scratch, channels);
        graph.tap.push(&self.scratch);
    }

    pub fn set_monitor_gain(&mut self, gain: f32) {
        self.monitor_gain.set_target(gain);
    }

    pub fn monitor_gain(&self) -> f32 {
        self.monitor_gain.target()
    }

    pub fn set_capture_gain(&mut self, gain: f32) {
        self.capture_gain.set_target(gain);
    }

    pub fn capture_gain(&self) -> f32 {
        self.capture_gain.target()
    }

    pub fn has_capture_tap(&self) -> bool {
        self.graph.as_ref().is_some_and(|g| !g.tap.is_closed())
    }

    pub fn capture_tap_mut(&mut self) -> Option<&mut CaptureTap> {
        self.graph.as_mut().map(|g| &mut g.tap)
    }
}

impl Default for AudioRouter {
    fn default() -> Self {
        Self::new(Box::new(NullMonitor::default()))
    }
}
