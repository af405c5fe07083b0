//! Caption wrapping, layout, and the typewriter reveal.
//!
//! A cue's text is revealed left to right, one character at a time, over
//! `min(1.5 s, 0.8 × cue duration)`. Line breaks (wrapped or explicit) each
//! count as one character, so the reveal runs at the same pace regardless
//! of how the text wraps.

/// Longest reveal, in seconds.
const MAX_REVEAL_SECS: f64 = 1.5;
/// Fraction of the cue duration the reveal may use.
const REVEAL_SHARE: f64 = 0.8;

/// Reference frame heights the style sizes are expressed at.
const FONT_REFERENCE_HEIGHT: f32 = 450.0;
const OUTLINE_REFERENCE_HEIGHT: f32 = 720.0;

const LINE_SPACING: f32 = 1.2;
const MAX_WIDTH_SHARE: f32 = 0.85;

/// Number of characters visible `elapsed_secs` into a cue.
pub fn reveal_count(text_len: usize, elapsed_secs: f64, cue_duration_secs: f64) -> usize {
    let window = MAX_REVEAL_SECS.min(REVEAL_SHARE * cue_duration_secs);
    let progress = if window <= 0.0 {
        1.0
    } else {
        (elapsed_secs / window).clamp(0.0, 1.0)
    };
    ((text_len as f64 * progress).floor() as usize).min(text_len)
}

/// Greedy word wrap.
///
/// Words are separated by single spaces; `\n` forces a break. `measure`
/// returns the rendered width of a candidate line.
pub fn wrap_words(text: &str, max_width: f32, mut measure: impl FnMut(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut words = paragraph.split(' ');
        let mut current = words.next().unwrap_or_default().to_string();

        for word in words {
            let candidate = format!("{current} {word}");
            if measure(&candidate) < max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }

    lines
}

/// Visible prefix of each line once `count` characters are revealed.
///
/// Every line gets an entry (possibly empty) so layout stays stable while
/// the text types out.
pub fn reveal_lines(lines: &[String], count: usize) -> Vec<String> {
    let mut shown = 0usize;
    let last = lines.len().saturating_sub(1);

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let remaining = count.saturating_sub(shown);
            let line_len = line.chars().count();
            let visible: String = line.chars().take(remaining.min(line_len)).collect();
            shown += line_len + usize::from(i < last);
            visible
        })
        .collect()
}

/// Pixel geometry of the caption block for one frame size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypewriterLayout {
    /// Font size in pixels.
    pub font_px: f32,

    /// Distance between line centers.
    pub line_height: f32,

    /// Width a line may occupy before wrapping.
    pub max_width: f32,

    /// Outline stroke width in pixels.
    pub outline_px: f32,

    /// Horizontal center of every line.
    pub center_x: f32,

    /// Vertical center of the whole block.
    pub anchor_y: f32,
}

impl TypewriterLayout {
    pub fn for_frame(
        width: u32,
        height: u32,
        font_size: f32,
        outline_width: f32,
        vertical_anchor: f32,
    ) -> Self {
        let (w, h) = (width as f32, height as f32);
        let font_px = font_size * h / FONT_REFERENCE_HEIGHT;
        Self {
            font_px,
            line_height: font_px * LINE_SPACING,
            max_width: w * MAX_WIDTH_SHARE,
            outline_px: (outline_width * h / OUTLINE_REFERENCE_HEIGHT).max(0.0),
            center_x: w / 2.0,
            anchor_y: h * vertical_anchor,
        }
    }

    /// Vertical centers of `line_count` lines centered on the anchor.
    pub fn line_centers(&self, line_count: usize) -> Vec<f32> {
        let total = line_count as f32 * self.line_height;
        let first = self.anchor_y - total / 2.0 + self.line_height / 2.0;
        (0..line_count)
            .map(|i| first + i as f32 * self.line_height)
            .collect()
    }
}
