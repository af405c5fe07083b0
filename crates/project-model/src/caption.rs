//! Timed caption cues and the caption file parser.
//!
//! The accepted format is the common numbered-block subtitle layout:
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,500
//! First line
//! second line
//! ```
//!
//! Parsing is lenient. A block that cannot be understood is dropped and the
//! rest of the file is still returned.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::project::ProjectError;

/// A single caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Cue number from the file, or the block ordinal when absent.
    pub id: u32,

    /// Start time in seconds.
    pub start_secs: f64,

    /// End time in seconds (always greater than `start_secs`).
    pub end_secs: f64,

    /// Cue text; lines are joined with `\n`.
    pub text: String,
}

impl Caption {
    /// Duration of the cue in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Whether `position_secs` falls inside `[start, end]`.
    pub fn contains(&self, position_secs: f64) -> bool {
        position_secs >= self.start_secs && position_secs <= self.end_secs
    }
}

/// Parse caption text. Never fails; malformed blocks are skipped.
pub fn parse_captions(content: &str) -> Vec<Caption> {
    let normalized = content.replace('\r', "");
    let mut captions = Vec::new();

    for (ordinal, block) in split_blocks(normalized.trim()).into_iter().enumerate() {
        let lines: Vec<&str> = block.lines().collect();
        if lines.len() < 3 {
            continue;
        }

        let Some((start_secs, end_secs)) = parse_timing_line(lines[1]) else {
            tracing::debug!(block = ordinal, line = lines[1], "Skipping caption with bad timing");
            continue;
        };
        if end_secs <= start_secs {
            tracing::debug!(block = ordinal, start_secs, end_secs, "Skipping empty caption span");
            continue;
        }

        let id = lines[0]
            .trim()
            .parse::<u32>()
            .unwrap_or(ordinal as u32);
        let text = lines[2..].join("\n").trim().to_string();

        captions.push(Caption {
            id,
            start_secs,
            end_secs,
            text,
        });
    }

    captions
}

/// Read and parse a caption file.
pub fn load_captions(path: impl AsRef<Path>) -> Result<Vec<Caption>, ProjectError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let captions = parse_captions(&content);
    tracing::debug!(path = %path.display(), cues = captions.len(), "Loaded captions");
    Ok(captions)
}

/// The cue shown at `position_secs`.
///
/// When cues overlap, the one that started earliest wins; equal starts keep
/// list order.
pub fn active_caption(captions: &[Caption], position_secs: f64) -> Option<&Caption> {
    captions
        .iter()
        .filter(|c| c.contains(position_secs))
        .fold(None, |best: Option<&Caption>, c| match best {
            Some(b) if b.start_secs <= c.start_secs => Some(b),
            _ => Some(c),
        })
}

/// Split on runs of empty lines.
///
/// Only truly empty lines separate blocks. A line holding just spaces or
/// tabs stays inside its block and becomes part of the cue text.
fn split_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Parse `HH:MM:SS,mmm --> HH:MM:SS,mmm`.
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (left, right) = line.split_once("-->")?;
    let start = parse_timestamp_suffix(left.trim_end())?;
    let (end, _) = parse_timestamp_prefix(right.trim_start())?;
    Some((start, end))
}

/// Timestamp that ends `s` (anything before it is ignored).
fn parse_timestamp_suffix(s: &str) -> Option<f64> {
    // 8 chars of HH:MM:SS, one separator, 2 or 3 fraction digits.
    [12usize, 11].iter().find_map(|&len| {
        let start = s.len().checked_sub(len)?;
        let tail = s.get(start..)?;
        match parse_timestamp_prefix(tail) {
            Some((secs, used)) if used == tail.len() => Some(secs),
            _ => None,
        }
    })
}

/// Timestamp at the start of `s`; returns seconds and bytes consumed.
fn parse_timestamp_prefix(s: &str) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let two_digits = |at: usize| -> Option<u32> {
        let pair = bytes.get(at..at + 2)?;
        if pair.iter().all(u8::is_ascii_digit) {
            Some(u32::from(pair[0] - b'0') * 10 + u32::from(pair[1] - b'0'))
        } else {
            None
        }
    };

    let hours = two_digits(0)?;
    (bytes.get(2) == Some(&b':')).then_some(())?;
    let minutes = two_digits(3)?;
    (bytes.get(5) == Some(&b':')).then_some(())?;
    let seconds = two_digits(6)?;
    matches!(bytes.get(8), Some(b',' | b'.' | b' ')).then_some(())?;

    let digits = bytes[9..]
        .iter()
        .take(3)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits < 2 {
        return None;
    }
    let fraction_str = &s[9..9 + digits];
    let fraction = fraction_str.parse::<f64>().ok()? / 10f64.powi(digits as i32);

    let secs = f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + f64::from(seconds) + fraction;
    Some((secs, 9 + digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_file() {
        let content = "1\n00:00:01,000 --> 00:00:04,500\nHello\nworld\n\n2\n00:00:05.250 --> 00:00:07.000\nSecond\n";
        let captions = parse_captions(content);
        assert_eq!(captions.len(), 2);

        assert_eq!(captions[0].id, 1);
        assert!((captions[0].start_secs - 1.0).abs() < 1e-9);
        assert!((captions[0].end_secs - 4.5).abs() < 1e-9);
        assert_eq!(captions[0].text, "Hello\nworld");

        assert_eq!(captions[1].id, 2);
        assert!((captions[1].start_secs - 5.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_tolerates_crlf_and_extra_blank_lines() {
        let content = "\r\n1\r\n00:00:00,500 --> 00:00:02,000\r\nHi\r\n\r\n\r\n\r\n2\r\n00:01:00,000 --> 00:01:01,000\r\nThere\r\n";
        let captions = parse_captions(content);
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].text, "Hi");
        assert!((captions[1].start_secs - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_digit_fraction_and_space_separator() {
        let content = "1\n00:00:01 50 --> 00:00:02,25\nA\n";
        let captions = parse_captions(content);
        assert_eq!(captions.len(), 1);
        assert!((captions[0].start_secs - 1.5).abs() < 1e-9);
        assert!((captions[0].end_secs - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_blocks_are_dropped() {
        let content = concat!(
            "1\n00:00:01,000 --> 00:00:02,000\n\n",
            "2\nnot a timing line\nText\n\n",
            "3\n00:00:05,000 --> 00:00:04,000\nBackwards\n\n",
            "4\n00:00:06,000 --> 00:00:07,000\nKept\n",
        );
        let captions = parse_captions(content);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].id, 4);
        assert_eq!(captions[0].text, "Kept");
    }

    #[test]
    fn test_whitespace_only_line_does_not_split_blocks() {
        let content = "1\n00:00:00,000 --> 00:00:01,000\nA\n  \t\n2\n00:00:01,000 --> 00:00:02,000\nB\n";
        let captions = parse_captions(content);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].id, 1);
        assert_eq!(captions[0].end_secs, 1.0);
        assert_eq!(
            captions[0].text,
            "A\n  \t\n2\n00:00:01,000 --> 00:00:02,000\nB"
        );
    }

    #[test]
    fn test_non_numeric_index_uses_block_ordinal() {
        let content = "intro\n00:00:00,000 --> 00:00:01,000\nA\n\nx\n00:00:01,000 --> 00:00:02,000\nB\n";
        let captions = parse_captions(content);
        assert_eq!(captions[0].id, 0);
        assert_eq!(captions[1].id, 1);
    }

    #[test]
    fn test_timing_with_trailing_position_hints() {
        let content = "1\n00:00:01,000 --> 00:00:02,000 X1:10 X2:20\nA\n";
        let captions = parse_captions(content);
        assert_eq!(captions.len(), 1);
        assert!((captions[0].end_secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_captions("").is_empty());
        assert!(parse_captions("\n\n\r\n").is_empty());
    }

    #[test]
    fn test_active_caption_prefers_earliest_start() {
        let captions = vec![
            Caption {
                id: 1,
                start_secs: 2.0,
                end_secs: 6.0,
                text: "late".into(),
            },
            Caption {
                id: 2,
                start_secs: 1.0,
                end_secs: 5.0,
                text: "early".into(),
            },
        ];
        assert_eq!(active_caption(&captions, 3.0).map(|c| c.id), Some(2));
        assert_eq!(active_caption(&captions, 5.5).map(|c| c.id), Some(1));
        assert!(active_caption(&captions, 0.5).is_none());
    }

    #[test]
    fn test_active_caption_tie_keeps_list_order() {
        let cue = |id, text: &str| Caption {
            id,
            start_secs: 1.0,
            end_secs: 2.0,
            text: text.into(),
        };
        let captions = vec![cue(7, "first"), cue(8, "second")];
        assert_eq!(active_caption(&captions, 1.5).map(|c| c.id), Some(7));
    }

    #[test]
    fn test_load_captions_missing_file() {
        let result = load_captions("/nonexistent/reelsmith/captions.srt");
        assert!(matches!(result, Err(ProjectError::IoError { .. })));
    }
}
