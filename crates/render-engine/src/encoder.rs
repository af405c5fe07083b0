//! Stream encoder abstraction and codec negotiation.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::sync::mpsc;

use reelsmith_audio::AudioFormat;
use reelsmith_common::ReelResult;
use reelsmith_project_model::ExportFormat;

/// One container/codec combination an encoder may be able to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCandidate {
    pub format: ExportFormat,
    /// Muxer name passed to the encoder.
    pub muxer: &'static str,
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    /// File extension of the produced artifact.
    pub extension: &'static str,
}

const fn candidate(
    format: ExportFormat,
    muxer: &'static str,
    video_codec: &'static str,
    audio_codec: &'static str,
    extension: &'static str,
) -> CodecCandidate {
    CodecCandidate {
        format,
        muxer,
        video_codec,
        audio_codec,
        extension,
    }
}

const MP4_CANDIDATES: [CodecCandidate; 3] = [
    candidate(ExportFormat::Mp4, "mp4", "libx264", "aac", "mp4"),
    candidate(ExportFormat::Mp4, "mp4", "libopenh264", "aac", "mp4"),
    candidate(ExportFormat::Mp4, "mp4", "mpeg4", "aac", "mp4"),
];

const WEBM_CANDIDATES: [CodecCandidate; 3] = [
    candidate(ExportFormat::Webm, "webm", "libvpx-vp9", "libopus", "webm"),
    candidate(ExportFormat::Webm, "webm", "libvpx", "libopus", "webm"),
    candidate(ExportFormat::Webm, "webm", "libvpx", "libvorbis", "webm"),
];

impl CodecCandidate {
    /// Candidates for `format`, most preferred first.
    pub fn for_format(format: ExportFormat) -> &'static [CodecCandidate] {
        match format {
            ExportFormat::Mp4 => &MP4_CANDIDATES,
            ExportFormat::Webm => &WEBM_CANDIDATES,
        }
    }

    /// Whether an encoder exposing `available` codec names can produce this.
    pub fn supported_by(&self, available: &HashSet<String>) -> bool {
        available.contains(self.video_codec) && available.contains(self.audio_codec)
    }
}

/// Pick the first candidate for `format` that `probe` accepts.
///
/// When none is accepted the fallback format's preferred candidate is
/// returned, so negotiation itself never fails; the encoder reports the
/// problem when it is primed.
pub fn negotiate_codec(format: ExportFormat, probe: impl Fn(&CodecCandidate) -> bool) -> CodecCandidate {
    if let Some(found) = CodecCandidate::for_format(format).iter().find(|c| probe(c)) {
        return found.clone();
    }

    let fallback = format.fallback();
    let chosen = CodecCandidate::for_format(fallback)
        .iter()
        .find(|c| probe(c))
        .unwrap_or(&CodecCandidate::for_format(fallback)[0])
        .clone();
    tracing::warn!(
        requested = ?format,
        video_codec = chosen.video_codec,
        audio_codec = chosen.audio_codec,
        "No supported codec for requested format; using fallback"
    );
    chosen
}

/// Combined audio/video stream the encoder is primed with.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescription {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio: AudioFormat,
    /// Target video bitrate in bits per second.
    pub bitrate: u64,
    pub codec: CodecCandidate,
}

/// Events delivered by a started encoder, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderEvent {
    /// Next slice of the output container.
    Data(Vec<u8>),
    /// The encoder finished after a stop request. No events follow.
    Stopped,
    /// The encoder failed. No events follow.
    Error(String),
}

/// Encodes a live stream of frames and audio into a container.
#[async_trait]
pub trait StreamEncoder: Send {
    fn name(&self) -> &str;

    /// Whether this encoder can produce `candidate`.
    fn supports(&self, candidate: &CodecCandidate) -> bool;

    /// Configure the encoder for a stream.
    async fn prime(&mut self, description: &StreamDescription) -> ReelResult<()>;

    /// Start encoding. Output arrives on the returned receiver, batched at
    /// `chunk_interval`.
    async fn start(&mut self, chunk_interval: Duration) -> ReelResult<mpsc::Receiver<EncoderEvent>>;

    /// Submit the frame shown at `pts_secs`.
    async fn push_video(&mut self, frame: &RgbaImage, pts_secs: f64) -> ReelResult<()>;

    /// Submit interleaved audio in the primed sample format.
    async fn push_audio(&mut self, samples: &[f32]) -> ReelResult<()>;

    /// Finish the stream; a `Stopped` event follows the last data.
    async fn stop(&mut self) -> ReelResult<()>;

    /// Tear down immediately, discarding pending output.
    async fn abort(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_supported_candidate_wins() {
        let chosen = negotiate_codec(ExportFormat::Mp4, |c| c.video_codec != "libx264");
        assert_eq!(chosen.video_codec, "libopenh264");
    }

    #[test]
    fn test_third_candidate_when_first_two_unsupported() {
        let chosen = negotiate_codec(ExportFormat::Mp4, |c| c.video_codec == "mpeg4");
        assert_eq!(chosen, MP4_CANDIDATES[2]);
        assert_eq!(chosen.extension, "mp4");
    }

    #[test]
    fn test_fallback_when_nothing_supported() {
        let chosen = negotiate_codec(ExportFormat::Webm, |_| false);
        assert_eq!(chosen, MP4_CANDIDATES[0]);

        let chosen = negotiate_codec(ExportFormat::Mp4, |_| false);
        assert_eq!(chosen.format, ExportFormat::Webm);
        assert_eq!(chosen.extension, "webm");
    }

    #[test]
    fn test_fallback_prefers_supported_candidate() {
        let chosen = negotiate_codec(ExportFormat::Webm, |c| c.video_codec == "mpeg4");
        assert_eq!(chosen, MP4_CANDIDATES[2]);
    }

    #[test]
    fn test_supported_by_needs_both_codecs() {
        let available: HashSet<String> = ["libvpx".to_string(), "libvorbis".to_string()].into();
        let webm = CodecCandidate::for_format(ExportFormat::Webm);
        assert!(!webm[0].supported_by(&available));
        assert!(!webm[1].supported_by(&available));
        assert!(webm[2].supported_by(&available));
    }
}
