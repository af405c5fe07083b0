//! Audio file decoding via Symphonia.
//!
//! The whole track is decoded up front into one interleaved `f32` buffer.
//! Tracks are a few minutes long at most, and holding them in memory keeps
//! seeking and capture exact.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use reelsmith_common::ReelError;

use crate::pcm::{AudioFormat, PcmBuffer};

/// Decoding failures.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to open audio file: {0}")]
    FileOpen(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No audio track found in file")]
    NoAudioTrack,
}

impl From<DecodeError> for ReelError {
    fn from(err: DecodeError) -> Self {
        ReelError::audio(err.to_string())
    }
}

/// Decode an entire audio file.
pub fn decode_file(path: impl AsRef<Path>) -> Result<PcmBuffer, DecodeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| DecodeError::FileOpen(format!("{path:?}: {e}")))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(format!("{e}")))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.channels.is_some())
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Decode("No sample rate in codec params".to_string()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| DecodeError::Decode("No channel info in codec params".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(format!("Codec init failed: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decode(format!("{e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!(error = %msg, "Skipping corrupted audio packet");
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(format!("{e}"))),
        };

        if decoded.frames() == 0 {
            continue;
        }
        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let buffer = PcmBuffer::new(AudioFormat::new(sample_rate, channels), samples);
    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        duration_secs = buffer.duration_secs(),
        "Decoded audio file"
    );
    Ok(buffer)
}
