//! Audio decoding - encoded bytes in, playable sample buffer out

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while decoding an asset
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no audio track found in stream")]
    NoAudioTrack,
    #[error("stream decoded to zero frames")]
    EmptyStream,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("resample error: {0}")]
    Resample(String),
}

/// A decoded audio asset, ready for playback.
///
/// Samples are interleaved stereo f32 in [-1, 1] at the engine sample rate,
/// immutable once decoded. Replaced wholesale by the next load.
#[derive(Clone, Debug)]
pub struct Track {
    /// Interleaved stereo samples, shared without copying
    pub samples: Arc<Vec<f32>>,
    /// Sample rate in Hz after resampling
    pub sample_rate: u32,
    /// Channel count of the source, before the stereo conversion
    pub source_channels: u16,
    /// Display name, usually the file stem
    pub name: String,
}

impl Track {
    /// Length in stereo frames
    pub fn frames(&self) -> i64 {
        (self.samples.len() / 2) as i64
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file from disk.
///
/// Derives the probe hint from the extension and the track name from the
/// file stem, then defers to [`decode_bytes`].
pub fn decode_file(path: &Path, target_sample_rate: u32) -> Result<Track, DecodeError> {
    let bytes = std::fs::read(path)?;
    let hint_ext = path.extension().and_then(|e| e.to_str());
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();
    decode_bytes(bytes, hint_ext, name, target_sample_rate)
}

/// Decode an in-memory encoded byte buffer into a [`Track`].
///
/// Probes the container, decodes the first real audio track to f32,
/// converts to stereo, and resamples to `target_sample_rate` when the
/// source rate differs. Corrupt input surfaces as an error, never a panic.
pub fn decode_bytes(
    bytes: Vec<u8>,
    hint_ext: Option<&str>,
    name: String,
    target_sample_rate: u32,
) -> Result<Track, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = hint_ext {
        hint.with_extension(ext);
    }

    // Probe the format
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    let mut format = probed.format;

    // Find first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let source_channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

    // Create decoder
    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    // Decode all packets to f32 interleaved
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::<f32>::new(capacity, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::EmptyStream);
    }

    // Stereo first, then resample: the transport only ever sees 2 channels
    let stereo = to_stereo(&samples, source_channels);
    let stereo = if source_sample_rate != target_sample_rate {
        resample_stereo(&stereo, source_sample_rate, target_sample_rate)?
    } else {
        stereo
    };

    debug!(
        name = %name,
        source_sample_rate,
        source_channels,
        frames = stereo.len() / 2,
        "decoded track"
    );

    Ok(Track {
        samples: Arc::new(stereo),
        sample_rate: target_sample_rate,
        source_channels,
        name,
    })
}

/// Convert an interleaved buffer of `channels` channels to interleaved stereo.
/// Mono is duplicated; anything above stereo keeps the first two channels.
fn to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 | 1 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for &s in samples {
                out.push(s);
                out.push(s);
            }
            out
        }
        2 => samples.to_vec(),
        n => {
            let n = n as usize;
            let frames = samples.len() / n;
            let mut out = Vec::with_capacity(frames * 2);
            for f in 0..frames {
                out.push(samples[f * n]);
                out.push(samples[f * n + 1]);
            }
            out
        }
    }
}

/// Resample interleaved stereo to the target rate
fn resample_stereo(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    use rubato::{FftFixedInOut, Resampler};

    let frames = samples.len() / 2;

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        1024,
        2,
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    // Deinterleave
    let deinterleaved: Vec<Vec<f32>> = (0..2)
        .map(|ch| (0..frames).map(|f| samples[f * 2 + ch]).collect())
        .collect();

    // Process in chunks
    let chunk_size = resampler.input_frames_next();
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); 2];

    let mut pos = 0;
    while pos + chunk_size <= frames {
        let input_refs: Vec<&[f32]> = deinterleaved
            .iter()
            .map(|ch| &ch[pos..pos + chunk_size])
            .collect();

        let resampled = resampler
            .process(&input_refs, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;

        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(data);
        }

        pos += chunk_size;
    }

    // Remaining tail, zero padded to a full chunk
    if pos < frames {
        let remaining = frames - pos;
        let padded: Vec<Vec<f32>> = deinterleaved
            .iter()
            .map(|ch| {
                let mut v = ch[pos..].to_vec();
                v.resize(chunk_size, 0.0);
                v
            })
            .collect();

        let input_refs: Vec<&[f32]> = padded.iter().map(|v| v.as_slice()).collect();

        if let Ok(resampled) = resampler.process(&input_refs, None) {
            for (ch, data) in resampled.into_iter().enumerate() {
                // Keep only the frames that correspond to real input
                let produced = (remaining * target_rate as usize) / source_rate as usize;
                output[ch].extend(&data[..produced.min(data.len())]);
            }
        }
    }

    // Reinterleave
    let output_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * 2);
    for frame_idx in 0..output_frames {
        interleaved.push(output[0][frame_idx]);
        interleaved.push(output[1][frame_idx]);
    }

    Ok(interleaved)
}

/// Test fixture shared across the crate: a minimal PCM16 WAV container
#[cfg(test)]
pub(crate) fn tests_pcm16_wav(rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut v = Vec::new();
    v.extend_from_slice(b"RIFF");
    v.extend_from_slice(&(36 + data_len).to_le_bytes());
    v.extend_from_slice(b"WAVE");
    v.extend_from_slice(b"fmt ");
    v.extend_from_slice(&16u32.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&channels.to_le_bytes());
    v.extend_from_slice(&rate.to_le_bytes());
    v.extend_from_slice(&(rate * channels as u32 * 2).to_le_bytes());
    v.extend_from_slice(&(channels * 2).to_le_bytes());
    v.extend_from_slice(&16u16.to_le_bytes());
    v.extend_from_slice(b"data");
    v.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        v.extend_from_slice(&s.to_le_bytes());
    }
    v
}
