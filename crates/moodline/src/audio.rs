//! Audio decoding via Symphonia
//!
//! Decodes any container Symphonia supports (MP3, WAV, FLAC, OGG, ...) to a
//! mono 44.1kHz waveform: first audio track only, channels averaged,
//! resampled with rubato, truncated to the configured duration.

use std::fs::File;
use std::io::Cursor;

use moodline_core::{AudioDecoder, AudioSource, DecodeOptions, PipelineError, Result, Waveform};
use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Resampler input block size
const RESAMPLE_CHUNK: usize = 1024;

/// Interleaved samples straight out of the codec
struct RawAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

/// `AudioDecoder` backed by Symphonia and rubato
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, source: &AudioSource, options: &DecodeOptions) -> Result<Waveform> {
        let id = source.id();
        let fail = |reason: String| PipelineError::decode(&id, reason);

        let media: Box<dyn MediaSource> = match source {
            AudioSource::Path(path) => {
                Box::new(File::open(path).map_err(|e| fail(e.to_string()))?)
            }
            AudioSource::Bytes { data, .. } => Box::new(Cursor::new(data.clone())),
        };

        // Decode at most a little over the limit; resampling changes the count
        let raw = decode_interleaved(media, source.extension().as_deref(), options.max_duration_secs)
            .map_err(fail)?;

        let mono = to_mono(&raw.samples, raw.channels);
        if mono.is_empty() {
            return Err(fail("no audio samples decoded".to_string()));
        }

        let mut samples = if raw.sample_rate == options.sample_rate {
            mono
        } else {
            resample(&mono, raw.sample_rate, options.sample_rate).map_err(fail)?
        };
        samples.truncate(options.max_samples());

        if samples.is_empty() {
            return Err(fail("no audio samples after resampling".to_string()));
        }

        log::info!(
            "decode: {} -> {} samples ({:.1}s, source {}Hz x{})",
            id,
            samples.len(),
            samples.len() as f64 / options.sample_rate as f64,
            raw.sample_rate,
            raw.channels
        );

        Ok(Waveform::new(id, samples, options.sample_rate))
    }
}

/// Decode the first audio track to interleaved f32
fn decode_interleaved(
    media: Box<dyn MediaSource>,
    extension: Option<&str>,
    max_duration_secs: f64,
) -> std::result::Result<RawAudio, String> {
    let mss = MediaSourceStream::new(media, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("unsupported format: {}", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track found".to_string())?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| "unknown sample rate".to_string())?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec: {}", e))?;

    // Stop reading once the source-rate frame limit is reached (plus resampler slack)
    let frame_limit = (sample_rate as f64 * max_duration_secs.max(0.0)) as usize + RESAMPLE_CHUNK;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("decode: error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("decode: skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(format!("decode error: {}", e)),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        if channels > 0 && samples.len() / channels >= frame_limit {
            break;
        }
    }

    if channels == 0 {
        return Err("no audio samples decoded".to_string());
    }

    Ok(RawAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels down to mono
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio, compensating for the resampler's output delay
fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> std::result::Result<Vec<f32>, String> {
    let mut resampler = FftFixedIn::<f32>::new(src_rate as usize, dst_rate as usize, RESAMPLE_CHUNK, 2, 1)
        .map_err(|e| format!("failed to create resampler: {}", e))?;

    let expected = (samples.len() as f64 * dst_rate as f64 / src_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);

    let mut blocks = samples.chunks_exact(RESAMPLE_CHUNK);
    for block in blocks.by_ref() {
        let out = resampler
            .process(&[block], None)
            .map_err(|e| format!("resampling failed: {}", e))?;
        output.extend_from_slice(&out[0]);
    }

    let rest = blocks.remainder();
    if !rest.is_empty() {
        let out = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(|e| format!("resampling failed: {}", e))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush until the delayed tail is out
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| format!("resampling failed: {}", e))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let start = delay.min(output.len());
    let end = (start + expected).min(output.len());
    Ok(output[start..end].to_vec())
}
