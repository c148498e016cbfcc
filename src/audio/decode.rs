use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono PCM for a single analysis call.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sub-track covering `[start, end)` seconds, clamped to the track.
    pub fn slice(&self, start: f64, end: f64) -> AudioTrack {
        let sr = self.sample_rate as f64;
        let len = self.samples.len();
        let start_sample = ((start.max(0.0) * sr) as usize).min(len);
        let end_sample = ((end.max(0.0) * sr) as usize).min(len);

        let samples = if end_sample > start_sample {
            self.samples[start_sample..end_sample].to_vec()
        } else {
            Vec::new()
        };

        AudioTrack {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

/// Decode an audio file into a mono [`AudioTrack`]. Multi-channel audio is averaged down.
pub fn decode_audio(path: &Path) -> Result<AudioTrack> {
    let mut format = open_format(path)?;

    let (track_id, sample_rate, mut decoder) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio tracks found")?;
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;
        (track.id, sample_rate, decoder)
    };

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("Failed to read audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e).context("Failed to decode audio"),
        };

        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        downmix_into(&mut mono, buf.samples(), spec.channels.count());
    }

    let track = AudioTrack::new(mono, sample_rate);
    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        track.samples.len(),
        sample_rate,
        track.duration()
    );
    Ok(track)
}

/// Probe the container, hinting with the file extension.
fn open_format(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported audio format: {}", path.display()))?;
    Ok(probed.format)
}

/// Append interleaved `samples` to `mono`, averaging each frame's channels.
fn downmix_into(mono: &mut Vec<f32>, samples: &[f32], channels: usize) {
    if channels <= 1 {
        mono.extend_from_slice(samples);
        return;
    }
    mono.extend(
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}
