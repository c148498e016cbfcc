use anyhow::Result;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::decode::AudioTrack;
use super::features::{SpectralFeatures, DEFAULT_BPM};

const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;

/// Source of the low-level spectral sequences that structure analysis consumes.
pub trait SpectralPrimitives {
    fn extract(&self, track: &AudioTrack) -> Result<SpectralFeatures>;
}

/// Short-time Fourier transform implementation of [`SpectralPrimitives`].
pub struct StftSpectral {
    fft_size: usize,
    hop_length: usize,
}

impl StftSpectral {
    pub fn new(fft_size: usize, hop_length: usize) -> Self {
        Self {
            fft_size: fft_size.max(2),
            hop_length: hop_length.max(1),
        }
    }
}

impl SpectralPrimitives for StftSpectral {
    fn extract(&self, track: &AudioTrack) -> Result<SpectralFeatures> {
        let samples = &track.samples;
        let sr = track.sample_rate;
        if sr == 0 {
            anyhow::bail!("Audio track has no sample rate");
        }
        if samples.is_empty() {
            anyhow::bail!("Audio track contains no samples");
        }

        let fft_size = self.fft_size;
        let hop = self.hop_length;
        let half = fft_size / 2;
        let num_frames = 1 + samples.len() / hop;
        let freq_resolution = sr as f32 / fft_size as f32;

        log::debug!(
            "STFT: {} frames (fft_size={}, hop_length={})",
            num_frames, fft_size, hop
        );

        let hann = hann_window(fft_size);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Centered frames, zero-padded at both ends
        let frames: Vec<(Vec<f32>, f32)> = (0..num_frames)
            .into_par_iter()
            .map(|frame_idx| {
                let center = (frame_idx * hop) as isize;
                let start = center - half as isize;

                let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); fft_size];
                let mut sum_sq = 0.0f32;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    let pos = start + i as isize;
                    if pos >= 0 && (pos as usize) < samples.len() {
                        let s = samples[pos as usize];
                        sum_sq += s * s;
                        *slot = Complex::new(s * hann[i], 0.0);
                    }
                }
                fft.process(&mut buffer);

                let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm()).collect();
                let rms = (sum_sq / fft_size as f32).sqrt();
                (magnitudes, rms)
            })
            .collect();

        let frame_times: Vec<f64> = (0..num_frames)
            .map(|i| (i * hop) as f64 / sr as f64)
            .collect();

        let spectral_centroid: Vec<f32> = frames
            .iter()
            .map(|(mags, _)| {
                let total: f32 = mags.iter().sum();
                if total > 1e-10 {
                    mags.iter()
                        .enumerate()
                        .map(|(i, &mag)| i as f32 * freq_resolution * mag)
                        .sum::<f32>()
                        / total
                } else {
                    0.0
                }
            })
            .collect();

        let rms: Vec<f32> = frames.iter().map(|(_, rms)| *rms).collect();

        // Half-wave rectified spectral flux
        let mut onset_envelope = vec![0.0f32; num_frames];
        for i in 1..num_frames {
            onset_envelope[i] = frames[i]
                .0
                .iter()
                .zip(frames[i - 1].0.iter())
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum();
        }

        let onset_times = pick_onsets(&onset_envelope, &frame_times);
        let frame_rate = sr as f64 / hop as f64;
        let (tempo_bpm, beat_times) = track_beats(&onset_envelope, &frame_times, frame_rate);

        log::info!(
            "Spectral: {} frames, onsets={}, beats={}, tempo={:.1} BPM",
            num_frames,
            onset_times.len(),
            beat_times.len(),
            tempo_bpm
        );

        Ok(SpectralFeatures {
            onset_envelope,
            frame_times,
            tempo_bpm,
            beat_times,
            onset_times,
            rms,
            spectral_centroid,
        })
    }
}

/// Adaptive-threshold local-peak picking over the onset envelope.
fn pick_onsets(envelope: &[f32], frame_times: &[f64]) -> Vec<f64> {
    if envelope.is_empty() {
        return Vec::new();
    }

    let window = 20;
    let mut onset_times: Vec<f64> = Vec::new();

    for i in 0..envelope.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(envelope.len());
        let local_mean: f32 = envelope[start..end].iter().sum::<f32>() / (end - start) as f32;

        let threshold = local_mean * 1.5 + 0.01;

        if envelope[i] > threshold {
            let is_peak = (i == 0 || envelope[i] >= envelope[i - 1])
                && (i == envelope.len() - 1 || envelope[i] >= envelope[i + 1]);

            // Minimum gap between onsets (100ms)
            let far_enough = onset_times
                .last()
                .map_or(true, |&last| frame_times[i] - last > 0.1);

            if is_peak && far_enough {
                onset_times.push(frame_times[i]);
            }
        }
    }

    onset_times
}

/// Autocorrelation tempo estimate followed by best-phase grid placement.
///
/// Returns the default tempo and no beats when the envelope is too short to
/// hold two periods of the slowest tempo, or carries no energy.
fn track_beats(envelope: &[f32], frame_times: &[f64], frame_rate: f64) -> (f64, Vec<f64>) {
    let n = envelope.len();
    let min_lag = ((frame_rate * 60.0 / MAX_BPM).round() as usize).max(1);
    let max_lag = ((frame_rate * 60.0 / MIN_BPM).round() as usize).max(min_lag);

    if n < max_lag * 2 || envelope.iter().all(|&v| v <= 0.0) {
        return (DEFAULT_BPM, Vec::new());
    }

    let mean = envelope.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = envelope.iter().map(|&v| v - mean).collect();

    let best_lag = (min_lag..=max_lag)
        .map(|lag| {
            let acf: f32 = centered[..n - lag]
                .iter()
                .zip(centered[lag..].iter())
                .map(|(a, b)| a * b)
                .sum();
            let bpm = 60.0 * frame_rate / lag as f64;
            (lag, acf / (n - lag) as f32 * tempo_prior(bpm))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(lag, _)| lag)
        .unwrap_or(min_lag);

    let best_phase = (0..best_lag)
        .map(|phase| {
            let hits: Vec<f32> = envelope[phase..].iter().step_by(best_lag).copied().collect();
            let score = hits.iter().sum::<f32>() / hits.len().max(1) as f32;
            (phase, score)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(phase, _)| phase)
        .unwrap_or(0);

    let tempo_bpm = 60.0 * frame_rate / best_lag as f64;
    let beat_times = (best_phase..n)
        .step_by(best_lag)
        .map(|i| frame_times[i])
        .collect();

    (tempo_bpm, beat_times)
}

/// Log-normal weight centered on 120 BPM with a one-octave spread.
fn tempo_prior(bpm: f64) -> f32 {
    let octaves = (bpm / DEFAULT_BPM).log2();
    (-0.5 * octaves * octaves).exp() as f32
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
