use std::path::Path;

use super::decode::{decode_audio, AudioTrack};
use super::features::{
    BeatEvent, EnergySample, OnsetEvent, SpectralSummary, StructureDescriptor,
};
use super::sections::segment;
use super::spectral::SpectralPrimitives;

/// Target number of points in the downsampled energy curve.
const ENERGY_CURVE_POINTS: usize = 100;
const ENERGY_EPSILON: f64 = 1e-8;

/// Optional `[start, end)` window, in seconds, to analyze instead of the whole file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

/// Decode and analyze an audio file. Never fails: decode or analysis errors
/// collapse into the degraded descriptor.
pub fn analyze_file(
    path: &Path,
    window: Option<TimeWindow>,
    primitives: &dyn SpectralPrimitives,
) -> StructureDescriptor {
    log::info!("Decoding audio...");
    let track = match decode_audio(path) {
        Ok(track) => track,
        Err(err) => {
            log::error!("Error analyzing audio {}: {:#}", path.display(), err);
            return StructureDescriptor::degraded(format!("{:#}", err));
        }
    };

    let track = match window {
        Some(w) => {
            log::info!("Analyzing segment {:.2}s - {:.2}s", w.start, w.end);
            track.slice(w.start, w.end)
        }
        None => track,
    };

    analyze(&track, primitives)
}

/// Turn spectral primitives over `track` into a structure descriptor.
pub fn analyze(track: &AudioTrack, primitives: &dyn SpectralPrimitives) -> StructureDescriptor {
    log::info!("Analyzing structure...");
    let features = match primitives.extract(track) {
        Ok(features) => features,
        Err(err) => {
            log::error!("Error analyzing audio: {:#}", err);
            return StructureDescriptor::degraded(format!("{:#}", err));
        }
    };

    let beats: Vec<BeatEvent> = features.beat_times.iter().map(|&t| BeatEvent::at(t)).collect();
    let onsets: Vec<OnsetEvent> = features
        .onset_times
        .iter()
        .map(|&time| OnsetEvent { time })
        .collect();
    let energy_curve = energy_curve(&features.rms, &features.frame_times);
    let sections = segment(&features.onset_envelope, &features.frame_times, &beats);
    let spectral_summary = spectral_summary(&features.spectral_centroid);

    log::info!(
        "Structure: {:.1} BPM, {} beats, {} onsets, {} sections, {} energy points",
        features.tempo_bpm,
        beats.len(),
        onsets.len(),
        sections.len(),
        energy_curve.len()
    );

    StructureDescriptor {
        error: None,
        bpm: features.tempo_bpm,
        duration: Some(track.duration()),
        beats,
        onsets: Some(onsets),
        energy_curve,
        sections,
        spectral_summary: Some(spectral_summary),
    }
}

/// Normalize RMS to its peak and keep every `stride`-th frame, where
/// `stride = max(1, frames / 100)`.
pub fn energy_curve(rms: &[f32], frame_times: &[f64]) -> Vec<EnergySample> {
    if rms.is_empty() {
        return Vec::new();
    }

    let peak = rms.iter().copied().fold(0.0f32, f32::max) as f64;
    let stride = (rms.len() / ENERGY_CURVE_POINTS).max(1);

    rms.iter()
        .zip(frame_times.iter())
        .step_by(stride)
        .map(|(&value, &time)| EnergySample {
            time,
            energy: (value as f64 / (peak + ENERGY_EPSILON)).clamp(0.0, 1.0),
        })
        .collect()
}

/// Mean and population standard deviation of the full centroid sequence.
pub fn spectral_summary(centroid: &[f32]) -> SpectralSummary {
    if centroid.is_empty() {
        return SpectralSummary {
            centroid_mean: 0.0,
            brightness: 0.0,
        };
    }

    let n = centroid.len() as f64;
    let mean = centroid.iter().map(|&c| c as f64).sum::<f64>() / n;
    let variance = centroid
        .iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    SpectralSummary {
        centroid_mean: mean,
        brightness: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{SectionName, SpectralFeatures};
    use anyhow::Result;

    struct FixedPrimitives(SpectralFeatures);

    impl SpectralPrimitives for FixedPrimitives {
        fn extract(&self, _track: &AudioTrack) -> Result<SpectralFeatures> {
            Ok(self.0.clone())
        }
    }

    struct FailingPrimitives;

    impl SpectralPrimitives for FailingPrimitives {
        fn extract(&self, _track: &AudioTrack) -> Result<SpectralFeatures> {
            anyhow::bail!("onset strength unavailable")
        }
    }

    fn times(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn energy_curve_bounded_with_peak_at_one() {
        let rms: Vec<f32> = (0..250).map(|i| ((i * 37) % 101) as f32 / 10.0).collect();
        let curve = energy_curve(&rms, &times(250, 0.01));

        assert!(curve.iter().all(|s| (0.0..=1.0).contains(&s.energy)));
        // stride 2 keeps even frames; frame 30 holds the peak value 10.0
        let peak = curve.iter().map(|s| s.energy).fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-6);
    }

    #[test]
    fn energy_curve_length_follows_stride() {
        for &n in &[1usize, 7, 99, 100, 101, 199, 250, 1000, 1234] {
            let rms = vec![0.5f32; n];
            let curve = energy_curve(&rms, &times(n, 0.02));
            let stride = (n / 100).max(1);
            assert_eq!(curve.len(), (n + stride - 1) / stride, "n={}", n);
        }
        assert!(energy_curve(&[], &[]).is_empty());
    }

    #[test]
    fn silent_rms_does_not_divide_by_zero() {
        let curve = energy_curve(&[0.0; 10], &times(10, 0.1));
        assert!(curve.iter().all(|s| s.energy == 0.0));
    }

    #[test]
    fn summary_uses_population_stddev() {
        let summary = spectral_summary(&[1000.0, 2000.0, 3000.0, 4000.0]);
        assert!((summary.centroid_mean - 2500.0).abs() < 1e-9);
        assert!((summary.brightness - 1118.033988749895).abs() < 1e-6);
    }

    #[test]
    fn analyze_wraps_primitive_output() {
        let mut envelope = vec![0.0f32; 200];
        envelope[102] = 4.0;
        let features = SpectralFeatures {
            onset_envelope: envelope,
            frame_times: times(200, 0.01),
            tempo_bpm: 128.0,
            beat_times: vec![0.0, 0.5, 1.0, 1.5],
            onset_times: vec![1.02, 0.3],
            rms: vec![0.25; 200],
            spectral_centroid: vec![1500.0; 200],
        };
        let track = AudioTrack::new(vec![0.0; 4410], 2205);
        let desc = analyze(&track, &FixedPrimitives(features));

        assert!(!desc.is_degraded());
        assert_eq!(desc.bpm, 128.0);
        assert_eq!(desc.duration, Some(2.0));
        assert_eq!(desc.beats.len(), 4);
        assert!(desc.beats.iter().all(|b| b.strength == 1.0));
        let onsets: Vec<f64> = desc.onsets.unwrap().iter().map(|o| o.time).collect();
        assert_eq!(onsets, vec![1.02, 0.3]);
        assert_eq!(desc.energy_curve.len(), 100);
        assert_eq!(desc.sections.len(), 1);
        assert_eq!(desc.sections[0].name, SectionName::Intro);
        assert_eq!(desc.sections[0].start_time, 1.0);
        let summary = desc.spectral_summary.unwrap();
        assert_eq!(summary.centroid_mean, 1500.0);
        assert_eq!(summary.brightness, 0.0);
    }

    #[test]
    fn primitive_failure_degrades() {
        let track = AudioTrack::new(vec![0.1; 100], 100);
        let desc = analyze(&track, &FailingPrimitives);
        assert!(desc.is_degraded());
        assert_eq!(desc.bpm, 120.0);
        assert!(desc.beats.is_empty());
        assert!(desc.sections.is_empty());
        assert!(desc.energy_curve.is_empty());
        assert!(desc.error.unwrap().contains("onset strength unavailable"));
    }

    #[test]
    fn unreadable_file_degrades() {
        let desc = analyze_file(Path::new("/nonexistent/track.wav"), None, &FailingPrimitives);
        assert!(desc.is_degraded());
        assert!(desc.error.unwrap().contains("Failed to open audio file"));
    }
}
