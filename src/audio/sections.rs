use super::features::{BeatEvent, Section, SectionKind, SECTION_ROTATION};

/// Envelope percentile above which a frame becomes a boundary candidate.
const PEAK_PERCENTILE: f64 = 70.0;

/// Split a track into labeled sections from its onset-strength envelope.
///
/// Frames strictly above the 70th percentile are snapped to the nearest beat
/// (raw time when there is no beat grid), deduplicated and sorted into section
/// starts. Each section ends where the next begins; the last one ends at the
/// final envelope frame, not at the track duration. No boundaries yields no
/// sections.
pub fn segment(envelope: &[f32], frame_times: &[f64], beats: &[BeatEvent]) -> Vec<Section> {
    let n = envelope.len().min(frame_times.len());
    if n == 0 {
        return Vec::new();
    }
    let envelope = &envelope[..n];
    let frame_times = &frame_times[..n];

    let threshold = percentile(envelope, PEAK_PERCENTILE);

    let mut boundaries: Vec<f64> = envelope
        .iter()
        .zip(frame_times.iter())
        .filter(|(&value, _)| value as f64 > threshold)
        .map(|(_, &time)| snap_to_beat(time, beats))
        .collect();
    boundaries.sort_by(|a, b| a.total_cmp(b));
    boundaries.dedup();

    log::debug!(
        "Sections: threshold={:.4}, {} boundaries",
        threshold,
        boundaries.len()
    );

    let last_frame_time = frame_times[n - 1];

    boundaries
        .iter()
        .enumerate()
        .map(|(i, &start_time)| Section {
            name: SECTION_ROTATION[i % SECTION_ROTATION.len()],
            start_time,
            end_time: boundaries.get(i + 1).copied().unwrap_or(last_frame_time),
            kind: SectionKind::Structural,
        })
        .collect()
}

/// Nearest beat by absolute difference; the earliest beat wins ties.
fn snap_to_beat(time: f64, beats: &[BeatEvent]) -> f64 {
    let mut best: Option<(f64, f64)> = None;
    for beat in beats {
        let diff = (beat.time - time).abs();
        if best.map_or(true, |(_, d)| diff < d) {
            best = Some((beat.time, diff));
        }
    }
    best.map_or(time, |(t, _)| t)
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f32], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::SectionName;

    fn grid(times: &[f64]) -> Vec<BeatEvent> {
        times.iter().map(|&t| BeatEvent::at(t)).collect()
    }

    fn frame_times(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn single_peak_snaps_to_nearest_beat() {
        let times = frame_times(200, 0.01);
        let mut envelope = vec![0.1f32; 200];
        envelope[102] = 3.0; // t = 1.02s

        let sections = segment(&envelope, &times, &grid(&[0.0, 0.5, 1.0, 1.5]));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, SectionName::Intro);
        assert_eq!(sections[0].start_time, 1.0);
        assert_eq!(sections[0].end_time, times[199]);
        assert_eq!(sections[0].kind, SectionKind::Structural);
    }

    #[test]
    fn no_beats_keeps_raw_candidate_time() {
        let times = frame_times(100, 0.05);
        let mut envelope = vec![0.0f32; 100];
        envelope[30] = 1.0;

        let sections = segment(&envelope, &times, &[]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].start_time, times[30]);
    }

    #[test]
    fn flat_envelope_yields_no_sections() {
        let times = frame_times(50, 0.1);
        assert!(segment(&[0.5; 50], &times, &grid(&[0.0, 1.0])).is_empty());
        assert!(segment(&[], &[], &[]).is_empty());
    }

    #[test]
    fn sections_are_contiguous_and_cycle_names() {
        let n = 1000;
        let times = frame_times(n, 0.01);
        let mut envelope = vec![0.0f32; n];
        // ten peaks, one per second
        for k in 0..10 {
            envelope[k * 100 + 3] = 2.0;
        }
        let beats = grid(&(0..20).map(|i| i as f64 * 0.5).collect::<Vec<_>>());

        let sections = segment(&envelope, &times, &beats);
        assert_eq!(sections.len(), 10);

        for pair in sections.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert!(pair[0].start_time < pair[1].start_time);
        }

        let names: Vec<SectionName> = sections.iter().map(|s| s.name).collect();
        for (i, name) in names.iter().enumerate() {
            assert_eq!(*name, SECTION_ROTATION[i % 7]);
        }
        assert_eq!(names[7], SectionName::Intro);
        assert_eq!(sections.last().unwrap().end_time, times[n - 1]);
    }

    #[test]
    fn candidates_sharing_a_beat_collapse() {
        let times = frame_times(300, 0.01);
        let mut envelope = vec![0.0f32; 300];
        envelope[98] = 1.0;
        envelope[101] = 1.0;
        envelope[199] = 1.0;

        let sections = segment(&envelope, &times, &grid(&[0.0, 1.0, 2.0]));
        let starts: Vec<f64> = sections.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![1.0, 2.0]);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&values, 70.0) - 3.8).abs() < 1e-9);
        assert_eq!(percentile(&[7.0], 70.0), 7.0);
    }
}
