//! Mouth-visibility quality score for a rendered video.

use std::path::Path;

use crate::video::reader::FfmpegReader;
use crate::video::{FrameSource, VideoError};
use crate::vision::{DetectError, FaceBox, FaceDetector};

/// Score when face detection or the video itself is unavailable.
pub const UNAVAILABLE_SCORE: f64 = 0.75;
/// Score when detection or decoding fails mid-run.
pub const FAILURE_SCORE: f64 = 0.70;
/// Score when the video has no frames to sample.
pub const NO_SAMPLES_SCORE: f64 = 0.7;
pub const DEFAULT_MAX_SAMPLES: usize = 30;

#[derive(Debug, thiserror::Error)]
enum QualityError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

impl From<DetectError> for QualityError {
    fn from(e: DetectError) -> Self {
        match e {
            DetectError::Unavailable(_) => QualityError::Unavailable(e.to_string()),
            DetectError::Failed(_) => QualityError::Failed(e.to_string()),
        }
    }
}

impl From<VideoError> for QualityError {
    fn from(e: VideoError) -> Self {
        QualityError::Failed(e.to_string())
    }
}

/// Best mouth visibility among the detected faces; 0 with no faces.
pub fn frame_visibility(faces: &[FaceBox]) -> f64 {
    faces
        .iter()
        .map(|f| f.mouth_region().visible_fraction())
        .fold(0.0, f64::max)
}

/// Mean mouth visibility over the first `max_samples` frames, in `[0, 1]`.
/// Failures resolve to the fixed fallback scores.
pub fn score<S: FrameSource>(mut source: S, detector: &dyn FaceDetector, max_samples: usize) -> f64 {
    match mean_visibility(&mut source, detector, max_samples) {
        Ok(Some(mean)) => mean.clamp(0.0, 1.0),
        Ok(None) => {
            log::warn!("No frames sampled, using fallback score {}", NO_SAMPLES_SCORE);
            NO_SAMPLES_SCORE
        }
        Err(QualityError::Unavailable(e)) => {
            log::warn!("{}; using fallback score {}", e, UNAVAILABLE_SCORE);
            UNAVAILABLE_SCORE
        }
        Err(QualityError::Failed(e)) => {
            log::error!("Quality check failed: {}; using fallback score {}", e, FAILURE_SCORE);
            FAILURE_SCORE
        }
    }
}

fn mean_visibility<S: FrameSource>(
    source: &mut S,
    detector: &dyn FaceDetector,
    max_samples: usize,
) -> Result<Option<f64>, QualityError> {
    let mut total = 0.0;
    let mut sampled = 0usize;
    while sampled < max_samples {
        let Some(frame) = source.read_frame()? else {
            break;
        };
        let faces = detector.detect(&frame.image)?;
        let visibility = frame_visibility(&faces);
        log::debug!(
            "Frame {}: {} face(s), mouth visibility {:.3}",
            frame.index,
            faces.len(),
            visibility
        );
        total += visibility;
        sampled += 1;
    }

    if sampled == 0 {
        return Ok(None);
    }
    Ok(Some(total / sampled as f64))
}

/// Score the video at `path`. A missing or unopenable video scores as unavailable.
pub fn check_video(path: &Path, detector: &dyn FaceDetector, max_samples: usize) -> f64 {
    log::info!("Checking mouth visibility: {}", path.display());
    match FfmpegReader::open(path) {
        Ok(source) => score(source, detector, max_samples),
        Err(e) => {
            log::warn!("{}; using fallback score {}", e, UNAVAILABLE_SCORE);
            UNAVAILABLE_SCORE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frame::testing::{solid, MemorySource};
    use crate::video::frame::FrameRate;
    use crate::vision::testing::{face, ScriptedDetector};

    fn source(n: usize) -> MemorySource {
        MemorySource::new(
            FrameRate::new(25, 1),
            (0..n).map(|_| solid(16, 16, [0, 0, 0])).collect(),
        )
    }

    #[test]
    fn no_faces_scores_zero() {
        let detector = ScriptedDetector::always(Vec::new(), 10);
        assert_eq!(score(source(10), &detector, DEFAULT_MAX_SAMPLES), 0.0);
    }

    #[test]
    fn fully_visible_faces_score_one() {
        let detector = ScriptedDetector::always(vec![face(0.2, 0.2, 0.5, 0.5)], 4);
        assert_eq!(score(source(4), &detector, DEFAULT_MAX_SAMPLES), 1.0);
    }

    #[test]
    fn unavailable_detector_scores_fallback() {
        let detector = ScriptedDetector::new(vec![Err(DetectError::Unavailable("none".into()))]);
        assert_eq!(score(source(3), &detector, DEFAULT_MAX_SAMPLES), UNAVAILABLE_SCORE);
    }

    #[test]
    fn failed_detection_scores_fallback() {
        let detector = ScriptedDetector::new(vec![
            Ok(Vec::new()),
            Err(DetectError::Failed("crashed".into())),
        ]);
        assert_eq!(score(source(3), &detector, DEFAULT_MAX_SAMPLES), FAILURE_SCORE);
    }

    #[test]
    fn read_failure_scores_fallback() {
        let detector = ScriptedDetector::always(Vec::new(), 5);
        assert_eq!(score(source(5).failing_at(1), &detector, 5), FAILURE_SCORE);
    }

    #[test]
    fn empty_video_scores_no_samples_fallback() {
        let detector = ScriptedDetector::new(Vec::new());
        assert_eq!(score(source(0), &detector, DEFAULT_MAX_SAMPLES), NO_SAMPLES_SCORE);
    }

    #[test]
    fn samples_only_the_prefix() {
        let detector = ScriptedDetector::always(vec![face(0.2, 0.2, 0.5, 0.5)], 2);
        // a read past frame 1 would fail the run
        assert_eq!(score(source(5).failing_at(2), &detector, 2), 1.0);
    }

    #[test]
    fn partial_visibility_is_averaged() {
        let detector = ScriptedDetector::new(vec![
            // half the mouth below the frame, plus a smaller face fully out
            Ok(vec![face(0.3, 0.6, 0.4, 0.5), face(1.2, 0.1, 0.1, 0.1)]),
            Ok(Vec::new()),
        ]);
        let value = score(source(2), &detector, DEFAULT_MAX_SAMPLES);
        assert!((value - 0.25).abs() < 1e-9);
    }

    #[test]
    fn missing_video_scores_unavailable() {
        let detector = ScriptedDetector::new(Vec::new());
        let value = check_video(Path::new("/nonexistent/clip.mp4"), &detector, 30);
        assert_eq!(value, UNAVAILABLE_SCORE);
    }
}
