use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::vision::FaceDetector;

/// Mouth region of interest in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouthRoi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MouthRoi {
    /// Intersect with a `frame_width` x `frame_height` frame. `None` when nothing is left.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<MouthRoi> {
        let x0 = self.x.min(frame_width);
        let y0 = self.y.min(frame_height);
        let x1 = self.x.saturating_add(self.width).min(frame_width);
        let y1 = self.y.saturating_add(self.height).min(frame_height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(MouthRoi {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Finds the mouth in a frame. `None` means the frame is left alone.
pub trait MouthLocator {
    fn locate(&self, frame: &RgbImage) -> Option<MouthRoi>;
}

/// Which locator a lipsync call uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// Fixed lower-center box, no detection needed
    #[default]
    Geometric,
    /// Mouth band of the largest detected face
    Face,
}

/// Fixed box in the lower middle of the frame.
pub struct GeometricLocator;

impl MouthLocator for GeometricLocator {
    fn locate(&self, frame: &RgbImage) -> Option<MouthRoi> {
        let (w, h) = frame.dimensions();
        let roi = MouthRoi {
            x: (w - w / 3) / 2,
            y: h / 2 + h / 8,
            width: w / 3,
            height: h / 6,
        };
        roi.clip(w, h)
    }
}

/// Mouth band of the largest face reported by a detector.
pub struct FaceDetectionLocator<'a> {
    detector: &'a dyn FaceDetector,
}

impl<'a> FaceDetectionLocator<'a> {
    pub fn new(detector: &'a dyn FaceDetector) -> Self {
        Self { detector }
    }
}

impl MouthLocator for FaceDetectionLocator<'_> {
    fn locate(&self, frame: &RgbImage) -> Option<MouthRoi> {
        let faces = match self.detector.detect(frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::debug!("Mouth not located: {}", e);
                return None;
            }
        };

        let face = faces
            .iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()))?;
        let mouth = face.mouth_region();

        let (w, h) = frame.dimensions();
        let to_px = |v: f64, size: u32| (v * size as f64).clamp(0.0, size as f64).round() as u32;
        let x0 = to_px(mouth.x_min, w);
        let x1 = to_px(mouth.x_max, w);
        let y0 = to_px(mouth.y_min, h);
        let y1 = to_px(mouth.y_max, h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        MouthRoi {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
        .clip(w, h)
    }
}
