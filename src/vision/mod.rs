//! Face detection capability.
//!
//! The core only needs normalized face bounding boxes. The shipped detector
//! delegates to an external program: each frame goes to its stdin as PNG and
//! a JSON array of boxes comes back on stdout.

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

/// Face bounding box in normalized `[0, 1]` frame coordinates. Detectors may
/// report boxes that extend past the frame edges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub xmin: f64,
    pub ymin: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_score")]
    pub score: f64,
}

fn default_score() -> f64 {
    1.0
}

/// Axis-aligned rectangle in normalized coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormRect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl FaceBox {
    /// Lower 40% of the face, inner 60% of its width.
    pub fn mouth_region(&self) -> NormRect {
        NormRect {
            x_min: self.xmin + self.width * 0.2,
            y_min: self.ymin + self.height * 0.6,
            x_max: self.xmin + self.width * 0.8,
            y_max: self.ymin + self.height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

impl NormRect {
    pub fn area(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0) * (self.y_max - self.y_min).max(0.0)
    }

    /// Fraction of this rectangle's area inside the unit square.
    pub fn visible_fraction(&self) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        let visible_w = (self.x_max.min(1.0) - self.x_min.max(0.0)).max(0.0);
        let visible_h = (self.y_max.min(1.0) - self.y_min.max(0.0)).max(0.0);
        (visible_w * visible_h / area).clamp(0.0, 1.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// No detector is installed or configured.
    #[error("Face detector unavailable: {0}")]
    Unavailable(String),

    /// The detector ran but did not produce a usable result.
    #[error("Face detection failed: {0}")]
    Failed(String),
}

pub trait FaceDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceBox>, DetectError>;
}

/// Runs an external detector program once per frame.
pub struct CommandFaceDetector {
    command: Option<String>,
    args: Vec<String>,
    min_confidence: f64,
}

impl CommandFaceDetector {
    pub fn new(command: Option<String>, args: Vec<String>, min_confidence: f64) -> Self {
        Self {
            command,
            args,
            min_confidence,
        }
    }
}

impl FaceDetector for CommandFaceDetector {
    fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceBox>, DetectError> {
        let program = self
            .command
            .as_deref()
            .ok_or_else(|| DetectError::Unavailable("no detector command configured".into()))?;

        let mut png = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DetectError::Failed(format!("Failed to encode frame: {}", e)))?;

        let mut child = Command::new(program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    DetectError::Unavailable(format!("{}: {}", program, e))
                }
                _ => DetectError::Failed(format!("Failed to spawn {}: {}", program, e)),
            })?;

        // Feed stdin from a separate thread so a chatty detector cannot block on a full stdout pipe
        let stdin = child.stdin.take();
        let feeder = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&png)?;
            }
            Ok(())
        });

        let output = child
            .wait_with_output()
            .map_err(|e| DetectError::Failed(format!("Failed to wait for {}: {}", program, e)))?;

        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(DetectError::Failed(format!("Failed to send frame: {}", e))),
            Err(_) => return Err(DetectError::Failed("Frame feeder thread panicked".into())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectError::Failed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.lines().last().unwrap_or("")
            )));
        }

        let faces: Vec<FaceBox> = serde_json::from_slice(&output.stdout)
            .map_err(|e| DetectError::Failed(format!("Invalid detector output: {}", e)))?;

        Ok(faces
            .into_iter()
            .filter(|f| f.score >= self.min_confidence)
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::face;
    use super::*;

    #[test]
    fn mouth_region_is_lower_center_band() {
        let mouth = face(0.2, 0.1, 0.5, 0.5).mouth_region();
        assert!((mouth.x_min - 0.3).abs() < 1e-12);
        assert!((mouth.x_max - 0.6).abs() < 1e-12);
        assert!((mouth.y_min - 0.4).abs() < 1e-12);
        assert!((mouth.y_max - 0.6).abs() < 1e-12);
    }

    #[test]
    fn visibility_fraction() {
        assert_eq!(face(0.2, 0.2, 0.4, 0.4).mouth_region().visible_fraction(), 1.0);

        // mouth spans y 0.9..1.1, half of it below the frame
        let half = face(0.3, 0.6, 0.4, 0.5).mouth_region().visible_fraction();
        assert!((half - 0.5).abs() < 1e-9);

        assert_eq!(face(1.5, 0.2, 0.3, 0.3).mouth_region().visible_fraction(), 0.0);
        assert_eq!(face(0.5, 0.5, 0.0, 0.0).mouth_region().visible_fraction(), 0.0);
    }

    #[test]
    fn unconfigured_detector_is_unavailable() {
        let detector = CommandFaceDetector::new(None, Vec::new(), 0.5);
        let result = detector.detect(&RgbImage::new(4, 4));
        assert!(matches!(result, Err(DetectError::Unavailable(_))));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let detector = CommandFaceDetector::new(
            Some("/nonexistent/face-detector".into()),
            Vec::new(),
            0.5,
        );
        let result = detector.detect(&RgbImage::new(4, 4));
        assert!(matches!(result, Err(DetectError::Unavailable(_))));
    }

    fn shell_detector(script: &str) -> CommandFaceDetector {
        CommandFaceDetector::new(
            Some("sh".into()),
            vec!["-c".into(), script.into()],
            0.5,
        )
    }

    #[test]
    fn drops_low_confidence_boxes() {
        let detector = shell_detector(
            r#"cat > /dev/null; echo '[{"xmin": 0.1, "ymin": 0.1, "width": 0.3, "height": 0.3, "score": 0.9},
                {"xmin": 0.5, "ymin": 0.5, "width": 0.2, "height": 0.2, "score": 0.2}]'"#,
        );
        let faces = detector.detect(&RgbImage::new(8, 8)).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].score, 0.9);
    }

    #[test]
    fn receives_frame_as_png() {
        // PNG signature starts with 0x89 'P' 'N' 'G'
        let detector = shell_detector(
            r#"if head -c 4 | grep -q PNG; then echo '[]'; else exit 1; fi"#,
        );
        assert!(detector.detect(&RgbImage::new(8, 8)).unwrap().is_empty());
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let detector = shell_detector("cat > /dev/null; echo oops >&2; exit 3");
        match detector.detect(&RgbImage::new(8, 8)) {
            Err(DetectError::Failed(message)) => assert!(message.contains("oops")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn unparsable_output_is_failure() {
        let detector = shell_detector("cat > /dev/null; echo notjson");
        let result = detector.detect(&RgbImage::new(8, 8));
        assert!(matches!(result, Err(DetectError::Failed(_))));
    }

    #[test]
    fn face_box_score_defaults() {
        let parsed: Vec<FaceBox> =
            serde_json::from_str(r#"[{"xmin": 0.1, "ymin": 0.2, "width": 0.3, "height": 0.4}]"#)
                .unwrap();
        assert_eq!(parsed[0].score, 1.0);
    }
}
