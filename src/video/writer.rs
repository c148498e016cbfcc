use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::error::VideoError;
use super::frame::{FrameSink, StreamInfo, VideoFrame};

/// Encoder options for the lip-synced output.
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
}

pub struct FfmpegWriter {
    child: Option<Child>,
    output_path: PathBuf,
    width: u32,
    height: u32,
}

impl FfmpegWriter {
    /// Start an encoder with the same size and frame rate as `info`.
    pub fn create(
        output_path: &Path,
        info: &StreamInfo,
        settings: &EncoderSettings,
    ) -> Result<Self, VideoError> {
        let writer_init = |message: String| VideoError::WriterInit {
            path: output_path.to_path_buf(),
            message,
        };

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(writer_init(format!(
                    "Output directory does not exist: {}",
                    parent.display()
                )));
            }
        }
        if info.width == 0 || info.height == 0 {
            return Err(writer_init(format!(
                "Invalid frame size {}x{}",
                info.width, info.height
            )));
        }

        let args = vec![
            "-y".to_string(),
            "-v".into(), "error".into(),
            "-f".into(), "rawvideo".into(),
            "-pixel_format".into(), "rgb24".into(),
            "-video_size".into(), format!("{}x{}", info.width, info.height),
            "-framerate".into(), info.frame_rate.to_string(),
            "-i".into(), "pipe:0".into(),
            "-c:v".into(), settings.codec.clone(),
            "-pix_fmt".into(), settings.pix_fmt.clone(),
            "-crf".into(), settings.crf.to_string(),
            "-preset".into(), "medium".into(),
        ];

        let child = Command::new("ffmpeg")
            .args(&args)
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| writer_init(format!("Failed to spawn ffmpeg. Is ffmpeg installed? {}", e)))?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {} fps, codec={}",
            info.width,
            info.height,
            info.frame_rate,
            settings.codec
        );

        Ok(Self {
            child: Some(child),
            output_path: output_path.to_path_buf(),
            width: info.width,
            height: info.height,
        })
    }
}

impl FrameSink for FfmpegWriter {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), VideoError> {
        if frame.image.dimensions() != (self.width, self.height) {
            return Err(VideoError::Write(format!(
                "Frame {} is {}x{}, encoder expects {}x{}",
                frame.index,
                frame.image.width(),
                frame.image.height(),
                self.width,
                self.height
            )));
        }

        let stdin = self
            .child
            .as_mut()
            .and_then(|c| c.stdin.as_mut())
            .ok_or_else(|| VideoError::Write("FFmpeg stdin not available".into()))?;
        stdin
            .write_all(frame.image.as_raw())
            .map_err(|e| VideoError::Write(format!("Failed to write frame to ffmpeg: {}", e)))
    }

    fn finish(mut self) -> Result<(), VideoError> {
        let Some(mut child) = self.child.take() else {
            return Err(VideoError::Encode("Encoder already finished".into()));
        };

        // Close stdin to signal EOF
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .map_err(|e| VideoError::Encode(format!("Failed to wait for ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::Encode(format!("FFmpeg exited with error:\n{}", stderr)));
        }

        log::info!("FFmpeg encoding complete: {}", self.output_path.display());
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            log::debug!("Abandoning encoder for {}", self.output_path.display());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
