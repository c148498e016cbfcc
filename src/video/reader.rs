//! FFmpeg subprocess video reader.
//!
//! ffprobe supplies the stream properties; an ffmpeg child decodes the whole
//! file to `rgb24` rawvideo on its stdout, one frame after another.

use image::RgbImage;
use serde::Deserialize;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use super::error::VideoError;
use super::frame::{FrameRate, FrameSource, StreamInfo, VideoFrame};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Read video stream properties with ffprobe.
pub fn probe(path: &Path) -> Result<StreamInfo, VideoError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| VideoError::Probe(format!("ffprobe execution failed: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VideoError::Probe(format!(
            "ffprobe failed: {}",
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }

    parse_probe(&output.stdout)
}

fn parse_probe(json: &[u8]) -> Result<StreamInfo, VideoError> {
    let data: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| VideoError::Probe(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let stream = data
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| VideoError::Probe("No video stream found".into()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VideoError::Probe("Video stream has no resolution".into())),
    };

    // r_frame_rate first, then the average rate, then 24 fps
    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .and_then(FrameRate::parse)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(FrameRate::parse))
        .unwrap_or(FrameRate::FALLBACK);

    let frame_count = stream.nb_frames.as_deref().and_then(|n| n.parse().ok());

    Ok(StreamInfo {
        width,
        height,
        frame_rate,
        frame_count,
    })
}

pub struct FfmpegReader {
    child: Option<Child>,
    stdout: BufReader<ChildStdout>,
    info: StreamInfo,
    next_index: u64,
}

impl FfmpegReader {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        if !path.exists() {
            return Err(VideoError::Open {
                path: path.to_path_buf(),
                message: "File does not exist".into(),
            });
        }

        let info = probe(path)?;

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::Open {
                path: path.to_path_buf(),
                message: format!("Failed to spawn ffmpeg: {}", e),
            })?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VideoError::Open {
                    path: path.to_path_buf(),
                    message: "ffmpeg stdout not available".into(),
                });
            }
        };

        log::debug!(
            "Opened video {}: {}x{} @ {} fps, {:?} frames",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
        );

        Ok(Self {
            child: Some(child),
            stdout: BufReader::new(stdout),
            info,
            next_index: 0,
        })
    }

    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    /// Reap the decoder at end of stream and surface a failed exit.
    fn finish_stream(&mut self) -> Result<(), VideoError> {
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| VideoError::Read(format!("Failed to wait for ffmpeg: {}", e)))?;
            if !status.success() {
                return Err(VideoError::Read(format!("ffmpeg decoder exited with {}", status)));
            }
        }
        Ok(())
    }
}

impl FrameSource for FfmpegReader {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        let mut buf = vec![0u8; self.frame_bytes()];
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(VideoError::Read(e.to_string())),
            }
        }

        if filled == 0 {
            self.finish_stream()?;
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(VideoError::Read(format!(
                "Truncated frame {}: {} of {} bytes",
                self.next_index,
                filled,
                buf.len()
            )));
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| VideoError::Read("Frame buffer size mismatch".into()))?;
        let frame = VideoFrame::new(self.next_index, self.info.frame_rate, image);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_nonexistent() {
        let result = FfmpegReader::open(Path::new("/nonexistent/video.mp4"));
        assert!(matches!(result, Err(VideoError::Open { .. })));
    }

    #[test]
    fn parses_probe_json() {
        let json = br#"{"streams": [{"width": 1280, "height": 720,
            "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001", "nb_frames": "300"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.frame_rate, FrameRate::new(30000, 1001));
        assert_eq!(info.frame_count, Some(300));
    }

    #[test]
    fn probe_falls_back_to_24_fps() {
        let json = br#"{"streams": [{"width": 64, "height": 48, "r_frame_rate": "0/0"}]}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.frame_rate, FrameRate::FALLBACK);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn probe_without_streams_fails() {
        assert!(parse_probe(br#"{"streams": []}"#).is_err());
        assert!(parse_probe(b"not json").is_err());
    }
}
