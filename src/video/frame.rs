use image::RgbImage;
use std::fmt;

use super::error::VideoError;

/// Rational frame rate, kept exact so output streams match their input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// Rate used when a stream does not report one.
    pub const FALLBACK: FrameRate = FrameRate { num: 24, den: 1 };

    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Parse `"30000/1001"` or `"25"`; zero rates are rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let (num, den) = match value.split_once('/') {
            Some((n, d)) => (n.trim().parse().ok()?, d.trim().parse().ok()?),
            None => (value.trim().parse().ok()?, 1),
        };
        if num == 0 || den == 0 {
            return None;
        }
        Some(Self::new(num, den))
    }

    pub fn fps(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Reported frame count, when the container knows it
    pub frame_count: Option<u64>,
}

/// One decoded RGB frame. `timestamp = index / fps`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub index: u64,
    pub timestamp: f64,
    pub image: RgbImage,
}

impl VideoFrame {
    pub fn new(index: u64, frame_rate: FrameRate, image: RgbImage) -> Self {
        let fps = frame_rate.fps();
        let timestamp = if fps > 0.0 { index as f64 / fps } else { 0.0 };
        Self {
            index,
            timestamp,
            image,
        }
    }
}

/// Sequential frame input. Dropping a source releases its decode handle.
pub trait FrameSource {
    fn info(&self) -> StreamInfo;

    /// Next frame in index order, `None` at end of stream.
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, VideoError>;
}

/// Sequential frame output. Dropping a sink without `finish` abandons the
/// output and releases its encode handle.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), VideoError>;

    fn finish(self) -> Result<(), VideoError>
    where
        Self: Sized;
}

#[cfg(test)]
pub mod testing {
    //! In-memory sources and sinks for exercising frame loops.

    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    pub struct MemorySource {
        info: StreamInfo,
        frames: VecDeque<RgbImage>,
        next_index: u64,
        fail_at: Option<u64>,
        pub released: Rc<Cell<bool>>,
    }

    impl MemorySource {
        pub fn new(frame_rate: FrameRate, frames: Vec<RgbImage>) -> Self {
            let (width, height) = frames.first().map_or((0, 0), |f| f.dimensions());
            Self {
                info: StreamInfo {
                    width,
                    height,
                    frame_rate,
                    frame_count: Some(frames.len() as u64),
                },
                frames: frames.into(),
                next_index: 0,
                fail_at: None,
                released: Rc::new(Cell::new(false)),
            }
        }

        /// Return a read error instead of the frame at `index`.
        pub fn failing_at(mut self, index: u64) -> Self {
            self.fail_at = Some(index);
            self
        }
    }

    impl FrameSource for MemorySource {
        fn info(&self) -> StreamInfo {
            self.info
        }

        fn read_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
            if self.fail_at == Some(self.next_index) {
                return Err(VideoError::Read("scripted read failure".into()));
            }
            let Some(image) = self.frames.pop_front() else {
                return Ok(None);
            };
            let frame = VideoFrame::new(self.next_index, self.info.frame_rate, image);
            self.next_index += 1;
            Ok(Some(frame))
        }
    }

    impl Drop for MemorySource {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub frames: Rc<RefCell<Vec<VideoFrame>>>,
        pub finished: Rc<Cell<bool>>,
        pub released: Rc<Cell<bool>>,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), VideoError> {
            self.frames.borrow_mut().push(frame.clone());
            Ok(())
        }

        fn finish(self) -> Result<(), VideoError> {
            self.finished.set(true);
            Ok(())
        }
    }

    impl Drop for MemorySink {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    /// Solid-color RGB frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb(rgb))
    }

    /// Frame with a vertical gradient, so resized regions differ from their source.
    pub fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(y * 255 / height.max(1)) as u8, (x % 256) as u8, 40])
        })
    }
}
