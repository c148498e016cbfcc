pub mod error;
pub mod frame;
pub mod reader;
pub mod writer;

pub use error::VideoError;
pub use frame::{FrameSink, FrameSource, StreamInfo};
