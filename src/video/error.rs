use std::path::PathBuf;

/// Errors from the video decode and encode collaborators.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    /// Input video missing or unreadable.
    #[error("Failed to open video '{path}': {message}")]
    Open { path: PathBuf, message: String },

    /// ffprobe failed or reported no usable video stream.
    #[error("Failed to probe video: {0}")]
    Probe(String),

    /// Frame read failed mid-stream.
    #[error("Failed to read frame: {0}")]
    Read(String),

    /// Output sink could not be created.
    #[error("Failed to initialize output writer '{path}': {message}")]
    WriterInit { path: PathBuf, message: String },

    /// Frame write failed mid-stream.
    #[error("Failed to write frame: {0}")]
    Write(String),

    /// Encoder exited with an error after the last frame.
    #[error("Encoder failed: {0}")]
    Encode(String),
}
