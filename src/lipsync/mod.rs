pub mod locator;
pub mod pipeline;
pub mod warp;

use std::path::Path;

use crate::align::PhonemeTiming;
use crate::video::reader::FfmpegReader;
use crate::video::writer::{EncoderSettings, FfmpegWriter};
use crate::vision::FaceDetector;
use locator::{FaceDetectionLocator, GeometricLocator, LocatorKind, MouthLocator};
use pipeline::LipsyncPipeline;

#[derive(Clone, Debug)]
pub struct LipsyncOptions {
    pub expand_factor: f64,
    pub locator: LocatorKind,
    pub encoder: EncoderSettings,
    pub show_progress: bool,
}

/// Re-encode `video` to `output` with the mouth warped along `phonemes`.
///
/// The audio track is accepted for the record only; warping is driven by the
/// phoneme timings. Returns `false` on any failure.
pub fn postprocess_video(
    video: &Path,
    audio: Option<&Path>,
    phonemes: &[PhonemeTiming],
    output: &Path,
    opts: &LipsyncOptions,
    detector: &dyn FaceDetector,
) -> bool {
    log::info!("Lipsync: {} -> {}", video.display(), output.display());
    if let Some(audio) = audio {
        log::debug!("Audio {} accepted, not consumed", audio.display());
    }

    let source = match FfmpegReader::open(video) {
        Ok(source) => source,
        Err(e) => {
            log::error!("{}", e);
            return false;
        }
    };

    let geometric = GeometricLocator;
    let face = FaceDetectionLocator::new(detector);
    let locator: &dyn MouthLocator = match opts.locator {
        LocatorKind::Geometric => &geometric,
        LocatorKind::Face => &face,
    };

    LipsyncPipeline::new(locator, opts.expand_factor)
        .with_progress(opts.show_progress)
        .process(source, phonemes, |info| {
            FfmpegWriter::create(output, info, &opts.encoder)
        })
}
