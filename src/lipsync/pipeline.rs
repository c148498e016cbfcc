use indicatif::{ProgressBar, ProgressStyle};

use super::locator::MouthLocator;
use super::warp::{warp_mouth, WarpOutcome};
use crate::align::PhonemeTiming;
use crate::video::{FrameSink, FrameSource, StreamInfo, VideoError};

/// First phoneme in list order whose `[start, end)` contains `time`.
pub fn active_phoneme(phonemes: &[PhonemeTiming], time: f64) -> Option<&PhonemeTiming> {
    phonemes.iter().find(|p| p.contains(time))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub warped: u64,
    pub skipped: u64,
}

/// Frame-by-frame mouth warp driven by phoneme timings.
pub struct LipsyncPipeline<'a> {
    locator: &'a dyn MouthLocator,
    expand_factor: f64,
    show_progress: bool,
}

impl<'a> LipsyncPipeline<'a> {
    pub fn new(locator: &'a dyn MouthLocator, expand_factor: f64) -> Self {
        Self {
            locator,
            expand_factor,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Copy every frame of `source` into the sink built by `open_sink`,
    /// warping the mouth while a vowel phoneme is active.
    ///
    /// Returns `false` on any failure. Source and sink are owned here, so
    /// both are released on every exit path.
    pub fn process<S, W, F>(&self, source: S, phonemes: &[PhonemeTiming], open_sink: F) -> bool
    where
        S: FrameSource,
        W: FrameSink,
        F: FnOnce(&StreamInfo) -> Result<W, VideoError>,
    {
        if !(self.expand_factor > 0.0 && self.expand_factor <= 1.0) {
            log::error!(
                "Expand factor must be in (0, 1], got {}",
                self.expand_factor
            );
            return false;
        }

        match self.run(source, phonemes, open_sink) {
            Ok(stats) => {
                log::info!(
                    "Lipsync complete: {} frames, {} warped, {} skipped",
                    stats.frames,
                    stats.warped,
                    stats.skipped
                );
                true
            }
            Err(e) => {
                log::error!("Lipsync failed: {}", e);
                false
            }
        }
    }

    fn run<S, W, F>(
        &self,
        mut source: S,
        phonemes: &[PhonemeTiming],
        open_sink: F,
    ) -> Result<PipelineStats, VideoError>
    where
        S: FrameSource,
        W: FrameSink,
        F: FnOnce(&StreamInfo) -> Result<W, VideoError>,
    {
        let info = source.info();
        let mut sink = open_sink(&info)?;

        let pb = self.progress_bar(&info);
        let mut stats = PipelineStats::default();

        while let Some(mut frame) = source.read_frame()? {
            if let Some(phoneme) = active_phoneme(phonemes, frame.timestamp) {
                if let Some(roi) = self.locator.locate(&frame.image) {
                    match warp_mouth(&mut frame.image, roi, &phoneme.symbol, self.expand_factor) {
                        WarpOutcome::Blended => stats.warped += 1,
                        WarpOutcome::Skipped => stats.skipped += 1,
                        WarpOutcome::Passthrough => {}
                    }
                }
            }
            sink.write_frame(&frame)?;
            stats.frames += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();

        drop(source);
        sink.finish()?;
        Ok(stats)
    }

    fn progress_bar(&self, info: &StreamInfo) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(info.frame_count.unwrap_or(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}
