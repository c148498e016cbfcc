//! Job harness: JSON-lines job descriptors in, one result record per job out.
//!
//! Each descriptor names its operation in `type`. Everything a job needs
//! (config, spectral primitives, face detector, result delivery) comes from
//! an explicit [`Context`] built once by the caller.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::align::{self, Alignment, PhonemeTiming};
use crate::audio::analysis::{analyze_file, TimeWindow};
use crate::audio::decode::decode_audio;
use crate::audio::features::StructureDescriptor;
use crate::audio::spectral::{SpectralPrimitives, StftSpectral};
use crate::config::Config;
use crate::lipsync::locator::LocatorKind;
use crate::lipsync::{postprocess_video, LipsyncOptions};
use crate::quality;
use crate::video::writer::EncoderSettings;
use crate::vision::{CommandFaceDetector, FaceDetector};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    AudioAnalysis {
        audio_path: PathBuf,
        #[serde(default)]
        start_time: Option<f64>,
        #[serde(default)]
        end_time: Option<f64>,
    },
    Alignment {
        transcript: String,
        #[serde(default)]
        duration: Option<f64>,
        /// Duration source when `duration` is absent
        #[serde(default)]
        audio_path: Option<PathBuf>,
    },
    Lipsync {
        video_path: PathBuf,
        #[serde(default)]
        audio_path: Option<PathBuf>,
        phonemes: Vec<PhonemeTiming>,
        output_path: PathBuf,
        #[serde(default)]
        expand_factor: Option<f64>,
        #[serde(default)]
        locator: Option<LocatorKind>,
    },
    QualityCheck {
        video_path: PathBuf,
        #[serde(default)]
        max_samples: Option<usize>,
    },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::AudioAnalysis { .. } => "audio_analysis",
            Job::Alignment { .. } => "alignment",
            Job::Lipsync { .. } => "lipsync",
            Job::QualityCheck { .. } => "quality_check",
        }
    }
}

/// One queue entry: an optional caller id plus the job itself.
#[derive(Debug, Deserialize)]
pub struct JobEnvelope {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(flatten)]
    pub job: Job,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobOutput {
    Structure(StructureDescriptor),
    Alignment(Alignment),
    Lipsync { success: bool, output_path: PathBuf },
    Quality { score: f64 },
}

#[derive(Debug, Serialize)]
pub struct JobReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub result: JobOutput,
}

/// POSTs each report to a fixed URL.
pub struct ResultDelivery {
    client: reqwest::blocking::Client,
    url: String,
}

impl ResultDelivery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url: url.into(),
        }
    }

    pub fn deliver(&self, report: &JobReport) -> Result<()> {
        let body = serde_json::to_vec(report).context("Failed to serialize job report")?;
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("Failed to POST result to {}", self.url))?;
        if !response.status().is_success() {
            anyhow::bail!("Result endpoint {} answered {}", self.url, response.status());
        }
        Ok(())
    }
}

pub struct Context {
    pub config: Config,
    pub primitives: Box<dyn SpectralPrimitives>,
    pub detector: Box<dyn FaceDetector>,
    pub delivery: Option<ResultDelivery>,
}

impl Context {
    pub fn from_config(config: Config) -> Self {
        let primitives = StftSpectral::new(config.analysis.fft_size, config.analysis.hop_length);
        let detector = CommandFaceDetector::new(
            config.detector.command.clone(),
            config.detector.args.clone(),
            config.detector.min_confidence,
        );
        let delivery = config.worker.result_url.clone().map(ResultDelivery::new);
        Self {
            config,
            primitives: Box::new(primitives),
            detector: Box::new(detector),
            delivery,
        }
    }

    pub fn lipsync_options(&self, expand_factor: Option<f64>, locator: Option<LocatorKind>) -> LipsyncOptions {
        let cfg = &self.config.lipsync;
        LipsyncOptions {
            expand_factor: expand_factor.unwrap_or(cfg.expand_factor),
            locator: locator.unwrap_or(cfg.locator),
            encoder: EncoderSettings {
                codec: cfg.codec.clone(),
                pix_fmt: cfg.pix_fmt.clone(),
                crf: cfg.crf,
            },
            show_progress: cfg.progress,
        }
    }
}

/// Analysis window from optional bounds; an open end runs to the end of the track.
pub fn time_window(start: Option<f64>, end: Option<f64>) -> Option<TimeWindow> {
    match (start, end) {
        (None, None) => None,
        (start, end) => Some(TimeWindow {
            start: start.unwrap_or(0.0),
            end: end.unwrap_or(f64::INFINITY),
        }),
    }
}

/// Alignment over an explicit duration, or over the length of `audio`.
pub fn align_transcript(transcript: &str, duration: Option<f64>, audio: Option<&std::path::Path>) -> Alignment {
    let duration = match (duration, audio) {
        (Some(d), _) => d,
        (None, Some(path)) => match decode_audio(path) {
            Ok(track) => track.duration(),
            Err(e) => {
                log::error!("Cannot read duration from {}: {:#}", path.display(), e);
                return Alignment::default();
            }
        },
        (None, None) => {
            log::warn!("Alignment needs a duration or an audio file");
            return Alignment::default();
        }
    };
    align::align(transcript, duration)
}

pub fn run_job(ctx: &Context, job: &Job) -> JobOutput {
    match job {
        Job::AudioAnalysis {
            audio_path,
            start_time,
            end_time,
        } => JobOutput::Structure(analyze_file(
            audio_path,
            time_window(*start_time, *end_time),
            ctx.primitives.as_ref(),
        )),
        Job::Alignment {
            transcript,
            duration,
            audio_path,
        } => JobOutput::Alignment(align_transcript(transcript, *duration, audio_path.as_deref())),
        Job::Lipsync {
            video_path,
            audio_path,
            phonemes,
            output_path,
            expand_factor,
            locator,
        } => {
            let opts = ctx.lipsync_options(*expand_factor, *locator);
            let success = postprocess_video(
                video_path,
                audio_path.as_deref(),
                phonemes,
                output_path,
                &opts,
                ctx.detector.as_ref(),
            );
            JobOutput::Lipsync {
                success,
                output_path: output_path.clone(),
            }
        }
        Job::QualityCheck {
            video_path,
            max_samples,
        } => JobOutput::Quality {
            score: quality::check_video(
                video_path,
                ctx.detector.as_ref(),
                max_samples.unwrap_or(ctx.config.quality.max_samples),
            ),
        },
    }
}

/// Process jobs line by line until EOF. Returns the number of jobs run.
///
/// Malformed lines are logged and skipped. Delivery failures are logged and
/// never retried.
pub fn run_worker<R: BufRead, W: Write>(ctx: &Context, input: R, mut output: W) -> Result<usize> {
    log::info!("Worker started, reading jobs from input");
    let mut processed = 0;

    for (line_no, line) in input.lines().enumerate() {
        let line = line.context("Failed to read job queue")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope: JobEnvelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Skipping malformed job on line {}: {}", line_no + 1, e);
                continue;
            }
        };

        let kind = envelope.job.kind();
        log::info!("Processing {} job {:?}", kind, envelope.id);
        let report = JobReport {
            id: envelope.id,
            kind,
            result: run_job(ctx, &envelope.job),
        };

        serde_json::to_writer(&mut output, &report).context("Failed to write job result")?;
        writeln!(output)?;
        output.flush()?;
        processed += 1;

        if let Some(delivery) = &ctx.delivery {
            if let Err(e) = delivery.deliver(&report) {
                log::error!("Result delivery failed: {:#}", e);
            }
        }
    }

    log::info!("Worker finished: {} job(s)", processed);
    Ok(processed)
}
