mod align;
mod audio;
mod cli;
mod config;
mod jobs;
mod lipsync;
mod quality;
mod video;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::Path;

use align::PhonemeTiming;
use cli::{Cli, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match config::discover(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}, using defaults", path.display());
                config::Config::default()
            }
        },
        None => config::Config::default(),
    };
    let ctx = jobs::Context::from_config(config);

    match cli.command {
        Command::Analyze {
            audio,
            start,
            end,
            output,
        } => {
            if !audio.exists() {
                log::warn!("Input file not found: {}", audio.display());
            }
            let descriptor = crate::audio::analysis::analyze_file(
                &audio,
                jobs::time_window(start, end),
                ctx.primitives.as_ref(),
            );
            if descriptor.is_degraded() {
                log::warn!("Analysis degraded, writing fallback descriptor");
            } else {
                log::info!(
                    "Tempo {:.1} BPM, {} beats, {} sections",
                    descriptor.bpm,
                    descriptor.beats.len(),
                    descriptor.sections.len()
                );
            }
            let json = serde_json::to_string_pretty(&descriptor)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        Command::Align {
            transcript,
            duration,
            audio,
        } => {
            let alignment = jobs::align_transcript(&transcript, duration, audio.as_deref());
            log::info!(
                "Aligned {} words, {} phonemes",
                alignment.words.len(),
                alignment.phonemes.len()
            );
            println!("{}", serde_json::to_string_pretty(&alignment)?);
        }

        Command::Lipsync {
            video,
            phonemes,
            output,
            audio,
            expand,
            locator,
        } => {
            let phonemes = read_phonemes(&phonemes)?;
            let opts = ctx.lipsync_options(expand, locator);
            let ok = lipsync::postprocess_video(
                &video,
                audio.as_deref(),
                &phonemes,
                &output,
                &opts,
                ctx.detector.as_ref(),
            );
            if !ok {
                anyhow::bail!("Lip-sync post-processing failed");
            }
            log::info!("Done! Output: {}", output.display());
        }

        Command::Quality { video, max_samples } => {
            let score = quality::check_video(
                &video,
                ctx.detector.as_ref(),
                max_samples.unwrap_or(ctx.config.quality.max_samples),
            );
            println!("{}", serde_json::json!({ "score": score }));
        }

        Command::Worker => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            jobs::run_worker(&ctx, stdin.lock(), stdout.lock())?;
        }
    }

    Ok(())
}

/// Phoneme file: a bare array, or an alignment record with a `phonemes` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum PhonemeFile {
    List(Vec<PhonemeTiming>),
    Alignment { phonemes: Vec<PhonemeTiming> },
}

fn read_phonemes(path: &Path) -> Result<Vec<PhonemeTiming>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read phonemes from {}", path.display()))?;
    let parsed: PhonemeFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid phoneme JSON in {}", path.display()))?;
    Ok(match parsed {
        PhonemeFile::List(list) => list,
        PhonemeFile::Alignment { phonemes } => phonemes,
    })
}
