use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::lipsync::locator::LocatorKind;

#[derive(Parser, Debug)]
#[command(name = "songsync", about = "Song structure analysis, lyric alignment and lip-sync post-processing")]
pub struct Cli {
    /// Config file (default: ./songsync.toml or the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze song structure: tempo, beats, onsets, energy and sections
    Analyze {
        /// Input audio file (WAV, MP3, FLAC, OGG)
        audio: PathBuf,

        /// Analyze from this time (seconds)
        #[arg(long)]
        start: Option<f64>,

        /// Analyze up to this time (seconds)
        #[arg(long)]
        end: Option<f64>,

        /// Write the JSON descriptor here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Spread a transcript over a duration as word and phoneme timings
    Align {
        /// Lyrics or speech transcript
        #[arg(long)]
        transcript: String,

        /// Duration in seconds
        #[arg(long, conflicts_with = "audio", required_unless_present = "audio")]
        duration: Option<f64>,

        /// Take the duration from this audio file
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Warp the mouth region of a video along phoneme timings
    Lipsync {
        /// Input video
        video: PathBuf,

        /// Phoneme timings as JSON (an array, or an alignment with a "phonemes" field)
        #[arg(long)]
        phonemes: PathBuf,

        /// Output video file
        #[arg(short, long, default_value = "lipsync.mp4")]
        output: PathBuf,

        /// Audio track for the video (accepted, not consumed)
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Mouth expansion for vowels, in (0, 1]
        #[arg(long)]
        expand: Option<f64>,

        /// Mouth locator strategy
        #[arg(long, value_enum)]
        locator: Option<LocatorKind>,
    },

    /// Score mouth visibility of a video in [0, 1]
    Quality {
        /// Input video
        video: PathBuf,

        /// Number of leading frames to sample
        #[arg(long)]
        max_samples: Option<usize>,
    },

    /// Process JSON-lines jobs from stdin, one result line per job on stdout
    Worker,
}
