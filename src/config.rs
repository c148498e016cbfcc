use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::lipsync::locator::LocatorKind;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub lipsync: LipsyncConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
}

#[derive(Debug, Deserialize)]
pub struct LipsyncConfig {
    #[serde(default = "default_expand_factor")]
    pub expand_factor: f64,
    #[serde(default)]
    pub locator: LocatorKind,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_progress")]
    pub progress: bool,
}

#[derive(Debug, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

#[derive(Debug, Deserialize)]
pub struct DetectorConfig {
    /// External face-detector program; detection is unavailable without one
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkerConfig {
    /// Results are also POSTed here when set
    pub result_url: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            hop_length: default_hop_length(),
        }
    }
}

impl Default for LipsyncConfig {
    fn default() -> Self {
        Self {
            expand_factor: default_expand_factor(),
            locator: LocatorKind::default(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            crf: default_crf(),
            progress: default_progress(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_fft_size() -> usize { 2048 }
fn default_hop_length() -> usize { 512 }
fn default_expand_factor() -> f64 { 0.3 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_crf() -> u32 { 18 }
fn default_progress() -> bool { true }
fn default_max_samples() -> usize { crate::quality::DEFAULT_MAX_SAMPLES }
fn default_min_confidence() -> f64 { 0.5 }

/// Explicit path first, then `./songsync.toml`, then the user config locations.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("songsync.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("songsync").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("songsync").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}
