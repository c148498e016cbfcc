use serde::{Deserialize, Serialize};

/// Tempo used when analysis cannot produce one.
pub const DEFAULT_BPM: f64 = 120.0;

/// A beat on the grid. Strength is fixed, no per-beat confidence is modeled.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub time: f64,
    pub strength: f64,
}

impl BeatEvent {
    pub fn at(time: f64) -> Self {
        Self { time, strength: 1.0 }
    }
}

/// Detected transient attack, serialized as a bare time in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnsetEvent {
    pub time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergySample {
    pub time: f64,
    /// Normalized RMS (0.0-1.0)
    pub energy: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Outro,
}

/// Positional naming rotation for detected sections.
pub const SECTION_ROTATION: [SectionName; 7] = [
    SectionName::Intro,
    SectionName::Verse,
    SectionName::Chorus,
    SectionName::Bridge,
    SectionName::Verse,
    SectionName::Chorus,
    SectionName::Outro,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Structural,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: SectionName,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(rename = "type")]
    pub kind: SectionKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectralSummary {
    /// Mean spectral centroid (Hz)
    pub centroid_mean: f64,
    /// Standard deviation of the spectral centroid (Hz)
    pub brightness: f64,
}

/// Result of structure analysis.
///
/// A degraded descriptor carries `error` and only the fallback fields
/// (`bpm`, `beats`, `sections`, `energy_curve`); the optional fields are
/// omitted from its JSON form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub bpm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub beats: Vec<BeatEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onsets: Option<Vec<OnsetEvent>>,
    pub energy_curve: Vec<EnergySample>,
    pub sections: Vec<Section>,
    #[serde(
        default,
        rename = "spectral_features",
        skip_serializing_if = "Option::is_none"
    )]
    pub spectral_summary: Option<SpectralSummary>,
}

impl StructureDescriptor {
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            bpm: DEFAULT_BPM,
            duration: None,
            beats: Vec::new(),
            onsets: None,
            energy_curve: Vec::new(),
            sections: Vec::new(),
            spectral_summary: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Raw output of the spectral primitives, consumed as opaque sequences.
#[derive(Clone, Debug, Default)]
pub struct SpectralFeatures {
    /// Onset-strength envelope, one value per analysis frame
    pub onset_envelope: Vec<f32>,
    /// Timestamp (s) of each analysis frame; shared by envelope, RMS and centroid
    pub frame_times: Vec<f64>,
    /// Tempo from beat tracking over the envelope
    pub tempo_bpm: f64,
    /// Beat times (s), non-decreasing
    pub beat_times: Vec<f64>,
    /// Onset times (s) in detection order
    pub onset_times: Vec<f64>,
    /// RMS energy per frame (linear)
    pub rms: Vec<f32>,
    /// Spectral centroid per frame (Hz)
    pub spectral_centroid: Vec<f32>,
}
