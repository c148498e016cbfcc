use serde::{Deserialize, Serialize};

const WORD_CONFIDENCE: f64 = 0.9;
const PHONEME_CONFIDENCE: f64 = 0.8;

/// A transcript word with its estimated time span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

/// A phoneme-sized slice of a word. The symbol is placeholder text; only the
/// timing is meaningful.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhonemeTiming {
    #[serde(rename = "phoneme")]
    pub symbol: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default = "default_phoneme_confidence")]
    pub confidence: f64,
}

impl PhonemeTiming {
    /// Whether `time` falls in `[start_time, end_time)`.
    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time
    }
}

fn default_phoneme_confidence() -> f64 {
    PHONEME_CONFIDENCE
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub words: Vec<WordTiming>,
    pub phonemes: Vec<PhonemeTiming>,
}

/// Spread the transcript's words evenly over `[0, duration]` and split each
/// word into `max(1, chars / 3)` equal phoneme slots.
///
/// Deterministic. Empty transcripts and unusable durations yield an empty
/// alignment.
pub fn align(transcript: &str, duration: f64) -> Alignment {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    if words.is_empty() {
        return Alignment::default();
    }
    if !duration.is_finite() || duration < 0.0 {
        log::warn!("Cannot align transcript over duration {}", duration);
        return Alignment::default();
    }

    let n = words.len() as f64;
    let word_timings: Vec<WordTiming> = words
        .iter()
        .enumerate()
        .map(|(i, word)| WordTiming {
            text: word.to_string(),
            start_time: i as f64 * duration / n,
            end_time: if i + 1 == words.len() {
                duration
            } else {
                (i + 1) as f64 * duration / n
            },
            confidence: WORD_CONFIDENCE,
        })
        .collect();

    let phonemes = word_timings.iter().flat_map(split_word).collect();

    Alignment {
        words: word_timings,
        phonemes,
    }
}

fn split_word(word: &WordTiming) -> Vec<PhonemeTiming> {
    let syllables = (word.text.chars().count() / 3).max(1);
    let span = word.end_time - word.start_time;
    let symbol = match word.text.chars().next() {
        Some(first) => format!("{}...", first),
        None => String::new(),
    };

    (0..syllables)
        .map(|k| {
            let start_time = word.start_time + k as f64 * span / syllables as f64;
            // last slot ends exactly on the word boundary
            let end_time = if k + 1 == syllables {
                word.end_time
            } else {
                word.start_time + (k + 1) as f64 * span / syllables as f64
            };
            PhonemeTiming {
                symbol: symbol.clone(),
                start_time,
                end_time,
                confidence: PHONEME_CONFIDENCE,
            }
        })
        .collect()
}
