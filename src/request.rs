//! Generation request model.
//!
//! A `GenerationRequest` can only be built from parameters that pass every
//! bound check, so anything that reaches a client is already API-ready. The
//! canonical payload is produced in one place and shared by submission and
//! metadata persistence.
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const BPM_MIN: u32 = 30;
pub const BPM_MAX: u32 = 300;
pub const DURATION_MIN: f64 = 10.0;
pub const DURATION_MAX: f64 = 600.0;
pub const MAX_PROMPT_LENGTH: usize = 1024;
pub const MAX_LYRICS_LENGTH: usize = 4096;
pub const MAX_BATCH_SIZE: u32 = 8;
pub const VALID_TIME_SIGNATURES: [&str; 4] = ["2", "3", "4", "6"];

/// Lyrics value that asks the model for an instrumental track.
pub const INSTRUMENTAL_LYRICS: &str = "[Instrumental]";

pub const VALID_LANGUAGES: &[&str] = &[
    "ar", "az", "bg", "bn", "ca", "cs", "da", "de", "el", "en", "es", "fa", "fi", "fr", "he", "hi",
    "hr", "ht", "hu", "id", "is", "it", "ja", "ko", "la", "lt", "ms", "ne", "nl", "no", "pa", "pl",
    "pt", "ro", "ru", "sa", "sk", "sr", "sv", "sw", "ta", "te", "th", "tl", "tr", "uk", "ur", "vi",
    "yue", "zh", "unknown",
];

const KEY_NOTES: [char; 7] = ['A', 'B', 'C', 'D', 'E', 'F', 'G'];
const KEY_ACCIDENTALS: [&str; 5] = ["", "#", "b", "\u{266f}", "\u{266d}"];
const KEY_MODES: [&str; 2] = ["major", "minor"];

/// Audio container requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
    Wav32,
    Opus,
    Aac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Mp3,
        AudioFormat::Wav,
        AudioFormat::Flac,
        AudioFormat::Wav32,
        AudioFormat::Opus,
        AudioFormat::Aac,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav32 => "wav32",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "aac",
        }
    }

    /// File extension for downloaded samples.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav32 => "wav",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AudioFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == value)
            .ok_or_else(|| {
                let names: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.as_str()).collect();
                ValidationError::new(
                    "audio_format",
                    format!("must be one of {} (got {value:?})", names.join(", ")),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskType {
    #[default]
    #[serde(rename = "text2music")]
    Text2Music,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Text2Music => "text2music",
        }
    }
}

/// Raw, unvalidated generation parameters.
///
/// Empty strings and `None` mean "let the server decide".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub prompt: String,
    pub lyrics: String,
    pub bpm: Option<u32>,
    pub key_scale: String,
    pub time_signature: String,
    pub vocal_language: String,
    pub audio_duration: Option<f64>,
    pub batch_size: Option<u32>,
    pub inference_steps: u32,
    pub guidance_scale: f64,
    pub seed: i64,
    pub audio_format: AudioFormat,
    pub task_type: TaskType,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            lyrics: String::new(),
            bpm: None,
            key_scale: String::new(),
            time_signature: String::new(),
            vocal_language: "en".to_string(),
            audio_duration: None,
            batch_size: Some(2),
            inference_steps: 8,
            guidance_scale: 7.0,
            seed: -1,
            audio_format: AudioFormat::Mp3,
            task_type: TaskType::Text2Music,
        }
    }
}

/// Validated request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(params: GenerationParams) -> Result<Self, ValidationError> {
        validate_params(&params)?;
        Ok(Self { params })
    }

    /// Rebuild a request from a canonical payload.
    #[cfg(test)]
    pub fn from_api_payload(payload: &Map<String, Value>) -> Result<Self, ValidationError> {
        let params: GenerationParams = serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|err| ValidationError::new("payload", err.to_string()))?;
        Self::new(params)
    }

    pub fn prompt(&self) -> &str {
        &self.params.prompt
    }

    pub fn lyrics(&self) -> &str {
        &self.params.lyrics
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.params.audio_format
    }

    pub fn batch_size(&self) -> Option<u32> {
        self.params.batch_size
    }

    pub fn audio_duration(&self) -> Option<f64> {
        self.params.audio_duration
    }

    pub fn is_instrumental(&self) -> bool {
        self.params.lyrics.trim() == INSTRUMENTAL_LYRICS
    }

    /// Canonical wire payload: unset and empty-string fields are left out so
    /// the server applies its own defaults.
    pub fn to_api_payload(&self) -> Map<String, Value> {
        let p = &self.params;
        let mut map = Map::new();
        insert_text(&mut map, "prompt", &p.prompt);
        insert_text(&mut map, "lyrics", &p.lyrics);
        if let Some(bpm) = p.bpm {
            map.insert("bpm".to_string(), Value::from(bpm));
        }
        insert_text(&mut map, "key_scale", &p.key_scale);
        insert_text(&mut map, "time_signature", &p.time_signature);
        insert_text(&mut map, "vocal_language", &p.vocal_language);
        if let Some(duration) = p.audio_duration {
            map.insert("audio_duration".to_string(), Value::from(duration));
        }
        if let Some(batch_size) = p.batch_size {
            map.insert("batch_size".to_string(), Value::from(batch_size));
        }
        map.insert(
            "inference_steps".to_string(),
            Value::from(p.inference_steps),
        );
        map.insert("guidance_scale".to_string(), Value::from(p.guidance_scale));
        map.insert("seed".to_string(), Value::from(p.seed));
        insert_text(&mut map, "audio_format", p.audio_format.as_str());
        insert_text(&mut map, "task_type", p.task_type.as_str());
        map
    }
}

fn insert_text(map: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        map.insert(key.to_string(), Value::from(value));
    }
}

fn validate_params(p: &GenerationParams) -> Result<(), ValidationError> {
    let prompt_len = p.prompt.chars().count();
    if prompt_len > MAX_PROMPT_LENGTH {
        return Err(ValidationError::new(
            "prompt",
            format!("must be at most {MAX_PROMPT_LENGTH} characters (got {prompt_len})"),
        ));
    }
    let lyrics_len = p.lyrics.chars().count();
    if lyrics_len > MAX_LYRICS_LENGTH {
        return Err(ValidationError::new(
            "lyrics",
            format!("must be at most {MAX_LYRICS_LENGTH} characters (got {lyrics_len})"),
        ));
    }
    if let Some(bpm) = p.bpm {
        if !(BPM_MIN..=BPM_MAX).contains(&bpm) {
            return Err(ValidationError::new(
                "bpm",
                format!("must be between {BPM_MIN} and {BPM_MAX} (got {bpm})"),
            ));
        }
    }
    if let Some(duration) = p.audio_duration {
        if !(DURATION_MIN..=DURATION_MAX).contains(&duration) {
            return Err(ValidationError::new(
                "audio_duration",
                format!("must be between {DURATION_MIN}s and {DURATION_MAX}s (got {duration})"),
            ));
        }
    }
    if !p.time_signature.is_empty() && !VALID_TIME_SIGNATURES.contains(&p.time_signature.as_str())
    {
        return Err(ValidationError::new(
            "time_signature",
            format!(
                "must be one of {} (got {:?})",
                VALID_TIME_SIGNATURES.join(", "),
                p.time_signature
            ),
        ));
    }
    if let Some(batch_size) = p.batch_size {
        if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(ValidationError::new(
                "batch_size",
                format!("must be between 1 and {MAX_BATCH_SIZE} (got {batch_size})"),
            ));
        }
    }
    if p.inference_steps == 0 {
        return Err(ValidationError::new("inference_steps", "must be positive"));
    }
    if !p.guidance_scale.is_finite() {
        return Err(ValidationError::new("guidance_scale", "must be a finite number"));
    }
    if !p.key_scale.is_empty() && !is_valid_key_scale(&p.key_scale) {
        return Err(ValidationError::new(
            "key_scale",
            format!("invalid key {:?} (examples: \"C major\", \"F# minor\")", p.key_scale),
        ));
    }
    if !p.vocal_language.is_empty() && !VALID_LANGUAGES.contains(&p.vocal_language.as_str()) {
        return Err(ValidationError::new(
            "vocal_language",
            format!("unsupported language {:?}", p.vocal_language),
        ));
    }
    Ok(())
}

/// Accepts `<note><accidental> <mode>`, e.g. `C major`, `F# minor`, `B\u{266d} major`.
pub fn is_valid_key_scale(value: &str) -> bool {
    let Some((tonic, mode)) = value.split_once(' ') else {
        return false;
    };
    if !KEY_MODES.contains(&mode) {
        return false;
    }
    let mut chars = tonic.chars();
    let Some(note) = chars.next() else {
        return false;
    };
    if !KEY_NOTES.contains(&note) {
        return false;
    }
    KEY_ACCIDENTALS.contains(&chars.as_str())
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
