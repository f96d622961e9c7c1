//! Run output directories and metadata.
//!
//! Each generation run gets `<YYYYMMDD_HHMMSS>_<slug>/` under the output root,
//! holding `sample_<n>.<ext>` files and a `metadata.json` sidecar.
use crate::request::GenerationRequest;
use crate::result::{Metas, TaskResult, TaskStatus};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const METADATA_FILE: &str = "metadata.json";
pub const DEFAULT_SLUG_LEN: usize = 50;

/// Sidecar written next to the audio files of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub prompt: String,
    pub lyrics: String,
    pub task_id: String,
    pub status: TaskStatus,
    /// Canonical request payload, identical to what was submitted.
    pub settings: Map<String, Value>,
    pub audios: Vec<AudioMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub file: String,
    pub prompt: String,
    pub lyrics: String,
    pub metas: Metas,
}

impl RunMetadata {
    pub fn new(request: &GenerationRequest, result: &TaskResult) -> Self {
        Self {
            prompt: request.prompt().to_string(),
            lyrics: request.lyrics().to_string(),
            task_id: result.task_id.clone(),
            status: result.status,
            settings: request.to_api_payload(),
            audios: result
                .audios
                .iter()
                .map(|audio| AudioMetadata {
                    file: audio.file.clone(),
                    prompt: audio.prompt.clone(),
                    lyrics: audio.lyrics.clone(),
                    metas: audio.metas.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputManager {
    base_dir: PathBuf,
}

impl OutputManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create `<timestamp>_<slug>` under the base directory.
    pub fn create_output_dir(&self, prompt: &str) -> Result<PathBuf> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let name = format!("{timestamp}_{}", slugify(prompt, DEFAULT_SLUG_LEN));
        let dir = self.base_dir.join(name);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "created output directory");
        Ok(dir)
    }

    /// Clients stream downloads straight to disk; this is for bytes already in memory.
    #[cfg(test)]
    pub fn save_audio(&self, bytes: &[u8], filename: &str, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(filename);
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Write `metadata.json` for a finished run.
    pub fn save_metadata(
        &self,
        request: &GenerationRequest,
        result: &TaskResult,
        dir: &Path,
    ) -> Result<PathBuf> {
        let metadata = RunMetadata::new(request, result);
        let path = dir.join(METADATA_FILE);
        let text = serde_json::to_string_pretty(&metadata).context("serialize run metadata")?;
        fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Local file name for the `index`-th (1-based) sample.
pub fn sample_file_name(index: usize, extension: &str) -> String {
    format!("sample_{index}.{extension}")
}

fn non_alphanumeric_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"))
}

/// Lowercase, collapse non-alphanumeric runs to `_`, trim `_`, cap length.
pub fn slugify(text: &str, max_len: usize) -> String {
    let lowered = text.to_lowercase();
    let replaced = non_alphanumeric_runs().replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');
    // The slug is ASCII after replacement, so byte truncation is safe.
    trimmed[..trimmed.len().min(max_len)].to_string()
}

/// Human-readable size in 1024-based units with one decimal, e.g. `2.0KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}TB")
}

pub fn file_size(path: &Path) -> Result<String> {
    let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    Ok(format_size(meta.len()))
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
