//! Line-oriented input helpers for the wizard.
//!
//! All input flows through [`Prompter`] so sessions can be scripted in tests.
//! Helpers re-ask on unparseable answers; an exhausted input source is an error.
use crate::config::GenerationDefaults;
use crate::display::{Console, Table};
use crate::request::{AudioFormat, GenerationParams, INSTRUMENTAL_LYRICS, MAX_BATCH_SIZE};
use crate::wizard::ExecutionMode;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

pub trait Prompter {
    /// Show `label` and read one line, without the trailing newline.
    fn read_line(&mut self, label: &str) -> Result<String>;
}

/// Reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn read_line(&mut self, label: &str) -> Result<String> {
        let mut stdout = io::stdout();
        if label.is_empty() {
            write!(stdout, "> ")?;
        } else {
            write!(stdout, "{label}: ")?;
        }
        stdout.flush()?;
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read from stdin")?;
        if read == 0 {
            return Err(anyhow!("input closed"));
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Pre-recorded answers; records every label asked.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|answer| answer.to_string()).collect(),
            asked: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, label: &str) -> Result<String> {
        self.asked.push(label.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for {label:?}"))
    }
}

/// Trimmed free text; empty input yields `default`.
pub fn ask_text(prompter: &mut dyn Prompter, label: &str, default: &str) -> Result<String> {
    let label = if default.is_empty() {
        label.to_string()
    } else {
        format!("{label} [{default}]")
    };
    let answer = prompter.read_line(&label)?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

/// One of `choices` (case-insensitive); empty input yields `default`.
pub fn ask_choice(
    prompter: &mut dyn Prompter,
    label: &str,
    choices: &[&str],
    default: &str,
) -> Result<String> {
    let label = format!("{label} ({}) [{default}]", choices.join("/"));
    loop {
        let answer = prompter.read_line(&label)?.trim().to_lowercase();
        if answer.is_empty() {
            return Ok(default.to_string());
        }
        if let Some(choice) = choices
            .iter()
            .find(|choice| choice.eq_ignore_ascii_case(&answer))
        {
            return Ok(choice.to_string());
        }
    }
}

pub fn ask_int(prompter: &mut dyn Prompter, label: &str, default: i64) -> Result<i64> {
    let label = format!("{label} [{default}]");
    loop {
        let answer = prompter.read_line(&label)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default);
        }
        if let Ok(value) = answer.parse() {
            return Ok(value);
        }
    }
}

/// Integer or nothing; empty input yields `None`.
pub fn ask_optional_int(prompter: &mut dyn Prompter, label: &str) -> Result<Option<i64>> {
    let label = format!("{label} (blank to skip)");
    loop {
        let answer = prompter.read_line(&label)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        if let Ok(value) = answer.parse() {
            return Ok(Some(value));
        }
    }
}

/// Float with fallback: unparseable input yields `default` instead of re-asking.
pub fn ask_float_or(prompter: &mut dyn Prompter, label: &str, default: f64) -> Result<f64> {
    let answer = prompter.read_line(&format!("{label} [{default}]"))?;
    Ok(answer
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(default))
}

pub fn confirm(prompter: &mut dyn Prompter, label: &str, default: bool) -> Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    let label = format!("{label} [{hint}]");
    loop {
        let answer = prompter.read_line(&label)?.trim().to_lowercase();
        match answer.as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}

/// Lines until two consecutive blank lines; the separating blank is dropped.
pub fn read_multiline(prompter: &mut dyn Prompter) -> Result<String> {
    let mut lines: Vec<String> = Vec::new();
    loop {
        let line = prompter.read_line("")?;
        if line.is_empty() && lines.last().is_some_and(|last| last.is_empty()) {
            lines.pop();
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn get_execution_mode(
    prompter: &mut dyn Prompter,
    console: &mut dyn Console,
) -> Result<ExecutionMode> {
    console.heading("Execution Mode");
    console.line("  [1] Local server");
    console.line("  [2] RunPod (cloud GPU)");
    let choice = ask_choice(prompter, "Select mode", &["1", "2"], "1")?;
    Ok(if choice == "2" {
        ExecutionMode::RunPod
    } else {
        ExecutionMode::Local
    })
}

/// Music description; empty means the user wants to stop.
pub fn get_prompt(prompter: &mut dyn Prompter) -> Result<String> {
    ask_text(prompter, "Describe the music you want to generate", "")
}

/// Typed lyrics, lyrics loaded from a file, or the instrumental marker.
pub fn get_lyrics(prompter: &mut dyn Prompter, console: &mut dyn Console) -> Result<String> {
    loop {
        console.line("Lyrics Options:");
        console.line("  [1] Type lyrics");
        console.line("  [2] Load from file");
        console.line("  [3] Instrumental (no lyrics)");
        match ask_choice(prompter, "Select option", &["1", "2", "3"], "3")?.as_str() {
            "1" => {
                console.note("Enter lyrics (press Enter twice to finish):");
                return read_multiline(prompter);
            }
            "2" => {
                let raw = ask_text(prompter, "Path to lyrics file", "")?;
                let path = expand_home(&raw);
                match fs::read_to_string(&path) {
                    Ok(text) => return Ok(text),
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "lyrics file unreadable");
                        console.error("File Error", &format!("Cannot read {}", path.display()));
                    }
                }
            }
            _ => return Ok(INSTRUMENTAL_LYRICS.to_string()),
        }
    }
}

/// Show the configured defaults and optionally customize them.
///
/// The returned params carry no prompt or lyrics yet.
pub fn get_settings(
    prompter: &mut dyn Prompter,
    console: &mut dyn Console,
    defaults: &GenerationDefaults,
) -> Result<GenerationParams> {
    let default_format = defaults
        .audio_format
        .parse::<AudioFormat>()
        .unwrap_or_default();
    let mut table = Table::new("Generation Settings", &["Setting", "Current Value"]);
    table.push_row(vec!["Audio Format".to_string(), default_format.to_string()]);
    table.push_row(vec!["Batch Size".to_string(), defaults.batch_size.to_string()]);
    table.push_row(vec![
        "Inference Steps".to_string(),
        defaults.inference_steps.to_string(),
    ]);
    table.push_row(vec![
        "Guidance Scale".to_string(),
        defaults.guidance_scale.to_string(),
    ]);
    table.push_row(vec![
        "Duration".to_string(),
        format!("{}s", defaults.audio_duration),
    ]);
    console.table(&table);

    let mut params = GenerationParams {
        audio_format: default_format,
        batch_size: Some(defaults.batch_size),
        inference_steps: defaults.inference_steps,
        guidance_scale: defaults.guidance_scale,
        audio_duration: Some(f64::from(defaults.audio_duration)),
        ..GenerationParams::default()
    };
    if !confirm(prompter, "Customize settings?", false)? {
        return Ok(params);
    }

    let formats: Vec<&str> = AudioFormat::ALL.iter().map(AudioFormat::as_str).collect();
    let format = ask_choice(prompter, "Audio format", &formats, default_format.as_str())?;
    params.audio_format = format.parse()?;

    let batch = ask_int(
        prompter,
        &format!("Batch size (1-{MAX_BATCH_SIZE})"),
        i64::from(defaults.batch_size),
    )?;
    params.batch_size = Some(batch.clamp(1, i64::from(MAX_BATCH_SIZE)) as u32);

    let steps = ask_int(
        prompter,
        "Inference steps",
        i64::from(defaults.inference_steps),
    )?;
    // Out-of-range counts become 0 and are rejected by request validation.
    params.inference_steps = u32::try_from(steps).unwrap_or(0);
    params.guidance_scale = ask_float_or(prompter, "Guidance scale", defaults.guidance_scale)?;

    let duration = ask_int(
        prompter,
        "Duration in seconds",
        i64::from(defaults.audio_duration),
    )?;
    params.audio_duration = Some(duration as f64);
    params.bpm = ask_optional_int(prompter, "BPM")?.map(|bpm| u32::try_from(bpm).unwrap_or(0));
    params.key_scale = ask_text(prompter, "Key (e.g. \"C major\", \"F# minor\")", "")?;
    params.seed = ask_int(prompter, "Seed (-1 = random)", -1)?;
    Ok(params)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
