use super::*;
use crate::request::GenerationParams;
use crate::result::{AudioResult, MetaValue};

#[test]
fn slugify_collapses_punctuation_runs() {
    assert_eq!(slugify("Rock & Roll!!!", DEFAULT_SLUG_LEN), "rock_roll");
    assert_eq!(slugify("---hello---", DEFAULT_SLUG_LEN), "hello");
    assert_eq!(slugify("Café Música", DEFAULT_SLUG_LEN), "caf_m_sica");
}

#[test]
fn slugify_handles_empty_and_long_input() {
    assert_eq!(slugify("", DEFAULT_SLUG_LEN), "");
    assert_eq!(slugify("?!", DEFAULT_SLUG_LEN), "");
    assert_eq!(slugify("hello world", 5), "hello");
    let long = "a".repeat(100);
    assert_eq!(slugify(&long, DEFAULT_SLUG_LEN).len(), DEFAULT_SLUG_LEN);
}

#[test]
fn format_size_picks_largest_unit_below_1024() {
    assert_eq!(format_size(0), "0.0B");
    assert_eq!(format_size(500), "500.0B");
    assert_eq!(format_size(1023), "1023.0B");
    assert_eq!(format_size(2048), "2.0KB");
    assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0GB");
    assert_eq!(format_size(2 * 1024 * 1024 * 1024 * 1024), "2.0TB");
}

#[test]
fn output_dir_name_has_timestamp_and_slug() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = OutputManager::new(tmp.path().join("nested").join("output"));
    let dir = manager.create_output_dir("My Awesome Song!").unwrap();
    assert!(dir.is_dir());
    assert_eq!(dir.parent(), Some(manager.base_dir.as_path()));

    let name = dir.file_name().unwrap().to_str().unwrap();
    let pattern = Regex::new(r"^\d{8}_\d{6}_[a-z0-9_]+$").unwrap();
    assert!(pattern.is_match(name), "unexpected name {name}");
    assert!(name.ends_with("_my_awesome_song"));
}

#[test]
fn empty_prompt_keeps_trailing_separator() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = OutputManager::new(tmp.path());
    let dir = manager.create_output_dir("!!!").unwrap();
    let name = dir.file_name().unwrap().to_str().unwrap();
    let pattern = Regex::new(r"^\d{8}_\d{6}_$").unwrap();
    assert!(pattern.is_match(name), "unexpected name {name}");
}

#[test]
fn save_audio_writes_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = OutputManager::new(tmp.path());
    let path = manager
        .save_audio(b"RIFF0000", &sample_file_name(1, "wav"), tmp.path())
        .unwrap();
    assert_eq!(path, tmp.path().join("sample_1.wav"));
    assert_eq!(fs::read(&path).unwrap(), b"RIFF0000");
    assert_eq!(file_size(&path).unwrap(), "8.0B");
}

#[test]
fn metadata_round_trips_and_matches_submitted_payload() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = OutputManager::new(tmp.path());
    let request = GenerationRequest::new(GenerationParams {
        prompt: "lofi beat".to_string(),
        lyrics: "[Instrumental]".to_string(),
        bpm: Some(85),
        ..GenerationParams::default()
    })
    .unwrap();
    let mut metas = Metas::new();
    metas.insert("duration".to_string(), MetaValue::Float(61.5));
    metas.insert("size".to_string(), MetaValue::Int(2048));
    metas.insert("codec".to_string(), MetaValue::Text("mp3".to_string()));
    let result = TaskResult {
        task_id: "task-9".to_string(),
        status: TaskStatus::Succeeded,
        progress_text: String::new(),
        audios: vec![AudioResult {
            file: "/srv/out/a.mp3".to_string(),
            status: TaskStatus::Succeeded,
            prompt: "lofi beat".to_string(),
            lyrics: String::new(),
            metas,
        }],
        error: None,
    };

    let path = manager.save_metadata(&request, &result, tmp.path()).unwrap();
    assert_eq!(path, tmp.path().join(METADATA_FILE));

    let text = fs::read_to_string(&path).unwrap();
    let parsed: RunMetadata = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, RunMetadata::new(&request, &result));
    assert_eq!(parsed.settings, request.to_api_payload());
    assert_eq!(parsed.status, TaskStatus::Succeeded);

    let raw: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(raw["status"], 1);
    assert_eq!(raw["task_id"], "task-9");
    assert_eq!(raw["settings"]["bpm"], 85);
    assert_eq!(raw["audios"][0]["metas"]["size"], 2048);
}
