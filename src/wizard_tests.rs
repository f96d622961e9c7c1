use super::*;
use crate::client::fake::{FakeClient, FakePodProvider};
use crate::clock::FakeClock;
use crate::display::CaptureConsole;
use crate::output::METADATA_FILE;
use crate::prompts::ScriptedPrompter;
use crate::result::{AudioResult, Metas, TaskResult, TaskStatus};
use std::path::Path;

/// Description, six skipped tag menus, instrumental lyrics, default settings.
const DEFAULT_CYCLE: [&str; 9] = ["Song", "", "", "", "", "", "", "", ""];

fn test_config(output_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.output.output_dir = output_dir.display().to_string();
    config
}

fn answers(parts: &[&[&str]]) -> ScriptedPrompter {
    let flat: Vec<&str> = parts.iter().flat_map(|part| part.iter().copied()).collect();
    ScriptedPrompter::new(&flat)
}

fn audio(file: &str) -> AudioResult {
    AudioResult {
        file: file.to_string(),
        status: TaskStatus::Succeeded,
        prompt: String::new(),
        lyrics: String::new(),
        metas: Metas::new(),
    }
}

fn succeeded(files: &[&str]) -> TaskResult {
    TaskResult {
        task_id: "task-1".to_string(),
        status: TaskStatus::Succeeded,
        audios: files.iter().map(|file| audio(file)).collect(),
        ..TaskResult::default()
    }
}

#[test]
fn full_cycle_downloads_samples_and_repeats_same_request() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let prompter = answers(&[
        &["Chill beat", "7", "", "", "", "", "", "", ""],
        &["g", "q"],
    ]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);

    let client = FakeClient::new();
    client.push_running(2, "");
    client.push_result(Ok(succeeded(&["/srv/a.mp3", "", "/srv/c.mp3"])));
    client.push_result(Ok(succeeded(&["/srv/d.mp3"])));

    wizard.session(&client).unwrap();

    let submissions = client.submissions.borrow();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0], submissions[1]);
    assert_eq!(submissions[0]["prompt"], "Chill beat. jazz");
    assert_eq!(submissions[0]["lyrics"], "[Instrumental]");
    assert_eq!(submissions[0]["audio_format"], "mp3");

    let downloads = client.downloads.borrow();
    let names: Vec<String> = downloads
        .iter()
        .map(|(_, path)| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["sample_1.mp3", "sample_3.mp3", "sample_1.mp3"]);
    assert_eq!(downloads[1].0, "/srv/c.mp3");
    let run_dir = downloads[0].1.parent().unwrap();
    assert!(run_dir.starts_with(tmp.path()));
    assert!(run_dir.to_string_lossy().ends_with("_chill_beat"));
    assert!(run_dir.join(METADATA_FILE).is_file());

    assert_eq!(clock.sleeps().len(), 2);
    let console = &wizard.console;
    assert!(console.contains("banner: http://fake:8001 connected=true"));
    assert!(console.contains("note: Final prompt: Chill beat. jazz"));
    assert!(console.contains("success: 2 samples generated!"));
    assert!(console.contains("success: 1 samples generated!"));
    assert!(console.contains("Generated Audio ("));
    assert_eq!(wizard.prompter.remaining(), 0);
}

#[test]
fn wav32_samples_are_saved_as_wav() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let prompter = answers(&[
        &["Song", "", "", "", "", "", "", ""],
        &["y", "wav32", "", "", "", "", "", "", ""],
        &["q"],
    ]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);
    let client = FakeClient::new();
    client.push_result(Ok(succeeded(&["/srv/a.wav"])));

    wizard.session(&client).unwrap();

    assert_eq!(client.submissions.borrow()[0]["audio_format"], "wav32");
    let downloads = client.downloads.borrow();
    assert!(downloads[0].1.ends_with("sample_1.wav"));
}

#[test]
fn failed_generation_shows_error_and_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let prompter = answers(&[&DEFAULT_CYCLE, &["n", ""]]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);
    let client = FakeClient::new();
    client.push_result(Ok(TaskResult {
        status: TaskStatus::Failed,
        error: Some("OOM".to_string()),
        ..TaskResult::default()
    }));

    wizard.session(&client).unwrap();

    assert!(wizard.console.contains("error: Generation Failed: OOM"));
    assert!(client.downloads.borrow().is_empty());
    assert_eq!(wizard.prompter.remaining(), 0);
}

#[test]
fn transport_error_is_shown_as_panel() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let prompter = answers(&[&DEFAULT_CYCLE, &["q"]]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);
    let client = FakeClient::new();
    client.fail_next_submit(ClientError::Transport {
        endpoint: "/release_task".to_string(),
        status: Some(500),
        message: "HTTP status 500".to_string(),
    });

    wizard.session(&client).unwrap();

    assert!(wizard
        .console
        .contains("error: Request Failed: /release_task failed: HTTP status 500"));
    assert_eq!(client.polls.get(), 0);
}

#[test]
fn generation_timeout_is_shown_and_session_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.timeouts.generation_secs = 4;
    let clock = FakeClock::new();
    let prompter = answers(&[&DEFAULT_CYCLE, &["q"]]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);
    let client = FakeClient::new();

    wizard.session(&client).unwrap();

    assert!(wizard.console.contains("error: Timeout: task task-1"));
    assert_eq!(clock.sleeps().len(), 3);
}

#[test]
fn invalid_settings_never_reach_the_server() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let prompter = answers(&[
        &["Song", "", "", "", "", "", "", ""],
        // Customize: keep everything but set an out-of-range BPM.
        &["y", "", "", "", "", "", "10", "", ""],
        // "Generate again" has nothing to repeat, so a new description is asked.
        &["g", ""],
    ]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);
    let client = FakeClient::new();

    wizard.session(&client).unwrap();

    assert!(wizard.console.contains("error: Invalid Settings: invalid request: bpm"));
    assert!(client.submissions.borrow().is_empty());
    assert_eq!(wizard.prompter.remaining(), 0);
}

#[test]
fn unreachable_server_ends_session_without_prompting() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let mut wizard = Wizard::new(
        &config,
        ScriptedPrompter::new(&[]),
        CaptureConsole::default(),
        &clock,
    );
    let client = FakeClient::new();
    client.healthy.set(false);

    wizard.session(&client).unwrap();

    assert!(wizard.console.contains("banner: http://fake:8001 connected=false"));
    assert!(wizard.console.contains("error: Connection Failed"));
    assert!(wizard.prompter.asked.is_empty());
}

#[test]
fn tight_vram_can_skip_submission() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let prompter = answers(&[&DEFAULT_CYCLE, &["", "q"]]);
    let mut wizard = Wizard::new(&config, prompter, CaptureConsole::default(), &clock);
    wizard.gpu = Some(GpuInfo {
        name: "Tiny".to_string(),
        vram_total_mb: 6000,
        vram_free_mb: 5000,
    });
    let client = FakeClient::new();

    wizard.session(&client).unwrap();

    assert!(wizard.console.contains("warn: Estimated VRAM"));
    assert!(client.submissions.borrow().is_empty());
}

#[test]
fn pod_wait_timeout_tears_down_the_pod() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.timeouts.pod_start_secs = 20;
    let clock = FakeClock::new();
    let mut wizard = Wizard::new(
        &config,
        ScriptedPrompter::new(&[]),
        CaptureConsole::default(),
        &clock,
    );
    let provider = FakePodProvider::default();
    let spec = PodSpec::new("NVIDIA GeForce RTX 4090", "acestep/acestep:latest", "", "");
    let mut client = PodClient::new(&provider, spec);

    let err = wizard.provision_pod(&mut client).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::Timeout { .. })
    ));
    assert_eq!(*provider.terminated.borrow(), vec!["pod-abc123".to_string()]);
    assert_eq!(client.pod_id(), None);
    assert!(wizard.console.contains("error: Timeout: pod pod-abc123"));
    assert!(wizard.console.contains("note: Pod pod-abc123 terminated."));
}

#[test]
fn runpod_mode_requires_an_api_key() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let clock = FakeClock::new();
    let mut wizard = Wizard::new(
        &config,
        ScriptedPrompter::new(&[""]),
        CaptureConsole::default(),
        &clock,
    );

    let err = wizard.run(Some(ExecutionMode::RunPod)).unwrap_err();
    assert!(err.to_string().contains("RunPod API key"));
}
