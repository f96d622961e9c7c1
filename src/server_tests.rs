use super::*;
use crate::clock::FakeClock;
use std::fs;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checkout(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("pyproject.toml"), "[project]\nname = \"acestep\"\n").unwrap();
    dir
}

#[test]
fn configured_dir_wins_when_present() {
    let tmp = tempfile::tempdir().unwrap();
    let configured = tmp.path().join("custom");
    fs::create_dir_all(&configured).unwrap();
    let candidate = checkout(tmp.path(), "candidate");

    let resolved = resolve_install_dir(configured.to_str().unwrap(), &[candidate]);
    assert_eq!(resolved, Some(configured));
}

#[test]
fn falls_back_to_first_candidate_with_pyproject() {
    let tmp = tempfile::tempdir().unwrap();
    let bare = tmp.path().join("bare");
    fs::create_dir_all(&bare).unwrap();
    let missing = tmp.path().join("missing");
    let real = checkout(tmp.path(), "real");

    let resolved = resolve_install_dir(
        tmp.path().join("nope").to_str().unwrap(),
        &[missing, bare, real.clone()],
    );
    assert_eq!(resolved, Some(real));
    assert_eq!(resolve_install_dir("", &[]), None);
}

#[test]
fn launch_command_is_split_and_port_substituted() {
    let launcher =
        ServerLauncher::new(Path::new("."), 9100, "uv run acestep-api --port {port}").unwrap();
    assert_eq!(
        launcher.argv(),
        ["uv", "run", "acestep-api", "--port", "9100"]
    );
    assert!(ServerLauncher::new(Path::new("."), 8001, "").is_err());
    assert!(ServerLauncher::new(Path::new("."), 8001, "uv 'run").is_err());
}

#[test]
fn shutdown_without_launch_is_noop() {
    let mut launcher = ServerLauncher::new(Path::new("."), 8001, "uv run acestep-api").unwrap();
    assert!(!launcher.is_launched());
    launcher.shutdown().unwrap();
}

#[cfg(unix)]
#[test]
fn launch_then_shutdown_stops_the_child() {
    let tmp = tempfile::tempdir().unwrap();
    let mut launcher = ServerLauncher::new(tmp.path(), 8001, "sleep 30").unwrap();
    let pid = launcher.launch().unwrap();
    assert!(pid > 0);
    assert!(launcher.is_launched());

    launcher.shutdown().unwrap();
    assert!(!launcher.is_launched());
}

#[test]
fn wait_until_ready_gives_up_after_timeout() {
    let launcher = ServerLauncher::new(Path::new("."), 8001, "uv run acestep-api").unwrap();
    let clock = FakeClock::new();
    assert!(!launcher.wait_until_ready("http://127.0.0.1:9", Duration::from_secs(6), &clock));
    assert_eq!(clock.sleeps(), vec![READY_POLL_INTERVAL; 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn is_running_checks_health_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let uri = server.uri();

    let (running, ready) = tokio::task::spawn_blocking(move || {
        let launcher = ServerLauncher::new(Path::new("."), 8001, "uv run acestep-api").unwrap();
        let clock = FakeClock::new();
        let running = launcher.is_running(&format!("{uri}/"));
        let ready = launcher.wait_until_ready(&uri, Duration::from_secs(10), &clock);
        (running, ready && clock.sleeps().is_empty())
    })
    .await
    .expect("blocking task");
    assert!(running);
    assert!(ready);
}
