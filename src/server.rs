//! Launch and stop a local ACE-Step API server.
use crate::clock::Clock;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use ureq::Agent;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const INSTALL_DIR_NAME: &str = "ACE-Step-1.5";
const PORT_PLACEHOLDER: &str = "{port}";

/// Owns the server subprocess we started, if any.
#[derive(Debug)]
pub struct ServerLauncher {
    install_dir: PathBuf,
    argv: Vec<String>,
    agent: Agent,
    child: Option<Child>,
}

impl ServerLauncher {
    /// `launch_command` is split shell-style; `{port}` is replaced with `port`.
    pub fn new(install_dir: &Path, port: u16, launch_command: &str) -> Result<Self> {
        let argv: Vec<String> = shell_words::split(launch_command)
            .with_context(|| format!("parse launch command: {launch_command}"))?
            .into_iter()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, &port.to_string()))
            .collect();
        if argv.is_empty() {
            return Err(anyhow!("launch command is empty"));
        }
        let agent = Agent::config_builder()
            .timeout_global(Some(HEALTH_TIMEOUT))
            .build()
            .into();
        Ok(Self {
            install_dir: install_dir.to_path_buf(),
            argv,
            agent,
            child: None,
        })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// True only when `/health` answers 200 within the health timeout.
    pub fn is_running(&self, base_url: &str) -> bool {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        match self.agent.get(&url).call() {
            Ok(response) => response.status().as_u16() == 200,
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "server not reachable");
                false
            }
        }
    }

    /// Spawn the server in the install directory with its output discarded.
    pub fn launch(&mut self) -> Result<u32> {
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .current_dir(&self.install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!(
                    "spawn {} in {}",
                    self.argv[0],
                    self.install_dir.display()
                )
            })?;
        let pid = child.id();
        tracing::info!(pid, dir = %self.install_dir.display(), "launched ACE-Step server");
        if let Some(mut previous) = self.child.replace(child) {
            let _ = previous.kill();
            let _ = previous.wait();
        }
        Ok(pid)
    }

    /// A child was spawned and has not exited yet.
    pub fn is_launched(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Poll health until the server answers or `timeout` passes.
    pub fn wait_until_ready(&self, base_url: &str, timeout: Duration, clock: &dyn Clock) -> bool {
        let start = clock.now();
        while clock.now().duration_since(start) < timeout {
            if self.is_running(base_url) {
                return true;
            }
            clock.sleep(READY_POLL_INTERVAL);
        }
        false
    }

    /// Leave the server running after this launcher is dropped.
    pub fn detach(&mut self) {
        if let Some(child) = self.child.take() {
            tracing::info!(pid = child.id(), "leaving ACE-Step server running");
        }
    }

    /// SIGTERM, wait up to the grace period, then kill. No-op when nothing was launched.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();
        tracing::info!(pid, "stopping ACE-Step server");
        terminate(&mut child)?;

        let start = Instant::now();
        loop {
            if child.try_wait().context("check server status")?.is_some() {
                return Ok(());
            }
            if start.elapsed() > SHUTDOWN_GRACE {
                tracing::warn!(pid, "server did not stop in time, killing");
                child.kill().context("kill server")?;
                child.wait().context("wait for killed server")?;
                return Ok(());
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl Drop for ServerLauncher {
    fn drop(&mut self) {
        if self.child.is_some() {
            let _ = self.shutdown();
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<()> {
    let pid = libc::pid_t::try_from(child.id()).context("server pid out of range")?;
    // SAFETY: kill(2) with a pid we spawned and still own through `child`.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        tracing::debug!(pid, error = %err, "SIGTERM failed");
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<()> {
    child.kill().context("stop server")
}

/// Usual checkout locations, in lookup order.
pub fn default_install_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("projects").join(INSTALL_DIR_NAME));
        candidates.push(home.join(INSTALL_DIR_NAME));
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(parent) = cwd.parent() {
            candidates.push(parent.join(INSTALL_DIR_NAME));
        }
        candidates.push(cwd.join(INSTALL_DIR_NAME));
    }
    candidates
}

/// The configured directory if it exists, else the first candidate that looks
/// like a checkout (has a `pyproject.toml`).
pub fn resolve_install_dir(configured: &str, candidates: &[PathBuf]) -> Option<PathBuf> {
    if !configured.is_empty() {
        let path = crate::prompts::expand_home(configured);
        if path.is_dir() {
            return Some(path);
        }
        tracing::debug!(path = %path.display(), "configured install dir missing");
    }
    candidates
        .iter()
        .find(|candidate| candidate.is_dir() && candidate.join("pyproject.toml").is_file())
        .cloned()
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
