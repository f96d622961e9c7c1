//! Interactive generation session.
//!
//! A session picks a backend, checks it is reachable, then repeats
//! describe -> tags -> lyrics -> settings -> submit -> poll -> download until
//! the user quits. Errors inside a cycle are shown and the session continues;
//! a server or pod that never comes up ends the session with an error.
use crate::client::pod::{pod_base_url, PodProvider, PodSpec, GPU_OPTIONS};
use crate::client::{LocalClient, MusicGenClient, PodClient, RunPodProvider};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::display::{results_table, Console, TerminalConsole};
use crate::error::ClientError;
use crate::gpu::{self, GpuInfo};
use crate::output::{self, sample_file_name, OutputManager};
use crate::poll::poll_until_done;
use crate::prompts::{self, Prompter, StdinPrompter};
use crate::request::{GenerationParams, GenerationRequest};
use crate::server::{self, ServerLauncher};
use crate::tags;
use anyhow::{anyhow, Result};

/// Where generation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutionMode {
    /// ACE-Step server on this machine
    Local,
    /// On-demand RunPod GPU pod
    #[value(name = "runpod")]
    RunPod,
}

/// Post-cycle menu answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Again,
    New,
    Quit,
}

/// A validated request plus the bare description used to name its output.
#[derive(Debug, Clone)]
struct PreparedRequest {
    description: String,
    request: GenerationRequest,
}

enum Collected {
    Quit,
    Invalid,
    Ready(PreparedRequest),
}

/// Run a session on the terminal.
pub fn run(config: &AppConfig, mode: Option<ExecutionMode>) -> Result<()> {
    let clock = SystemClock;
    let mut wizard = Wizard::new(config, StdinPrompter, TerminalConsole::new(), &clock);
    wizard.run(mode)
}

pub struct Wizard<'a, P: Prompter, C: Console> {
    config: &'a AppConfig,
    prompter: P,
    console: C,
    clock: &'a dyn Clock,
    output: OutputManager,
    gpu_detector: fn() -> Option<GpuInfo>,
    gpu: Option<GpuInfo>,
}

impl<'a, P: Prompter, C: Console> Wizard<'a, P, C> {
    pub fn new(config: &'a AppConfig, prompter: P, console: C, clock: &'a dyn Clock) -> Self {
        Self {
            config,
            prompter,
            console,
            clock,
            output: OutputManager::new(&config.output.output_dir),
            gpu_detector: gpu::detect_gpu,
            gpu: None,
        }
    }

    pub fn run(&mut self, mode: Option<ExecutionMode>) -> Result<()> {
        let mode = match mode {
            Some(mode) => mode,
            None => prompts::get_execution_mode(&mut self.prompter, &mut self.console)?,
        };
        tracing::info!(?mode, "starting session");
        match mode {
            ExecutionMode::Local => self.run_local(),
            ExecutionMode::RunPod => self.run_runpod(),
        }
    }

    fn run_local(&mut self) -> Result<()> {
        let config = self.config;
        let client = LocalClient::new(&config.server.base_url, &config.server.api_key);
        self.gpu = (self.gpu_detector)();
        let mut launcher = self.ensure_local_server(&client)?;

        let outcome = self.session(&client);

        if let Some(launcher) = launcher.as_mut() {
            if launcher.is_launched() {
                match prompts::confirm(&mut self.prompter, "Stop the ACE-Step server?", true) {
                    Ok(false) => launcher.detach(),
                    _ => {
                        launcher.shutdown()?;
                        self.console.note("Server stopped.");
                    }
                }
            }
        }
        outcome
    }

    /// Offer to start a local server when none answers. Startup timeout is fatal.
    fn ensure_local_server(&mut self, client: &LocalClient) -> Result<Option<ServerLauncher>> {
        let config = self.config;
        let base_url = config.server.base_url.as_str();
        if client.health_check() {
            return Ok(None);
        }
        self.console
            .warn(&format!("ACE-Step server not detected at {base_url}"));

        let Some(install_dir) = server::resolve_install_dir(
            &config.acestep.install_dir,
            &server::default_install_candidates(),
        ) else {
            self.console.note("Could not find ACE-Step installation.");
            self.console.note(
                "Set acestep.install_dir in config.toml or the ACESTEP_INSTALL_DIR env var.",
            );
            return Ok(None);
        };
        if !prompts::confirm(&mut self.prompter, "Launch ACE-Step server now?", true)? {
            return Ok(None);
        }

        let mut launcher = ServerLauncher::new(
            &install_dir,
            config.acestep.port,
            &config.acestep.launch_command,
        )?;
        launcher.launch()?;
        self.console
            .note("Starting ACE-Step server... (this may take a minute)");
        let limit = config.timeouts.server_start();
        if !launcher.wait_until_ready(base_url, limit, self.clock) {
            self.console.error(
                "Server Timeout",
                "Server didn't start in time. Check GPU/memory.",
            );
            launcher.shutdown()?;
            return Err(anyhow!(
                "ACE-Step server at {base_url} did not become ready within {}s",
                limit.as_secs()
            ));
        }
        self.console.success("Server ready!");
        Ok(Some(launcher))
    }

    fn run_runpod(&mut self) -> Result<()> {
        let config = self.config;
        let api_key = if config.runpod.api_key.is_empty() {
            prompts::ask_text(&mut self.prompter, "RunPod API key", "")?
        } else {
            config.runpod.api_key.clone()
        };
        if api_key.is_empty() {
            return Err(anyhow!("a RunPod API key is required"));
        }

        self.console.heading("GPU Type");
        for (idx, option) in GPU_OPTIONS.iter().enumerate() {
            self.console.line(&format!(
                "  [{}] {} (${:.2}/hr)",
                idx + 1,
                option.label,
                option.price_per_hour
            ));
        }
        let default_choice = GPU_OPTIONS
            .iter()
            .position(|option| option.gpu_type_id == config.runpod.gpu_type)
            .map_or(1, |idx| idx + 1);
        let choice = prompts::ask_int(&mut self.prompter, "Select GPU", default_choice as i64)?;
        let option = GPU_OPTIONS[(choice.clamp(1, GPU_OPTIONS.len() as i64) - 1) as usize];

        self.console
            .note(&format!("Estimated cost: ~${:.2}/hr", option.price_per_hour));
        if !prompts::confirm(&mut self.prompter, "Proceed with RunPod?", true)? {
            return Ok(());
        }

        let spec = PodSpec::new(
            option.gpu_type_id,
            &config.runpod.image_name,
            &config.runpod.template_id,
            &config.runpod.volume_id,
        );
        let mut client = PodClient::new(RunPodProvider::new(&api_key), spec)
            .with_server_api_key(&config.server.api_key);
        self.provision_pod(&mut client)?;

        let outcome = self.session(&client);

        if config.runpod.auto_destroy {
            self.destroy_pod(&mut client);
        } else if let Some(pod_id) = client.pod_id() {
            self.console
                .warn(&format!("Pod {pod_id} is still running and billing."));
        }
        outcome
    }

    /// Create the pod and wait for it and its server. Any failure tears the pod down.
    fn provision_pod<R: PodProvider>(&mut self, client: &mut PodClient<R>) -> Result<String> {
        let config = self.config;
        let timeouts = &config.timeouts;
        self.console.note("Creating RunPod instance...");
        let pod_id = client.create_pod()?;

        self.console
            .note("Waiting for pod to start... (may take 1-3 minutes)");
        let base_url = match client.wait_for_pod(timeouts.pod_start(), self.clock) {
            Ok(base_url) => base_url,
            Err(err) => {
                self.console.error(err.title(), &err.to_string());
                self.destroy_pod(client);
                return Err(err.into());
            }
        };

        self.console
            .note("Waiting for ACE-Step server to initialize...");
        if !client.wait_for_server(timeouts.pod_server(), self.clock) {
            self.console.error(
                "Server Timeout",
                "ACE-Step server on RunPod didn't start in time.",
            );
            self.destroy_pod(client);
            return Err(anyhow!(
                "server on pod {pod_id} ({}) did not become ready within {}s",
                pod_base_url(&pod_id),
                timeouts.pod_server_secs
            ));
        }
        self.console.success("RunPod ready!");
        Ok(base_url)
    }

    fn destroy_pod<R: PodProvider>(&mut self, client: &mut PodClient<R>) {
        let Some(pod_id) = client.pod_id().map(str::to_string) else {
            return;
        };
        match client.destroy_pod() {
            Ok(()) => self.console.note(&format!("Pod {pod_id} terminated.")),
            Err(err) => self.console.error(
                "Pod Cleanup Failed",
                &format!("Terminate pod {pod_id} manually: {err}"),
            ),
        }
    }

    /// Banner, then generation cycles until the user quits.
    pub fn session(&mut self, client: &dyn MusicGenClient) -> Result<()> {
        let base_url = client.base_url().unwrap_or_default().to_string();
        let connected = client.health_check();
        self.console.banner(&base_url, connected);
        if !connected {
            self.console.error(
                "Connection Failed",
                &format!("Cannot reach server at {base_url}"),
            );
            return Ok(());
        }

        let mut last: Option<PreparedRequest> = None;
        let mut next = NextStep::New;
        loop {
            let prepared = match (next, last.take()) {
                (NextStep::Again, Some(prepared)) => prepared,
                _ => match self.collect_request()? {
                    Collected::Quit => return Ok(()),
                    Collected::Invalid => {
                        next = self.post_menu()?;
                        if next == NextStep::Quit {
                            return Ok(());
                        }
                        continue;
                    }
                    Collected::Ready(prepared) => prepared,
                },
            };

            self.console.heading("Step 5: Generate!");
            if let Err(err) = self.generate(client, &prepared) {
                let title = err
                    .downcast_ref::<ClientError>()
                    .map_or("Error", ClientError::title);
                self.console.error(title, &format!("{err:#}"));
            }
            last = Some(prepared);

            next = self.post_menu()?;
            if next == NextStep::Quit {
                return Ok(());
            }
        }
    }

    /// Steps 1-4. An empty description ends the session.
    fn collect_request(&mut self) -> Result<Collected> {
        self.console.heading("Step 1: Music Description");
        let description = prompts::get_prompt(&mut self.prompter)?;
        if description.is_empty() {
            return Ok(Collected::Quit);
        }

        self.console.heading("Step 2: Style Tags (optional)");
        let tags = tags::select_tags(&mut self.prompter, &mut self.console)?;
        let prompt = tags::format_prompt_with_tags(&description, &tags);
        if !tags.is_empty() {
            self.console.note(&format!("Final prompt: {prompt}"));
        }

        self.console.heading("Step 3: Lyrics");
        let lyrics = prompts::get_lyrics(&mut self.prompter, &mut self.console)?;

        self.console.heading("Step 4: Settings");
        let settings =
            prompts::get_settings(&mut self.prompter, &mut self.console, &self.config.generation)?;

        let params = GenerationParams {
            prompt,
            lyrics,
            ..settings
        };
        match GenerationRequest::new(params) {
            Ok(request) => Ok(Collected::Ready(PreparedRequest {
                description,
                request,
            })),
            Err(err) => {
                let err = ClientError::from(err);
                self.console.error(err.title(), &err.to_string());
                Ok(Collected::Invalid)
            }
        }
    }

    /// Submit, poll and save one request.
    fn generate(&mut self, client: &dyn MusicGenClient, prepared: &PreparedRequest) -> Result<()> {
        let request = &prepared.request;
        let fit = gpu::check_vram_fit(
            request.audio_duration(),
            request.batch_size().unwrap_or(1),
            self.gpu.as_ref(),
        );
        if !fit.fits() {
            self.console.warn(fit.message());
            if !prompts::confirm(&mut self.prompter, "Continue anyway?", false)? {
                return Ok(());
            }
        }

        let submission = client.submit_task(request)?;
        tracing::info!(
            task_id = %submission.task_id,
            instrumental = request.is_instrumental(),
            "task submitted"
        );
        self.console
            .note(&format!("Task submitted: {}", submission.task_id));

        let result = poll_until_done(
            client,
            &submission.task_id,
            self.config.timeouts.generation(),
            self.clock,
            &mut self.console,
        )?;
        if result.is_failed() {
            let message = result.error.as_deref().unwrap_or("Unknown error");
            self.console.error("Generation Failed", message);
            return Ok(());
        }

        let dir = self.output.create_output_dir(&prepared.description)?;
        let extension = request.audio_format().extension();
        let mut saved = 0;
        for (idx, audio) in result.audios.iter().enumerate() {
            if audio.file.is_empty() {
                continue;
            }
            let local_path = dir.join(sample_file_name(idx + 1, extension));
            let saved_path = client.download_audio(&audio.file, &local_path)?;
            if let Ok(size) = output::file_size(&saved_path) {
                tracing::info!(path = %saved_path.display(), size = %size, "sample saved");
            }
            saved += 1;
        }
        self.output.save_metadata(request, &result, &dir)?;

        self.console
            .success(&format!("{saved} samples generated!"));
        self.console
            .table(&results_table(&result.audios, &dir.display().to_string()));
        Ok(())
    }

    fn post_menu(&mut self) -> Result<NextStep> {
        self.console
            .note("[g] Generate again  [n] New prompt  [q] Quit");
        let choice = prompts::ask_choice(&mut self.prompter, "Next", &["g", "n", "q"], "q")?;
        Ok(match choice.as_str() {
            "g" => NextStep::Again,
            "n" => NextStep::New,
            _ => NextStep::Quit,
        })
    }
}

#[cfg(test)]
#[path = "wizard_tests.rs"]
mod tests;
