use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod client;
mod clock;
mod config;
mod display;
mod error;
mod gpu;
mod output;
mod poll;
mod prompts;
mod request;
mod result;
mod server;
mod tags;
mod wizard;

use cli::{Command, ConfigArgs, GenerateArgs, GpuArgs, RootArgs};
use config::LoadedConfig;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_logging(args.verbose);

    let loaded = config::load_config(args.config.as_deref())?;
    match args.command {
        None => cmd_generate(&loaded, GenerateArgs::default()),
        Some(Command::Generate(generate)) => cmd_generate(&loaded, generate),
        Some(Command::Config(config_args)) => cmd_config(&loaded, &config_args),
        Some(Command::Gpu(gpu_args)) => cmd_gpu(&loaded, &gpu_args),
    }
}

/// Logs go to stderr; stdout belongs to the wizard.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_generate(loaded: &LoadedConfig, args: GenerateArgs) -> Result<()> {
    config::validate_config(&loaded.config)
        .with_context(|| format!("invalid configuration ({})", loaded.source))?;
    wizard::run(&loaded.config, args.mode)
}

fn cmd_config(loaded: &LoadedConfig, args: &ConfigArgs) -> Result<()> {
    let shown = config::masked(&loaded.config);
    if args.json {
        let value = serde_json::json!({
            "source": loaded.source.to_string(),
            "config": shown,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("serialize config")?
        );
    } else {
        println!("# source: {}", loaded.source);
        print!(
            "{}",
            toml::to_string_pretty(&shown).context("serialize config")?
        );
    }
    Ok(())
}

fn cmd_gpu(loaded: &LoadedConfig, args: &GpuArgs) -> Result<()> {
    let defaults = &loaded.config.generation;
    let duration = args
        .duration
        .unwrap_or_else(|| f64::from(defaults.audio_duration));
    let batch_size = args.batch_size.unwrap_or(defaults.batch_size).max(1);
    let estimated = gpu::estimate_vram_mb(duration, batch_size);
    println!(
        "Job: {duration:.0}s x {batch_size} sample(s), estimated VRAM ~{:.1}GB",
        estimated as f64 / 1024.0
    );

    let Some(info) = gpu::detect_gpu() else {
        println!("No NVIDIA GPU detected (nvidia-smi unavailable).");
        return Ok(());
    };
    println!(
        "GPU: {} ({:.1}GB total, {:.1}GB free)",
        info.name,
        info.vram_total_gb(),
        info.vram_free_gb()
    );
    let fit = gpu::check_vram_fit(Some(duration), batch_size, Some(&info));
    if fit.fits() {
        println!("Fits.");
    } else {
        println!("{}", fit.message());
    }
    Ok(())
}
