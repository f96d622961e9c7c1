//! CLI argument parsing.
//!
//! With no subcommand the interactive generation wizard runs.
use crate::wizard::ExecutionMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "amg",
    version,
    about = "Interactive text-to-music generation on an ACE-Step server",
    after_help = "Commands:\n  generate [--mode local|runpod]   Run the interactive wizard (default)\n  config [--json]                  Show the effective configuration (secrets masked)\n  gpu [--duration S] [--batch-size N]  Show the local GPU and a VRAM estimate\n\nExamples:\n  amg\n  amg generate --mode runpod\n  amg --config ./config.toml config --json\n  amg gpu --duration 240 --batch-size 2"
)]
pub struct RootArgs {
    /// Config file to load instead of the default search paths
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log progress details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    Config(ConfigArgs),
    Gpu(GpuArgs),
}

#[derive(Parser, Debug, Default)]
#[command(about = "Run the interactive generation wizard")]
pub struct GenerateArgs {
    /// Skip the execution mode menu
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,
}

#[derive(Parser, Debug)]
#[command(about = "Show the effective configuration with secrets masked")]
pub struct ConfigArgs {
    /// Emit JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Detect the local GPU and estimate VRAM for a job")]
pub struct GpuArgs {
    /// Sample duration in seconds (defaults to the configured duration)
    #[arg(long, value_name = "SECS")]
    pub duration: Option<f64>,

    /// Samples per job (defaults to the configured batch size)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<u32>,
}
