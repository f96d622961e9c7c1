//! GPU detection and a rough VRAM estimate for a generation job.
use std::process::Command;

const MODEL_BASE_MB: f64 = 4000.0;
/// Working memory for one 60s sample.
const PER_MINUTE_SAMPLE_MB: f64 = 1500.0;
/// Each extra batch sample costs this share of the first one.
const EXTRA_SAMPLE_FACTOR: f64 = 0.7;
const MIN_HEADROOM_MB: u64 = 500;
pub const DEFAULT_DURATION_SECS: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuInfo {
    pub name: String,
    pub vram_total_mb: u64,
    pub vram_free_mb: u64,
}

impl GpuInfo {
    pub fn vram_total_gb(&self) -> f64 {
        self.vram_total_mb as f64 / 1024.0
    }

    pub fn vram_free_gb(&self) -> f64 {
        self.vram_free_mb as f64 / 1024.0
    }
}

/// Query the first GPU through `nvidia-smi`; `None` when unavailable.
pub fn detect_gpu() -> Option<GpuInfo> {
    let binary = which::which("nvidia-smi").ok()?;
    let output = Command::new(binary)
        .args([
            "--query-gpu=name,memory.total,memory.free",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .map_err(|err| tracing::debug!(error = %err, "nvidia-smi failed to run"))
        .ok()?;
    if !output.status.success() {
        tracing::debug!(status = %output.status, "nvidia-smi exited with failure");
        return None;
    }
    let gpu = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout));
    if let Some(gpu) = &gpu {
        tracing::info!(name = %gpu.name, total_mb = gpu.vram_total_mb, "detected GPU");
    }
    gpu
}

/// Parse `name, total, free` from the first line of CSV output.
pub fn parse_nvidia_smi(stdout: &str) -> Option<GpuInfo> {
    let line = stdout.lines().next()?;
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }
    Some(GpuInfo {
        name: parts[0].to_string(),
        vram_total_mb: parts[1].parse().ok()?,
        vram_free_mb: parts[2].parse().ok()?,
    })
}

/// Peak VRAM in MB: model weights plus working memory that grows linearly with
/// duration and sub-linearly with batch size.
pub fn estimate_vram_mb(duration_secs: f64, batch_size: u32) -> u64 {
    let per_sample = PER_MINUTE_SAMPLE_MB * (duration_secs / 60.0);
    let extra = f64::from(batch_size.saturating_sub(1)) * per_sample * EXTRA_SAMPLE_FACTOR;
    (MODEL_BASE_MB + per_sample + extra) as u64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VramFit {
    Fits,
    /// Job likely falls back to CPU.
    TooLarge(String),
    /// Less than the minimum headroom left.
    Tight(String),
}

impl VramFit {
    pub fn fits(&self) -> bool {
        matches!(self, VramFit::Fits)
    }

    pub fn message(&self) -> &str {
        match self {
            VramFit::Fits => "",
            VramFit::TooLarge(message) | VramFit::Tight(message) => message,
        }
    }
}

/// Check a job against the detected GPU. Without a GPU the job is assumed to fit.
pub fn check_vram_fit(
    duration_secs: Option<f64>,
    batch_size: u32,
    gpu: Option<&GpuInfo>,
) -> VramFit {
    let Some(gpu) = gpu else {
        return VramFit::Fits;
    };
    let duration = duration_secs
        .filter(|secs| *secs > 0.0)
        .unwrap_or(DEFAULT_DURATION_SECS);
    let estimated = estimate_vram_mb(duration, batch_size);
    let total = gpu.vram_total_mb;
    let estimated_gb = estimated as f64 / 1024.0;

    if estimated > total {
        return VramFit::TooLarge(format!(
            "Estimated VRAM: ~{estimated_gb:.1}GB (GPU has {:.1}GB total). \
             This will likely fall back to CPU and take hours. \
             Try reducing duration or batch size.",
            gpu.vram_total_gb()
        ));
    }
    if total - estimated < MIN_HEADROOM_MB {
        return VramFit::Tight(format!(
            "Estimated VRAM: ~{estimated_gb:.1}GB (GPU has {:.1}GB total, {}MB free). \
             Very tight, may fall back to CPU. \
             Consider batch_size=1 or shorter duration.",
            gpu.vram_total_gb(),
            gpu.vram_free_mb
        ));
    }
    VramFit::Fits
}

#[cfg(test)]
#[path = "gpu_tests.rs"]
mod tests;
