use super::*;

fn gpu(total_mb: u64) -> GpuInfo {
    GpuInfo {
        name: "NVIDIA GeForce RTX 4090".to_string(),
        vram_total_mb: total_mb,
        vram_free_mb: total_mb - 300,
    }
}

fn working_mb(duration: f64, batch: u32) -> u64 {
    estimate_vram_mb(duration, batch) - MODEL_BASE_MB as u64
}

#[test]
fn estimate_matches_known_points() {
    assert_eq!(estimate_vram_mb(60.0, 1), 5500);
    assert_eq!(estimate_vram_mb(120.0, 1), 7000);
    assert_eq!(estimate_vram_mb(120.0, 2), 9100);
}

#[test]
fn estimate_is_monotonic_in_duration_and_batch() {
    let durations = [10.0, 30.0, 60.0, 120.0, 240.0, 600.0];
    for batch in 1..=8 {
        for pair in durations.windows(2) {
            assert!(estimate_vram_mb(pair[0], batch) <= estimate_vram_mb(pair[1], batch));
        }
    }
    for duration in durations {
        for batch in 1..8 {
            assert!(estimate_vram_mb(duration, batch) <= estimate_vram_mb(duration, batch + 1));
        }
    }
}

#[test]
fn doubling_batch_less_than_doubles_working_memory() {
    for duration in [10.0, 60.0, 300.0, 600.0] {
        for batch in 1..=4 {
            assert!(working_mb(duration, batch * 2) < 2 * working_mb(duration, batch));
        }
    }
}

#[test]
fn parses_first_csv_line() {
    let parsed = parse_nvidia_smi("NVIDIA GeForce RTX 4090, 24564, 23000\nNVIDIA A100, 81920, 80000\n");
    assert_eq!(
        parsed,
        Some(GpuInfo {
            name: "NVIDIA GeForce RTX 4090".to_string(),
            vram_total_mb: 24564,
            vram_free_mb: 23000,
        })
    );
}

#[test]
fn rejects_malformed_csv() {
    assert_eq!(parse_nvidia_smi(""), None);
    assert_eq!(parse_nvidia_smi("Tesla T4, 15360"), None);
    assert_eq!(parse_nvidia_smi("Tesla T4, lots, 100"), None);
}

#[test]
fn no_gpu_is_assumed_to_fit() {
    assert!(check_vram_fit(Some(600.0), 8, None).fits());
}

#[test]
fn roomy_gpu_fits() {
    let card = gpu(24576);
    let verdict = check_vram_fit(None, 1, Some(&card));
    assert_eq!(verdict, VramFit::Fits);
    assert_eq!(verdict.message(), "");
}

#[test]
fn oversized_job_warns_about_cpu_fallback() {
    let card = gpu(24576);
    let verdict = check_vram_fit(Some(600.0), 8, Some(&card));
    assert!(matches!(verdict, VramFit::TooLarge(_)));
    assert!(verdict.message().contains("fall back to CPU"));
}

#[test]
fn small_headroom_is_tight() {
    // Default duration of 120s with batch 1 needs 7000MB.
    let card = gpu(7100);
    let verdict = check_vram_fit(None, 1, Some(&card));
    assert!(matches!(verdict, VramFit::Tight(_)));
    assert!(verdict.message().contains("6800MB free"));
    assert_eq!(check_vram_fit(Some(120.0), 1, Some(&card)), verdict);
}
