// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{cpu_percent_from_samples, parse_cpu_line, parse_gpu_csv, parse_meminfo, CpuSample};

#[test]
fn cpu_line_sums_idle_and_total() {
    let sample = parse_cpu_line("cpu  100 0 50 800 50 0 0 0 0 0");
    assert_eq!(sample, Some(CpuSample { idle: 850, total: 1000 }));
}

#[test]
fn cpu_line_rejects_per_core_rows() {
    assert_eq!(parse_cpu_line("cpu0 1 2 3 4"), None);
    assert_eq!(parse_cpu_line("intr 12345"), None);
}

#[test]
fn cpu_percent_is_busy_share_of_delta() {
    let prev = CpuSample { idle: 800, total: 1000 };
    let next = CpuSample { idle: 850, total: 1100 };
    // 100 total delta, 50 idle delta -> 50% busy.
    assert_eq!(cpu_percent_from_samples(prev, next), Some(50));
}

#[test]
fn cpu_percent_none_when_counters_stand_still() {
    let sample = CpuSample { idle: 10, total: 100 };
    assert_eq!(cpu_percent_from_samples(sample, sample), None);
}

#[test]
fn cpu_percent_none_when_counters_go_backwards() {
    let prev = CpuSample { idle: 10, total: 1000 };
    let next = CpuSample { idle: 10, total: 900 };
    assert_eq!(cpu_percent_from_samples(prev, next), None);
}

#[test]
fn meminfo_parses_kb_into_bytes() -> anyhow::Result<()> {
    let text = "MemTotal:       16384 kB\nMemFree:         1024 kB\nMemAvailable:    8192 kB\n";
    let ram = parse_meminfo(text).ok_or_else(|| anyhow::anyhow!("meminfo did not parse"))?;
    assert_eq!(ram.total, 16384 * 1024);
    assert_eq!(ram.available, 8192 * 1024);
    assert_eq!(ram.used, (16384 - 8192) * 1024);
    Ok(())
}

#[test]
fn meminfo_without_available_is_none() {
    assert!(parse_meminfo("MemTotal: 100 kB\n").is_none());
}

#[test]
fn gpu_csv_first_device_in_bytes() -> anyhow::Result<()> {
    let text = "35, 2048, 8192\n99, 1, 2\n";
    let gpu = parse_gpu_csv(text).ok_or_else(|| anyhow::anyhow!("gpu csv did not parse"))?;
    assert_eq!(gpu.utilization, 35);
    assert_eq!(gpu.mem_used, 2048 * 1024 * 1024);
    assert_eq!(gpu.mem_total, 8192 * 1024 * 1024);
    Ok(())
}

#[test]
fn gpu_csv_garbage_is_none() {
    assert!(parse_gpu_csv("").is_none());
    assert!(parse_gpu_csv("N/A, N/A, N/A").is_none());
}
