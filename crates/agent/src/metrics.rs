// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host metrics: CPU from consecutive /proc/stat reads, memory from
//! /proc/meminfo, optional GPU via nvidia-smi. Pushed every 5 seconds.
//!
//! A missing GPU tool is a degraded signal, not an error: the field is
//! simply absent.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use fortynine_proto::messages::{GpuMetrics, Message, MetricsReport, RamMetrics};

use crate::transport::Outbound;

const PUSH_INTERVAL: Duration = Duration::from_secs(5);
const GPU_TIMEOUT: Duration = Duration::from_secs(3);

/// Aggregate counters from one /proc/stat `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    pub idle: u64,
    pub total: u64,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    prev_cpu: Option<CpuSample>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the 5 s push loop until shutdown. The collector is shared with
    /// the `GET /api/metrics` handler.
    pub async fn run(
        collector: std::sync::Arc<tokio::sync::Mutex<MetricsCollector>>,
        outbound: Outbound,
        shutdown: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(PUSH_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let report = collector.lock().await.collect().await;
            let _ = outbound.send(Message::Metrics(report));
        }
    }

    /// Collect one report.
    pub async fn collect(&mut self) -> MetricsReport {
        let cpu = self.cpu_percent().await;
        let ram = read_memory().await.unwrap_or(RamMetrics { total: 0, used: 0, available: 0 });
        let gpu = read_gpu().await;
        MetricsReport { ram, cpu, gpu }
    }

    /// CPU% from the idle/total delta of two consecutive stat reads; the
    /// first read (or a read failure) falls back to the load average.
    async fn cpu_percent(&mut self) -> Option<u8> {
        match read_cpu_sample().await {
            Some(sample) => {
                let prev = self.prev_cpu.replace(sample);
                match prev {
                    Some(prev) => cpu_percent_from_samples(prev, sample),
                    None => load_average_percent().await,
                }
            }
            None => load_average_percent().await,
        }
    }
}

/// Percentage from two samples; `None` when the counters did not advance.
pub fn cpu_percent_from_samples(prev: CpuSample, next: CpuSample) -> Option<u8> {
    let total_delta = next.total.checked_sub(prev.total)?;
    if total_delta == 0 {
        return None;
    }
    let idle_delta = next.idle.saturating_sub(prev.idle).min(total_delta);
    let busy = total_delta - idle_delta;
    Some(((busy * 100) / total_delta).min(100) as u8)
}

/// Parse the aggregate `cpu` line of /proc/stat.
pub fn parse_cpu_line(line: &str) -> Option<CpuSample> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        return None;
    }
    let values: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
    if values.len() < 4 {
        return None;
    }
    // Fields: user nice system idle iowait irq softirq steal ...
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total: u64 = values.iter().sum();
    Some(CpuSample { idle, total })
}

async fn read_cpu_sample() -> Option<CpuSample> {
    let text = tokio::fs::read_to_string("/proc/stat").await.ok()?;
    parse_cpu_line(text.lines().next()?)
}

/// Approximate utilization as 1-minute load over core count.
async fn load_average_percent() -> Option<u8> {
    let text = tokio::fs::read_to_string("/proc/loadavg").await.ok()?;
    let load: f64 = text.split_whitespace().next()?.parse().ok()?;
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as f64;
    Some(((load / cores) * 100.0).clamp(0.0, 100.0) as u8)
}

async fn read_memory() -> Option<RamMetrics> {
    let text = tokio::fs::read_to_string("/proc/meminfo").await.ok()?;
    parse_meminfo(&text)
}

/// Parse MemTotal/MemAvailable (kB) into byte totals.
pub fn parse_meminfo(text: &str) -> Option<RamMetrics> {
    let mut total = None;
    let mut available = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kb(rest);
        }
    }
    let total = total?;
    let available = available?;
    Some(RamMetrics { total, used: total.saturating_sub(available), available })
}

fn parse_kb(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse::<u64>().ok().map(|kb| kb * 1024)
}

/// First GPU only; memory reported in bytes.
async fn read_gpu() -> Option<GpuMetrics> {
    let mut cmd = tokio::process::Command::new("nvidia-smi");
    cmd.args([
        "--query-gpu=utilization.gpu,memory.used,memory.total",
        "--format=csv,noheader,nounits",
    ]);
    cmd.stdin(std::process::Stdio::null());
    let output = match tokio::time::timeout(GPU_TIMEOUT, cmd.output()).await {
        Ok(Ok(o)) if o.status.success() => o,
        Ok(Ok(_)) | Ok(Err(_)) => return None,
        Err(_) => {
            debug!("nvidia-smi timed out");
            return None;
        }
    };
    parse_gpu_csv(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the first line of `nvidia-smi --query-gpu` CSV output.
pub fn parse_gpu_csv(text: &str) -> Option<GpuMetrics> {
    let line = text.lines().next()?;
    let mut fields = line.split(',').map(str::trim);
    let utilization: u8 = fields.next()?.parse().ok()?;
    let mem_used_mib: u64 = fields.next()?.parse().ok()?;
    let mem_total_mib: u64 = fields.next()?.parse().ok()?;
    Some(GpuMetrics {
        utilization,
        mem_used: mem_used_mib * 1024 * 1024,
        mem_total: mem_total_mib * 1024 * 1024,
    })
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
